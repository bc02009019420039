use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Argon2Config {
    pub memory_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub output_length: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
            output_length: 32,
        }
    }
}

impl Argon2Config {
    pub fn low_memory() -> Self {
        Self {
            memory_cost_kib: 4096,
            time_cost: 1,
            parallelism: 1,
            output_length: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordIssue {
    TooShort(usize),
    TooLong(usize),
    Blank,
}

impl PasswordIssue {
    pub fn message(&self) -> String {
        match self {
            Self::TooShort(min) => format!("Password must be at least {min} characters"),
            Self::TooLong(max) => format!("Password must be at most {max} characters"),
            Self::Blank => "Password cannot be only whitespace".to_string(),
        }
    }
}

/// Checks the length policy. Counts characters, not bytes.
pub fn validate_password(password: &str) -> Result<(), PasswordIssue> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordIssue::TooShort(MIN_PASSWORD_LENGTH));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(PasswordIssue::TooLong(MAX_PASSWORD_LENGTH));
    }
    if password.trim().is_empty() {
        return Err(PasswordIssue::Blank);
    }
    Ok(())
}

pub struct PasswordHasher2 {
    argon2: Argon2<'static>,
}

impl PasswordHasher2 {
    pub fn new(argon2_config: Argon2Config) -> Result<Self> {
        let params = Params::new(
            argon2_config.memory_cost_kib,
            argon2_config.time_cost,
            argon2_config.parallelism,
            Some(argon2_config.output_length),
        )
        .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(Argon2Config::default())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?;

        Ok(hash.to_string())
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| anyhow!("Invalid password hash format: {e}"))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(anyhow!("Password verification failed: {e}")),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    PasswordHasher2::with_defaults()?.hash(password)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    PasswordHasher2::with_defaults()?.verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher2 {
        PasswordHasher2::new(Argon2Config::low_memory()).expect("hasher")
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse battery").expect("hash");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse battery", &hash).expect("verify"));
        assert!(!hasher.verify("wrong password", &hash).expect("verify"));
    }

    #[test]
    fn test_verify_with_default_params_reads_phc_string() {
        let hash = hasher().hash("another secret").expect("hash");
        assert!(verify_password("another secret", &hash).expect("verify"));
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        assert!(hasher().verify("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_length_policy() {
        assert_eq!(
            validate_password("short"),
            Err(PasswordIssue::TooShort(MIN_PASSWORD_LENGTH))
        );
        assert_eq!(
            validate_password(&"a".repeat(129)),
            Err(PasswordIssue::TooLong(MAX_PASSWORD_LENGTH))
        );
        assert_eq!(validate_password("        "), Err(PasswordIssue::Blank));
        assert!(validate_password("eightchr").is_ok());
        assert!(validate_password(&"é".repeat(8)).is_ok());
    }
}
