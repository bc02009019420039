use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::AuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
    pub leeway_seconds: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "learnserver".into(),
            audience: "learnserver-api".into(),
            access_token_expiry_minutes: 60,
            refresh_token_expiry_days: 14,
            leeway_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub nbf: i64,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        issuer: &str,
        audience: &str,
        token_type: TokenType,
        expiry: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: expiry.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: token_type.as_str().to_string(),
            email: None,
            role: None,
        }
    }

    pub fn with_email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_role(mut self, role: String) -> Self {
        self.role = Some(role);
        self
    }

    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user id in token: {e}"))
    }

    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access.as_str()
    }

    pub fn is_refresh_token(&self) -> bool {
        self.token_type == TokenType::Refresh.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// HS256 token issuer with an in-memory revocation list keyed by `jti`.
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    blacklist: Arc<RwLock<HashMap<String, i64>>>,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("config", &self.config)
            .finish()
    }
}

impl JwtManager {
    pub fn new(config: JwtConfig, secret: &str) -> Result<Self> {
        if secret.len() < 32 {
            return Err(anyhow!("JWT secret must be at least 32 characters"));
        }
        Ok(Self {
            config,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            blacklist: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Result<Self> {
        let config = JwtConfig {
            access_token_expiry_minutes: auth.access_token_minutes,
            refresh_token_expiry_days: auth.refresh_token_days,
            ..JwtConfig::default()
        };
        Self::new(config, &auth.jwt_secret)
    }

    fn encode(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode {} token: {e}", claims.token_type))
    }

    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        role: &str,
    ) -> Result<TokenPair> {
        let now = Utc::now();
        let access_expiry = now + Duration::minutes(self.config.access_token_expiry_minutes);
        let refresh_expiry = now + Duration::days(self.config.refresh_token_expiry_days);

        let access_claims = Claims::new(
            user_id,
            &self.config.issuer,
            &self.config.audience,
            TokenType::Access,
            access_expiry,
        )
        .with_email(email.to_string())
        .with_role(role.to_string());

        let refresh_claims = Claims::new(
            user_id,
            &self.config.issuer,
            &self.config.audience,
            TokenType::Refresh,
            refresh_expiry,
        );

        Ok(TokenPair {
            access_token: self.encode(&access_claims)?,
            refresh_token: self.encode(&refresh_claims)?,
            token_type: "Bearer".into(),
            expires_in: self.config.access_token_expiry_minutes * 60,
            refresh_expires_in: self.config.refresh_token_expiry_days * 24 * 60 * 60,
        })
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.leeway = self.config.leeway_seconds;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| anyhow!("Token validation failed: {e}"))
    }

    pub async fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if !claims.is_access_token() {
            return Err(anyhow!("Token is not an access token"));
        }
        if self.is_revoked(&claims.jti).await {
            return Err(anyhow!("Token has been revoked"));
        }
        Ok(claims)
    }

    pub async fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if !claims.is_refresh_token() {
            return Err(anyhow!("Token is not a refresh token"));
        }
        if self.is_revoked(&claims.jti).await {
            return Err(anyhow!("Refresh token has been revoked"));
        }
        Ok(claims)
    }

    /// Revokes the presented refresh token and returns its claims.
    /// The caller issues the new pair with the user's current role.
    pub async fn consume_refresh_token(&self, refresh_token: &str) -> Result<Claims> {
        let claims = self.validate_token(refresh_token)?;
        if !claims.is_refresh_token() {
            return Err(anyhow!("Token is not a refresh token"));
        }

        // Check and revoke under one write lock so a token is consumed at most once.
        let mut blacklist = self.blacklist.write().await;
        if blacklist.insert(claims.jti.clone(), claims.exp).is_some() {
            return Err(anyhow!("Refresh token has been revoked"));
        }
        drop(blacklist);

        debug!("Consumed refresh token for user {}", claims.sub);
        Ok(claims)
    }

    pub async fn revoke(&self, claims: &Claims) {
        let mut blacklist = self.blacklist.write().await;
        blacklist.insert(claims.jti.clone(), claims.exp);
        debug!("Revoked token {}", claims.jti);
    }

    pub async fn revoke_by_token(&self, token: &str) -> Result<()> {
        let claims = self.validate_token(token)?;
        self.revoke(&claims).await;
        Ok(())
    }

    pub async fn is_revoked(&self, jti: &str) -> bool {
        let blacklist = self.blacklist.read().await;
        blacklist.contains_key(jti)
    }

    /// Drops revocation entries whose tokens have expired anyway.
    pub async fn cleanup_blacklist(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut blacklist = self.blacklist.write().await;
        let initial_count = blacklist.len();
        blacklist.retain(|_, exp| *exp >= now);
        let removed = initial_count - blacklist.len();
        if removed > 0 {
            info!("Cleaned up {removed} entries from token blacklist");
        }
        removed
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }
}

pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}
