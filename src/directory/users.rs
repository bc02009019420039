use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use diesel::prelude::*;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{
    CreateUserRequest, UpdateRoleRequest, UpdateStatusRequest, User, UserFilters, UserRole,
    UserStatus,
};
use crate::core::shared::error::ApiError;
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{
    created_json, like_pattern, message_json, ok_json, page, with_conn, DbPool,
};
use crate::notifications::{notify, NotificationDraft, NotificationType};
use crate::security::auth_api::{AuthError, AuthenticatedUser, Permission};
use crate::security::password::{hash_password, validate_password, verify_password};

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Verified when the email is unknown so both login failures cost one argon2 check.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("learnserver-unknown-account").ok());

pub const MAX_DISPLAY_NAME_LENGTH: usize = 100;

pub fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let valid = EMAIL_RE
        .as_ref()
        .map(|re| re.is_match(&email))
        .unwrap_or(false);
    if !valid || email.len() > 254 {
        return Err(ApiError::Validation("A valid email address is required".to_string()));
    }
    Ok(email)
}

pub fn normalize_display_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Display name is required".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(ApiError::Validation(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

/// Checks a password against the account found for an email, if any.
fn check_credentials(user: Option<User>, password: &str) -> Result<User, AuthError> {
    let Some(user) = user else {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = verify_password(password, hash);
        }
        return Err(AuthError::InvalidCredentials);
    };

    let valid = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
        warn!("Stored password hash for {} is unreadable: {}", user.id, e);
        false
    });
    if !valid {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active() {
        return Err(AuthError::AccountDisabled);
    }
    Ok(user)
}

// ============================================================================
// USER DIRECTORY
// ============================================================================

pub struct UserDirectory {
    db: DbPool,
}

impl UserDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn find(&self, user_id: Uuid) -> Result<Option<User>, ApiError> {
        with_conn(&self.db, move |conn| {
            Ok(users::table.find(user_id).first(conn).optional()?)
        })
        .await
    }

    pub async fn get(&self, user_id: Uuid) -> Result<User, ApiError> {
        self.find(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User"))
    }

    pub async fn create(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: UserRole,
    ) -> Result<User, ApiError> {
        let email = normalize_email(email)?;
        let display_name = normalize_display_name(display_name)?;
        validate_password(password).map_err(|issue| ApiError::Validation(issue.message()))?;
        let password = password.to_string();

        let user = with_conn(&self.db, move |conn| {
            let password_hash =
                hash_password(&password).map_err(|e| ApiError::Internal(e.to_string()))?;
            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                email,
                display_name,
                password_hash,
                role: role.as_str().to_string(),
                status: UserStatus::Active.as_str().to_string(),
                created_at: now,
                updated_at: now,
                last_login_at: None,
            };

            diesel::insert_into(users::table)
                .values(&user)
                .execute(conn)
                .map_err(|e| match ApiError::from(e) {
                    ApiError::Conflict(_) => {
                        ApiError::Conflict("Email is already registered".to_string())
                    }
                    other => other,
                })?;
            Ok(user)
        })
        .await?;

        info!("Created {} account {}", user.role, user.id);
        Ok(user)
    }

    /// Same error for unknown email and wrong password.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let email = email.trim().to_lowercase();
        let password = password.to_string();

        with_conn(&self.db, move |conn| {
            let found: Option<User> = users::table
                .filter(users::email.eq(&email))
                .first(conn)
                .optional()?;
            let user = check_credentials(found, &password)?;

            Ok(diesel::update(users::table.find(user.id))
                .set(users::last_login_at.eq(Some(Utc::now())))
                .get_result(conn)?)
        })
        .await
    }

    pub async fn update_profile(&self, user_id: Uuid, display_name: &str) -> Result<User, ApiError> {
        let display_name = normalize_display_name(display_name)?;
        with_conn(&self.db, move |conn| {
            Ok(diesel::update(users::table.find(user_id))
                .set((
                    users::display_name.eq(display_name),
                    users::updated_at.eq(Utc::now()),
                ))
                .get_result(conn)?)
        })
        .await
    }

    pub async fn list(&self, filters: &UserFilters) -> Result<Vec<User>, ApiError> {
        let filters = filters.clone();
        with_conn(&self.db, move |conn| {
            let (limit, offset) = page(filters.limit, filters.offset);

            let mut query = users::table.into_boxed();
            if let Some(role) = filters.role {
                query = query.filter(users::role.eq(role.as_str()));
            }
            if let Some(status) = filters.status {
                query = query.filter(users::status.eq(status.as_str()));
            }
            if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
                let pattern = like_pattern(search);
                query = query.filter(
                    users::email
                        .ilike(pattern.clone())
                        .or(users::display_name.ilike(pattern)),
                );
            }

            Ok(query
                .order(users::created_at.desc())
                .limit(limit)
                .offset(offset)
                .load(conn)?)
        })
        .await
    }

    pub async fn update_role(
        &self,
        actor: &AuthenticatedUser,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<User, ApiError> {
        if actor.user_id == user_id && role != UserRole::Admin {
            return Err(ApiError::Validation(
                "Administrators cannot demote themselves".to_string(),
            ));
        }

        let user = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let user: User = diesel::update(users::table.find(user_id))
                    .set((
                        users::role.eq(role.as_str()),
                        users::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("User"))?;

                let draft = NotificationDraft::new(
                    NotificationType::Account,
                    "Role updated",
                    format!("Your role is now {}", role.as_str()),
                );
                notify(conn, user.id, &draft)?;
                Ok(user)
            })
        })
        .await?;

        info!("User {} set role of {} to {}", actor.user_id, user_id, role.as_str());
        Ok(user)
    }

    pub async fn update_status(
        &self,
        actor: &AuthenticatedUser,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<User, ApiError> {
        if actor.user_id == user_id && status != UserStatus::Active {
            return Err(ApiError::Validation(
                "Administrators cannot suspend themselves".to_string(),
            ));
        }

        let user = with_conn(&self.db, move |conn| {
            conn.transaction::<_, ApiError, _>(|conn| {
                let user: User = diesel::update(users::table.find(user_id))
                    .set((
                        users::status.eq(status.as_str()),
                        users::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)
                    .optional()?
                    .ok_or_else(|| ApiError::not_found("User"))?;

                let message = match status {
                    UserStatus::Active => "Your account has been reactivated",
                    UserStatus::Suspended => "Your account has been suspended",
                };
                let draft = NotificationDraft::new(NotificationType::Account, "Account status", message);
                notify(conn, user.id, &draft)?;
                Ok(user)
            })
        })
        .await?;

        info!(
            "User {} set status of {} to {}",
            actor.user_id,
            user_id,
            status.as_str()
        );
        Ok(user)
    }

    pub async fn delete(&self, actor: &AuthenticatedUser, user_id: Uuid) -> Result<(), ApiError> {
        if actor.user_id == user_id {
            return Err(ApiError::Validation(
                "Administrators cannot delete their own account".to_string(),
            ));
        }

        let deleted = with_conn(&self.db, move |conn| {
            Ok(diesel::delete(users::table.find(user_id)).execute(conn)?)
        })
        .await?;
        if deleted == 0 {
            return Err(ApiError::not_found("User"));
        }

        info!("User {} deleted account {}", actor.user_id, user_id);
        Ok(())
    }
}

// ============================================================================
// ADMIN HANDLERS
// ============================================================================

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(filters): Query<UserFilters>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    Ok(ok_json(directory.list(&filters).await?))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    Ok(ok_json(directory.get(user_id).await?))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    let created = directory
        .create(&req.email, &req.password, &req.display_name, req.role)
        .await?;
    info!("Admin {} created user {}", user.user_id, created.id);
    Ok(created_json(created))
}

pub async fn update_user_role(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    Ok(ok_json(directory.update_role(&user, user_id, req.role).await?))
}

pub async fn update_user_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    Ok(ok_json(
        directory.update_status(&user, user_id, req.status).await?,
    ))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::ManageUsers)?;
    let directory = UserDirectory::new(state.conn.clone());
    directory.delete(&user, user_id).await?;
    Ok(message_json("User deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Ana.Silva@Example.COM ").unwrap(),
            "ana.silva@example.com"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("two words@example.com").is_err());
    }

    fn account(password: &str, status: UserStatus) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            display_name: "Ana".to_string(),
            password_hash: hash_password(password).unwrap(),
            role: UserRole::Student.as_str().to_string(),
            status: status.as_str().to_string(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn test_unknown_email_still_verifies_a_real_hash() {
        let hash = DUMMY_HASH.as_deref().expect("dummy hash");
        assert!(hash.starts_with("$argon2"));
        assert!(!verify_password("whatever", hash).unwrap());

        assert!(matches!(
            check_credentials(None, "whatever"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_check_credentials() {
        let user = account("correct horse battery", UserStatus::Active);
        assert!(check_credentials(Some(user.clone()), "correct horse battery").is_ok());
        assert!(matches!(
            check_credentials(Some(user), "wrong password"),
            Err(AuthError::InvalidCredentials)
        ));

        let suspended = account("correct horse battery", UserStatus::Suspended);
        assert!(matches!(
            check_credentials(Some(suspended), "correct horse battery"),
            Err(AuthError::AccountDisabled)
        ));
    }

    #[test]
    fn test_normalize_display_name() {
        assert_eq!(normalize_display_name("  Ana  ").unwrap(), "Ana");
        assert!(normalize_display_name("   ").is_err());
        assert!(normalize_display_name(&"x".repeat(101)).is_err());
    }
}
