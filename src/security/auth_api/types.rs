use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ViewCatalog,
    RequestEnrollment,
    TrackProgress,
    TakeQuizzes,
    UseAssistant,
    ReadNotifications,
    ManageOwnCourses,
    ManageQuizzes,
    ReviewEnrollments,
    UploadMedia,
    ApproveCourses,
    ManageUsers,
    ViewPlatformStats,
    BroadcastNotifications,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Anonymous,
    Student,
    Formateur,
    Admin,
}

impl Role {
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Self::Anonymous => {
                let mut perms = HashSet::new();
                perms.insert(Permission::ViewCatalog);
                perms
            }
            Self::Student => {
                let mut perms = Self::Anonymous.permissions();
                perms.insert(Permission::RequestEnrollment);
                perms.insert(Permission::TrackProgress);
                perms.insert(Permission::TakeQuizzes);
                perms.insert(Permission::UseAssistant);
                perms.insert(Permission::ReadNotifications);
                perms
            }
            Self::Formateur => {
                let mut perms = Self::Anonymous.permissions();
                perms.insert(Permission::UseAssistant);
                perms.insert(Permission::ReadNotifications);
                perms.insert(Permission::ManageOwnCourses);
                perms.insert(Permission::ManageQuizzes);
                perms.insert(Permission::ReviewEnrollments);
                perms.insert(Permission::UploadMedia);
                perms
            }
            Self::Admin => {
                let mut perms = Self::Formateur.permissions();
                perms.insert(Permission::ApproveCourses);
                perms.insert(Permission::ManageUsers);
                perms.insert(Permission::ViewPlatformStats);
                perms.insert(Permission::BroadcastNotifications);
                perms
            }
        }
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions().contains(permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Student => "student",
            Self::Formateur => "formateur",
            Self::Admin => "admin",
        }
    }

    pub fn hierarchy_level(&self) -> u8 {
        match self {
            Self::Anonymous => 0,
            Self::Student => 1,
            Self::Formateur => 2,
            Self::Admin => 3,
        }
    }

    pub fn is_at_least(&self, other: &Role) -> bool {
        self.hierarchy_level() >= other.hierarchy_level()
    }
}

impl std::str::FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "formateur" | "instructor" => Ok(Self::Formateur),
            "admin" => Ok(Self::Admin),
            _ => Ok(Self::Anonymous),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of a request, as resolved by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
    #[serde(skip)]
    pub token_id: Option<String>,
}

impl Default for AuthenticatedUser {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            email: None,
            display_name: display_name.into(),
            role,
            token_id: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: Uuid::nil(),
            email: None,
            display_name: "anonymous".to_string(),
            role: Role::Anonymous,
            token_id: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_token_id(mut self, jti: impl Into<String>) -> Self {
        self.token_id = Some(jti.into());
        self
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn is_authenticated(&self) -> bool {
        self.role != Role::Anonymous && !self.user_id.is_nil()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_formateur(&self) -> bool {
        self.role == Role::Formateur
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn require_authenticated(&self) -> Result<(), AuthError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AuthError::MissingToken)
        }
    }

    /// 401 for anonymous callers, 403 when the role lacks `permission`.
    pub fn require(&self, permission: &Permission) -> Result<(), AuthError> {
        self.require_authenticated()?;
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions)
        }
    }

    /// Admins manage everything; formateurs manage what they own.
    pub fn can_manage(&self, owner_id: &Uuid) -> bool {
        self.is_admin()
            || (self.has_permission(&Permission::ManageOwnCourses) && &self.user_id == owner_id)
    }
}
