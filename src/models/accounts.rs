//! Users, roles and contact-form messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{normalize_email, optional_text, require_text};
use crate::error::{AppError, AppResult};

/// Access level of a user. Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Manager,
    Admin,
}

impl Role {
    /// Returns true when this role ranks at least `required`.
    pub fn allows(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Subscription plan chosen during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl FromStr for Plan {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(AppError::validation(format!("Unknown plan: {}", other))),
        }
    }
}

/// A dashboard user. The password hash is never part of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub plan: Option<Plan>,
    pub created_at: DateTime<Utc>,
}

/// Admin request to create a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

/// Validated user ready for insertion. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub farm_name: Option<String>,
    pub farm_location: Option<String>,
    pub plan: Option<Plan>,
}

/// Message submitted through the public contact form.
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub handled: bool,
    pub created_at: DateTime<Utc>,
}

/// Maximum length of a contact message body.
pub const MAX_CONTACT_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
}

impl NewContactMessage {
    /// Validates and normalizes the submission.
    pub fn validate(&self) -> AppResult<NewContactMessage> {
        let message = require_text("message", &self.message)?;
        if message.chars().count() > MAX_CONTACT_MESSAGE_LEN {
            return Err(AppError::validation(format!(
                "message must be at most {} characters",
                MAX_CONTACT_MESSAGE_LEN
            )));
        }
        Ok(NewContactMessage {
            name: require_text("name", &self.name)?,
            email: normalize_email(&self.email)?,
            subject: Some(
                optional_text(self.subject.as_deref()).unwrap_or_else(|| "General enquiry".into()),
            ),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin.allows(Role::Manager));
        assert!(Role::Manager.allows(Role::Manager));
        assert!(Role::Manager.allows(Role::Staff));
        assert!(!Role::Staff.allows(Role::Manager));
        assert!(!Role::Manager.allows(Role::Admin));
    }

    #[test]
    fn test_role_round_trip_text() {
        for role in [Role::Staff, Role::Manager, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_contact_message_validation() {
        let input = NewContactMessage {
            name: " Ada ".into(),
            email: "ADA@farm.io".into(),
            subject: Some("   ".into()),
            message: "Need a demo".into(),
        };
        let valid = input.validate().unwrap();
        assert_eq!(valid.name, "Ada");
        assert_eq!(valid.email, "ada@farm.io");
        assert_eq!(valid.subject.as_deref(), Some("General enquiry"));

        let empty = NewContactMessage {
            message: " ".into(),
            ..input
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_contact_message_too_long() {
        let input = NewContactMessage {
            name: "Ada".into(),
            email: "ada@farm.io".into(),
            subject: None,
            message: "x".repeat(MAX_CONTACT_MESSAGE_LEN + 1),
        };
        assert!(input.validate().is_err());
    }
}
