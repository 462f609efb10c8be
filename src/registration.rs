//! Multi-step sign-up wizard.
//!
//! A draft walks `Account -> Farm -> Plan -> Review -> Complete` and lives
//! in the `registrations` table until it is completed or expires.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::hash_password;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{normalize_email, require_text, NewUser, Plan, Role, User};

/// Drafts untouched for longer than this are discarded.
pub const DRAFT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStep {
    Account,
    Farm,
    Plan,
    Review,
    Complete,
}

impl RegistrationStep {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStep::Account => "account",
            RegistrationStep::Farm => "farm",
            RegistrationStep::Plan => "plan",
            RegistrationStep::Review => "review",
            RegistrationStep::Complete => "complete",
        }
    }

    fn next(self) -> Self {
        match self {
            RegistrationStep::Account => RegistrationStep::Farm,
            RegistrationStep::Farm => RegistrationStep::Plan,
            RegistrationStep::Plan => RegistrationStep::Review,
            RegistrationStep::Review | RegistrationStep::Complete => RegistrationStep::Complete,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            RegistrationStep::Account => Some(RegistrationStep::Account),
            RegistrationStep::Farm => Some(RegistrationStep::Account),
            RegistrationStep::Plan => Some(RegistrationStep::Farm),
            RegistrationStep::Review => Some(RegistrationStep::Plan),
            RegistrationStep::Complete => None,
        }
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountStep {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmStep {
    pub farm_name: String,
    pub location: String,
    pub size_hectares: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub plan: Plan,
}

/// Body of `PUT /api/registration/:token`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepInput {
    Account(AccountStep),
    Farm(FarmStep),
    Plan(PlanStep),
}

impl StepInput {
    pub fn step(&self) -> RegistrationStep {
        match self {
            StepInput::Account(_) => RegistrationStep::Account,
            StepInput::Farm(_) => RegistrationStep::Farm,
            StepInput::Plan(_) => RegistrationStep::Plan,
        }
    }
}

/// Account details as stored in a draft. Only the hash is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDraft {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDraft {
    pub token: String,
    pub step: RegistrationStep,
    pub account: Option<AccountDraft>,
    pub farm: Option<FarmStep>,
    pub plan: Option<Plan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What clients see of a draft.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub token: String,
    pub step: RegistrationStep,
    pub account: Option<AccountSummary>,
    pub farm: Option<FarmStep>,
    pub plan: Option<Plan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub name: String,
    pub email: String,
}

fn new_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl RegistrationDraft {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            token: new_token(),
            step: RegistrationStep::Account,
            account: None,
            farm: None,
            plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::hours(DRAFT_TTL_HOURS)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn view(&self) -> RegistrationView {
        RegistrationView {
            token: self.token.clone(),
            step: self.step,
            account: self.account.as_ref().map(|a| AccountSummary {
                name: a.name.clone(),
                email: a.email.clone(),
            }),
            farm: self.farm.clone(),
            plan: self.plan,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at(),
        }
    }

    /// Applies the input for the current step and advances.
    ///
    /// Email uniqueness is the caller's concern; see [`submit`].
    pub fn submit(&mut self, input: StepInput, now: DateTime<Utc>) -> AppResult<()> {
        if input.step() != self.step {
            return Err(AppError::validation(format!("expected step {}", self.step)));
        }

        match input {
            StepInput::Account(account) => {
                let name = require_text("name", &account.name)?;
                let email = normalize_email(&account.email)?;
                let password_hash = hash_password(&account.password)?;
                self.account = Some(AccountDraft {
                    name,
                    email,
                    password_hash,
                });
            }
            StepInput::Farm(farm) => {
                if !farm.size_hectares.is_finite() || farm.size_hectares <= 0.0 {
                    return Err(AppError::validation("size_hectares must be greater than 0"));
                }
                self.farm = Some(FarmStep {
                    farm_name: require_text("farm_name", &farm.farm_name)?,
                    location: require_text("location", &farm.location)?,
                    size_hectares: farm.size_hectares,
                });
            }
            StepInput::Plan(plan) => {
                self.plan = Some(plan.plan);
            }
        }

        self.step = self.step.next();
        self.updated_at = now;
        Ok(())
    }

    /// Moves one step back. Data already entered is kept.
    pub fn back(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        let previous = self.step.previous().ok_or_else(|| AppError::InvalidTransition {
            from: self.step.to_string(),
            to: "previous step".into(),
        })?;
        self.step = previous;
        self.updated_at = now;
        Ok(())
    }

    /// Builds the user to create. Only valid from `Review`.
    pub fn finish(&mut self, role: Role, now: DateTime<Utc>) -> AppResult<NewUser> {
        if self.step != RegistrationStep::Review {
            return Err(AppError::InvalidTransition {
                from: self.step.to_string(),
                to: RegistrationStep::Complete.to_string(),
            });
        }
        let (Some(account), Some(farm), Some(plan)) = (&self.account, &self.farm, self.plan) else {
            return Err(AppError::validation("registration is incomplete"));
        };

        let user = NewUser {
            email: account.email.clone(),
            name: account.name.clone(),
            password_hash: account.password_hash.clone(),
            role,
            farm_name: Some(farm.farm_name.clone()),
            farm_location: Some(farm.location.clone()),
            plan: Some(plan),
        };
        self.step = RegistrationStep::Complete;
        self.updated_at = now;
        Ok(user)
    }
}

// === Storage-backed operations used by the routes ===

/// Starts a new draft.
pub fn start(db: &Database, now: DateTime<Utc>) -> AppResult<RegistrationDraft> {
    let draft = RegistrationDraft::new(now);
    db.save_registration(&draft)?;
    tracing::debug!(token = %draft.token, "Registration started");
    Ok(draft)
}

/// Loads a live draft. Expired drafts are deleted and reported missing.
pub fn load(db: &Database, token: &str, now: DateTime<Utc>) -> AppResult<RegistrationDraft> {
    let draft = db
        .get_registration(token)?
        .ok_or_else(|| AppError::not_found("Registration", token))?;
    if draft.is_expired(now) {
        db.delete_registration(token)?;
        tracing::debug!(%token, "Registration draft expired");
        return Err(AppError::not_found("Registration", token));
    }
    Ok(draft)
}

pub fn submit(
    db: &Database,
    token: &str,
    input: StepInput,
    now: DateTime<Utc>,
) -> AppResult<RegistrationDraft> {
    let mut draft = load(db, token, now)?;
    if let StepInput::Account(account) = &input {
        if draft.step == RegistrationStep::Account
            && db.find_user_by_email(&account.email)?.is_some()
        {
            return Err(AppError::Conflict("Email is already registered".into()));
        }
    }
    draft.submit(input, now)?;
    db.save_registration(&draft)?;
    Ok(draft)
}

pub fn back(db: &Database, token: &str, now: DateTime<Utc>) -> AppResult<RegistrationDraft> {
    let mut draft = load(db, token, now)?;
    draft.back(now)?;
    db.save_registration(&draft)?;
    Ok(draft)
}

/// Creates the account and discards the draft.
///
/// The first account on a fresh install becomes an admin.
pub fn complete(db: &Database, token: &str, now: DateTime<Utc>) -> AppResult<User> {
    let mut draft = load(db, token, now)?;
    let role = if db.count_users()? == 0 {
        Role::Admin
    } else {
        Role::Manager
    };
    let new_user = draft.finish(role, now)?;
    let user = db.create_user(&new_user)?;
    db.delete_registration(token)?;
    tracing::info!(user_id = user.id, "Registration completed");
    Ok(user)
}
