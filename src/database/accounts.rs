//! Users, contact messages and registration drafts.

use chrono::Utc;
use rusqlite::{params, types::Value, OptionalExtension, Row};

use super::inventory::query_page;
use super::{parse_column, parse_optional_column, Database};
use crate::error::{AppError, AppResult};
use crate::models::{ContactMessage, ListQuery, NewContactMessage, NewUser, Page, User};
use crate::registration::RegistrationDraft;

const USER_COLUMNS: &str =
    "id, email, name, role, farm_name, farm_location, plan, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: parse_column(row, 3)?,
        farm_name: row.get(4)?,
        farm_location: row.get(5)?,
        plan: parse_optional_column(row, 6)?,
        created_at: row.get(7)?,
    })
}

fn contact_from_row(row: &Row<'_>) -> rusqlite::Result<ContactMessage> {
    Ok(ContactMessage {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        subject: row.get(3)?,
        message: row.get(4)?,
        handled: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    // === Users ===

    pub fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let id = {
            let conn = self.lock();
            conn.execute(
                "INSERT INTO users (email, name, password_hash, role, farm_name, farm_location, plan, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.email,
                    user.name,
                    user.password_hash,
                    user.role.as_str(),
                    user.farm_name,
                    user.farm_location,
                    user.plan.map(|p| p.as_str()),
                    Utc::now(),
                ],
            )?;
            conn.last_insert_rowid()
        };
        tracing::info!(user_id = id, email = %user.email, role = %user.role, "User created");
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> AppResult<User> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            user_from_row,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("User", id))
    }

    /// Looks up a user and their password hash by (normalized) email.
    pub fn find_user_by_email(&self, email: &str) -> AppResult<Option<(User, String)>> {
        let conn = self.lock();
        let found = conn
            .query_row(
                &format!(
                    "SELECT {}, password_hash FROM users WHERE email = ?1",
                    USER_COLUMNS
                ),
                params![email.trim().to_lowercase()],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(8)?)),
            )
            .optional()?;
        Ok(found)
    }

    pub fn list_users(&self) -> AppResult<Vec<User>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
        let rows = stmt.query_map([], user_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn count_users(&self) -> AppResult<i64> {
        let conn = self.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
    }

    // === Contact Messages ===

    /// Stores a validated contact-form submission.
    pub fn create_contact_message(&self, msg: &NewContactMessage) -> AppResult<ContactMessage> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO contact_messages (name, email, subject, message, handled, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                msg.name,
                msg.email,
                msg.subject.as_deref().unwrap_or_default(),
                msg.message,
                Utc::now(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(conn.query_row(
            "SELECT id, name, email, subject, message, handled, created_at
             FROM contact_messages WHERE id = ?1",
            params![id],
            contact_from_row,
        )?)
    }

    pub fn list_contact_messages(
        &self,
        query: &ListQuery,
        max_page_size: usize,
    ) -> AppResult<Page<ContactMessage>> {
        let mut conditions = Vec::new();
        let mut args = Vec::new();
        if let Some(pattern) = query.search_pattern() {
            conditions.push(
                "(name LIKE ? ESCAPE '\\' OR email LIKE ? ESCAPE '\\' OR subject LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            args.extend(std::iter::repeat(Value::Text(pattern)).take(3));
        }

        let conn = self.lock();
        query_page(
            &conn,
            "contact_messages",
            "id, name, email, subject, message, handled, created_at",
            "created_at",
            &conditions,
            args,
            query,
            max_page_size,
            contact_from_row,
        )
    }

    pub fn mark_contact_handled(&self, id: i64) -> AppResult<()> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE contact_messages SET handled = 1 WHERE id = ?1",
            params![id],
        )?;
        if affected == 0 {
            return Err(AppError::not_found("Contact message", id));
        }
        Ok(())
    }

    // === Registration Drafts ===

    /// Inserts or replaces a draft.
    pub fn save_registration(&self, draft: &RegistrationDraft) -> AppResult<()> {
        let data = serde_json::to_string(draft)
            .map_err(|e| AppError::validation(format!("Unserializable draft: {}", e)))?;
        let conn = self.lock();
        conn.execute(
            "INSERT INTO registrations (token, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(token) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![draft.token, data, draft.created_at, draft.updated_at],
        )?;
        Ok(())
    }

    pub fn get_registration(&self, token: &str) -> AppResult<Option<RegistrationDraft>> {
        let conn = self.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM registrations WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => match serde_json::from_str(&data) {
                Ok(draft) => Ok(Some(draft)),
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable registration draft");
                    conn.execute("DELETE FROM registrations WHERE token = ?1", params![token])?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn delete_registration(&self, token: &str) -> AppResult<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM registrations WHERE token = ?1", params![token])?;
        Ok(())
    }
}
