use std::sync::{Arc, Mutex};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Duration;
use rusqlite::Connection;

use crate::db::queries::{self, NewUser};
use crate::models::{Identity, Profile, Role, Session};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("{0}")]
    InvalidInput(String),

    #[error("auth storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;
    /// Resolves a session token to its identity; `None` if unknown or expired.
    async fn current_user(&self, token: &str) -> Result<Option<Session>, AuthError>;
}

pub struct SqliteAuthProvider {
    db: Arc<Mutex<Connection>>,
    admin_emails: Vec<String>,
    session_ttl: Duration,
}

impl SqliteAuthProvider {
    pub fn new(db: Arc<Mutex<Connection>>, admin_emails: Vec<String>, session_ttl_hours: i64) -> Self {
        Self {
            db,
            admin_emails,
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    fn role_for(&self, email: &str) -> Role {
        if self.admin_emails.iter().any(|e| e == email) {
            Role::Admin
        } else {
            Role::Customer
        }
    }

    fn open_session(&self, conn: &Connection, identity: Identity) -> anyhow::Result<Session> {
        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = queries::now_timestamp() + self.session_ttl;
        queries::create_session(conn, &token, &identity.user_id, &expires_at)?;
        Ok(Session {
            token,
            identity,
            expires_at,
        })
    }
}

#[async_trait]
impl AuthProvider for SqliteAuthProvider {
    async fn sign_up(&self, request: SignUp) -> Result<Session, AuthError> {
        let email = normalize_email(&request.email);
        let full_name = request.full_name.trim().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput("a valid email is required".to_string()));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if full_name.is_empty() {
            return Err(AuthError::InvalidInput("full name is required".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user_id = uuid::Uuid::new_v4().to_string();
        let role = self.role_for(&email);

        let db = self.db.lock().unwrap();
        if queries::email_exists(&db, &email)? {
            return Err(AuthError::EmailTaken);
        }

        queries::insert_user(
            &db,
            &NewUser {
                id: &user_id,
                email: &email,
                password_hash: &password_hash,
                role,
            },
        )?;
        queries::upsert_profile(
            &db,
            &Profile {
                id: user_id.clone(),
                full_name: Some(full_name.clone()),
                phone: request.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            },
        )?;

        tracing::info!(user_id = %user_id, role = role.as_str(), "account created");

        let identity = Identity {
            user_id,
            email,
            full_name: Some(full_name),
            role,
        };
        Ok(self.open_session(&db, identity)?)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let db = self.db.lock().unwrap();

        let Some((user_id, hash)) = queries::get_credentials(&db, &email)? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &hash) {
            tracing::warn!(user_id = %user_id, "failed sign-in attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let identity = queries::get_identity(&db, &user_id)?.ok_or(AuthError::InvalidCredentials)?;
        Ok(self.open_session(&db, identity)?)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let db = self.db.lock().unwrap();
        queries::delete_session(&db, token)?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<Option<Session>, AuthError> {
        let db = self.db.lock().unwrap();
        let Some((user_id, expires_at)) = queries::get_live_session(&db, token)? else {
            return Ok(None);
        };

        Ok(queries::get_identity(&db, &user_id)?.map(|identity| Session {
            token: token.to_string(),
            identity,
            expires_at,
        }))
    }
}

const MIN_PASSWORD_LEN: usize = 6;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
