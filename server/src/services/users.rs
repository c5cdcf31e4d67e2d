//! Users service
//!
//! Registration and credential checks. Passwords are stored as Argon2id
//! PHC strings; issuing session tokens is left to the transport layer.

use crate::access::Principal;
use crate::config::{MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH};
use crate::database::{Repository, User};
use crate::error::{AppError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;

const SALT_SIZE: usize = 16;

/// Service for registering users and checking credentials
#[derive(Clone)]
pub struct UsersService {
    repo: Repository,
}

impl UsersService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Register a new user
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let username = username.trim();
        let email = normalize_email(email);

        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        if username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(AppError::Validation(format!(
                "Username must be at most {} characters",
                MAX_USERNAME_LENGTH
            )));
        }
        if !is_plausible_email(&email) {
            return Err(AppError::Validation("A valid email is required".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let password_hash = hash_password(password.to_string()).await?;
        let user = self.repo.create_user(username, &email, &password_hash).await?;

        tracing::info!("Registered user: {}", user.id);
        Ok(user)
    }

    /// Check credentials and return the matching principal
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Principal> {
        let invalid = || AppError::Forbidden("Invalid credentials".to_string());

        let user = self
            .repo
            .find_user_by_email(&normalize_email(email))
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(password.to_string(), user.password_hash.clone()).await? {
            tracing::warn!("Failed login for user: {}", user.id);
            return Err(invalid());
        }

        Ok(Principal::User(user.id))
    }

    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.repo
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

/// Emails are compared trimmed and lowercased
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.contains('@'),
        None => false,
    }
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let salt = SaltString::encode_b64(&salt)
            .map_err(|e| AppError::Credential(format!("Salt encoding failed: {}", e)))?;

        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Credential(format!("Password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| AppError::Credential(format!("Hashing task failed: {}", e)))?
}

async fn verify_password(password: String, stored: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| AppError::Credential(format!("Stored hash is invalid: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Credential(format!("Verification task failed: {}", e)))?
}
