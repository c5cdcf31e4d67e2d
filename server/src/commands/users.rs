//! Account endpoints

use crate::access::Principal;
use crate::app::AppState;
use crate::database::User;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: User,
}

/// `POST auth/register`
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User> {
    state
        .users_service
        .register(&req.username, &req.email, &req.password)
        .await
}

/// `POST auth/login`. Session token minting is the transport's job; this
/// returns the verified user.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<LoginResponse> {
    let principal = state
        .users_service
        .authenticate(&req.email, &req.password)
        .await?;

    let user_id = principal
        .user_id()
        .ok_or_else(|| AppError::Forbidden("Invalid credentials".to_string()))?;
    let user = state.users_service.get_user(user_id).await?;

    Ok(LoginResponse { user })
}

/// `GET auth/me`
pub async fn current_user(state: &AppState, principal: &Principal) -> Result<User> {
    let user_id = principal.require_user()?;
    state.users_service.get_user(user_id).await
}
