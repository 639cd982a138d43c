//! Middleware de autenticación JWT
//!
//! La emisión de identidad es de otro servicio: aquí solo se valida el
//! token firmado y se materializa un `ActorContext` explícito en las
//! extensions de la request. El core nunca consulta una sesión global.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{
    models::actor::{ActorContext, ActorRole},
    state::AppState,
    utils::errors::AppError,
};

/// Claims del JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

/// Middleware de autenticación JWT
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Extraer token del header Authorization
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|auth_str| auth_str.to_str().ok())
        .and_then(|auth_str| auth_str.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

    let token_data = decode::<Claims>(
        auth_header,
        &DecodingKey::from_secret(state.config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    let claims = token_data.claims;

    let actor_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".to_string()))?;
    let role = ActorRole::from_str(&claims.role)
        .map_err(|_| AppError::Unauthorized("Invalid role in token".to_string()))?;

    // Inyectar el actor autenticado en las extensions
    request
        .extensions_mut()
        .insert(ActorContext::new(actor_id, role));

    Ok(next.run(request).await)
}
