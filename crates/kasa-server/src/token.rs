//! Session tokens
//!
//! HS256 JWTs issued at login. The subject is the user id; the email and
//! role are carried for clients but the server re-reads the user on every
//! request.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use kasa_core::{Role, User};

/// Token lifetime
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Sign a token for `user`, returning it with its expiry
pub fn issue_token(
    user: &User,
    secret: &str,
) -> jsonwebtoken::errors::Result<(String, DateTime<Utc>)> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

/// Verify signature and expiry
pub fn decode_token(token: &str, secret: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}
