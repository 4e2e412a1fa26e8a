use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use crate::app::AppState;
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = parse_exp_hours(std::env::var("JWT_EXP_HOURS").ok().as_deref())?;

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn encode(&self, user_id: i64) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

/// Token lifetime in hours; 24 when unset.
fn parse_exp_hours(raw: Option<&str>) -> Result<i64, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(24),
        Some(value) => match value.parse::<i64>() {
            Ok(hours) if hours > 0 => Ok(hours),
            _ => Err(AppError::configuration("JWT_EXP_HOURS must be a positive integer")),
        },
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub exp: usize,
    pub iat: usize,
}

/// The bearer of a valid token. Loading the account behind it is the job of
/// [`crate::authz::Principal`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Authorization header missing"))?;

        let claims = state.jwt.decode(token)?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_subject() {
        let config = JwtConfig::new("unit-secret", 1);
        let token = config.encode(42).expect("encode");
        let claims = config.decode(&token).expect("decode");
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn lifetime_defaults_and_rejects_nonsense() {
        assert_eq!(parse_exp_hours(None).unwrap(), 24);
        assert_eq!(parse_exp_hours(Some(" 8 ")).unwrap(), 8);
        for raw in ["0", "-3", "a day"] {
            assert!(matches!(parse_exp_hours(Some(raw)), Err(AppError::Configuration(_))), "{raw}");
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = JwtConfig::new("unit-secret", -1);
        let token = config.encode(3).expect("encode");
        assert!(matches!(config.decode(&token), Err(AppError::Token(_))));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let signer = JwtConfig::new("one", 1);
        let verifier = JwtConfig::new("two", 1);
        let token = signer.encode(7).expect("encode");
        assert!(matches!(verifier.decode(&token), Err(AppError::Token(_))));
    }
}
