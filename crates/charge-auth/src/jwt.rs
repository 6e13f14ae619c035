//! JWT token creation and validation

use crate::claims::Claims;
use charge_core::config::AuthConfig;
use charge_core::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, error, warn};

/// Signs and validates HS256 bearer tokens
#[derive(Clone)]
pub struct JwtService {
    expiration_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a JWT service
    ///
    /// ```
    /// use charge_auth::{Claims, JwtService};
    ///
    /// let jwt_service = JwtService::new("secret", 3600);
    /// let token = jwt_service.create_token(&Claims::new("billing-tool"))?;
    /// let claims = jwt_service.validate_token(&token)?;
    /// assert_eq!(claims.sub, "billing-tool");
    /// # Ok::<(), charge_core::AppError>(())
    /// ```
    pub fn new(secret: &str, expiration_secs: i64) -> Self {
        Self {
            expiration_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expiration_secs)
    }

    /// Sign `claims`, filling in the expiry when it is unset
    pub fn create_token(&self, claims: &Claims) -> Result<String, AppError> {
        let mut token_claims = claims.clone();

        if token_claims.exp == 0 {
            let exp = Utc::now() + Duration::seconds(self.expiration_secs);
            token_claims.exp = exp.timestamp();
        }

        debug!(client_id = %token_claims.sub, exp = %token_claims.exp, "Creating JWT token");

        encode(&Header::default(), &token_claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "Failed to create JWT token");
            AppError::InvalidToken(format!("Token creation failed: {}", e))
        })
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    ///
    /// - `AppError::TokenExpired` if the token has expired
    /// - `AppError::InvalidToken` for any other failure
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data =
            decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(|e| {
                if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                    warn!("Token expired");
                    return AppError::TokenExpired;
                }

                warn!(error = %e, "Invalid token");
                AppError::InvalidToken(format!("Token validation failed: {}", e))
            })?;

        let claims = token_data.claims;

        // Validation allows a leeway of 60 seconds
        if claims.is_expired() {
            warn!(client_id = %claims.sub, "Token expired (within leeway)");
            return Err(AppError::TokenExpired);
        }

        debug!(client_id = %claims.sub, "Token validated");
        Ok(claims)
    }

    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("expiration_secs", &self.expiration_secs)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
