//! JWT claims for client systems
//!
//! Tokens are issued to client systems (the regime's own billing tools) by an
//! external identity provider. The subject is the client id, which is recorded
//! as `createdBy` on the rows the client creates.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (client id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Claims for `client_id`; expiry is set when the token is created
    ///
    /// ```
    /// use charge_auth::Claims;
    ///
    /// let claims = Claims::new("billing-tool");
    /// assert_eq!(claims.client_id(), "billing-tool");
    /// ```
    pub fn new(client_id: &str) -> Self {
        Self {
            sub: client_id.to_string(),
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    pub fn with_expiration(client_id: &str, expires_in_secs: i64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::seconds(expires_in_secs);

        Self {
            sub: client_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn client_id(&self) -> &str {
        &self.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_with_expiration() {
        let claims = Claims::with_expiration("client-a", 3600);
        assert_eq!(claims.client_id(), "client-a");
        assert!(!claims.is_expired());

        let now = Utc::now().timestamp();
        assert!(claims.exp > now);
        assert!(claims.exp <= now + 3600);
    }

    #[test]
    fn test_expired_claims() {
        let mut claims = Claims::new("client-a");
        claims.exp = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(claims.is_expired());
    }
}
