//! Actix-web extractor for authenticated client systems

use crate::jwt::JwtService;
use crate::Claims;
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use charge_core::error::AppError;
use futures::future::{ready, Ready};
use std::sync::Arc;
use tracing::{debug, warn};

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Client system behind a valid bearer token
///
/// ```no_run
/// use actix_web::HttpResponse;
/// use charge_auth::AuthenticatedClient;
///
/// async fn whoami(client: AuthenticatedClient) -> HttpResponse {
///     HttpResponse::Ok().json(serde_json::json!({ "clientId": client.client_id }))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    pub client_id: String,
    pub claims: Claims,
}

impl FromRequest for AuthenticatedClient {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(jwt_service) = req.app_data::<web::Data<Arc<JwtService>>>() else {
            warn!("JwtService not found in app data");
            return ready(Err(AppError::Unauthorized(
                "Authentication service not configured".to_string(),
            )
            .into()));
        };

        let Some(token) = bearer_token(req) else {
            debug!("No bearer token in request");
            return ready(Err(AppError::Unauthorized(
                "No authentication token provided".to_string(),
            )
            .into()));
        };

        match jwt_service.validate_token(token) {
            Ok(claims) => {
                debug!(client_id = %claims.sub, "Client authenticated");
                ready(Ok(AuthenticatedClient {
                    client_id: claims.sub.clone(),
                    claims,
                }))
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                ready(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test::TestRequest;

    fn jwt() -> Arc<JwtService> {
        Arc::new(JwtService::new("middleware-test-secret", 3600))
    }

    #[actix_web::test]
    async fn test_valid_bearer_token() {
        let jwt = jwt();
        let token = jwt.create_token(&Claims::new("client-a")).unwrap();
        let req = TestRequest::default()
            .app_data(web::Data::new(jwt))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request();

        let client = AuthenticatedClient::extract(&req).await.unwrap();
        assert_eq!(client.client_id, "client-a");
    }

    #[actix_web::test]
    async fn test_missing_token_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(web::Data::new(jwt()))
            .to_http_request();

        let err = AuthenticatedClient::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_bad_token_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(web::Data::new(jwt()))
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_http_request();

        let err = AuthenticatedClient::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
