//! Bearer token authentication for the charge ledger
//!
//! Client systems present an HS256 JWT in the `Authorization` header. The
//! [`AuthenticatedClient`] extractor validates it against the [`JwtService`]
//! registered as app data and exposes the client id.

pub mod claims;
pub mod jwt;
pub mod middleware;

pub use claims::Claims;
pub use jwt::JwtService;
pub use middleware::AuthenticatedClient;
