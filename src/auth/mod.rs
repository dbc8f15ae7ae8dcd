/// Authentication primitives
///
/// JWT issuance/verification for both token classes and bcrypt
/// password handling. Everything here is stateless: secrets and TTLs
/// come in through `JwtSettings`, never from ambient globals.

mod claims;
mod jwt;
mod password;

pub use claims::AccessClaims;
pub use claims::RefreshClaims;
pub use jwt::issue_access_token;
pub use jwt::issue_refresh_token;
pub use jwt::validate_access_token;
pub use jwt::verify_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
