/// Session Routes
///
/// Login, logout, and token refresh. The handlers translate between
/// the wire (JSON bodies, cookie carriers) and the SessionManager;
/// every state transition lives in the manager.

use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::AccessClaims;
use crate::error::{AppError, AuthError};
use crate::session::{SessionManager, SessionPair};

/// Login request. Either identifier field is accepted; username wins
/// when both are present.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Authentication response carrying both tokens.
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

const ACCESS_COOKIE: &str = "access_token";
const REFRESH_COOKIE: &str = "refresh_token";

/// Carrier cookies are script-inaccessible and secure-transport only;
/// delivery beyond those flags is the transport layer's concern.
fn carrier_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(true)
        .path("/")
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .http_only(true)
        .secure(true)
        .path("/")
        .max_age(actix_web::cookie::time::Duration::ZERO)
        .finish()
}

fn session_response(pair: SessionPair, expires_in: i64) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(carrier_cookie(ACCESS_COOKIE, pair.access_token.clone()))
        .cookie(carrier_cookie(REFRESH_COOKIE, pair.refresh_token.clone()))
        .json(AuthResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        })
}

/// POST /auth/login
///
/// # Errors
/// - 400: neither username nor email supplied
/// - 404: no such identity
/// - 401: wrong password
pub async fn login(
    form: web::Json<LoginRequest>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let identifier = form
        .username
        .as_deref()
        .or(form.email.as_deref())
        .ok_or_else(|| AppError::Validation("username or email is required".to_string()))?;

    let pair = manager.login(identifier, &form.password).await?;

    Ok(session_response(
        pair,
        manager.jwt_settings().access_token_expiry,
    ))
}

/// POST /auth/refresh
///
/// Accepts the refresh token from the carrier cookie or the request
/// body. Rotates on success: the presented token is dead afterwards.
///
/// # Errors
/// - 401: missing, forged, expired, or already-rotated token (one
///   generic wire message for all four)
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.map(|b| b.into_inner().refresh_token))
        .ok_or(AppError::Auth(AuthError::MissingToken))?;

    let pair = manager.refresh(&presented).await?;

    Ok(session_response(
        pair,
        manager.jwt_settings().access_token_expiry,
    ))
}

/// POST /auth/logout
///
/// Requires a valid access token (enforced by JwtMiddleware, which
/// injects the claims). Idempotent: always succeeds for an
/// authenticated caller.
pub async fn logout(
    claims: web::ReqData<AccessClaims>,
    manager: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let identity_id = claims.identity_id()?;

    manager.logout(identity_id).await?;

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_COOKIE))
        .cookie(removal_cookie(REFRESH_COOKIE))
        .json(serde_json::json!({ "message": "Logged out" })))
}
