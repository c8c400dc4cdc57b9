//! Account context extracted from request headers.
//!
//! The authentication surface in front of this service verifies the session
//! token and forwards the account identity as headers. Headers are only
//! trusted on the internal network; this service never sees raw credentials.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Role forwarded by the auth surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Student,
    Instructor,
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Student => "student",
            AccountRole::Instructor => "instructor",
            AccountRole::Admin => "admin",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "instructor" => AccountRole::Instructor,
            "admin" => AccountRole::Admin,
            _ => AccountRole::Student,
        }
    }
}

/// Identity of the calling account.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: Uuid,
    pub role: AccountRole,
}

#[async_trait]
impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get("X-Account-Id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Missing X-Account-Id header"))
            })?;

        let account_id = Uuid::parse_str(account_id).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Malformed X-Account-Id header"))
        })?;

        let role = parts
            .headers
            .get("X-Account-Role")
            .and_then(|v| v.to_str().ok())
            .map(AccountRole::from_string)
            .unwrap_or(AccountRole::Student);

        let span = tracing::Span::current();
        span.record("account_id", account_id.to_string().as_str());

        Ok(AccountContext { account_id, role })
    }
}
