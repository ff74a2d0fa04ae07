//! Role gate for administrative endpoints
//!
//! Authentication happens upstream; the gateway forwards the caller's
//! role in a trusted header. This service only checks the header value,
//! it never validates credentials.

use axum::http::HeaderMap;

use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-waxline-role";

/// Reject callers whose forwarded role is not `admin`
pub fn require_admin(headers: &HeaderMap) -> Result<(), ApiError> {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if role.eq_ignore_ascii_case("admin") {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Administrative role required".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn admin_role_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("admin"));
        assert!(require_admin(&headers).is_ok());
    }

    #[test]
    fn role_check_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("Admin"));
        assert!(require_admin(&headers).is_ok());
    }

    #[test]
    fn missing_or_other_role_is_rejected() {
        let headers = HeaderMap::new();
        assert!(matches!(
            require_admin(&headers),
            Err(ApiError::Forbidden(_))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, HeaderValue::from_static("staff"));
        assert!(require_admin(&headers).is_err());
    }
}
