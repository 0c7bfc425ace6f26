//! Double-submit CSRF defense.
//!
//! The refresh secret rides in an HTTP-only cookie, so forged cross-site
//! requests would carry it automatically. The guard issues a second random
//! token in a cookie client script CAN read; a legitimate client echoes it
//! back in a request header, and the two must match byte-for-byte. A
//! forged request cannot read the cookie and therefore cannot produce the
//! header.

use rand::RngCore;
use subtle::ConstantTimeEq;

use super::ServiceError;

pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Clone)]
pub struct CsrfGuard {
    cookie_name: String,
}

impl CsrfGuard {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Mint a fresh token; called on every successful authentication
    /// event (login, refresh, email verification).
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Validate the cookie/header pair. Absence or mismatch both fail
    /// with the same generic result.
    pub fn validate(
        &self,
        cookie_value: Option<&str>,
        header_value: Option<&str>,
    ) -> Result<(), ServiceError> {
        let (cookie, header) = match (cookie_value, header_value) {
            (Some(c), Some(h)) if !c.is_empty() && !h.is_empty() => (c, h),
            _ => return Err(ServiceError::CsrfMismatch),
        };

        if cookie.as_bytes().ct_eq(header.as_bytes()).into() {
            Ok(())
        } else {
            Err(ServiceError::CsrfMismatch)
        }
    }
}
