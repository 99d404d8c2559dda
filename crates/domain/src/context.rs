//! Store context: who is calling, passed explicitly into every service call.

use std::fmt;

use crate::error::TillguardError;
use crate::id::StoreId;

/// The store a request acts for, plus the caller's session token.
///
/// Authentication happens upstream; this crate only needs to know whether a
/// session token was presented at all.
#[derive(Clone)]
pub struct StoreContext {
    store_id: StoreId,
    session_token: String,
}

impl StoreContext {
    #[must_use]
    pub fn new(store_id: StoreId, session_token: impl Into<String>) -> Self {
        Self {
            store_id,
            session_token: session_token.into(),
        }
    }

    #[must_use]
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// The session token.
    ///
    /// # Errors
    ///
    /// Returns [`TillguardError::SessionExpired`] when the token is empty.
    pub fn session_token(&self) -> Result<&str, TillguardError> {
        let token = self.session_token.trim();
        if token.is_empty() {
            return Err(TillguardError::SessionExpired);
        }
        Ok(token)
    }

    /// Fail fast when the caller has no session.
    ///
    /// # Errors
    ///
    /// Returns [`TillguardError::SessionExpired`] when the token is empty.
    pub fn ensure_session(&self) -> Result<(), TillguardError> {
        self.session_token().map(|_| ())
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("store_id", &self.store_id)
            .field("session_token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expose_non_empty_session_token() {
        let ctx = StoreContext::new(StoreId::new(), "jwt-abc");
        assert_eq!(ctx.session_token().unwrap(), "jwt-abc");
    }

    #[test]
    fn should_report_session_expired_for_blank_token() {
        let ctx = StoreContext::new(StoreId::new(), "   ");
        assert!(matches!(
            ctx.ensure_session(),
            Err(TillguardError::SessionExpired)
        ));
    }

    #[test]
    fn should_redact_token_in_debug() {
        let ctx = StoreContext::new(StoreId::new(), "jwt-secret");
        assert!(!format!("{ctx:?}").contains("jwt-secret"));
    }
}
