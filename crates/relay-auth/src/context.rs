//! Per-request context carrying the session identifier.
//!
//! The session id rides on the request context so result reporting can find
//! the binding the pick created. Executor paths that cannot carry a context
//! use the selector options metadata instead; both read paths are kept.

/// Opaque per-request carrier. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a session identifier. Empty or whitespace-only ids are ignored.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let trimmed = session_id.trim();
        if !trimmed.is_empty() {
            self.session_id = Some(trimmed.to_string());
        }
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_has_no_session() {
        assert_eq!(RequestContext::new().session_id(), None);
    }

    #[test]
    fn test_with_session_id_trims() {
        let ctx = RequestContext::new().with_session_id("  session-1  ");
        assert_eq!(ctx.session_id(), Some("session-1"));
    }

    #[test]
    fn test_blank_session_id_is_ignored() {
        let ctx = RequestContext::new().with_session_id("   ");
        assert_eq!(ctx.session_id(), None);
    }

    #[test]
    fn test_clone_preserves_session() {
        let ctx = RequestContext::new().with_session_id("session-1");
        assert_eq!(ctx.clone().session_id(), Some("session-1"));
    }
}
