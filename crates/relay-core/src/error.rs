#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("No auth available for provider '{provider}' model '{model}'")]
    NoAvailable { provider: String, model: String },

    #[error("Auth '{0}' not found")]
    NotFound(String),

    #[error("Auth '{0}' already exists")]
    AlreadyExists(String),

    #[error("Storage failure: {0}")]
    Storage(#[source] anyhow::Error),
}

impl RelayError {
    /// Wrap a storage collaborator error without interpreting it.
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_no_available() {
        let err = RelayError::NoAvailable {
            provider: "codex".into(),
            model: "gpt-5".into(),
        };
        assert_eq!(
            err.to_string(),
            "No auth available for provider 'codex' model 'gpt-5'"
        );
    }

    #[test]
    fn test_display_not_found() {
        let err = RelayError::NotFound("auth-1".into());
        assert_eq!(err.to_string(), "Auth 'auth-1' not found");
    }

    #[test]
    fn test_display_already_exists() {
        let err = RelayError::AlreadyExists("auth-1".into());
        assert_eq!(err.to_string(), "Auth 'auth-1' already exists");
    }

    #[test]
    fn test_display_storage() {
        let err = RelayError::storage(anyhow::anyhow!("disk full"));
        assert_eq!(err.to_string(), "Storage failure: disk full");
    }

    #[test]
    fn test_storage_preserves_source() {
        let err = RelayError::storage(anyhow::anyhow!("disk full"));
        let source = std::error::Error::source(&err).expect("storage error has a source");
        assert_eq!(source.to_string(), "disk full");
    }

    #[test]
    fn test_display_boundary_values() {
        let err = RelayError::NoAvailable {
            provider: String::new(),
            model: String::new(),
        };
        assert_eq!(err.to_string(), "No auth available for provider '' model ''");

        let err = RelayError::NotFound(String::new());
        assert_eq!(err.to_string(), "Auth '' not found");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RelayError>();
    }
}
