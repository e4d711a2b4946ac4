//! Error types for palaver

use thiserror::Error;

/// The main error type for palaver operations
#[derive(Error, Debug)]
pub enum Error {
    /// The backing store is unreachable. The operation was abandoned and may
    /// be retried by the caller; the store itself never retries.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Signup conflict: the username is already taken
    #[error("username '{0}' already exists")]
    DuplicateUser(String),

    /// Bad credentials. Deliberately carries no detail so that unknown
    /// usernames and wrong passwords are indistinguishable to the caller.
    #[error("invalid username or password")]
    AuthenticationFailed,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for palaver operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failure_is_generic() {
        // The message must not leak which part of the credentials was wrong.
        let err = Error::AuthenticationFailed;
        assert_eq!(err.to_string(), "invalid username or password");
    }

    #[test]
    fn test_duplicate_user_names_the_conflict() {
        let err = Error::DuplicateUser("alice".to_string());
        assert!(err.to_string().contains("alice"));
    }
}
