//! Typed error taxonomy for the auth core.

use thiserror::Error;

/// Errors surfaced by [`super::AuthService`] operations.
///
/// The HTTP boundary maps each variant to a status code; `Internal` and
/// `CorruptCredential` collapse to an opaque 500 so no backend detail crosses
/// the trust boundary.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Uniqueness violation on create/update (409).
    #[error("{0}")]
    Conflict(String),
    /// Bad credentials or missing account at login (401).
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Authenticated but disallowed action (403).
    #[error("{0}")]
    Forbidden(&'static str),
    /// Invalid or expired token, or a rejected state transition (400).
    #[error("{0}")]
    BadRequest(&'static str),
    /// Referenced account absent for an authenticated operation (404).
    #[error("{0}")]
    NotFound(&'static str),
    /// Stored password hash cannot be parsed; unrecoverable (500-class).
    #[error("corrupt credential record")]
    CorruptCredential,
    /// Anything unexpected from the store or a dependency (500-class).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<super::store::StoreError> for AuthError {
    fn from(err: super::store::StoreError) -> Self {
        match err {
            super::store::StoreError::Conflict { field } => {
                Self::Conflict(format!("{field} already exists"))
            }
            super::store::StoreError::Backend(inner) => Self::Internal(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::StoreError;

    #[test]
    fn conflict_message_names_field() {
        let err: AuthError = StoreError::Conflict {
            field: "Email".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Email already exists");
    }

    #[test]
    fn backend_errors_stay_opaque() {
        let err: AuthError = StoreError::Backend(anyhow::anyhow!("connection refused")).into();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
