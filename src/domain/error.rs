use thiserror::Error;

/// A post body that fails the client-side required-field checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("author must not be empty")]
    MissingAuthor,
    #[error("content must not be empty")]
    MissingContent,
}
