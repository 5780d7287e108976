//! Errors raised while building wire records from text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The address has no `scheme:` prefix.
    MissingScheme(String),
    /// The scheme before the `:` is empty.
    EmptyScheme(String),
    /// Nothing follows the `:`.
    EmptyIdentifier(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScheme(raw) => write!(f, "address '{}' has no scheme", raw),
            Self::EmptyScheme(raw) => write!(f, "address '{}' has an empty scheme", raw),
            Self::EmptyIdentifier(raw) => write!(f, "address '{}' has an empty identifier", raw),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
