use std::fmt;

/// Outcome of a completed (non-error) sort or merge.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOutcome {
    Ok,
    Cancelled,
}

/// Error kinds surfaced by this engine. `anyhow::Error` is still used
/// internally for `.context()`-annotated propagation; this enum exists so
/// callers can distinguish `Cancelled` from every other failure without
/// string-matching an `anyhow::Error`.
#[derive(Debug)]
pub enum SortError {
    InvalidArgs(String),
    InputMissing(String),
    IoFailure(anyhow::Error),
    Cancelled,
    Fatal(anyhow::Error),
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            SortError::InputMissing(path) => write!(f, "input not found or not readable: {path}"),
            SortError::IoFailure(e) => write!(f, "i/o failure: {e}"),
            SortError::Cancelled => write!(f, "cancelled"),
            SortError::Fatal(e) => write!(f, "fatal: {e}"),
        }
    }
}

impl std::error::Error for SortError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SortError::IoFailure(e) | SortError::Fatal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for SortError {
    fn from(e: anyhow::Error) -> Self {
        SortError::Fatal(e)
    }
}
