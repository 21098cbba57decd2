//! Common result and error types for the Mosaic floorplanner.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates a broken internal invariant (a bug in Mosaic), never an
/// infeasible floorplanning problem. Infeasibility is reported through the
/// `success` flag of solver outcomes and through diagnostics.
pub type MosaicResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Mosaic, not a user input problem.
///
/// Raised when a structural invariant is violated, for example a packing tree
/// node that is reachable twice or solution arrays of mismatched length.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("internal floorplanner error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("node 3 has two parents");
        assert_eq!(
            format!("{err}"),
            "internal floorplanner error: node 3 has two parents"
        );
    }

    #[test]
    fn ok_and_err_paths() {
        let ok: MosaicResult<usize> = Ok(7);
        assert_eq!(ok.ok(), Some(7));

        let err: MosaicResult<usize> = Err(InternalError::new("bad tree"));
        assert_eq!(err.unwrap_err().message, "bad tree");
    }

    #[test]
    fn from_string() {
        let err: InternalError = "length mismatch".to_string().into();
        assert_eq!(err.message, "length mismatch");
    }
}
