use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: storage: {0}")]
    Storage(String),

    #[error("vecstore: serialization: {0}")]
    Serialization(String),

    /// The backend could not be reached; retrying later may succeed.
    #[error("vecstore: unavailable: {0}")]
    Unavailable(String),

    #[error("vecstore: backend returned HTTP {status}: {body}")]
    Backend { status: u16, body: String },
}

impl VecError {
    /// Reports whether the failure is a connectivity problem rather than a
    /// rejected request.
    pub fn is_transient(&self) -> bool {
        match self {
            VecError::Unavailable(_) => true,
            VecError::Backend { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn storage(e: impl std::fmt::Display) -> Self {
        VecError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(VecError::Unavailable("refused".into()).is_transient());
        assert!(VecError::Backend { status: 503, body: String::new() }.is_transient());
        assert!(!VecError::Backend { status: 400, body: String::new() }.is_transient());
        assert!(!VecError::DimensionMismatch { got: 1, want: 2 }.is_transient());
    }
}
