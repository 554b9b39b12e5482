use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncoderError {
    /// The encoder rejected the input or produced an unusable vector.
    #[error("encoder: embedding failed: {0}")]
    Failed(String),

    /// The encoder could not be reached; retrying later may succeed.
    #[error("encoder: unavailable: {0}")]
    Unavailable(String),

    #[error("encoder: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("encoder: invalid config: {0}")]
    InvalidConfig(String),
}

impl EncoderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EncoderError::Unavailable(_))
    }
}
