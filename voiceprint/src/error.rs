use thiserror::Error;
use voxid_audio::AudioError;
use voxid_encoder::EncoderError;
use voxid_vecstore::VecError;

/// Errors returned by voiceprint operations.
#[derive(Debug, Error)]
pub enum VoiceprintError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("invalid speaker name: {0}")]
    InvalidName(String),

    #[error("speaker not found: {0}")]
    SpeakerNotFound(String),

    #[error("invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),

    #[error("invalid threshold: {0} (must be within [0, 1])")]
    InvalidThreshold(f32),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("encoder mismatch: record {record} was written by {found}, active encoder is {expected}")]
    EncoderMismatch {
        record: String,
        expected: String,
        found: String,
    },

    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable.
    Input,
    NotFound,
    /// The request conflicts with stored state (foreign encoder catalog).
    Conflict,
    /// A dependency is down; the request may succeed later.
    Unavailable,
    Internal,
}

impl VoiceprintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoiceprintError::Audio(AudioError::Resample(_)) => ErrorKind::Internal,
            VoiceprintError::Audio(_)
            | VoiceprintError::EmbeddingFailed(_)
            | VoiceprintError::InvalidName(_)
            | VoiceprintError::InvalidTopK(_)
            | VoiceprintError::InvalidThreshold(_)
            | VoiceprintError::DimensionMismatch { .. } => ErrorKind::Input,
            VoiceprintError::SpeakerNotFound(_) => ErrorKind::NotFound,
            VoiceprintError::EncoderMismatch { .. } => ErrorKind::Conflict,
            VoiceprintError::EncoderUnavailable(_) | VoiceprintError::IndexUnavailable(_) => {
                ErrorKind::Unavailable
            }
            VoiceprintError::Index(_) | VoiceprintError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Reports whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}

impl From<EncoderError> for VoiceprintError {
    fn from(e: EncoderError) -> Self {
        match e {
            EncoderError::Unavailable(msg) => VoiceprintError::EncoderUnavailable(msg),
            EncoderError::InvalidConfig(msg) => VoiceprintError::Internal(msg),
            other => VoiceprintError::EmbeddingFailed(other.to_string()),
        }
    }
}

impl From<VecError> for VoiceprintError {
    fn from(e: VecError) -> Self {
        match e {
            VecError::DimensionMismatch { got, want } => VoiceprintError::DimensionMismatch {
                expected: want,
                got,
            },
            e if e.is_transient() => VoiceprintError::IndexUnavailable(e.to_string()),
            e => VoiceprintError::Index(e.to_string()),
        }
    }
}
