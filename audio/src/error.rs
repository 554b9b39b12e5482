use thiserror::Error;

/// Errors returned while conditioning audio.
///
/// Every variant describes a problem with the caller's input, except
/// [`AudioError::Resample`], which indicates an internal DSP failure.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("empty input: no audio bytes")]
    EmptyInput,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no speech detected")]
    NoSpeechDetected,

    #[error("audio too short: need at least {min_secs:.2}s of speech, got {got_secs:.2}s")]
    AudioTooShort { min_secs: f32, got_secs: f32 },

    #[error("resample error: {0}")]
    Resample(String),
}
