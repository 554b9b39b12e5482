//! Audio conditioning for speaker embeddings.
//!
//! Turns an uploaded clip of unknown container into the canonical waveform the
//! voice encoders expect: mono, 16 kHz, speech-dense and level-normalized.
//!
//! # Pipeline
//!
//! ```text
//! bytes -> decode -> downmix -> resample -> VAD trim -> min duration
//!       -> best segment -> normalize -> pre-emphasis -> ConditionedAudio
//! ```
//!
//! Every stage after decoding can be switched off through
//! [`ConditionerConfig`]. The output is deterministic for a given input and
//! configuration.
//!
//! # Example
//!
//! ```no_run
//! use voxid_audio::{AudioConditioner, ConditionerConfig};
//!
//! let conditioner = AudioConditioner::new(ConditionerConfig::default());
//! let bytes = std::fs::read("alice.wav").unwrap();
//! let audio = conditioner.condition(&bytes).unwrap();
//! assert_eq!(audio.sample_rate, 16_000);
//! ```

mod condition;
mod decode;
pub mod dsp;
mod error;
mod resample;
pub mod vad;

pub use condition::{AudioConditioner, ConditionedAudio, ConditionerConfig, NormalizeMode};
pub use decode::{DecodedAudio, decode};
pub use error::AudioError;
pub use resample::resample;
pub use vad::VadConfig;
