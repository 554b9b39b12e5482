//! Speaker embedding encoders.
//!
//! An [`Encoder`] maps a conditioned mono waveform to a fixed-length speaker
//! embedding. Every encoder reports an [`EncoderId`]; stored catalogs are
//! tagged with it so vectors from different encoders are never compared.
//!
//! - [`HttpEncoder`] calls a model sidecar (Resemblyzer or ECAPA-TDNN) over
//!   HTTP.
//! - [`FbankEncoder`] computes log-mel filterbank statistics in process. It
//!   needs no model and is deterministic, which makes it the default for
//!   tests and offline use.

mod config;
mod encoder;
mod error;
mod fbank;
pub mod features;
mod http;

pub use config::{EncoderConfig, build};
pub use encoder::{Encoder, EncoderId, EncoderKind, check_embedding};
pub use error::EncoderError;
pub use fbank::FbankEncoder;
pub use http::HttpEncoder;
