//! Speaker enrollment and identification over a two-tier vector catalog.
//!
//! # Architecture
//!
//! ```text
//! audio bytes -> AudioConditioner -> Encoder -> embedding
//!     enroll:   EnrollmentManager -> ProfileStore (raw sample + centroid)
//!     identify: IdentificationEngine -> ProfileStore (centroid search)
//!                 -> calibration -> threshold -> Identification
//! ```
//!
//! # Two tiers
//!
//! The raw tier holds every enrollment embedding (append-only, L2-normalized,
//! random ids). The master tier holds one centroid per speaker at an id
//! derived from the name, equal to the mean of that speaker's samples. The
//! master tier is always derivable from the raw tier; [`RebuildService`]
//! recomputes it.
//!
//! All records are tagged with the encoder identity, and the catalog refuses
//! to compare vectors from a different encoder.

mod calibrate;
mod centroid;
mod enroll;
mod error;
mod identify;
pub mod ids;
mod profile;
mod rebuild;
mod service;

pub use calibrate::{CalibrationConfig, calibrate};
pub use centroid::mean;
pub use enroll::{Enrollment, EnrollmentManager};
pub use error::{ErrorKind, VoiceprintError};
pub use identify::{
    Candidate, Identification, IdentificationEngine, IdentifyConfig, UNKNOWN_SPEAKER,
};
pub use profile::{Centroid, KEY_COUNT, KEY_ENCODER, KEY_NAME, KEY_TS, ProfileStore, Sample};
pub use rebuild::{RebuildConfig, RebuildFailure, RebuildReport, RebuildService};
pub use service::{RuntimeSettings, VoiceprintService};
