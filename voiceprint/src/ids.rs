//! Speaker names and record identifiers.

use chrono::Utc;
use uuid::Uuid;

use crate::error::VoiceprintError;

/// Longest accepted speaker name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Namespace for deriving centroid ids from speaker names.
const CENTROID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_2a7e_93d4_4b8a_a0e5_57c2_d9f1_3b06);

/// Trims surrounding whitespace and checks the result is 1 to 100 characters
/// with no control characters. Returns the trimmed name.
pub fn validate_name(name: &str) -> Result<String, VoiceprintError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(VoiceprintError::InvalidName("name is empty".into()));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(VoiceprintError::InvalidName(format!(
            "name has {chars} characters, limit is {MAX_NAME_CHARS}"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(VoiceprintError::InvalidName(
            "name contains control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Deterministic master-tier id for `name` (UUID v5).
pub fn centroid_id(name: &str) -> String {
    Uuid::new_v5(&CENTROID_NAMESPACE, name.as_bytes()).to_string()
}

/// Fresh raw-tier id (UUID v4).
pub fn new_sample_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
