use crate::error::VoiceprintError;
use crate::profile::ProfileStore;

/// Arithmetic mean of equally sized embeddings, accumulated in f64.
///
/// Returns `None` for an empty set. The result is not re-normalized.
pub fn mean(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = embeddings.first()?;
    let mut acc = vec![0.0f64; first.len()];
    for emb in embeddings {
        for (a, &x) in acc.iter_mut().zip(emb) {
            *a += x as f64;
        }
    }
    let n = embeddings.len() as f64;
    Some(acc.into_iter().map(|a| (a / n) as f32).collect())
}

/// Recomputes the centroid of `name` from a fresh read of its samples and
/// writes it. Returns the number of samples folded in, or `None` (writing
/// nothing) when the speaker has no samples.
pub(crate) async fn recompute(
    store: &ProfileStore,
    name: &str,
) -> Result<Option<usize>, VoiceprintError> {
    let samples = store.fetch_samples(name).await?;
    let Some(centroid) = mean(&samples) else {
        return Ok(None);
    };
    store.upsert_centroid(name, &centroid, samples.len()).await?;
    Ok(Some(samples.len()))
}
