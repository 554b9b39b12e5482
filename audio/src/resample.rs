//! Sample rate conversion using rubato's sinc interpolator.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

const SINC_LEN: usize = 128;

/// Resamples a mono signal from `from` Hz to `to` Hz.
///
/// The whole clip is processed in one pass. The input is zero-padded so the
/// filter delay does not truncate the tail, and the delay is removed from the
/// output, so the result has exactly `round(len * to / from)` samples.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    if from == 0 || to == 0 {
        return Err(AudioError::Resample(format!("invalid rates {from} -> {to}")));
    }
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = to as f64 / from as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    // Enough trailing zeros to flush the filter in both directions.
    let pad = (SINC_LEN as f64 * (1.0 / ratio).max(1.0)).ceil() as usize * 2;
    let mut input = Vec::with_capacity(samples.len() + pad);
    input.extend_from_slice(samples);
    input.resize(samples.len() + pad, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, params, input.len(), 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    let delay = resampler.output_delay();

    let output = resampler
        .process(&[input], None)
        .map_err(|e| AudioError::Resample(e.to_string()))?;
    let channel = output.into_iter().next().unwrap_or_default();

    let mut out: Vec<f32> = channel.into_iter().skip(delay).take(expected).collect();
    out.resize(expected, 0.0);
    Ok(out)
}
