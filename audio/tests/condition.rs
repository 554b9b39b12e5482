use std::io::Cursor;

use voxid_audio::{AudioConditioner, AudioError, ConditionerConfig};

fn wav(sample_rate: u32, channels: u16, frames: &[Vec<f32>]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for frame in frames {
            for &s in frame {
                w.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).unwrap();
            }
        }
        w.finalize().unwrap();
    }
    cursor.into_inner()
}

fn tone(freq: f32, rate: u32, secs: f32, amp: f32) -> Vec<f32> {
    let n = (rate as f64 * secs as f64).round() as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * amp)
        .collect()
}

fn mono(samples: &[f32]) -> Vec<Vec<f32>> {
    samples.iter().map(|&s| vec![s]).collect()
}

#[test]
fn stereo_44k_becomes_mono_16k() {
    let left = tone(220.0, 44_100, 2.0, 0.4);
    let right = tone(330.0, 44_100, 2.0, 0.4);
    let frames: Vec<Vec<f32>> = left.iter().zip(&right).map(|(&l, &r)| vec![l, r]).collect();

    let out = AudioConditioner::default()
        .condition(&wav(44_100, 2, &frames))
        .unwrap();
    assert_eq!(out.sample_rate, 16_000);
    // Two seconds of continuous tone survive VAD and sit under the window.
    let secs = out.duration_secs();
    assert!((secs - 2.0).abs() < 0.05, "duration {secs}");
}

#[test]
fn silent_file_has_no_speech() {
    let bytes = wav(16_000, 1, &mono(&vec![0.0; 32_000]));
    let err = AudioConditioner::default().condition(&bytes).unwrap_err();
    assert!(matches!(err, AudioError::NoSpeechDetected), "got {err:?}");
}

#[test]
fn empty_wav_without_vad_is_too_short() {
    let cfg = ConditionerConfig {
        trim_silence: false,
        ..ConditionerConfig::default()
    };
    let bytes = wav(16_000, 1, &[]);
    let err = AudioConditioner::new(cfg).condition(&bytes).unwrap_err();
    assert!(matches!(err, AudioError::AudioTooShort { .. }), "got {err:?}");
}

#[test]
fn short_tone_between_silence_is_too_short() {
    let mut x = vec![0.0; 16_000];
    x.extend(tone(200.0, 16_000, 0.5, 0.5));
    x.extend(vec![0.0; 16_000]);
    let err = AudioConditioner::default()
        .condition(&wav(16_000, 1, &mono(&x)))
        .unwrap_err();
    assert!(matches!(err, AudioError::AudioTooShort { .. }), "got {err:?}");
}

#[test]
fn five_second_clip_keeps_three_seconds() {
    let x = tone(200.0, 16_000, 5.0, 0.3);
    let out = AudioConditioner::default()
        .condition(&wav(16_000, 1, &mono(&x)))
        .unwrap();
    assert_eq!(out.samples.len(), 48_000);
}

#[test]
fn loudest_window_is_selected() {
    // Quiet tone, then a burst four times louder; the window must cover the
    // burst, which shows up as a higher pre-normalization level at the end.
    let cfg = ConditionerConfig {
        normalize: false,
        pre_emphasis: 0.0,
        ..ConditionerConfig::default()
    };
    let mut x = tone(200.0, 16_000, 3.0, 0.1);
    x.extend(tone(200.0, 16_000, 2.0, 0.4));
    let out = AudioConditioner::new(cfg)
        .condition(&wav(16_000, 1, &mono(&x)))
        .unwrap();
    assert_eq!(out.samples.len(), 48_000);
    let tail_peak = out.samples[16_000..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(tail_peak > 0.35, "tail peak {tail_peak}");
}

#[test]
fn left_channel_when_stereo_not_accepted() {
    let cfg = ConditionerConfig {
        force_mono: false,
        accept_stereo: false,
        enhance: false,
        ..ConditionerConfig::default()
    };
    let left = tone(200.0, 16_000, 1.5, 0.5);
    let frames: Vec<Vec<f32>> = left.iter().map(|&l| vec![l, 0.0]).collect();
    let out = AudioConditioner::new(cfg)
        .condition(&wav(16_000, 2, &frames))
        .unwrap();
    let peak = out.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    // Averaging would have halved the level.
    assert!(peak > 0.45, "peak {peak}");
}

#[test]
fn conditioning_is_deterministic() {
    let mut x = tone(150.0, 22_050, 1.0, 0.2);
    x.extend(vec![0.0; 11_025]);
    x.extend(tone(260.0, 22_050, 3.5, 0.5));
    let bytes = wav(22_050, 1, &mono(&x));
    let c = AudioConditioner::default();
    assert_eq!(c.condition(&bytes).unwrap(), c.condition(&bytes).unwrap());
}

#[test]
fn garbage_is_unsupported() {
    let err = AudioConditioner::default()
        .condition(b"RIFF but not really")
        .unwrap_err();
    assert!(matches!(err, AudioError::UnsupportedFormat(_)), "got {err:?}");
}
