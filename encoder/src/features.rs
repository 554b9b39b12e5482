//! Log-mel filterbank features.
//!
//! Frames are Hann-windowed, zero-padded to a power of two, transformed with
//! an iterative radix-2 FFT and projected onto triangular mel filters.

use std::f64::consts::PI;

/// Floor applied to filter energies before the log.
const ENERGY_FLOOR: f64 = 1e-10;

/// Log-mel frame parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMelConfig {
    pub sample_rate: u32,
    pub num_mels: usize,
    /// Frame length in seconds (default: 0.025).
    pub frame_secs: f32,
    /// Frame shift in seconds (default: 0.010).
    pub hop_secs: f32,
    /// Lowest filter edge in Hz (default: 20).
    pub low_hz: f32,
    /// Highest filter edge in Hz; `None` means Nyquist.
    pub high_hz: Option<f32>,
}

impl LogMelConfig {
    pub fn new(sample_rate: u32, num_mels: usize) -> Self {
        Self {
            sample_rate,
            num_mels,
            frame_secs: 0.025,
            hop_secs: 0.010,
            low_hz: 20.0,
            high_hz: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn mul(self, o: Complex) -> Complex {
        Complex {
            re: self.re * o.re - self.im * o.im,
            im: self.re * o.im + self.im * o.re,
        }
    }

    fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

/// A triangular filter stored sparsely from `start` bin.
#[derive(Debug, Clone)]
struct MelFilter {
    start: usize,
    weights: Vec<f64>,
}

/// Precomputed log-mel analysis for one sample rate.
#[derive(Debug, Clone)]
pub struct LogMel {
    frame_len: usize,
    hop: usize,
    fft_size: usize,
    window: Vec<f64>,
    twiddles: Vec<Complex>,
    filters: Vec<MelFilter>,
}

fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

impl LogMel {
    pub fn new(cfg: &LogMelConfig) -> Self {
        let rate = cfg.sample_rate.max(1) as f64;
        let frame_len = ((cfg.frame_secs as f64 * rate).round() as usize).max(2);
        let hop = ((cfg.hop_secs as f64 * rate).round() as usize).max(1);
        let fft_size = frame_len.next_power_of_two();

        let window = (0..frame_len)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / (frame_len - 1) as f64).cos())
            .collect();

        let twiddles = (0..fft_size / 2)
            .map(|k| {
                let a = -2.0 * PI * k as f64 / fft_size as f64;
                Complex {
                    re: a.cos(),
                    im: a.sin(),
                }
            })
            .collect();

        let nyquist = rate / 2.0;
        let high = cfg.high_hz.map(|h| h as f64).unwrap_or(nyquist).min(nyquist);
        let low = (cfg.low_hz as f64).clamp(0.0, high);
        let filters = mel_filters(cfg.num_mels, fft_size, rate, low, high);

        Self {
            frame_len,
            hop,
            fft_size,
            window,
            twiddles,
            filters,
        }
    }

    pub fn num_mels(&self) -> usize {
        self.filters.len()
    }

    /// Number of full frames available in `n` samples.
    pub fn num_frames(&self, n: usize) -> usize {
        if n < self.frame_len {
            0
        } else {
            (n - self.frame_len) / self.hop + 1
        }
    }

    /// Computes `[frames][num_mels]` natural-log mel energies. Returns an
    /// empty vector when the signal is shorter than one frame.
    pub fn compute(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let frames = self.num_frames(samples.len());
        let half = self.fft_size / 2 + 1;
        let mut buf = vec![Complex::default(); self.fft_size];
        let mut power = vec![0.0f64; half];
        let mut out = Vec::with_capacity(frames);

        for f in 0..frames {
            let frame = &samples[f * self.hop..f * self.hop + self.frame_len];
            let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / self.frame_len as f64;

            buf.fill(Complex::default());
            for ((slot, &s), &w) in buf.iter_mut().zip(frame).zip(&self.window) {
                slot.re = (s as f64 - mean) * w;
            }
            self.fft(&mut buf);
            for (p, c) in power.iter_mut().zip(&buf) {
                *p = c.norm_sqr();
            }

            let row = self
                .filters
                .iter()
                .map(|filter| {
                    let energy: f64 = filter
                        .weights
                        .iter()
                        .zip(&power[filter.start..])
                        .map(|(w, p)| w * p)
                        .sum();
                    energy.max(ENERGY_FLOOR).ln() as f32
                })
                .collect();
            out.push(row);
        }
        out
    }

    fn fft(&self, x: &mut [Complex]) {
        let n = x.len();
        let bits = n.trailing_zeros();
        if bits == 0 {
            return;
        }
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if i < j {
                x.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let stride = n / len;
            for block in x.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(len / 2);
                for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                    let t = b.mul(self.twiddles[k * stride]);
                    *b = Complex {
                        re: a.re - t.re,
                        im: a.im - t.im,
                    };
                    *a = Complex {
                        re: a.re + t.re,
                        im: a.im + t.im,
                    };
                }
            }
            len <<= 1;
        }
    }
}

fn mel_filters(num_mels: usize, fft_size: usize, rate: f64, low: f64, high: f64) -> Vec<MelFilter> {
    let half = fft_size / 2 + 1;
    let bin_hz = rate / fft_size as f64;
    let (mel_lo, mel_hi) = (hz_to_mel(low), hz_to_mel(high));
    let step = (mel_hi - mel_lo) / (num_mels + 1) as f64;
    let edges: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_lo + step * i as f64))
        .collect();

    edges
        .windows(3)
        .map(|e| {
            let (left, center, right) = (e[0], e[1], e[2]);
            let start = ((left / bin_hz).floor() as usize).min(half - 1);
            let end = ((right / bin_hz).ceil() as usize).min(half - 1);
            let weights = (start..=end)
                .map(|k| {
                    let hz = k as f64 * bin_hz;
                    if hz <= left || hz >= right {
                        0.0
                    } else if hz <= center {
                        (hz - left) / (center - left).max(f64::EPSILON)
                    } else {
                        (right - hz) / (right - center).max(f64::EPSILON)
                    }
                })
                .collect();
            MelFilter { start, weights }
        })
        .collect()
}
