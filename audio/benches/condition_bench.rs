use criterion::{Criterion, black_box, criterion_group, criterion_main};
use voxid_audio::{AudioConditioner, resample};

fn tone(freq: f32, rate: u32, secs: f32) -> Vec<f32> {
    let n = (rate as f32 * secs) as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.4)
        .collect()
}

fn bench_condition(c: &mut Criterion) {
    let conditioner = AudioConditioner::default();
    let pcm = tone(220.0, 16_000, 8.0);

    c.bench_function("condition_pcm_8s_16k", |b| {
        b.iter(|| {
            let _ = black_box(conditioner.condition_pcm(black_box(&pcm), 16_000));
        });
    });
}

fn bench_resample(c: &mut Criterion) {
    let pcm = tone(220.0, 44_100, 5.0);

    c.bench_function("resample_5s_44k_to_16k", |b| {
        b.iter(|| {
            let _ = black_box(resample(black_box(&pcm), 44_100, 16_000));
        });
    });
}

criterion_group!(benches, bench_condition, bench_resample);
criterion_main!(benches);
