//! Biquad filter benchmarks

use aria_dsp::MonoProcessor;
use aria_dsp::biquad::BiquadTDF2;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_biquad(c: &mut Criterion) {
    let mut filter = BiquadTDF2::new(48000.0);
    filter.set_lowpass(1000.0, 0.707);

    let mut buffer: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.01).sin()).collect();

    c.bench_function("biquad_block_1024", |b| {
        b.iter(|| {
            filter.process_block(black_box(&mut buffer));
        })
    });
}

fn bench_biquad_cascade(c: &mut Criterion) {
    let mut filters: Vec<BiquadTDF2> = (0..8)
        .map(|i| {
            let mut f = BiquadTDF2::new(48000.0);
            f.set_peaking(200.0 * (i + 1) as f64, 1.0, 3.0);
            f
        })
        .collect();

    let mut buffer: Vec<f64> = (0..1024).map(|i| (i as f64 * 0.01).sin()).collect();

    c.bench_function("biquad_cascade_8x1024", |b| {
        b.iter(|| {
            for f in filters.iter_mut() {
                f.process_block(black_box(&mut buffer));
            }
        })
    });
}

criterion_group!(benches, bench_biquad, bench_biquad_cascade);
criterion_main!(benches);
