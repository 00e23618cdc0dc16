use audiosync_core::cancel::CancelToken;
use audiosync_core::config::Config;
use audiosync_core::method::Method;
use audiosync_core::{engine, fft};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn sine(freq: f64, n: usize, sr: f64) -> Vec<f32> {
    (0..n)
        .map(|i| ((2.0 * std::f64::consts::PI * freq * i as f64 / sr).sin() * 0.6) as f32)
        .collect()
}

fn bench_magnitude_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("magnitude_spectrum");
    for &size in &[512usize, 2048, 8192] {
        let frame: Vec<f64> = (0..size).map(|i| (i as f64 * 0.01).sin()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| fft::magnitude_spectrum(black_box(frame)).unwrap());
        });
    }
    group.finish();
}

fn bench_align_methods(c: &mut Criterion) {
    let sr = 44_100.0;
    let reference = sine(440.0, 44_100 * 4, sr);
    let shift = 2_205usize;
    let mut target = vec![0.0f32; shift];
    target.extend_from_slice(&reference);
    let config = Config::default();
    let cancel = CancelToken::new();

    let mut group = c.benchmark_group("align");
    for method in [Method::SpectralFlux, Method::Energy, Method::Chroma, Method::Mfcc] {
        group.bench_function(BenchmarkId::from_parameter(method.name()), |b| {
            b.iter(|| {
                engine::align(
                    black_box(&reference),
                    44_100,
                    black_box(&target),
                    44_100,
                    method,
                    &config,
                    &cancel,
                )
                .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_hybrid_align(c: &mut Criterion) {
    let sr = 44_100.0;
    let reference = sine(220.0, 44_100 * 4, sr);
    let shift = 441usize;
    let mut target = vec![0.0f32; shift];
    target.extend_from_slice(&reference);
    let config = Config::default();
    let cancel = CancelToken::new();

    c.bench_function("align/hybrid", |b| {
        b.iter(|| {
            engine::align(black_box(&reference), 44_100, black_box(&target), 44_100, Method::Hybrid, &config, &cancel).unwrap()
        });
    });
}

criterion_group!(benches, bench_magnitude_spectrum, bench_align_methods, bench_hybrid_align);
criterion_main!(benches);
