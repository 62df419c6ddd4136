//! Render cost of a running engine, per block size.

use std::hint::black_box;

use bowlscape_engine::{BowlsEngine, EngineConfig, Mode, Offline};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const SR: f32 = 48_000.0;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];

fn playing(mode: Mode) -> BowlsEngine {
    let mut engine = BowlsEngine::new(Offline::new(SR), EngineConfig { seed: Some(7), initial_mode: mode });
    if let Err(e) = engine.start(mode) {
        panic!("offline start failed: {e}");
    }
    // Past the fade-in so every layer is sounding.
    let mut warm = vec![0.0; 2 * SR as usize];
    engine.render(&mut warm);
    engine
}

fn bench_blocks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/render");
    for mode in Mode::ALL {
        for &size in BLOCK_SIZES {
            let mut engine = playing(mode);
            let mut buffer = vec![0.0f32; size];
            group.bench_with_input(BenchmarkId::new(mode.as_str(), size), &size, |b, _| {
                b.iter(|| engine.render(black_box(&mut buffer)));
            });
        }
    }
    group.finish();
}

fn bench_one_second(c: &mut Criterion) {
    let mut engine = playing(Mode::Practice);
    let mut buffer = vec![0.0f32; SR as usize];
    c.bench_function("engine/practice_1s", |b| {
        b.iter(|| engine.render(black_box(&mut buffer)));
    });
}

criterion_group!(benches, bench_blocks, bench_one_second);
criterion_main!(benches);
