// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::time::Duration;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Point, Vec2};
use loupe_geometry::IntSize;
use loupe_zoom::{ZoomConfig, ZoomableEngine};

fn engine() -> ZoomableEngine {
    let mut engine = ZoomableEngine::new(ZoomConfig::default());
    engine.set_container_size(IntSize::new(1080, 1920));
    engine.set_content_size(IntSize::new(1200, 800));
    engine.set_content_origin_size(IntSize::new(12000, 8000));
    engine
}

fn bench_pinch(c: &mut Criterion) {
    c.bench_function("zoom/pinch_120_steps", |b| {
        b.iter_batched(
            engine,
            |mut engine| {
                let centroid = Point::new(400.0, 900.0);
                for i in 0..120 {
                    let change = if i < 60 { 1.04 } else { 0.98 };
                    engine.gesture_transform(change, centroid, Vec2::new(1.5, -0.5));
                    black_box(engine.content_visible_rect());
                }
                engine.gesture_end(Vec2::ZERO);
                engine
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_fling(c: &mut Criterion) {
    c.bench_function("zoom/drag_and_fling", |b| {
        b.iter_batched(
            || {
                let mut engine = engine();
                engine.scale(4.0, None, false);
                engine
            },
            |mut engine| {
                engine.drag_start();
                for _ in 0..30 {
                    engine.drag(Vec2::new(-12.0, 4.0));
                }
                engine.drag_end(Vec2::new(-3000.0, 1000.0));
                while engine.advance(Duration::from_millis(16)) {
                    black_box(engine.transform());
                }
                engine
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_pinch, bench_fling);
criterion_main!(benches);
