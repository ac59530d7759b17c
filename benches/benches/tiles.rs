// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for tile grid construction and tile refreshing while panning.
//!
//! Decoding is faked with one pixel bitmaps so the numbers reflect the
//! bookkeeping of the tile manager, not codec speed.

use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use loupe_geometry::{ContinuousTransformType, IntRect, IntSize};
use loupe_source::{DecodeError, ImageInfo, RegionDecoder, TileBitmap};
use loupe_tiles::{
    InlineExecutor, TileAnimationSpec, TileConfig, TileDecoder, TileManager, build_tile_grids,
    calculate_image_load_rect, calculate_sample_size,
};

#[derive(Debug)]
struct PixelDecoder {
    info: ImageInfo,
}

impl RegionDecoder for PixelDecoder {
    fn image_info(&self) -> &ImageInfo {
        &self.info
    }

    fn decode_region(&self, _key: &str, _rect: IntRect, _sample_size: u32) -> Result<TileBitmap, DecodeError> {
        Ok(TileBitmap::rgba8(1, 1, vec![0; 4]))
    }

    fn try_clone(&self) -> Result<Box<dyn RegionDecoder>, DecodeError> {
        Ok(Box::new(Self {
            info: self.info.clone(),
        }))
    }
}

const IMAGES: [(&str, IntSize); 3] = [
    ("12mp", IntSize::new(4000, 3000)),
    ("100mp", IntSize::new(12000, 8000)),
    ("panorama", IntSize::new(30000, 2000)),
];

fn bench_build_grids(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles/build_grids");
    let tile = IntSize::new(540, 960);
    for (name, image) in IMAGES {
        group.bench_with_input(BenchmarkId::from_parameter(name), &image, |b, &image| {
            b.iter(|| black_box(build_tile_grids(black_box(image), tile)));
        });
    }
    group.finish();
}

fn bench_sample_and_load_rect(c: &mut Criterion) {
    let image = IntSize::new(12000, 8000);
    let content = IntSize::new(1200, 800);
    c.bench_function("tiles/sample_and_load_rect", |b| {
        let mut scale = 0.5;
        b.iter(|| {
            scale = if scale > 20.0 { 0.5 } else { scale * 1.1 };
            let sample_size = calculate_sample_size(image, content, black_box(scale));
            let load = calculate_image_load_rect(
                image,
                content,
                IntSize::new(270, 480),
                IntRect::new(300, 200, 600, 400),
            );
            black_box((sample_size, load))
        });
    });
}

fn manager(image: IntSize, content: IntSize) -> TileManager {
    let decoder = TileDecoder::new(
        "bench",
        Box::new(PixelDecoder {
            info: ImageInfo::new(image.width, image.height, "image/jpeg"),
        }),
    );
    let config = TileConfig {
        tile_animation: TileAnimationSpec::NONE,
        ..TileConfig::default()
    };
    TileManager::new(
        Arc::new(decoder),
        content,
        IntSize::new(540, 960),
        None,
        Arc::new(InlineExecutor),
        config,
    )
}

/// Visible rects of a horizontal pan across the content at `scale`.
fn pan_path(content: IntSize, scale: f64, steps: u32) -> Vec<IntRect> {
    let view = IntSize::new(1080, 1920);
    let w = ((f64::from(view.width) / scale) as u32).min(content.width);
    let h = ((f64::from(view.height) / scale) as u32).min(content.height);
    let y = (content.height - h) / 2;
    (0..steps)
        .map(|i| {
            let x = (content.width - w) * i / steps.max(1);
            IntRect::new(x, y, x + w, y + h)
        })
        .collect()
}

fn bench_refresh_while_panning(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles/refresh_pan");
    let image = IntSize::new(12000, 8000);
    let content = IntSize::new(1200, 800);
    for scale in [2.0, 8.0, 16.0] {
        let path = pan_path(content, scale, 64);
        group.bench_with_input(BenchmarkId::from_parameter(scale), &path, |b, path| {
            b.iter_batched(
                || manager(image, content),
                |mut manager| {
                    for &visible in path {
                        manager.refresh_tiles(
                            scale,
                            visible,
                            0,
                            ContinuousTransformType::empty(),
                            "bench",
                        );
                        manager.apply_decode_results();
                    }
                    black_box(manager.foreground_tiles().len())
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_build_grids,
    bench_sample_and_load_rect,
    bench_refresh_while_panning
);
criterion_main!(benches);
