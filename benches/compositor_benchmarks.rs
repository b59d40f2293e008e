use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgba, RgbaImage};
use imgly_bgcanvas::{
    compose, pipeline, BatchInput, BatchProcessor, CanvasConfig, OutputFormatHandler,
    PipelineConfig,
};

/// Opaque subject on a transparent border, like a cropped segmentation result
fn subject(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let inside = x > width / 10 && x < width * 9 / 10 && y > height / 10 && y < height * 9 / 10;
        if inside {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn benchmark_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    group.sample_size(20);

    let canvas = CanvasConfig::default();
    for (width, height) in [(400, 600), (1200, 800), (3000, 2000)] {
        let image = subject(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{width}x{height}")),
            &image,
            |b, image| b.iter(|| compose(black_box(image), black_box(&canvas)).unwrap()),
        );
    }

    let opaque = RgbaImage::from_pixel(1200, 800, Rgba([90, 90, 90, 255]));
    group.bench_function("opaque_1200x800", |b| {
        b.iter(|| compose(black_box(&opaque), black_box(&canvas)).unwrap());
    });

    group.finish();
}

fn benchmark_crop(c: &mut Criterion) {
    let image = subject(2000, 1500);
    c.bench_function("content_bounds_2000x1500", |b| {
        b.iter(|| pipeline::content_bounds(black_box(&image)));
    });
}

fn benchmark_batch_without_segmentation(c: &mut Criterion) {
    let config = PipelineConfig::builder()
        .remove_background(false)
        .build()
        .unwrap();
    let processor = BatchProcessor::builder(config).build().unwrap();
    let bytes = OutputFormatHandler::encode_png(&subject(800, 600)).unwrap();
    let inputs: Vec<BatchInput> = (0..4)
        .map(|i| BatchInput::new(format!("image{i}.png"), bytes.clone()))
        .collect();

    let mut group = c.benchmark_group("batch");
    group.sample_size(10);
    group.bench_function("four_images_to_archive", |b| {
        b.iter(|| {
            processor
                .process_batch(black_box(&inputs))
                .to_archive()
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    compositor_benches,
    benchmark_compose,
    benchmark_crop,
    benchmark_batch_without_segmentation
);
criterion_main!(compositor_benches);
