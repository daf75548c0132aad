use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::Array1;
use rand::{Rng, SeedableRng, rngs::StdRng};
use retina::{Boxes, DetectionConfig, Encoder, ImageSize, NmsParams, Target, Xyxy, nms};

fn random_boxes(rng: &mut StdRng, n: usize) -> (Boxes<Xyxy>, Array1<f32>) {
    let rows = (0..n)
        .map(|_| {
            let (x, y) = (rng.random_range(0.0..300.0), rng.random_range(0.0..220.0));
            let (w, h) = (rng.random_range(4.0..80.0), rng.random_range(4.0..80.0));
            [x, y, x + w, y + h]
        })
        .collect::<Vec<_>>();
    let confidence = (0..n).map(|_| rng.random_range(0.0..1.0)).collect();

    (Boxes::from_rows(&rows), confidence)
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let params = NmsParams::default();

    for n in [1_000, 10_000] {
        let (boxes, confidence) = random_boxes(&mut rng, n);
        c.bench_function(&format!("nms {n} boxes"), |b| {
            b.iter(|| nms(black_box(&boxes), confidence.view(), &params));
        });
    }

    let encoder = Encoder::new(DetectionConfig::default()).unwrap();
    let image = ImageSize::new(320, 240);
    let (boxes, _) = random_boxes(&mut rng, 20);
    let target = Target::new(boxes, Array1::zeros(20)).unwrap();

    c.bench_function("encode 20 objects", |b| {
        b.iter(|| encoder.encode(image, black_box(&target)));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
