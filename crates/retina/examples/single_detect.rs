use miette::Result;
use ndarray::Array2;
use retina::{Boxes, DetectionConfig, Encoder, ImageSize, Target};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let encoder = Encoder::new(DetectionConfig::default())?;
    let image = ImageSize::new(320, 240);

    let target = Target::new(
        Boxes::from_rows(&[[40.0, 30.0, 120.0, 150.0], [200.0, 100.0, 260.0, 140.0]]),
        ndarray::array![0, 1],
    )?;
    let encoding = encoder.encode(image, &target)?;
    tracing::info!(stats = ?encoding.stats(), "encoded {} objects", target.len());

    // pretend the network predicted the encoding exactly
    let num_classes = 2;
    let confidence = Array2::from_shape_fn((encoding.len(), num_classes), |(i, class)| {
        if encoding.classification[i] == class as i64 + 1 {
            0.9
        } else {
            0.01
        }
    });

    for detection in encoder.decode(image, encoding.regression.view(), confidence.view())? {
        tracing::info!(
            label = detection.label,
            confidence = detection.confidence,
            bbox = ?detection.bbox.inner,
            "detected"
        );
    }

    Ok(())
}
