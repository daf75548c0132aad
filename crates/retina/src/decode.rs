use ndarray::{Array1, ArrayView2};

use crate::anchor::Anchors;
use crate::bbox::Xyxy;
use crate::box_coder::BoxCoder;
use crate::boxes::Boxes;
use crate::error::{Error, Result};
use crate::prediction::Prediction;
use crate::util::argmax;

/// Decode `M x 4` regression output against the anchors into boxes in point form.
pub fn decode(regression: ArrayView2<'_, f32>, anchors: &Anchors) -> Result<Boxes<Xyxy>> {
    BoxCoder::default().decode(regression, anchors)
}

/// Decode network output into a [`Prediction`] with one row per anchor.
///
/// `class_confidence` is an `M x C` array of per-class confidences. Every row is labelled with its
/// most confident class, ties going to the lowest class.
pub fn decode_prediction(
    regression: ArrayView2<'_, f32>,
    class_confidence: ArrayView2<'_, f32>,
    anchors: &Anchors,
) -> Result<Prediction> {
    decode_prediction_with(&BoxCoder::default(), regression, class_confidence, anchors)
}

/// Same as [`decode_prediction`], using `coder` to decode the boxes.
pub fn decode_prediction_with(
    coder: &BoxCoder,
    regression: ArrayView2<'_, f32>,
    class_confidence: ArrayView2<'_, f32>,
    anchors: &Anchors,
) -> Result<Prediction> {
    if class_confidence.ncols() == 0 {
        return Err(Error::NoClasses);
    }

    if class_confidence.nrows() != anchors.len() {
        return Err(Error::ShapeMismatch {
            name: "class_confidence",
            expected: anchors.len(),
            actual: class_confidence.nrows(),
        });
    }

    let boxes = coder.decode(regression, anchors)?;

    let (labels, confidence): (Vec<usize>, Vec<f32>) = class_confidence
        .rows()
        .into_iter()
        .map(|row| argmax(row).unwrap_or((0, 0.0)))
        .unzip();

    Prediction::new(boxes, Array1::from(labels), Array1::from(confidence))
}
