use ndarray::{Array1, Axis};

use crate::bbox::{Bbox, Xyxy};
use crate::boxes::Boxes;
use crate::error::{Error, Result};

/// A decoded detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box in point form, in image pixels.
    pub bbox: Bbox<Xyxy>,
    /// 0-based class label.
    pub label: usize,
    /// Confidence of `label`, in `[0, 1]`.
    pub confidence: f32,
}

/// Decoded boxes with the most likely class and its confidence for every box.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub boxes: Boxes<Xyxy>,
    pub labels: Array1<usize>,
    pub confidence: Array1<f32>,
}

impl Prediction {
    pub fn new(boxes: Boxes<Xyxy>, labels: Array1<usize>, confidence: Array1<f32>) -> Result<Self> {
        if boxes.len() != labels.len() {
            return Err(Error::LabelMismatch {
                boxes: boxes.len(),
                labels: labels.len(),
            });
        }

        if boxes.len() != confidence.len() {
            return Err(Error::ShapeMismatch {
                name: "confidence",
                expected: boxes.len(),
                actual: confidence.len(),
            });
        }

        Ok(Prediction {
            boxes,
            labels,
            confidence,
        })
    }

    #[must_use]
    pub fn empty() -> Self {
        Prediction {
            boxes: Boxes::empty(),
            labels: Array1::zeros(0),
            confidence: Array1::zeros(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.confidence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.confidence.is_empty()
    }

    /// Gather the rows at `indices`, in that order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Prediction {
            boxes: self.boxes.select(indices),
            labels: self.labels.select(Axis(0), indices),
            confidence: self.confidence.select(Axis(0), indices),
        }
    }

    /// Concatenate predictions in order.
    pub fn concatenate(parts: &[Prediction]) -> Result<Self> {
        if parts.is_empty() {
            return Ok(Self::empty());
        }

        let boxes = parts.iter().map(|p| p.boxes.clone()).collect::<Vec<_>>();
        let labels = parts.iter().map(|p| p.labels.view()).collect::<Vec<_>>();
        let confidence = parts.iter().map(|p| p.confidence.view()).collect::<Vec<_>>();

        Self::new(
            Boxes::concatenate(&boxes)?,
            ndarray::concatenate(Axis(0), &labels)?,
            ndarray::concatenate(Axis(0), &confidence)?,
        )
    }

    /// Shift all boxes by `offset`, mapping detections on an image tile back to the full image.
    #[must_use]
    pub fn translate(&self, offset: (f32, f32)) -> Self {
        Prediction {
            boxes: self.boxes.translate(offset),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn detections(&self) -> Vec<Detection> {
        self.boxes
            .iter()
            .zip(&self.labels)
            .zip(&self.confidence)
            .map(|((bbox, &label), &confidence)| Detection {
                bbox,
                label,
                confidence,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn prediction() -> Prediction {
        Prediction::new(
            Boxes::from_rows(&[[0.0, 0.0, 2.0, 2.0], [4.0, 4.0, 8.0, 6.0]]),
            array![1, 0],
            array![0.25, 0.75],
        )
        .unwrap()
    }

    #[test]
    fn rejects_misaligned_fields() {
        let result = Prediction::new(
            Boxes::from_rows(&[[0.0, 0.0, 2.0, 2.0]]),
            array![1],
            array![0.5, 0.5],
        );

        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                name: "confidence",
                ..
            })
        ));
    }

    #[test]
    fn detections_follow_rows() {
        let detections = prediction().select(&[1, 0]).detections();

        assert_eq!(
            detections,
            vec![
                Detection {
                    bbox: Bbox::xyxy(4.0, 4.0, 8.0, 6.0),
                    label: 0,
                    confidence: 0.75,
                },
                Detection {
                    bbox: Bbox::xyxy(0.0, 0.0, 2.0, 2.0),
                    label: 1,
                    confidence: 0.25,
                },
            ]
        );
    }

    #[test]
    fn translate_only_moves_boxes() {
        let moved = prediction().translate((10.0, -1.0));

        assert_eq!(
            moved.boxes.view(),
            array![[10.0, -1.0, 12.0, 1.0], [14.0, 3.0, 18.0, 5.0]]
        );
        assert_eq!(moved.labels, array![1, 0]);
        assert_eq!(moved.confidence, array![0.25, 0.75]);
    }

    #[test]
    fn concatenate_keeps_rows_aligned() {
        let joined = Prediction::concatenate(&[prediction(), prediction().translate((1.0, 0.0))])
            .unwrap();

        assert_eq!(joined.len(), 4);
        assert_eq!(joined.labels, array![1, 0, 1, 0]);
        assert_eq!(joined.confidence, array![0.25, 0.75, 0.25, 0.75]);
        assert_eq!(joined.boxes.view().row(2), array![1.0, 0.0, 3.0, 2.0]);

        assert!(Prediction::concatenate(&[]).unwrap().is_empty());
    }

    #[test]
    fn empty_prediction_has_no_detections() {
        assert!(Prediction::empty().detections().is_empty());
    }
}
