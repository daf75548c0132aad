//! Greedy non-maximum suppression.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::bbox::{Bbox, Xyxy};
use crate::boxes::Boxes;
use crate::error::{Error, Result};
use crate::prediction::Prediction;

/// Overlap measure used to decide whether two boxes cover the same object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Overlap {
    /// Intersection over union.
    #[default]
    Iou,
    /// Intersection over the area of the smaller box.
    MinArea,
}

impl Overlap {
    #[must_use]
    pub fn measure(self, a: &Bbox<Xyxy>, b: &Bbox<Xyxy>) -> f32 {
        match self {
            Overlap::Iou => a.iou(b),
            Overlap::MinArea => a.min_area_overlap(b),
        }
    }
}

/// Parameters of [`nms`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmsParams {
    nms_threshold: f32,
    class_threshold: f32,
    max_detections: usize,
    candidate_multiplier: usize,
    overlap: Overlap,
}

impl Default for NmsParams {
    fn default() -> Self {
        NmsParams {
            nms_threshold: 0.5,
            class_threshold: 0.05,
            max_detections: 100,
            candidate_multiplier: 200,
            overlap: Overlap::Iou,
        }
    }
}

impl NmsParams {
    pub fn new(nms_threshold: f32, class_threshold: f32, max_detections: usize) -> Result<Self> {
        check_unit("nms_threshold", nms_threshold)?;
        check_unit("class_threshold", class_threshold)?;

        if max_detections == 0 {
            return Err(Error::InvalidMaxDetections);
        }

        Ok(NmsParams {
            nms_threshold,
            class_threshold,
            max_detections,
            ..Default::default()
        })
    }

    /// Limit the number of candidates considered to `multiplier * max_detections`.
    pub fn with_candidate_multiplier(self, multiplier: usize) -> Result<Self> {
        if multiplier == 0 {
            return Err(Error::InvalidCandidateMultiplier);
        }

        Ok(NmsParams {
            candidate_multiplier: multiplier,
            ..self
        })
    }

    #[must_use]
    pub fn with_overlap(self, overlap: Overlap) -> Self {
        NmsParams { overlap, ..self }
    }

    #[must_use]
    pub fn nms_threshold(&self) -> f32 {
        self.nms_threshold
    }

    #[must_use]
    pub fn class_threshold(&self) -> f32 {
        self.class_threshold
    }

    #[must_use]
    pub fn max_detections(&self) -> usize {
        self.max_detections
    }

    #[must_use]
    pub fn candidate_multiplier(&self) -> usize {
        self.candidate_multiplier
    }

    #[must_use]
    pub fn overlap(&self) -> Overlap {
        self.overlap
    }

    fn max_candidates(&self) -> usize {
        self.max_detections.saturating_mul(self.candidate_multiplier)
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidThreshold { name, value })
    }
}

/// Select a subset of non-overlapping boxes, in order of decreasing confidence.
///
/// Boxes with a confidence below the class threshold are never selected. Starting from the most
/// confident box, every box is kept unless it overlaps an already kept box by at least the NMS
/// threshold. Disjoint boxes never suppress each other. Boxes with equal confidence are visited
/// in their original order.
///
/// Only the `candidate_multiplier * max_detections` most confident boxes are considered, which
/// bounds the quadratic suppression loop. Returns the indices of the kept boxes.
pub fn nms(
    boxes: &Boxes<Xyxy>,
    confidence: ArrayView1<'_, f32>,
    params: &NmsParams,
) -> Result<Vec<usize>> {
    if confidence.len() != boxes.len() {
        return Err(Error::ShapeMismatch {
            name: "confidence",
            expected: boxes.len(),
            actual: confidence.len(),
        });
    }

    let mut candidates = (0..boxes.len())
        .filter(|&i| confidence[i] >= params.class_threshold)
        .collect::<Vec<_>>();
    candidates.sort_by(|&a, &b| confidence[b].total_cmp(&confidence[a]));

    let max_candidates = params.max_candidates();
    if candidates.len() > max_candidates {
        tracing::debug!(
            num_candidates = candidates.len(),
            max_candidates,
            "discarding low confidence nms candidates"
        );
        candidates.truncate(max_candidates);
    }

    let candidate_boxes = boxes.select(&candidates);
    let candidates = candidates
        .into_iter()
        .zip(candidate_boxes.iter())
        .collect::<Vec<_>>();

    let mut suppressed = vec![false; candidates.len()];
    let mut keep = Vec::new();

    for (i, (index, bbox)) in candidates.iter().enumerate() {
        if suppressed[i] {
            continue;
        }

        keep.push(*index);
        if keep.len() == params.max_detections {
            break;
        }

        for (j, (_, other)) in candidates.iter().enumerate().skip(i + 1) {
            // boxes that do not overlap at all are never suppressed, even at a zero threshold
            let overlap = params.overlap.measure(bbox, other);
            if !suppressed[j] && overlap > 0.0 && overlap >= params.nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    Ok(keep)
}

/// Apply [`nms`] to a prediction, keeping the selected rows in order of decreasing confidence.
pub fn filter_nms(prediction: &Prediction, params: &NmsParams) -> Result<Prediction> {
    let keep = nms(&prediction.boxes, prediction.confidence.view(), params)?;
    Ok(prediction.select(&keep))
}
