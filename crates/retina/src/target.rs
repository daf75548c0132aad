use ndarray::{Array1, Axis};

use crate::bbox::Xyxy;
use crate::boxes::Boxes;
use crate::error::{Error, Result};

/// Ground truth for a single image: boxes in point form with a 0-based class label per box.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub boxes: Boxes<Xyxy>,
    pub labels: Array1<usize>,
}

impl Target {
    /// Create a new [`Target`], the number of boxes and labels must match.
    pub fn new(boxes: Boxes<Xyxy>, labels: Array1<usize>) -> Result<Self> {
        if boxes.len() != labels.len() {
            return Err(Error::LabelMismatch {
                boxes: boxes.len(),
                labels: labels.len(),
            });
        }

        Ok(Target { boxes, labels })
    }

    /// A target without any objects.
    #[must_use]
    pub fn empty() -> Self {
        Target {
            boxes: Boxes::empty(),
            labels: Array1::zeros(0),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Gather the objects at `indices`, keeping boxes and labels aligned.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Target {
            boxes: self.boxes.select(indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Replace the boxes, keeping the labels.
    pub fn with_boxes(self, boxes: Boxes<Xyxy>) -> Result<Self> {
        Self::new(boxes, self.labels)
    }

    /// Remove all boxes with a non-positive width or height.
    #[must_use]
    pub fn filter_invalid(&self) -> Self {
        let valid = self
            .boxes
            .iter()
            .enumerate()
            .filter(|(_, bbox)| {
                let (x1, y1, x2, y2) = bbox.inner;
                x2 - x1 > 0.0 && y2 - y1 > 0.0
            })
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        self.select(&valid)
    }

    /// Remove boxes of which at most `min_visible` of their area lies within `lower` and `upper`.
    ///
    /// All boxes must have a positive area, a degenerate box results in
    /// [`Error::DegenerateBox`]. Use [`Target::filter_invalid`] first to remove those.
    pub fn filter_hidden(
        &self,
        lower: (f32, f32),
        upper: (f32, f32),
        min_visible: f32,
    ) -> Result<Self> {
        let bounds = Boxes::<Xyxy>::from_rows(&[[lower.0, lower.1, upper.0, upper.1]]);
        let overlaps = bounds.intersect(&self.boxes);
        let areas = self.boxes.area();

        if let Some(index) = areas.iter().position(|&area| area <= 0.0) {
            return Err(Error::DegenerateBox { index });
        }

        let visible = overlaps
            .row(0)
            .iter()
            .zip(&areas)
            .enumerate()
            .filter(|(_, (overlap, area))| *overlap / *area > min_visible)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        Ok(self.select(&visible))
    }
}
