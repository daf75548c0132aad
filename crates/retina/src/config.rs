use std::path::Path;

use odal::Config;
use serde::{Deserialize, Serialize};

use crate::anchor::{DEFAULT_ASPECT_RATIOS, DEFAULT_SCALES, pyramid_box_sizes};
use crate::box_coder::{BoxCoder, default_size_clip};
use crate::encode::MatchThresholds;
use crate::error::{Error, Result};
use crate::nms::{NmsParams, Overlap};

/// Configuration of the anchor pyramid, the target encoding and the post-processing.
///
/// Missing keys take their default value, unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionConfig {
    /// First pyramid level, with a stride of `2^first_layer` pixels.
    pub first_layer: u32,
    /// Last pyramid level (inclusive).
    pub last_layer: u32,
    pub aspect_ratios: Vec<f32>,
    pub scales: Vec<f32>,
    /// Clamp the anchors to the image bounds.
    pub crop_boxes: bool,
    /// Anchors with a best IoU of at most this value are background.
    pub neg_match: f32,
    /// Anchors with a best IoU above this value are positive.
    pub pos_match: f32,
    /// Number of best anchors per ground truth box whose IoU is boosted while matching.
    pub match_nearest: usize,
    pub nms_threshold: f32,
    pub class_threshold: f32,
    pub max_detections: usize,
    pub candidate_multiplier: usize,
    pub overlap: Overlap,
    /// Weights of the `(x, y, w, h)` regression components.
    pub box_weights: [f32; 4],
    /// Upper bound for encoded box sizes when decoding.
    pub size_clip: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            first_layer: 3,
            last_layer: 7,
            aspect_ratios: DEFAULT_ASPECT_RATIOS.to_vec(),
            scales: DEFAULT_SCALES.to_vec(),
            crop_boxes: true,
            neg_match: 0.4,
            pos_match: 0.5,
            match_nearest: 0,
            nms_threshold: 0.5,
            class_threshold: 0.05,
            max_detections: 100,
            candidate_multiplier: 200,
            overlap: Overlap::Iou,
            box_weights: [1.0; 4],
            size_clip: default_size_clip(),
        }
    }
}

impl Config for DetectionConfig {
    const PATH: &'static str = "detection.toml";
}

impl DetectionConfig {
    /// Load the config from `main`, applying the overlay in `overlay` if there is one, and
    /// validate it.
    pub fn load_validated(main: &Path, overlay: &Path) -> Result<Self> {
        let config = Self::load_or_main(main, overlay)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is within its valid range.
    pub fn validate(&self) -> Result<()> {
        if self.first_layer > self.last_layer {
            return Err(Error::InvalidConfig(format!(
                "`first_layer` ({}) must not exceed `last_layer` ({})",
                self.first_layer, self.last_layer
            )));
        }

        // levels above 29 overflow the i32 exponent of the base size
        if self.last_layer > 29 {
            return Err(Error::InvalidConfig(format!(
                "`last_layer` must be at most 29, got {}",
                self.last_layer
            )));
        }

        for (name, values) in [
            ("aspect_ratios", self.aspect_ratios.as_slice()),
            ("scales", self.scales.as_slice()),
            ("box_weights", self.box_weights.as_slice()),
        ] {
            if values.is_empty() || values.iter().any(|&v| !(v.is_finite() && v > 0.0)) {
                return Err(Error::InvalidConfig(format!(
                    "`{name}` must be a non-empty list of positive numbers"
                )));
            }
        }

        if !(self.size_clip.is_finite() && self.size_clip > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "`size_clip` must be positive, got {}",
                self.size_clip
            )));
        }

        self.match_thresholds()?;
        self.nms_params()?;
        Ok(())
    }

    pub fn match_thresholds(&self) -> Result<MatchThresholds> {
        MatchThresholds::new(self.neg_match, self.pos_match)
    }

    pub fn nms_params(&self) -> Result<NmsParams> {
        Ok(
            NmsParams::new(self.nms_threshold, self.class_threshold, self.max_detections)?
                .with_candidate_multiplier(self.candidate_multiplier)?
                .with_overlap(self.overlap),
        )
    }

    #[must_use]
    pub fn box_coder(&self) -> BoxCoder {
        let [wx, wy, ww, wh] = self.box_weights;
        BoxCoder::new_with_clip((wx, wy, ww, wh), self.size_clip)
    }

    /// Anchor sizes of every pyramid level.
    #[must_use]
    pub fn box_sizes(&self) -> Vec<Vec<(f32, f32)>> {
        pyramid_box_sizes(
            self.first_layer,
            self.last_layer,
            &self.aspect_ratios,
            &self.scales,
        )
    }

    #[must_use]
    pub fn num_levels(&self) -> usize {
        (self.last_layer.saturating_sub(self.first_layer) + 1) as usize
    }
}
