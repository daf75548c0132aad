use std::sync::Arc;

use ndarray::{ArrayView2, ArrayView3, Axis};

use crate::anchor::{Anchors, ImageSize, layer_dims, make_anchors};
use crate::box_coder::BoxCoder;
use crate::cache::AnchorCache;
use crate::config::DetectionConfig;
use crate::decode::decode_prediction_with;
use crate::encode::{Encoding, MatchThresholds, encode_with};
use crate::error::{Error, Result};
use crate::nms::{NmsParams, filter_nms};
use crate::prediction::{Detection, Prediction};
use crate::target::Target;
use crate::tile::Tile;

/// Encodes targets and decodes network output for images of any size.
///
/// The anchors of every image size are generated once and cached.
#[derive(Debug)]
pub struct Encoder {
    config: DetectionConfig,
    box_sizes: Vec<Vec<(f32, f32)>>,
    thresholds: MatchThresholds,
    nms_params: NmsParams,
    coder: BoxCoder,
    cache: AnchorCache,
}

impl Encoder {
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Encoder {
            box_sizes: config.box_sizes(),
            thresholds: config.match_thresholds()?,
            nms_params: config.nms_params()?,
            coder: config.box_coder(),
            cache: AnchorCache::new(),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    #[must_use]
    pub fn nms_params(&self) -> &NmsParams {
        &self.nms_params
    }

    /// Anchors for an image of `image_size`.
    pub fn anchors(&self, image_size: ImageSize) -> Result<Arc<Anchors>> {
        self.cache.get_or_try_insert_with(image_size, || {
            let dims = layer_dims(image_size, self.config.first_layer, self.box_sizes.len());
            make_anchors(&self.box_sizes, &dims, image_size, self.config.crop_boxes)
        })
    }

    /// Encode the target of an image of `image_size` into training targets.
    pub fn encode(&self, image_size: ImageSize, target: &Target) -> Result<Encoding> {
        let anchors = self.anchors(image_size)?;
        encode_with(&self.coder, target, &anchors, self.thresholds, self.config.match_nearest)
    }

    /// Decode network output into one (unfiltered) prediction per anchor.
    pub fn decode_prediction(
        &self,
        image_size: ImageSize,
        regression: ArrayView2<'_, f32>,
        class_confidence: ArrayView2<'_, f32>,
    ) -> Result<Prediction> {
        let anchors = self.anchors(image_size)?;
        decode_prediction_with(&self.coder, regression, class_confidence, &anchors)
    }

    /// Decode network output into the final detections, most confident first.
    pub fn decode(
        &self,
        image_size: ImageSize,
        regression: ArrayView2<'_, f32>,
        class_confidence: ArrayView2<'_, f32>,
    ) -> Result<Vec<Detection>> {
        let prediction = self.decode_prediction(image_size, regression, class_confidence)?;
        Ok(filter_nms(&prediction, &self.nms_params)?.detections())
    }

    /// Decode the network output of every tile of an image into detections on the full image.
    ///
    /// Boxes are shifted by their tile offset before a single NMS pass over all tiles, so
    /// duplicates in overlapping regions are removed.
    pub fn decode_tiled(
        &self,
        tiles: &[(Tile, ArrayView2<'_, f32>, ArrayView2<'_, f32>)],
    ) -> Result<Vec<Detection>> {
        let predictions = tiles
            .iter()
            .map(|(tile, regression, confidence)| {
                Ok(self
                    .decode_prediction(tile.size, *regression, *confidence)?
                    .translate(tile.translation()))
            })
            .collect::<Result<Vec<_>>>()?;

        let prediction = Prediction::concatenate(&predictions)?;
        tracing::debug!(
            num_tiles = tiles.len(),
            num_boxes = prediction.len(),
            "merging tiled predictions"
        );

        Ok(filter_nms(&prediction, &self.nms_params)?.detections())
    }

    /// Decode a batch of network output, where the first axis is the batch axis.
    pub fn decode_batch(
        &self,
        image_size: ImageSize,
        regression: ArrayView3<'_, f32>,
        class_confidence: ArrayView3<'_, f32>,
    ) -> Result<Vec<Vec<Detection>>> {
        let batch_size = regression.len_of(Axis(0));
        if class_confidence.len_of(Axis(0)) != batch_size {
            return Err(Error::ShapeMismatch {
                name: "class_confidence",
                expected: batch_size,
                actual: class_confidence.len_of(Axis(0)),
            });
        }

        regression
            .outer_iter()
            .zip(class_confidence.outer_iter())
            .map(|(regression, confidence)| self.decode(image_size, regression, confidence))
            .collect()
    }
}
