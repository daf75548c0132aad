//! Anchor-based object detection.
//!
//! This crate contains everything around a single-shot detector that is not the network itself:
//! - box geometry in point form and extents form ([`bbox`], [`boxes`])
//! - anchor generation for a feature pyramid ([`anchor`])
//! - encoding ground truth into per-anchor training targets ([`encode`])
//! - decoding network output back into boxes ([`decode`]) and filtering them with
//!   non-maximum suppression ([`nms`])
//! - splitting large images into tiles whose detections are merged again ([`tile`])
//!
//! [`Encoder`] ties these together for images of arbitrary size, configured by a
//! [`DetectionConfig`].

pub mod anchor;
pub mod bbox;
pub mod box_coder;
pub mod boxes;
pub mod cache;
pub mod config;
pub mod decode;
pub mod encode;
pub mod encoder;
pub mod error;
pub mod loss;
mod meshgrid;
pub mod nms;
pub mod prediction;
pub mod target;
pub mod tile;
pub mod util;

pub use anchor::{Anchors, ImageSize, make_anchors};
pub use bbox::{Bbox, ConvertBbox, Cxcywh, Xyxy};
pub use boxes::{Boxes, ConvertBoxes, extents_form, point_form};
pub use config::DetectionConfig;
pub use decode::{decode, decode_prediction};
pub use encode::{Encoding, MatchStats, MatchThresholds, encode};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use nms::{NmsParams, Overlap, filter_nms, nms};
pub use prediction::{Detection, Prediction};
pub use target::Target;
pub use tile::{Tile, image_tiles, tile_grid};
