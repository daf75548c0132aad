//! See [`Error`].

use miette::Diagnostic;
use thiserror::Error;

/// Error types for this crate.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(
        "Invalid match thresholds (negative: {negative}, positive: {positive}), both must lie in \
            [0, 1] and negative must not exceed positive"
    )]
    InvalidMatchThresholds { negative: f32, positive: f32 },

    #[error("`{name}` must lie in [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f32 },

    #[error("`max_detections` must be positive")]
    InvalidMaxDetections,

    #[error("`candidate_multiplier` must be positive")]
    InvalidCandidateMultiplier,

    #[error("Invalid detection config: {0}")]
    InvalidConfig(String),

    #[error("Box arrays must have 4 columns, got {0}")]
    BoxColumns(usize),

    #[error("Expected {expected} rows in `{name}`, got {actual}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Got {boxes} boxes but {labels} labels")]
    LabelMismatch { boxes: usize, labels: usize },

    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    #[error("Class confidence has no class columns")]
    NoClasses,

    #[error("Got {box_sizes} anchor size lists but {layer_dims} feature map sizes")]
    LevelMismatch { box_sizes: usize, layer_dims: usize },

    #[error("Feature map of pyramid level {level} has zero width or height")]
    EmptyFeatureMap { level: usize },

    #[error("Image size must be non-zero, got {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Cannot split {size} pixels into {splits} tiles overlapping by {overlap} pixels")]
    InvalidTiling { size: u32, splits: u32, overlap: u32 },

    #[error("Box {index} has zero area")]
    #[diagnostic(help("remove degenerate boxes with `Target::filter_invalid` first"))]
    DegenerateBox { index: usize },

    #[error("Failed to build array")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Failed to load detection config")]
    Config(#[from] odal::Error),
}

/// Type alias for [`Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;
