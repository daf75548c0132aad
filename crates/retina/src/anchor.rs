use itertools::Itertools;
use ndarray::{Array1, Array2};

use crate::bbox::{Cxcywh, Xyxy};
use crate::boxes::{Boxes, ConvertBoxes};
use crate::error::{Error, Result};
use crate::meshgrid::meshgrid;

/// A set of anchor boxes in extents form, tiling an image at every pyramid level.
pub type Anchors = Boxes<Cxcywh>;

/// Aspect ratios used by the default anchor pyramid.
pub const DEFAULT_ASPECT_RATIOS: [f32; 3] = [0.5, 1.0, 2.0];

/// Scales used by the default anchor pyramid, `1`, `2^(1/3)` and `2^(2/3)`.
pub const DEFAULT_SCALES: [f32; 3] = [1.0, 1.259_921, 1.587_401];

/// Size of an input image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn dims(self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

/// Generate anchor `(width, height)` pairs for every combination of scale and aspect ratio.
///
/// The scales form the outer loop, so all aspect ratios of the first scale come first.
/// Each pair is `(size * sqrt(aspect), size / sqrt(aspect))` with `size = base_size * scale`.
#[must_use]
pub fn anchor_sizes(base_size: f32, aspect_ratios: &[f32], scales: &[f32]) -> Vec<(f32, f32)> {
    scales
        .iter()
        .cartesian_product(aspect_ratios)
        .map(|(&scale, &aspect)| {
            let size = base_size * scale;
            let sqrt_ar = aspect.sqrt();
            (size * sqrt_ar, size / sqrt_ar)
        })
        .collect()
}

/// Anchor sizes for the pyramid levels `first..=last`.
///
/// Level `i` has a base size of `2^(i + 2)` pixels.
#[must_use]
pub fn pyramid_box_sizes(
    first: u32,
    last: u32,
    aspect_ratios: &[f32],
    scales: &[f32],
) -> Vec<Vec<(f32, f32)>> {
    (first..=last)
        .map(|level| anchor_sizes(2f32.powi(level as i32 + 2), aspect_ratios, scales))
        .collect()
}

/// Feature map sizes of `num_levels` pyramid levels starting at level `first`.
///
/// Level `i` downsamples the image by `2^i`, rounding up, with a minimum size of one cell.
#[must_use]
pub fn layer_dims(image_size: ImageSize, first: u32, num_levels: usize) -> Vec<(usize, usize)> {
    (0..num_levels)
        .map(|offset| {
            let stride = 2f64.powi(first as i32 + offset as i32);
            let cells = |pixels: u32| ((f64::from(pixels) / stride).ceil() as usize).max(1);
            (cells(image_size.width), cells(image_size.height))
        })
        .collect()
}

/// Generate the anchor boxes for all pyramid levels.
///
/// For every level an anchor of each size in `box_sizes[level]` is placed at the center of every
/// cell of a `layer_dims[level]` (width, height) grid spread over the image. Cells are ordered
/// row-major, anchors within a cell in the order of their sizes, and the levels are concatenated
/// in order.
///
/// With `crop_boxes` the anchors are clamped to the image bounds.
pub fn make_anchors(
    box_sizes: &[Vec<(f32, f32)>],
    layer_dims: &[(usize, usize)],
    image_size: ImageSize,
    crop_boxes: bool,
) -> Result<Anchors> {
    if box_sizes.len() != layer_dims.len() {
        return Err(Error::LevelMismatch {
            box_sizes: box_sizes.len(),
            layer_dims: layer_dims.len(),
        });
    }

    if image_size.width == 0 || image_size.height == 0 {
        return Err(Error::InvalidImageSize {
            width: image_size.width,
            height: image_size.height,
        });
    }

    let levels = box_sizes
        .iter()
        .zip(layer_dims)
        .enumerate()
        .map(|(level, (sizes, &dims))| {
            if dims.0 == 0 || dims.1 == 0 {
                return Err(Error::EmptyFeatureMap { level });
            }

            let boxes = grid_boxes(sizes, dims, image_size)?;
            tracing::trace!(level, ?dims, num_anchors = boxes.len(), "generated level anchors");
            Ok(boxes)
        })
        .collect::<Result<Vec<_>>>()?;

    let anchors = Anchors::concatenate(&levels)?;
    tracing::debug!(
        num_anchors = anchors.len(),
        ?image_size,
        crop_boxes,
        "generated anchors"
    );

    if !crop_boxes {
        return Ok(anchors);
    }

    let mut corners: Boxes<Xyxy> = anchors.convert();
    corners.clamp((0.0, 0.0), image_size.dims());
    Ok(corners.convert())
}

/// Generate the anchors of a single pyramid level, in cx, cy, w, h format.
fn grid_boxes(
    box_sizes: &[(f32, f32)],
    (width, height): (usize, usize),
    image_size: ImageSize,
) -> Result<Anchors> {
    let (image_width, image_height) = image_size.dims();

    let shifts_x = (Array1::range(0.0, width as f32, 1.0) + 0.5) * (image_width / width as f32);
    let shifts_y = (Array1::range(0.0, height as f32, 1.0) + 0.5) * (image_height / height as f32);

    // one (x, y) row per cell, row-major
    let centers = meshgrid(&shifts_y, &shifts_x)?;

    let num_sizes = box_sizes.len();
    let boxes = Array2::from_shape_fn((centers.nrows() * num_sizes, 4), |(i, j)| {
        let (cell, size) = (i / num_sizes, i % num_sizes);
        match j {
            0 => centers[[cell, 0]],
            1 => centers[[cell, 1]],
            2 => box_sizes[size].0,
            _ => box_sizes[size].1,
        }
    });

    Anchors::from_array(boxes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn single_level_grid() {
        let anchors = make_anchors(&[vec![(2.0, 2.0)]], &[(2, 2)], ImageSize::new(4, 4), false)
            .unwrap();

        assert_eq!(
            anchors.into_inner(),
            array![
                [1.0, 1.0, 2.0, 2.0],
                [3.0, 1.0, 2.0, 2.0],
                [1.0, 3.0, 2.0, 2.0],
                [3.0, 3.0, 2.0, 2.0],
            ]
        );
    }

    #[test]
    fn sizes_are_ordered_within_cells_and_levels_concatenated() {
        let box_sizes = vec![vec![(1.0, 2.0), (3.0, 4.0)], vec![(8.0, 8.0)]];
        let anchors =
            make_anchors(&box_sizes, &[(3, 2), (1, 1)], ImageSize::new(6, 4), false).unwrap();

        assert_eq!(anchors.len(), 3 * 2 * 2 + 1);

        let view = anchors.view();
        assert_eq!(view.row(0), array![1.0, 1.0, 1.0, 2.0]);
        assert_eq!(view.row(1), array![1.0, 1.0, 3.0, 4.0]);
        assert_eq!(view.row(2), array![3.0, 1.0, 1.0, 2.0]);
        // first cell of the second row
        assert_eq!(view.row(6), array![1.0, 3.0, 1.0, 2.0]);
        assert_eq!(view.row(12), array![3.0, 2.0, 8.0, 8.0]);
    }

    #[test]
    fn crop_boxes_clamps_to_image() {
        let anchors =
            make_anchors(&[vec![(4.0, 4.0)]], &[(2, 1)], ImageSize::new(4, 2), true).unwrap();

        // (1, 1, 4, 4) becomes the corners (0, 0) - (3, 2)
        assert_eq!(
            anchors.into_inner(),
            array![[1.5, 1.0, 3.0, 2.0], [2.5, 1.0, 3.0, 2.0]]
        );
    }

    #[test]
    fn anchors_extend_past_image_without_cropping() {
        let anchors =
            make_anchors(&[vec![(4.0, 4.0)]], &[(2, 1)], ImageSize::new(4, 2), false).unwrap();

        let corners: Boxes<Xyxy> = anchors.convert();
        assert_eq!(corners.view().row(0), array![-1.0, -1.0, 3.0, 3.0]);
    }

    #[test]
    fn generation_is_deterministic() {
        let box_sizes = pyramid_box_sizes(3, 5, &DEFAULT_ASPECT_RATIOS, &DEFAULT_SCALES);
        let dims = layer_dims(ImageSize::new(100, 60), 3, box_sizes.len());

        let a = make_anchors(&box_sizes, &dims, ImageSize::new(100, 60), true).unwrap();
        let b = make_anchors(&box_sizes, &dims, ImageSize::new(100, 60), true).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_levels() {
        let result = make_anchors(&[vec![(1.0, 1.0)]], &[], ImageSize::new(4, 4), false);
        assert!(matches!(
            result,
            Err(Error::LevelMismatch {
                box_sizes: 1,
                layer_dims: 0
            })
        ));

        let result = make_anchors(&[vec![(1.0, 1.0)]], &[(0, 3)], ImageSize::new(4, 4), false);
        assert!(matches!(result, Err(Error::EmptyFeatureMap { level: 0 })));
    }

    #[test]
    fn no_levels_gives_no_anchors() {
        let anchors = make_anchors(&[], &[], ImageSize::new(4, 4), true).unwrap();
        assert!(anchors.is_empty());
    }

    #[test]
    fn anchor_sizes_scale_outer_aspect_inner() {
        let sizes = anchor_sizes(4.0, &[0.25, 1.0], &[1.0, 2.0]);

        let expected = [(2.0, 8.0), (4.0, 4.0), (4.0, 16.0), (8.0, 8.0)];
        assert_eq!(sizes.len(), expected.len());
        for ((w, h), (ew, eh)) in sizes.into_iter().zip(expected) {
            assert_abs_diff_eq!(w, ew, epsilon = 1e-5);
            assert_abs_diff_eq!(h, eh, epsilon = 1e-5);
        }
    }

    #[test]
    fn pyramid_levels_double_in_size() {
        let sizes = pyramid_box_sizes(3, 4, &[1.0], &[1.0]);
        assert_eq!(sizes, vec![vec![(32.0, 32.0)], vec![(64.0, 64.0)]]);
    }

    #[test]
    fn layer_dims_round_up() {
        let dims = layer_dims(ImageSize::new(100, 60), 3, 4);
        assert_eq!(dims, vec![(13, 8), (7, 4), (4, 2), (2, 1)]);
    }
}
