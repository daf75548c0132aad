//! Splitting large images into overlapping tiles.
//!
//! Each tile is run through the network on its own. Detections from every tile are shifted back
//! by the tile offset and merged with a single NMS pass, see [`Encoder::decode_tiled`].
//!
//! [`Encoder::decode_tiled`]: crate::Encoder::decode_tiled

use crate::anchor::ImageSize;
use crate::error::{Error, Result};

/// A rectangular region of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Position of the top-left corner in the full image.
    pub offset: (u32, u32),
    pub size: ImageSize,
}

impl Tile {
    /// The tile offset as a translation for boxes.
    #[must_use]
    pub fn translation(&self) -> (f32, f32) {
        (self.offset.0 as f32, self.offset.1 as f32)
    }
}

/// Split `size` pixels into `n` ranges of equal length, where neighbouring ranges share
/// `overlap` pixels.
///
/// The ranges are half-open `(start, end)` pairs covering `0..size`, with bounds rounded to the
/// nearest pixel.
pub fn splits(size: u32, n: u32, overlap: u32) -> Result<Vec<(u32, u32)>> {
    if n == 0 || n > size || (n > 1 && overlap >= size) {
        return Err(Error::InvalidTiling {
            size,
            splits: n,
            overlap,
        });
    }

    let overlap = overlap as f32;
    let length = (size as f32 + (n - 1) as f32 * overlap) / n as f32;

    let mut end = length;
    let mut ranges = vec![(0, length.round() as u32)];
    for _ in 1..n {
        let start = end - overlap;
        end = start + length;
        ranges.push((start.round() as u32, end.round() as u32));
    }

    Ok(ranges)
}

/// Split an image into a grid of `nx x ny` tiles, column by column.
pub fn image_tiles(image: ImageSize, (nx, ny): (u32, u32), overlap: u32) -> Result<Vec<Tile>> {
    let xs = splits(image.width, nx, overlap)?;
    let ys = splits(image.height, ny, overlap)?;

    Ok(xs
        .iter()
        .flat_map(|&(x0, x1)| {
            ys.iter().map(move |&(y0, y1)| Tile {
                offset: (x0, y0),
                size: ImageSize::new(x1 - x0, y1 - y0),
            })
        })
        .collect())
}

/// Number of tiles along `(x, y)` giving at least `min_splits` tiles.
///
/// `aspect` is the width over the height of the image. Tiles are added along the longer axis
/// until that axis has about `max(aspect, 1 / aspect)^1.8` times as many tiles as the shorter
/// one, after which both axes grow together.
#[must_use]
pub fn split_sizes(min_splits: u32, aspect: f32) -> (u32, u32) {
    let max_aspect = aspect.max(1.0 / aspect);
    let (mut minor, mut major) = (1_u32, 1_u32);

    while minor * major < min_splits {
        if major as f32 / minor as f32 <= max_aspect.powf(1.8) {
            major += 1;
        } else {
            minor += 1;
            major = minor;
        }
    }

    if aspect >= 1.0 {
        (major, minor)
    } else {
        (minor, major)
    }
}

/// Tile grid for `image` such that every tile has at most about `max_pixels` pixels.
///
/// Without a pixel budget the image is a single tile.
#[must_use]
pub fn tile_grid(image: ImageSize, max_pixels: Option<u64>) -> (u32, u32) {
    let Some(max_pixels) = max_pixels else {
        return (1, 1);
    };

    let pixels = u64::from(image.width) * u64::from(image.height);
    let min_splits = pixels.div_ceil(max_pixels.max(1));
    let aspect = image.width as f32 / image.height.max(1) as f32;

    split_sizes(u32::try_from(min_splits).unwrap_or(u32::MAX), aspect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_split_is_whole_range() {
        assert_eq!(splits(100, 1, 0).unwrap(), vec![(0, 100)]);
        assert_eq!(splits(100, 1, 40).unwrap(), vec![(0, 100)]);
    }

    #[test]
    fn splits_share_overlap() {
        assert_eq!(splits(100, 2, 10).unwrap(), vec![(0, 55), (45, 100)]);
        assert_eq!(splits(10, 3, 0).unwrap(), vec![(0, 3), (3, 7), (7, 10)]);
    }

    #[test]
    fn invalid_splits() {
        for (size, n, overlap) in [(100, 0, 0), (3, 4, 0), (10, 2, 10)] {
            assert!(matches!(splits(size, n, overlap), Err(Error::InvalidTiling { .. })));
        }
    }

    #[test]
    fn tiles_cover_image() {
        let tiles = image_tiles(ImageSize::new(100, 60), (2, 2), 0).unwrap();

        assert_eq!(
            tiles,
            vec![
                Tile {
                    offset: (0, 0),
                    size: ImageSize::new(50, 30),
                },
                Tile {
                    offset: (0, 30),
                    size: ImageSize::new(50, 30),
                },
                Tile {
                    offset: (50, 0),
                    size: ImageSize::new(50, 30),
                },
                Tile {
                    offset: (50, 30),
                    size: ImageSize::new(50, 30),
                },
            ]
        );
        assert_eq!(tiles[3].translation(), (50.0, 30.0));
    }

    #[test]
    fn split_sizes_follow_aspect() {
        assert_eq!(split_sizes(1, 1.0), (1, 1));
        assert_eq!(split_sizes(2, 2.0), (2, 1));
        assert_eq!(split_sizes(2, 0.5), (1, 2));
        assert_eq!(split_sizes(4, 1.0), (2, 2));
    }

    #[test]
    fn tile_grid_respects_pixel_budget() {
        let image = ImageSize::new(200, 100);

        assert_eq!(tile_grid(image, None), (1, 1));
        assert_eq!(tile_grid(image, Some(100_000)), (1, 1));
        assert_eq!(tile_grid(image, Some(10_000)), (2, 1));

        let (nx, ny) = tile_grid(image, Some(2_000));
        assert!(nx * ny >= 10);
        assert!(nx > ny);
    }
}
