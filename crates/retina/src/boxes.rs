//! Batched bounding boxes.
//!
//! [`Boxes`] stores `N` boxes as an `N x 4` array, and uses the same format markers as [`Bbox`]
//! so point form and extents form can not be mixed up. All operations work on whole columns.

use std::marker::PhantomData;

use ndarray::{Array1, Array2, ArrayView2, Axis, Zip, concatenate, s};

use crate::bbox::{Bbox, Cxcywh, Xyxy};
use crate::error::{Error, Result};

/// A set of `N` bounding boxes in format `T`, stored as an `N x 4` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Boxes<T> {
    data: Array2<f32>,
    _marker: PhantomData<T>,
}

impl<T> Boxes<T> {
    /// Wrap an `N x 4` array.
    pub fn from_array(data: Array2<f32>) -> Result<Self> {
        if data.ncols() != 4 {
            return Err(Error::BoxColumns(data.ncols()));
        }

        Ok(Self::new_unchecked(data))
    }

    /// Build a box set from rows of four coordinates.
    #[must_use]
    pub fn from_rows(rows: &[[f32; 4]]) -> Self {
        Self::new_unchecked(Array2::from_shape_fn((rows.len(), 4), |(i, j)| rows[i][j]))
    }

    /// An empty box set.
    #[must_use]
    pub fn empty() -> Self {
        Self::new_unchecked(Array2::zeros((0, 4)))
    }

    fn new_unchecked(data: Array2<f32>) -> Self {
        Boxes {
            data,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// View of the underlying `N x 4` array.
    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    #[must_use]
    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// The box at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Bbox<T>> {
        (index < self.len()).then(|| {
            let row = self.data.row(index);
            Bbox::new((row[0], row[1], row[2], row[3]))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Bbox<T>> + '_ {
        self.data
            .rows()
            .into_iter()
            .map(|row| Bbox::new((row[0], row[1], row[2], row[3])))
    }

    /// Gather the boxes at `indices`, in that order.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self::new_unchecked(self.data.select(Axis(0), indices))
    }

    /// Concatenate box sets in order.
    pub fn concatenate(parts: &[Boxes<T>]) -> Result<Self> {
        if parts.is_empty() {
            return Ok(Self::empty());
        }

        let views = parts.iter().map(Boxes::view).collect::<Vec<_>>();
        Ok(Self::new_unchecked(ndarray::concatenate(Axis(0), &views)?))
    }
}

/// Trait for converting a set of boxes to a different representation.
pub trait ConvertBoxes<T> {
    fn convert(&self) -> Boxes<T>;
}

impl ConvertBoxes<Cxcywh> for Boxes<Xyxy> {
    fn convert(&self) -> Boxes<Cxcywh> {
        let lower = self.data.slice(s![.., 0..2]);
        let upper = self.data.slice(s![.., 2..4]);

        let center = (&lower + &upper) * 0.5;
        let size = &upper - &lower;

        Boxes::new_unchecked(concatenate![Axis(1), center, size])
    }
}

impl ConvertBoxes<Xyxy> for Boxes<Cxcywh> {
    fn convert(&self) -> Boxes<Xyxy> {
        let center = self.data.slice(s![.., 0..2]);
        let extents = &self.data.slice(s![.., 2..4]) * 0.5;

        let lower = &center - &extents;
        let upper = &center + &extents;

        Boxes::new_unchecked(concatenate![Axis(1), lower, upper])
    }
}

/// Convert boxes in extents form to point form.
#[must_use]
pub fn point_form(boxes: &Boxes<Cxcywh>) -> Boxes<Xyxy> {
    boxes.convert()
}

/// Convert boxes in point form to extents form.
#[must_use]
pub fn extents_form(boxes: &Boxes<Xyxy>) -> Boxes<Cxcywh> {
    boxes.convert()
}

impl Boxes<Xyxy> {
    /// Area of every box, `0.0` for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> Array1<f32> {
        let widths = &self.data.column(2) - &self.data.column(0);
        let heights = &self.data.column(3) - &self.data.column(1);
        widths * heights
    }

    /// Translate all corners by `offset`, then scale them by `scale`.
    ///
    /// Corners are re-ordered afterwards, so a negative scale mirrors the boxes while keeping
    /// `x_min <= x_max` and `y_min <= y_max`.
    #[must_use]
    pub fn transform(&self, offset: (f32, f32), scale: (f32, f32)) -> Self {
        let mut data = self.data.clone();

        for mut row in data.rows_mut() {
            let x1 = (row[0] + offset.0) * scale.0;
            let y1 = (row[1] + offset.1) * scale.1;
            let x2 = (row[2] + offset.0) * scale.0;
            let y2 = (row[3] + offset.1) * scale.1;

            row[0] = x1.min(x2);
            row[1] = y1.min(y2);
            row[2] = x1.max(x2);
            row[3] = y1.max(y2);
        }

        Self::new_unchecked(data)
    }

    /// Translate all boxes by `offset`.
    #[must_use]
    pub fn translate(&self, offset: (f32, f32)) -> Self {
        self.transform(offset, (1.0, 1.0))
    }

    /// Swap the x and y axes.
    #[must_use]
    pub fn transpose(&self) -> Self {
        Self::new_unchecked(self.data.select(Axis(1), &[1, 0, 3, 2]))
    }

    /// Mirror the boxes horizontally within an image of the given width.
    #[must_use]
    pub fn flip_horizontal(&self, width: f32) -> Self {
        self.transform((-width, 0.0), (-1.0, 1.0))
    }

    /// Mirror the boxes vertically within an image of the given height.
    #[must_use]
    pub fn flip_vertical(&self, height: f32) -> Self {
        self.transform((0.0, -height), (1.0, -1.0))
    }

    /// Clamp the boxes in place, so their corners lie within `lower` and `upper`.
    ///
    /// Boxes that become degenerate are kept.
    pub fn clamp(&mut self, lower: (f32, f32), upper: (f32, f32)) -> &mut Self {
        self.data.column_mut(0).mapv_inplace(|x| x.max(lower.0));
        self.data.column_mut(1).mapv_inplace(|y| y.max(lower.1));
        self.data.column_mut(2).mapv_inplace(|x| x.min(upper.0));
        self.data.column_mut(3).mapv_inplace(|y| y.min(upper.1));
        self
    }

    /// Pairwise intersection area of all boxes in `self` against all boxes in `other`.
    ///
    /// Returns an `N x M` matrix, boxes that don't overlap have an intersection of `0.0`.
    #[must_use]
    pub fn intersect(&self, other: &Boxes<Xyxy>) -> Array2<f32> {
        let overlap = |lower: usize, upper: usize| {
            let lower_a = self.data.column(lower).insert_axis(Axis(1));
            let upper_a = self.data.column(upper).insert_axis(Axis(1));
            let lower_b = other.data.column(lower).insert_axis(Axis(0));
            let upper_b = other.data.column(upper).insert_axis(Axis(0));

            let mut extent = Array2::<f32>::zeros((self.len(), other.len()));
            Zip::from(&mut extent)
                .and_broadcast(&lower_a)
                .and_broadcast(&upper_a)
                .and_broadcast(&lower_b)
                .and_broadcast(&upper_b)
                .for_each(|extent, &l1, &u1, &l2, &u2| {
                    *extent = (u1.min(u2) - l1.max(l2)).max(0.0);
                });

            extent
        };

        overlap(0, 2) * overlap(1, 3)
    }

    /// Pairwise intersection over union of all boxes in `self` against all boxes in `other`.
    ///
    /// Returns an `N x M` matrix with values in `[0, 1]`. Pairs with an empty union, which can
    /// only happen for degenerate boxes, have an IoU of `0.0`.
    #[must_use]
    pub fn iou(&self, other: &Boxes<Xyxy>) -> Array2<f32> {
        let mut iou = self.intersect(other);
        let area_a = self.area().insert_axis(Axis(1));
        let area_b = other.area().insert_axis(Axis(0));

        Zip::from(&mut iou)
            .and_broadcast(&area_a)
            .and_broadcast(&area_b)
            .for_each(|value, &a, &b| {
                let union = a + b - *value;
                *value = if union > 0.0 { *value / union } else { 0.0 };
            });

        iou
    }
}
