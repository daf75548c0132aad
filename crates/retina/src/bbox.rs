/// A type-safe bounding box.
///
/// It is a wrapper around a tuple of four `f32` values representing the coordinates of the
/// bounding box. The type parameter `T` specifies the format of the bounding box.
///
/// # Conversion
///
/// The bounding box can be converted between point form and extents form using the
/// [`ConvertBbox`] trait.
///
/// ```
/// use retina::bbox::*;
///
/// let xyxy = Bbox::xyxy(4.0, 4.0, 10.0, 10.0);
/// let cxcywh: Bbox<Cxcywh> = xyxy.convert();
///
/// assert_eq!(cxcywh.inner, (7.0, 7.0, 6.0, 6.0));
/// ```
///
/// # Formats
///
/// The following formats are supported:
///
/// - [`Xyxy`] (xmin, ymin, xmax, ymax), also called point form
/// - [`Cxcywh`] (center_x, center_y, width, height), also called extents form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox<T> {
    pub inner: (f32, f32, f32, f32),
    _marker: std::marker::PhantomData<T>,
}

impl<T> Bbox<T> {
    /// Create a new bounding box from the given coordinates.
    pub(crate) fn new(bbox: (f32, f32, f32, f32)) -> Self {
        Bbox {
            inner: bbox,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> Bbox<T>
where
    Bbox<T>: ConvertBbox<Xyxy>,
{
    /// Compute the area of the bounding box.
    pub fn area(&self) -> f32 {
        let (x1, y1, x2, y2) = ConvertBbox::<Xyxy>::convert(self).inner;
        (x2 - x1) * (y2 - y1)
    }

    /// Compute the intersection area between two bounding boxes.
    ///
    /// If the bounding boxes do not overlap, the intersection area is `0.0`.
    pub fn intersection<S>(&self, other: &S) -> f32
    where
        S: ConvertBbox<Xyxy>,
    {
        let (x1, y1, x2, y2) = ConvertBbox::<Xyxy>::convert(self).inner;
        let (x3, y3, x4, y4) = ConvertBbox::<Xyxy>::convert(other).inner;

        let x1 = x1.max(x3);
        let y1 = y1.max(y3);
        let x2 = x2.min(x4);
        let y2 = y2.min(y4);

        if x2 < x1 || y2 < y1 {
            0.0
        } else {
            (x2 - x1) * (y2 - y1)
        }
    }

    /// Compute the union area between two bounding boxes.
    ///
    /// The union area is computed as the sum of the areas of the two bounding boxes minus the
    /// intersection area.
    pub fn union<S>(&self, other: &S) -> f32
    where
        S: ConvertBbox<Xyxy>,
    {
        let area1 = ConvertBbox::<Xyxy>::convert(self).area();
        let area2 = ConvertBbox::<Xyxy>::convert(other).area();
        area1 + area2 - self.intersection(other)
    }

    /// Compute the intersection over union (IoU) between two bounding boxes.
    ///
    /// Two degenerate boxes have an empty union, their IoU is `0.0`.
    pub fn iou<S>(&self, other: &S) -> f32
    where
        S: ConvertBbox<Xyxy>,
    {
        let union = self.union(other);
        if union > 0.0 {
            self.intersection(other) / union
        } else {
            0.0
        }
    }

    /// Compute the intersection divided by the area of the smaller of both boxes.
    pub fn min_area_overlap<S>(&self, other: &S) -> f32
    where
        S: ConvertBbox<Xyxy>,
    {
        let smallest = self.area().min(ConvertBbox::<Xyxy>::convert(other).area());
        if smallest > 0.0 {
            self.intersection(other) / smallest
        } else {
            0.0
        }
    }
}

impl<T> From<Bbox<T>> for (f32, f32, f32, f32) {
    fn from(bbox: Bbox<T>) -> Self {
        bbox.inner
    }
}

/// Trait for converting a bounding box to a different representation.
pub trait ConvertBbox<T> {
    fn convert(&self) -> Bbox<T>;
}

/// Marker type for bounding boxes with coordinates of the top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyxy;

impl Bbox<Xyxy> {
    /// Create a bounding box from the coordinates of the top-left and bottom-right corners.
    #[must_use]
    pub fn xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Bbox<Xyxy> {
        Bbox::new((x1, y1, x2, y2))
    }

    /// Clamp the corners of the bounding box to the given bounds.
    #[must_use]
    pub fn clamp(&self, lower: (f32, f32), upper: (f32, f32)) -> Bbox<Xyxy> {
        let (x1, y1, x2, y2) = self.inner;
        Bbox::new((
            x1.max(lower.0),
            y1.max(lower.1),
            x2.min(upper.0),
            y2.min(upper.1),
        ))
    }

    /// Translate the bounding box by the given offset.
    #[must_use]
    pub fn translated(&self, offset: (f32, f32)) -> Bbox<Xyxy> {
        let (x1, y1, x2, y2) = self.inner;
        Bbox::new((x1 + offset.0, y1 + offset.1, x2 + offset.0, y2 + offset.1))
    }
}

impl ConvertBbox<Xyxy> for Bbox<Xyxy> {
    fn convert(&self) -> Bbox<Xyxy> {
        *self
    }
}

impl ConvertBbox<Cxcywh> for Bbox<Xyxy> {
    fn convert(&self) -> Bbox<Cxcywh> {
        let (x1, y1, x2, y2) = self.inner;
        Bbox::new(((x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1))
    }
}

/// Marker type for bounding boxes with coordinates of the center and the width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cxcywh;

impl Bbox<Cxcywh> {
    /// Create a bounding box from the coordinates of the center and the width and height.
    #[must_use]
    pub fn cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Bbox<Cxcywh> {
        Bbox::new((cx, cy, w, h))
    }
}

impl ConvertBbox<Xyxy> for Bbox<Cxcywh> {
    fn convert(&self) -> Bbox<Xyxy> {
        let (cx, cy, w, h) = self.inner;
        let (half_w, half_h) = (w * 0.5, h * 0.5);
        Bbox::new((cx - half_w, cy - half_h, cx + half_w, cy + half_h))
    }
}

impl ConvertBbox<Cxcywh> for Bbox<Cxcywh> {
    fn convert(&self) -> Bbox<Cxcywh> {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_xyxy() {
        let bbox1 = Bbox::xyxy(0.0, 0.0, 10.0, 10.0);
        let bbox2 = Bbox::xyxy(5.0, 5.0, 15.0, 15.0);

        assert_eq!(bbox1.intersection(&bbox2), 25.0);
        assert_eq!(bbox1.union(&bbox2), 175.0);
        assert_eq!(bbox1.iou(&bbox2), 25.0 / 175.0);
    }

    #[test]
    fn iou_cxcywh() {
        let bbox1 = Bbox::cxcywh(5.0, 5.0, 10.0, 10.0);
        let bbox2 = Bbox::cxcywh(10.0, 10.0, 10.0, 10.0);

        assert_eq!(bbox1.intersection(&bbox2), 25.0);
        assert_eq!(bbox1.union(&bbox2), 175.0);
        assert_eq!(bbox1.iou(&bbox2), 25.0 / 175.0);
    }

    #[test]
    fn degenerate_iou_is_zero() {
        let point = Bbox::xyxy(3.0, 3.0, 3.0, 3.0);

        assert_eq!(point.iou(&point), 0.0);
        assert_eq!(point.min_area_overlap(&point), 0.0);
    }

    #[test]
    fn min_area_overlap_of_nested_boxes() {
        let outer = Bbox::xyxy(0.0, 0.0, 10.0, 10.0);
        let inner = Bbox::xyxy(2.0, 2.0, 4.0, 4.0);

        assert_eq!(outer.min_area_overlap(&inner), 1.0);
        assert_eq!(outer.iou(&inner), 0.04);
    }

    #[test]
    fn convert_round_trip() {
        let xyxy = Bbox::xyxy(1.0, 2.0, 5.0, 10.0);
        let cxcywh: Bbox<Cxcywh> = xyxy.convert();

        assert_eq!(cxcywh.inner, (3.0, 6.0, 4.0, 8.0));
        assert_eq!(ConvertBbox::<Xyxy>::convert(&cxcywh), xyxy);
    }
}
