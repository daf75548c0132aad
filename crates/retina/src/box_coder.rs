use ndarray::{Array2, ArrayView2, Axis, Zip, concatenate, s};

use crate::anchor::Anchors;
use crate::bbox::{Cxcywh, Xyxy};
use crate::boxes::{Boxes, ConvertBoxes};
use crate::error::{Error, Result};

/// Encodes boxes relative to anchors, and decodes them back.
///
/// The encoding of a box `b` against an anchor `a` is
///
/// ```text
/// tx = wx * (b.cx - a.cx) / a.w
/// ty = wy * (b.cy - a.cy) / a.h
/// tw = ww * ln(b.w / a.w)
/// th = wh * ln(b.h / a.h)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCoder {
    pub weights: (f32, f32, f32, f32),
    pub bbox_xform_clip: f32,
}

impl Default for BoxCoder {
    fn default() -> Self {
        Self::new((1.0, 1.0, 1.0, 1.0))
    }
}

impl BoxCoder {
    /// Create a new [`BoxCoder`] with the given weights.
    ///
    /// This will default to a `bbox_xform_clip` of `ln(1000/16)`.
    #[must_use]
    pub fn new(weights: (f32, f32, f32, f32)) -> Self {
        BoxCoder {
            weights,
            bbox_xform_clip: default_size_clip(),
        }
    }

    /// Create a new [`BoxCoder`] with the given weights and clipping value.
    #[must_use]
    pub fn new_with_clip(weights: (f32, f32, f32, f32), bbox_xform_clip: f32) -> Self {
        BoxCoder {
            weights,
            bbox_xform_clip,
        }
    }

    /// Encode every box against the anchor in the same row.
    ///
    /// Returns an `M x 4` array of regression targets.
    pub fn encode(&self, boxes: &Boxes<Xyxy>, anchors: &Anchors) -> Result<Array2<f32>> {
        check_rows("boxes", anchors.len(), boxes.len())?;

        let boxes: Boxes<Cxcywh> = boxes.convert();
        let boxes = boxes.view();
        let anchors = anchors.view();

        let anchor_size = anchors.slice(s![.., 2..4]);
        let offset = (&boxes.slice(s![.., 0..2]) - &anchors.slice(s![.., 0..2])) / &anchor_size;
        let size = (&boxes.slice(s![.., 2..4]) / &anchor_size).mapv(f32::ln);

        let (wx, wy, ww, wh) = self.weights;
        let mut codes = concatenate![Axis(1), offset, size];
        for (mut column, weight) in codes.columns_mut().into_iter().zip([wx, wy, ww, wh]) {
            column *= weight;
        }

        Ok(codes)
    }

    /// Decode `M x 4` regression codes against the anchors into boxes in point form.
    ///
    /// The encoded sizes are clamped to at most `bbox_xform_clip` before exponentiation, so
    /// extreme predictions can't overflow.
    pub fn decode(&self, rel_codes: ArrayView2<'_, f32>, anchors: &Anchors) -> Result<Boxes<Xyxy>> {
        if rel_codes.ncols() != 4 {
            return Err(Error::BoxColumns(rel_codes.ncols()));
        }
        check_rows("regression", anchors.len(), rel_codes.nrows())?;

        let (wx, wy, ww, wh) = self.weights;
        let clip = self.bbox_xform_clip;

        let mut decoded = Array2::<f32>::zeros((anchors.len(), 4));
        Zip::from(decoded.rows_mut())
            .and(rel_codes.rows())
            .and(anchors.view().rows())
            .for_each(|mut out, code, anchor| {
                let (ctr_x, ctr_y, width, height) = (anchor[0], anchor[1], anchor[2], anchor[3]);

                let dx = code[0] / wx;
                let dy = code[1] / wy;
                // clamp to avoid overflow in exp
                let dw = (code[2] / ww).min(clip);
                let dh = (code[3] / wh).min(clip);

                out[0] = dx * width + ctr_x;
                out[1] = dy * height + ctr_y;
                out[2] = dw.exp() * width;
                out[3] = dh.exp() * height;
            });

        let decoded: Boxes<Cxcywh> = Boxes::from_array(decoded)?;
        Ok(decoded.convert())
    }
}

/// The default clip value for encoded sizes, `ln(1000 / 16)`.
#[must_use]
pub fn default_size_clip() -> f32 {
    (1000_f32 / 16_f32).ln()
}

fn check_rows(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            name,
            expected,
            actual,
        })
    }
}
