//! Forward value of the focal training loss.
//!
//! The classification part is a binary focal loss over one-hot class targets, the location part a
//! smooth L1 loss on the regression of every anchor that is not background.

use ndarray::{ArrayView2, ArrayView3, Axis};

use crate::encode::{BACKGROUND, Encoding, IGNORED};
use crate::error::{Error, Result};

/// Parameters of [`focal_loss`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalParams {
    /// Focusing exponent, larger values down-weight easy examples more.
    pub gamma: f32,
    /// The classification loss is divided by this value.
    pub balance: f32,
    /// Confidences are clamped to `[eps, 1 - eps]` before taking the logarithm.
    pub eps: f32,
}

impl Default for FocalParams {
    fn default() -> Self {
        FocalParams {
            gamma: 2.0,
            balance: 4.0,
            eps: 1e-6,
        }
    }
}

/// Loss of a single image or a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Loss {
    pub classification: f32,
    pub location: f32,
    pub total: f32,
}

impl Loss {
    fn new(classification: f32, location: f32) -> Self {
        Loss {
            classification,
            location,
            total: classification + location,
        }
    }
}

impl std::ops::Add for Loss {
    type Output = Loss;

    fn add(self, other: Loss) -> Loss {
        Loss::new(
            self.classification + other.classification,
            self.location + other.location,
        )
    }
}

impl std::iter::Sum for Loss {
    fn sum<I: Iterator<Item = Loss>>(iter: I) -> Loss {
        iter.fold(Loss::default(), std::ops::Add::add)
    }
}

/// Compute the focal loss of the network output of one image against its encoding.
///
/// `class_weights` holds the alpha weight of every class. Background anchors use an alpha of
/// `0`. Ignored anchors don't contribute to the classification loss, background anchors don't
/// contribute to the location loss.
pub fn focal_loss(
    encoding: &Encoding,
    regression: ArrayView2<'_, f32>,
    class_confidence: ArrayView2<'_, f32>,
    class_weights: &[f32],
    params: &FocalParams,
) -> Result<Loss> {
    let num_classes = class_confidence.ncols();
    if num_classes == 0 {
        return Err(Error::NoClasses);
    }

    check_len("regression", encoding.len(), regression.nrows())?;
    check_len("class_confidence", encoding.len(), class_confidence.nrows())?;
    check_len("class_weights", num_classes, class_weights.len())?;
    if regression.ncols() != 4 {
        return Err(Error::BoxColumns(regression.ncols()));
    }

    let mut classification = 0.0;
    let mut location = 0.0;

    for (i, &class) in encoding.classification.iter().enumerate() {
        if class == BACKGROUND {
            classification += class_confidence
                .row(i)
                .iter()
                .map(|&p| focal_term(p, false, 0.0, params))
                .sum::<f32>();
            continue;
        }

        // ignored and positive anchors both contribute to the location loss
        location += regression
            .row(i)
            .iter()
            .zip(encoding.regression.row(i))
            .map(|(&predicted, &target)| smooth_l1(predicted - target))
            .sum::<f32>();

        if class == IGNORED {
            continue;
        }

        let target_class = class as usize;
        if target_class > num_classes {
            return Err(Error::LabelOutOfRange {
                label: target_class - 1,
                num_classes,
            });
        }

        let alpha = class_weights[target_class - 1];
        classification += class_confidence
            .row(i)
            .iter()
            .enumerate()
            .map(|(c, &p)| focal_term(p, c + 1 == target_class, alpha, params))
            .sum::<f32>();
    }

    Ok(Loss::new(classification / params.balance, location))
}

/// Sum of the [`focal_loss`] of every image in a batch.
pub fn batch_focal_loss(
    encodings: &[Encoding],
    regression: ArrayView3<'_, f32>,
    class_confidence: ArrayView3<'_, f32>,
    class_weights: &[f32],
    params: &FocalParams,
) -> Result<Loss> {
    check_len("regression", encodings.len(), regression.len_of(Axis(0)))?;
    check_len(
        "class_confidence",
        encodings.len(),
        class_confidence.len_of(Axis(0)),
    )?;

    encodings
        .iter()
        .zip(regression.outer_iter())
        .zip(class_confidence.outer_iter())
        .map(|((encoding, regression), confidence)| {
            focal_loss(encoding, regression, confidence, class_weights, params)
        })
        .sum()
}

fn focal_term(p: f32, is_target: bool, alpha: f32, params: &FocalParams) -> f32 {
    let (p_t, alpha_t) = if is_target {
        (p, alpha)
    } else {
        (1.0 - p, 1.0 - alpha)
    };

    let p_t = p_t.clamp(params.eps, 1.0 - params.eps);
    -alpha_t * (1.0 - p_t).powf(params.gamma) * p_t.ln()
}

fn smooth_l1(x: f32) -> f32 {
    let x = x.abs();
    if x < 1.0 { 0.5 * x * x } else { x - 0.5 }
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, array, stack};

    fn encoding(classification: Array1<i64>) -> Encoding {
        Encoding {
            regression: Array2::zeros((classification.len(), 4)),
            classification,
        }
    }

    #[test]
    fn hand_computed_loss() {
        let encoding = encoding(array![1, BACKGROUND]);
        let regression = array![[0.5, 2.0, 0.0, 0.0], [5.0, 5.0, 5.0, 5.0]];
        let confidence = array![[0.5], [0.5]];

        let loss = focal_loss(
            &encoding,
            regression.view(),
            confidence.view(),
            &[0.25],
            &FocalParams::default(),
        )
        .unwrap();

        let ln2 = 2f32.ln();
        // positive: 0.25 * 0.5^2 * ln 2, background: 1.0 * 0.5^2 * ln 2
        let expected_class = (0.0625 * ln2 + 0.25 * ln2) / 4.0;
        assert_abs_diff_eq!(loss.classification, expected_class, epsilon = 1e-6);
        // the background anchor has no location loss
        assert_abs_diff_eq!(loss.location, 0.125 + 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(loss.total, expected_class + 1.625, epsilon = 1e-6);
    }

    #[test]
    fn ignored_anchors_only_contribute_location_loss() {
        let encoding = encoding(array![IGNORED, IGNORED]);
        let regression = Array2::from_elem((2, 4), 3.0);
        let confidence = array![[0.3, 0.9], [0.1, 0.4]];

        let loss = focal_loss(
            &encoding,
            regression.view(),
            confidence.view(),
            &[0.25, 0.25],
            &FocalParams::default(),
        )
        .unwrap();

        assert_eq!(loss.classification, 0.0);
        // 4 columns of smooth L1 at an error of 3, for both anchors
        assert_abs_diff_eq!(loss.location, 2.0 * 4.0 * 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(loss.total, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn confident_correct_prediction_has_small_loss() {
        let encoding = encoding(array![2, BACKGROUND, BACKGROUND]);
        let regression = Array2::<f32>::zeros((3, 4));
        let good = array![[0.0, 1.0], [0.0, 0.0], [0.0, 0.0]];
        let bad = array![[1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let params = FocalParams::default();
        let good = focal_loss(&encoding, regression.view(), good.view(), &[0.5, 0.5], &params)
            .unwrap();
        let bad =
            focal_loss(&encoding, regression.view(), bad.view(), &[0.5, 0.5], &params).unwrap();

        assert!(good.total < 1e-6);
        assert!(bad.total > 1.0);
        assert!(bad.total.is_finite());
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let encoding = encoding(array![3]);
        let result = focal_loss(
            &encoding,
            Array2::<f32>::zeros((1, 4)).view(),
            Array2::<f32>::zeros((1, 2)).view(),
            &[0.5, 0.5],
            &FocalParams::default(),
        );

        assert!(matches!(
            result,
            Err(Error::LabelOutOfRange {
                label: 2,
                num_classes: 2
            })
        ));
    }

    #[test]
    fn rejects_mismatched_weights() {
        let encoding = encoding(array![1]);
        let result = focal_loss(
            &encoding,
            Array2::<f32>::zeros((1, 4)).view(),
            Array2::<f32>::zeros((1, 2)).view(),
            &[0.5],
            &FocalParams::default(),
        );

        assert!(matches!(
            result,
            Err(Error::ShapeMismatch {
                name: "class_weights",
                ..
            })
        ));
    }

    #[test]
    fn batch_loss_is_sum_of_images() {
        let encodings = [encoding(array![1, 0]), encoding(array![0, 1])];
        let regression = Array2::from_elem((2, 4), 0.5);
        let confidence = array![[0.7], [0.2]];

        let single = focal_loss(
            &encodings[0],
            regression.view(),
            confidence.view(),
            &[0.25],
            &FocalParams::default(),
        )
        .unwrap()
            + focal_loss(
                &encodings[1],
                regression.view(),
                confidence.view(),
                &[0.25],
                &FocalParams::default(),
            )
            .unwrap();

        let regression = stack![Axis(0), regression, regression];
        let confidence = stack![Axis(0), confidence, confidence];
        let batch = batch_focal_loss(
            &encodings,
            regression.view(),
            confidence.view(),
            &[0.25],
            &FocalParams::default(),
        )
        .unwrap();

        assert_abs_diff_eq!(batch.total, single.total, epsilon = 1e-6);
        assert_abs_diff_eq!(batch.location, single.location, epsilon = 1e-6);
    }
}
