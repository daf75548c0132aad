//! Encoding of ground truth into per-anchor training targets.
//!
//! Every anchor is matched to the ground truth box it overlaps most. Depending on that overlap
//! the anchor becomes positive (it should predict the box's class), negative (background) or
//! ignored (contributes nothing to the classification loss).

use itertools::Itertools;
use ndarray::{Array1, Array2};

use crate::anchor::Anchors;
use crate::box_coder::BoxCoder;
use crate::boxes::point_form;
use crate::error::{Error, Result};
use crate::target::Target;
use crate::util::argmax;

/// Classification target of anchors that are neither positive nor negative.
pub const IGNORED: i64 = -1;

/// Classification target of anchors that match no ground truth.
pub const BACKGROUND: i64 = 0;

/// IoU thresholds used to decide whether an anchor is negative, ignored or positive.
///
/// An anchor with a best IoU of at most `negative` is background, one with a best IoU above
/// `positive` is positive, anything in between is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    negative: f32,
    positive: f32,
}

impl MatchThresholds {
    pub fn new(negative: f32, positive: f32) -> Result<Self> {
        let in_range = |t: f32| (0.0..=1.0).contains(&t);

        if !in_range(negative) || !in_range(positive) || positive < negative {
            return Err(Error::InvalidMatchThresholds { negative, positive });
        }

        Ok(MatchThresholds { negative, positive })
    }

    #[must_use]
    pub fn negative(&self) -> f32 {
        self.negative
    }

    #[must_use]
    pub fn positive(&self) -> f32 {
        self.positive
    }

    fn classify(&self, iou: f32, label: usize) -> i64 {
        if iou <= self.negative {
            BACKGROUND
        } else if iou <= self.positive {
            IGNORED
        } else {
            label as i64 + 1
        }
    }
}

impl Default for MatchThresholds {
    fn default() -> Self {
        MatchThresholds {
            negative: 0.4,
            positive: 0.5,
        }
    }
}

/// Per-anchor training targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    /// `M x 4` regression targets of every anchor against its matched ground truth.
    pub regression: Array2<f32>,
    /// `M` classification targets: [`IGNORED`], [`BACKGROUND`] or the 1-based class.
    pub classification: Array1<i64>,
}

/// Number of anchors in each match state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub positive: usize,
    pub ignored: usize,
    pub negative: usize,
}

impl Encoding {
    /// An encoding in which all `num_anchors` anchors are background.
    #[must_use]
    pub fn negative(num_anchors: usize) -> Self {
        Encoding {
            regression: Array2::zeros((num_anchors, 4)),
            classification: Array1::from_elem(num_anchors, BACKGROUND),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classification.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classification.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> MatchStats {
        self.classification
            .iter()
            .fold(MatchStats::default(), |mut stats, &class| {
                match class {
                    IGNORED => stats.ignored += 1,
                    BACKGROUND => stats.negative += 1,
                    _ => stats.positive += 1,
                }
                stats
            })
    }
}

/// Encode a target against a set of anchors.
///
/// Each anchor is matched to the ground truth box with the highest IoU, ties going to the box
/// with the lowest index. The class and the regression target of the anchor both come from
/// that single match.
///
/// With `match_nearest = k > 0`, the IoU of every ground truth box with its `k` best anchors is
/// doubled before matching. This guarantees small or oddly shaped objects still get positive
/// anchors.
pub fn encode(
    target: &Target,
    anchors: &Anchors,
    thresholds: MatchThresholds,
    match_nearest: usize,
) -> Result<Encoding> {
    encode_with(&BoxCoder::default(), target, anchors, thresholds, match_nearest)
}

/// Same as [`encode`], using `coder` to compute the regression targets.
pub fn encode_with(
    coder: &BoxCoder,
    target: &Target,
    anchors: &Anchors,
    thresholds: MatchThresholds,
    match_nearest: usize,
) -> Result<Encoding> {
    if target.is_empty() {
        return Ok(Encoding::negative(anchors.len()));
    }

    let mut ious = point_form(anchors).iou(&target.boxes);
    if match_nearest > 0 {
        boost_nearest(&mut ious, match_nearest);
    }

    let (matches, classification): (Vec<usize>, Vec<i64>) = ious
        .rows()
        .into_iter()
        .map(|row| {
            let (index, iou) = argmax(row).unwrap_or((0, 0.0));
            (index, thresholds.classify(iou, target.labels[index]))
        })
        .unzip();

    let matched = target.boxes.select(&matches);
    let regression = coder.encode(&matched, anchors)?;

    let encoding = Encoding {
        regression,
        classification: Array1::from(classification),
    };

    let MatchStats {
        positive,
        ignored,
        negative,
    } = encoding.stats();
    tracing::debug!(
        num_objects = target.len(),
        positive,
        ignored,
        negative,
        "encoded target"
    );

    Ok(encoding)
}

/// Double the IoU of every ground truth box (column) with its `k` best anchors (rows).
fn boost_nearest(ious: &mut Array2<f32>, k: usize) {
    for mut column in ious.columns_mut() {
        let nearest = (0..column.len())
            .k_largest_by(k, |&a, &b| column[a].total_cmp(&column[b]))
            .collect::<Vec<_>>();

        for anchor in nearest {
            column[anchor] *= 2.0;
        }
    }
}
