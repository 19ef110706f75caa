use anyhow::{bail, Result};

/// Operating points of a classifier, ordered by non-decreasing FPR.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
}

impl RocCurve {
    pub fn new(fpr: Vec<f64>, tpr: Vec<f64>) -> Self {
        Self { fpr, tpr }
    }

    pub fn len(&self) -> usize {
        self.fpr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fpr.is_empty()
    }

    pub fn auc(&self) -> f64 {
        trapezoid(&self.fpr, &self.tpr)
    }
}

/// Sweeps the decision threshold over every distinct probability, highest
/// first, and records the (FPR, TPR) pair reached at each step. Points lying
/// on a straight line between their neighbours are dropped and the origin is
/// prepended.
///
/// A fold without negatives reports FPR 0 everywhere, one without positives
/// reports TPR 0 everywhere.
pub fn roc_curve(y: &[u8], probs: &[f64]) -> Result<RocCurve> {
    if y.is_empty() {
        bail!("cannot compute a ROC curve for an empty fold");
    }
    if y.len() != probs.len() {
        bail!("{} labels but {} probabilities", y.len(), probs.len());
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    let mut tps: Vec<i64> = Vec::new();
    let mut fps: Vec<i64> = Vec::new();
    let (mut tp, mut fp) = (0i64, 0i64);
    for (rank, &i) in order.iter().enumerate() {
        if y[i] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let threshold_ends = match order.get(rank + 1) {
            Some(&next) => probs[next] != probs[i],
            None => true,
        };
        if threshold_ends {
            tps.push(tp);
            fps.push(fp);
        }
    }

    let keep: Vec<usize> = (0..tps.len())
        .filter(|&k| {
            k == 0
                || k + 1 == tps.len()
                || fps[k - 1] - 2 * fps[k] + fps[k + 1] != 0
                || tps[k - 1] - 2 * tps[k] + tps[k + 1] != 0
        })
        .collect();

    let positives = tp as f64;
    let negatives = fp as f64;
    let rate = |count: i64, total: f64| if total > 0.0 { count as f64 / total } else { 0.0 };

    let mut fpr = Vec::with_capacity(keep.len() + 1);
    let mut tpr = Vec::with_capacity(keep.len() + 1);
    fpr.push(0.0);
    tpr.push(0.0);
    for k in keep {
        fpr.push(rate(fps[k], negatives));
        tpr.push(rate(tps[k], positives));
    }

    Ok(RocCurve { fpr, tpr })
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x`, clamped to the end
/// values outside `xp`. `xp` must be sorted ascending and non-empty. On a
/// repeated `xp` value the right-most point is used.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert!(!xp.is_empty() && xp.len() == fp.len());
    if x.is_nan() {
        return f64::NAN;
    }
    let last = xp.len() - 1;
    if x < xp[0] {
        return fp[0];
    }
    if x >= xp[last] {
        return fp[last];
    }
    // xp[0] <= x < xp[last], so 1 <= j + 1 <= last
    let j = xp.partition_point(|&v| v <= x) - 1;
    let slope = (fp[j + 1] - fp[j]) / (xp[j + 1] - xp[j]);
    fp[j] + slope * (x - xp[j])
}

/// Trapezoidal rule over consecutive `(x, y)` points.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}
