use anyhow::{bail, Result};
use std::ops::Range;

use crate::roc::{interp, trapezoid, RocCurve};

/// One model's fold curves resampled onto a shared FPR domain and averaged.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroRoc {
    pub curve: RocCurve,
    pub auc: f64,
    /// AUC of every input curve, in input order.
    pub fold_aucs: Vec<f64>,
}

impl MacroRoc {
    pub fn folds(&self) -> usize {
        self.fold_aucs.len()
    }
}

/// Averages ROC curves of differing resolution.
///
/// The curves are evaluated on the sorted union of all their FPR values,
/// then averaged pointwise. Averaging raw points would be wrong since the
/// i-th point of two folds rarely sits at the same FPR.
///
/// A value is repeated in the domain as often as the curve with the most
/// points at that FPR has them. At the k-th repeat every curve contributes
/// its k-th point there (its last one once it runs out), and curves without
/// a point there contribute their interpolated TPR. Vertical steps thus
/// survive resampling and every fold keeps its own AUC.
pub fn aggregate(curves: &[RocCurve]) -> Result<MacroRoc> {
    if curves.is_empty() {
        bail!("no ROC curves to aggregate");
    }
    for (i, curve) in curves.iter().enumerate() {
        if curve.is_empty() {
            bail!("ROC curve {} has no points", i);
        }
        if curve.fpr.len() != curve.tpr.len() {
            bail!(
                "ROC curve {} has {} FPR values but {} TPR values",
                i,
                curve.fpr.len(),
                curve.tpr.len()
            );
        }
        if curve.fpr.iter().any(|x| x.is_nan()) {
            bail!("ROC curve {} contains a NaN false positive rate", i);
        }
        if curve.fpr.windows(2).any(|w| w[1] < w[0]) {
            bail!("ROC curve {} has decreasing false positive rates", i);
        }
    }

    let mut distinct: Vec<f64> = curves.iter().flat_map(|c| c.fpr.iter().copied()).collect();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();

    let repeats: Vec<usize> = distinct
        .iter()
        .map(|&x| {
            curves
                .iter()
                .map(|c| points_at(&c.fpr, x).len())
                .max()
                .unwrap_or(0)
                .max(1)
        })
        .collect();

    let domain: Vec<f64> = distinct
        .iter()
        .zip(&repeats)
        .flat_map(|(&x, &m)| std::iter::repeat(x).take(m))
        .collect();

    let mut tpr_sum = vec![0.0; domain.len()];
    for curve in curves {
        let mut slot = 0;
        for (&x, &m) in distinct.iter().zip(&repeats) {
            let at = points_at(&curve.fpr, x);
            for k in 0..m {
                tpr_sum[slot] += if at.is_empty() {
                    interp(x, &curve.fpr, &curve.tpr)
                } else {
                    curve.tpr[(at.start + k).min(at.end - 1)]
                };
                slot += 1;
            }
        }
    }

    let n = curves.len() as f64;
    let auc = trapezoid(&domain, &tpr_sum) / n;
    let mean_tpr = tpr_sum.into_iter().map(|t| t / n).collect();

    Ok(MacroRoc {
        curve: RocCurve::new(domain, mean_tpr),
        auc,
        fold_aucs: curves.iter().map(RocCurve::auc).collect(),
    })
}

/// Indices of the points of a sorted FPR sequence lying exactly at `x`.
fn points_at(fpr: &[f64], x: f64) -> Range<usize> {
    fpr.partition_point(|&v| v < x)..fpr.partition_point(|&v| v <= x)
}
