// Fixed polynomial predictors, orders 0-4
//
// The first `order` samples of a block fall back to the highest order they
// have history for, so a block needs no separate warm-up storage.

use super::MAX_FIXED_ORDER;

const FIXED_COEFFS: [&[i64]; MAX_FIXED_ORDER + 1] =
    [&[], &[1], &[2, -1], &[3, -3, 1], &[4, -6, 4, -1]];

/// None when the prediction leaves the i64 range
#[inline]
fn predict(history: &[i64], index: usize, order: usize) -> Option<i64> {
    FIXED_COEFFS[order.min(index)]
        .iter()
        .enumerate()
        .try_fold(0i64, |acc, (j, &c)| {
            c.checked_mul(history[index - 1 - j])?.checked_add(acc)
        })
}

/// residuals of `samples` under a fixed predictor, None on overflow
pub(crate) fn fixed_residuals(samples: &[i64], order: usize) -> Option<Vec<i64>> {
    let order = order.min(MAX_FIXED_ORDER);
    samples
        .iter()
        .enumerate()
        .map(|(i, &s)| s.checked_sub(predict(samples, i, order)?))
        .collect()
}

/// inverse of [`fixed_residuals`]
///
/// Residuals come straight from a packet, so overflow means corrupt data.
pub(crate) fn reconstruct_fixed(residuals: &[i64], order: usize) -> Option<Vec<i64>> {
    let order = order.min(MAX_FIXED_ORDER);
    let mut samples = Vec::with_capacity(residuals.len());
    for (i, &r) in residuals.iter().enumerate() {
        let prediction = predict(&samples, i, order)?;
        samples.push(r.checked_add(prediction)?);
    }
    Some(samples)
}

/// true when the side channel carries less energy than left and right
pub(crate) fn should_use_mid_side(left: &[i64], right: &[i64]) -> bool {
    let mut var_l: i128 = 0;
    let mut var_r: i128 = 0;
    let mut var_side: i128 = 0;

    for (&l, &r) in left.iter().zip(right) {
        var_l += (l as i128) * (l as i128);
        var_r += (r as i128) * (r as i128);
        let side = (l - r) as i128;
        var_side += side * side;
    }

    var_side < (var_l + var_r) / 2
}

/// mid = L + R, side = L - R, no bits lost
pub(crate) fn to_mid_side(left: &[i64], right: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let mid = left.iter().zip(right).map(|(&l, &r)| l + r).collect();
    let side = left.iter().zip(right).map(|(&l, &r)| l - r).collect();
    (mid, side)
}

/// None when a mid/side pair overflows
pub(crate) fn from_mid_side(mid: &[i64], side: &[i64]) -> Option<(Vec<i64>, Vec<i64>)> {
    let left = mid
        .iter()
        .zip(side)
        .map(|(&m, &s)| Some(m.checked_add(s)? / 2))
        .collect::<Option<Vec<i64>>>()?;
    let right = mid
        .iter()
        .zip(side)
        .map(|(&m, &s)| Some(m.checked_sub(s)? / 2))
        .collect::<Option<Vec<i64>>>()?;
    Some((left, right))
}
