//! Min-max scaling, used to turn district totals into a crime index between 0 and 1.

/// Scale `values` linearly so that the smallest becomes 0 and the largest becomes 1.
///
/// When all values are equal there is no range to scale over and every value maps to 0.
/// The result stays within [0, 1] even when the range overflows: the largest value maps to 1
/// and anything else which can't be scaled maps to 0.
pub fn min_max_scale(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    values
        .iter()
        .map(|&v| {
            if !(range > 0.0) {
                return 0.0;
            }

            let scaled = (v - min) / range;
            if scaled.is_nan() {
                if v == max {
                    1.0
                } else {
                    0.0
                }
            } else {
                scaled.clamp(0.0, 1.0)
            }
        })
        .collect()
}
