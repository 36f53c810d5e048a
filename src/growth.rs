/// Target breeding-pair counts for generations `1..=generations`.
///
/// Interpolates log-linearly from `start_pairs` to `terminal_pairs` over
/// `generations + 1` points and drops the first one, rounding each target to
/// the nearest integer. A shrinking or flat curve is allowed.
pub fn growth_schedule(start_pairs: f64, terminal_pairs: f64, generations: usize) -> Vec<usize> {
    if generations == 0 {
        return Vec::new();
    }
    let from = start_pairs.ln();
    let to = terminal_pairs.ln();
    let step = (to - from) / generations as f64;
    (1..=generations)
        .map(|k| {
            // Pin the final point so the curve lands exactly on the terminal size.
            let log_size = if k == generations { to } else { from + step * k as f64 };
            log_size.exp().round().max(0.0) as usize
        })
        .collect()
}
