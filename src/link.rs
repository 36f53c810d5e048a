//! Logit link helpers.

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

pub fn inv_logit(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
