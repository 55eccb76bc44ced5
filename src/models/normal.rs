//! Standard normal primitives. Pure and total over all reals.

use statrs::function::erf::erf;
use std::f64::consts::{PI, SQRT_2};

/// Phi(x) = 0.5 * (1 + erf(x / sqrt(2)))
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// phi(x) = exp(-x^2 / 2) / sqrt(2 * pi)
#[inline]
pub fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}
