pub mod black_scholes;
pub mod normal;

/// Safety guard applied to every scalar before it is stored or plotted.
/// NaN and +/-inf become 0.0; finite values pass through untouched.
#[inline]
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
