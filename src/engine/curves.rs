use crate::models::black_scholes;
use crate::models::sanitize;
use crate::state::{OptionParameters, SeriesKind, SeriesPoint};

/// Intervals per sweep; a sweep has NUM_POINTS + 1 samples.
pub const NUM_POINTS: usize = 100;

/// Plot series for one parameter snapshot. Built in one sweep, replaced whole.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct CurveSet {
    pub price: Vec<SeriesPoint>,
    pub delta: Vec<SeriesPoint>,
    pub gamma: Vec<SeriesPoint>,
}

impl CurveSet {
    pub fn series(&self, kind: SeriesKind) -> &[SeriesPoint] {
        match kind {
            SeriesKind::Price => &self.price,
            SeriesKind::Delta => &self.delta,
            SeriesKind::Gamma => &self.gamma,
        }
    }
}

/// Spot range for plotting. Always straddles both the current spot and the
/// strike, widening on whichever side is needed to keep both visible.
/// The upper bound saturates at `f64::MAX` instead of overflowing.
#[inline]
pub fn spot_range(p: &OptionParameters) -> (f64, f64) {
    let min_spot = (p.strike * 0.6).min(p.spot * 0.8);
    let max_spot = (p.strike * 1.4).max(p.spot * 1.2).min(f64::MAX);
    (min_spot, max_spot)
}

/// Sweep price, delta and gamma over `spot_range`, holding every other
/// input at its current value.
pub fn generate(p: &OptionParameters) -> CurveSet {
    let (min_spot, max_spot) = spot_range(p);

    let mut curves = CurveSet {
        price: Vec::with_capacity(NUM_POINTS + 1),
        delta: Vec::with_capacity(NUM_POINTS + 1),
        gamma: Vec::with_capacity(NUM_POINTS + 1),
    };

    let (k, r, v, t) = (p.strike, p.risk_free_rate, p.volatility, p.time_to_expiry);
    for i in 0..=NUM_POINTS {
        // Lerp: last sample lands exactly on max_spot, no overflow near f64::MAX.
        let w = i as f64 / NUM_POINTS as f64;
        let x = min_spot * (1.0 - w) + max_spot * w;

        let price = black_scholes::price(x, k, r, v, t, p.is_call);
        let delta = black_scholes::delta(x, k, r, v, t, p.is_call);
        let gamma = black_scholes::gamma(x, k, r, v, t);

        curves.price.push(SeriesPoint { x, y: sanitize(price) });
        curves.delta.push(SeriesPoint { x, y: sanitize(delta) });
        curves.gamma.push(SeriesPoint { x, y: sanitize(gamma) });
    }

    curves
}
