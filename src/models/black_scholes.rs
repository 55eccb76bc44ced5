//! Black-Scholes European option pricing and Greeks.
//!
//! d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
//! d2 = d1 - sigma * sqrt(T)
//!
//! Every public function is total: if any of S, K, sigma or T is not
//! strictly positive it returns exactly 0.0, and any non-finite result is
//! sanitized to 0.0. Theta is per year, vega per unit of vol, rho per unit
//! of rate.

use crate::models::normal::{normal_cdf, normal_pdf};
use crate::models::sanitize;
use crate::state::{OptionParameters, PricingResult};

/// Precomputed terms shared by price and all Greeks (stack, no alloc).
#[derive(Debug, Clone, Copy)]
struct Terms {
    spot: f64,
    strike: f64,
    rate: f64,
    sigma: f64,
    ttl: f64,
    sqrt_t: f64,
    d1: f64,
    d2: f64,
    /// K * e^(-rT)
    discounted_strike: f64,
}

impl Terms {
    #[inline]
    fn new(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64) -> Option<Self> {
        if sigma <= 0.0 || ttl <= 0.0 || spot <= 0.0 || strike <= 0.0 {
            return None;
        }

        let sqrt_t = ttl.sqrt();
        let sigma_sqrt_t = sigma * sqrt_t;
        let d1 = ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * ttl) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        Some(Self {
            spot,
            strike,
            rate,
            sigma,
            ttl,
            sqrt_t,
            d1,
            d2,
            discounted_strike: strike * (-rate * ttl).exp(),
        })
    }

    #[inline]
    fn price(&self, is_call: bool) -> f64 {
        if is_call {
            self.spot * normal_cdf(self.d1) - self.discounted_strike * normal_cdf(self.d2)
        } else {
            self.discounted_strike * normal_cdf(-self.d2) - self.spot * normal_cdf(-self.d1)
        }
    }

    #[inline]
    fn delta(&self, is_call: bool) -> f64 {
        let n_d1 = normal_cdf(self.d1);
        if is_call {
            n_d1
        } else {
            n_d1 - 1.0
        }
    }

    #[inline]
    fn gamma(&self) -> f64 {
        normal_pdf(self.d1) / (self.spot * self.sigma * self.sqrt_t)
    }

    #[inline]
    fn theta(&self, is_call: bool) -> f64 {
        let decay = -(self.spot * self.sigma * normal_pdf(self.d1)) / (2.0 * self.sqrt_t);
        let carry = self.rate * self.discounted_strike;
        if is_call {
            decay - carry * normal_cdf(self.d2)
        } else {
            decay + carry * normal_cdf(-self.d2)
        }
    }

    #[inline]
    fn vega(&self) -> f64 {
        self.spot * self.sqrt_t * normal_pdf(self.d1)
    }

    #[inline]
    fn rho(&self, is_call: bool) -> f64 {
        let k_t_df = self.ttl * self.discounted_strike;
        if is_call {
            k_t_df * normal_cdf(self.d2)
        } else {
            -k_t_df * normal_cdf(-self.d2)
        }
    }
}

#[inline]
fn guarded(
    spot: f64,
    strike: f64,
    rate: f64,
    sigma: f64,
    ttl: f64,
    f: impl FnOnce(&Terms) -> f64,
) -> f64 {
    Terms::new(spot, strike, rate, sigma, ttl).map_or(0.0, |t| sanitize(f(&t)))
}

pub fn price(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64, is_call: bool) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, |t| t.price(is_call))
}

/// Call: Phi(d1). Put: Phi(d1) - 1.
pub fn delta(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64, is_call: bool) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, |t| t.delta(is_call))
}

/// Same for calls and puts.
pub fn gamma(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, Terms::gamma)
}

pub fn theta(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64, is_call: bool) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, |t| t.theta(is_call))
}

/// Same for calls and puts.
pub fn vega(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, Terms::vega)
}

pub fn rho(spot: f64, strike: f64, rate: f64, sigma: f64, ttl: f64, is_call: bool) -> f64 {
    guarded(spot, strike, rate, sigma, ttl, |t| t.rho(is_call))
}

/// Price and all five Greeks for one parameter snapshot, sharing one d1/d2.
pub fn evaluate(p: &OptionParameters) -> PricingResult {
    let Some(t) = Terms::new(p.spot, p.strike, p.risk_free_rate, p.volatility, p.time_to_expiry)
    else {
        return PricingResult::default();
    };

    PricingResult {
        price: sanitize(t.price(p.is_call)),
        delta: sanitize(t.delta(p.is_call)),
        gamma: sanitize(t.gamma()),
        theta: sanitize(t.theta(p.is_call)),
        vega: sanitize(t.vega()),
        rho: sanitize(t.rho(p.is_call)),
    }
}
