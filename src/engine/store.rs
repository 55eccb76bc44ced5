use crate::state::{OptionParameters, ParamField, ParamsPatch};

/// Floor for spot, strike, volatility and time to expiry.
pub const MIN_POSITIVE: f64 = 0.01;

const REL_TOLERANCE: f64 = 1e-12;
const ABS_TOLERANCE: f64 = 1e-12;

/// Approximate float equality used for change suppression.
/// Absolute near zero (so a 0.0 rate compares sanely), relative elsewhere.
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= ABS_TOLERANCE.max(REL_TOLERANCE * scale)
}

#[inline]
fn clamp_positive(value: f64) -> f64 {
    if value <= 0.0 {
        MIN_POSITIVE
    } else {
        value
    }
}

/// Owns the six inputs. Setters clamp, then return whether anything changed;
/// the caller decides what to recompute.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: OptionParameters,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn params(&self) -> &OptionParameters {
        &self.params
    }

    pub fn set_spot(&mut self, value: f64) -> bool {
        write_f64(&mut self.params.spot, ParamField::Spot, value, clamp_positive)
    }

    pub fn set_strike(&mut self, value: f64) -> bool {
        write_f64(&mut self.params.strike, ParamField::Strike, value, clamp_positive)
    }

    /// Negative rates are allowed; no clamp.
    pub fn set_risk_free_rate(&mut self, value: f64) -> bool {
        write_f64(&mut self.params.risk_free_rate, ParamField::RiskFreeRate, value, |v| v)
    }

    pub fn set_volatility(&mut self, value: f64) -> bool {
        write_f64(&mut self.params.volatility, ParamField::Volatility, value, clamp_positive)
    }

    pub fn set_time_to_expiry(&mut self, value: f64) -> bool {
        write_f64(&mut self.params.time_to_expiry, ParamField::TimeToExpiry, value, clamp_positive)
    }

    pub fn set_is_call(&mut self, value: bool) -> bool {
        if self.params.is_call == value {
            tracing::trace!(field = %ParamField::IsCall, "unchanged, skipping");
            return false;
        }
        self.params.is_call = value;
        true
    }

    /// Apply every present field in declaration order.
    /// Returns the fields that actually changed.
    pub fn apply(&mut self, patch: &ParamsPatch) -> smallvec::SmallVec<[ParamField; 6]> {
        let mut changed = smallvec::SmallVec::new();

        let numeric: [(ParamField, Option<f64>, fn(&mut Self, f64) -> bool); 5] = [
            (ParamField::Spot, patch.spot, Self::set_spot),
            (ParamField::Strike, patch.strike, Self::set_strike),
            (ParamField::RiskFreeRate, patch.risk_free_rate, Self::set_risk_free_rate),
            (ParamField::Volatility, patch.volatility, Self::set_volatility),
            (ParamField::TimeToExpiry, patch.time_to_expiry, Self::set_time_to_expiry),
        ];
        for (field, value, setter) in numeric {
            if let Some(v) = value {
                if setter(&mut *self, v) {
                    changed.push(field);
                }
            }
        }

        if let Some(is_call) = patch.is_call {
            if self.set_is_call(is_call) {
                changed.push(ParamField::IsCall);
            }
        }

        changed
    }

    pub fn reset(&mut self) {
        self.params = OptionParameters::default();
    }
}

fn write_f64(slot: &mut f64, field: ParamField, value: f64, clamp: impl Fn(f64) -> f64) -> bool {
    if !value.is_finite() {
        tracing::warn!(field = %field, value, "rejecting non-finite input");
        return false;
    }

    let value = clamp(value);
    if approx_eq(*slot, value) {
        tracing::trace!(field = %field, value, "unchanged, skipping");
        return false;
    }

    *slot = value;
    true
}
