pub mod curves;
pub mod store;
pub mod task;

use crate::engine::curves::CurveSet;
use crate::engine::store::ParameterStore;
use crate::models::black_scholes;
use crate::state::{
    EngineSnapshot, Notification, OptionParameters, ParamField, ParamsPatch, PricingResult,
    SeriesKind,
};
use smallvec::SmallVec;

/// Six field changes, one result, three series, one data-changed.
pub type Notifications = SmallVec<[Notification; 11]>;

/// Recomputation orchestrator. Owns the parameter store and every derived
/// output; all mutation goes through here.
///
/// Each mutating call is synchronous and returns the notifications it caused,
/// in order: field changes, then the result, then the three series, then
/// data-changed. A no-op edit returns an empty list and recomputes nothing.
/// Readers only ever see whole snapshots.
pub struct OptionEngine {
    store: ParameterStore,
    result: PricingResult,
    curves: CurveSet,
    revision: u64,
    computed_at: chrono::DateTime<chrono::Utc>,
}

impl OptionEngine {
    /// Engine at the default parameters, fully computed.
    pub fn new() -> Self {
        let mut engine = Self {
            store: ParameterStore::new(),
            result: PricingResult::default(),
            curves: CurveSet::default(),
            revision: 0,
            computed_at: chrono::Utc::now(),
        };
        engine.recompute(&mut Notifications::new());
        engine
    }

    #[inline]
    pub fn params(&self) -> &OptionParameters {
        self.store.params()
    }

    #[inline]
    pub fn result(&self) -> &PricingResult {
        &self.result
    }

    #[inline]
    pub fn curves(&self) -> &CurveSet {
        &self.curves
    }

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set_spot(&mut self, value: f64) -> Notifications {
        let changed = self.store.set_spot(value);
        self.after_edit(changed.then_some(ParamField::Spot))
    }

    pub fn set_strike(&mut self, value: f64) -> Notifications {
        let changed = self.store.set_strike(value);
        self.after_edit(changed.then_some(ParamField::Strike))
    }

    pub fn set_risk_free_rate(&mut self, value: f64) -> Notifications {
        let changed = self.store.set_risk_free_rate(value);
        self.after_edit(changed.then_some(ParamField::RiskFreeRate))
    }

    pub fn set_volatility(&mut self, value: f64) -> Notifications {
        let changed = self.store.set_volatility(value);
        self.after_edit(changed.then_some(ParamField::Volatility))
    }

    pub fn set_time_to_expiry(&mut self, value: f64) -> Notifications {
        let changed = self.store.set_time_to_expiry(value);
        self.after_edit(changed.then_some(ParamField::TimeToExpiry))
    }

    pub fn set_is_call(&mut self, value: bool) -> Notifications {
        let changed = self.store.set_is_call(value);
        self.after_edit(changed.then_some(ParamField::IsCall))
    }

    /// Several fields at once, one recompute at most.
    pub fn apply(&mut self, patch: &ParamsPatch) -> Notifications {
        let changed = self.store.apply(patch);
        self.after_edit(changed)
    }

    /// Restore defaults. Always notifies every field and always recomputes,
    /// even if nothing differed.
    pub fn reset(&mut self) -> Notifications {
        self.store.reset();
        let mut out: Notifications = ParamField::ALL
            .iter()
            .map(|f| Notification::FieldChanged(*f))
            .collect();
        self.recompute(&mut out);
        out
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            revision: self.revision,
            computed_at: self.computed_at.to_rfc3339(),
            params: *self.store.params(),
            result: self.result,
            curves: self.curves.clone(),
        }
    }

    fn after_edit(&mut self, changed: impl IntoIterator<Item = ParamField>) -> Notifications {
        let mut out: Notifications = changed.into_iter().map(Notification::FieldChanged).collect();
        if out.is_empty() {
            return out;
        }
        self.recompute(&mut out);
        out
    }

    /// Point values first, then curves: anything watching the scalar price
    /// sees it no later than the curve refresh.
    fn recompute(&mut self, out: &mut Notifications) {
        let params = *self.store.params();

        self.result = black_scholes::evaluate(&params);
        out.push(Notification::ResultChanged);

        self.curves = curves::generate(&params);
        out.extend(SeriesKind::ALL.into_iter().map(Notification::SeriesChanged));

        self.revision += 1;
        self.computed_at = chrono::Utc::now();
        out.push(Notification::DataChanged);

        tracing::debug!(
            revision = self.revision,
            spot = params.spot,
            strike = params.strike,
            rate = params.risk_free_rate,
            vol = params.volatility,
            ttl = params.time_to_expiry,
            is_call = params.is_call,
            price = self.result.price,
            delta = self.result.delta,
            "recomputed"
        );
    }
}

impl Default for OptionEngine {
    fn default() -> Self {
        Self::new()
    }
}
