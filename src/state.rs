use crate::engine::curves::CurveSet;
use crate::errors::{EngineError, EngineResult};
use portable_atomic::{AtomicU64, Ordering};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

// ── Defaults (single source of truth for startup and reset) ──

pub const DEFAULT_SPOT: f64 = 100.0;
pub const DEFAULT_STRIKE: f64 = 100.0;
pub const DEFAULT_RATE: f64 = 0.05;
pub const DEFAULT_VOLATILITY: f64 = 0.2;
pub const DEFAULT_TIME_TO_EXPIRY: f64 = 1.0;

// ── Contract / market inputs ──

/// The six editable inputs. Only the parameter store writes these.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionParameters {
    pub spot: f64,
    pub strike: f64,
    /// Continuously compounded, annual. May be negative.
    pub risk_free_rate: f64,
    /// Annualized.
    pub volatility: f64,
    /// Years.
    pub time_to_expiry: f64,
    pub is_call: bool,
}

impl Default for OptionParameters {
    fn default() -> Self {
        Self {
            spot: DEFAULT_SPOT,
            strike: DEFAULT_STRIKE,
            risk_free_rate: DEFAULT_RATE,
            volatility: DEFAULT_VOLATILITY,
            time_to_expiry: DEFAULT_TIME_TO_EXPIRY,
            is_call: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamField {
    Spot,
    Strike,
    RiskFreeRate,
    Volatility,
    TimeToExpiry,
    IsCall,
}

impl ParamField {
    pub const ALL: [ParamField; 6] = [
        Self::Spot,
        Self::Strike,
        Self::RiskFreeRate,
        Self::Volatility,
        Self::TimeToExpiry,
        Self::IsCall,
    ];
}

impl std::fmt::Display for ParamField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Strike => write!(f, "strike"),
            Self::RiskFreeRate => write!(f, "risk_free_rate"),
            Self::Volatility => write!(f, "volatility"),
            Self::TimeToExpiry => write!(f, "time_to_expiry"),
            Self::IsCall => write!(f, "is_call"),
        }
    }
}

/// A partial edit. Absent fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ParamsPatch {
    pub spot: Option<f64>,
    pub strike: Option<f64>,
    pub risk_free_rate: Option<f64>,
    pub volatility: Option<f64>,
    pub time_to_expiry: Option<f64>,
    pub is_call: Option<bool>,
}

impl ParamsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Boundary check for edits arriving over the wire.
    pub fn validate(&self) -> EngineResult<()> {
        let numeric = [
            (ParamField::Spot, self.spot),
            (ParamField::Strike, self.strike),
            (ParamField::RiskFreeRate, self.risk_free_rate),
            (ParamField::Volatility, self.volatility),
            (ParamField::TimeToExpiry, self.time_to_expiry),
        ];
        for (field, value) in numeric {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(EngineError::InvalidInput(format!("{field} must be finite, got {v}")));
                }
            }
        }
        Ok(())
    }
}

// ── Derived outputs ──

/// Price and Greeks for one parameter snapshot. Every field is finite.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SeriesPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Price,
    Delta,
    Gamma,
}

impl SeriesKind {
    pub const ALL: [SeriesKind; 3] = [Self::Price, Self::Delta, Self::Gamma];
}

impl std::fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Price => write!(f, "price"),
            Self::Delta => write!(f, "delta"),
            Self::Gamma => write!(f, "gamma"),
        }
    }
}

impl FromStr for SeriesKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(Self::Price),
            "delta" => Ok(Self::Delta),
            "gamma" => Ok(Self::Gamma),
            other => Err(EngineError::InvalidInput(format!("unknown series: {other}"))),
        }
    }
}

// ── Change notifications (engine -> observers) ──

/// Emitted by the engine in the order the changes happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    FieldChanged(ParamField),
    /// Price and all five Greeks, refreshed together.
    ResultChanged,
    SeriesChanged(SeriesKind),
    /// Something updated; for consumers that don't care what.
    DataChanged,
}

// ── Snapshot for readers (sent via watch channel) ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSnapshot {
    pub revision: u64,
    pub computed_at: String,
    pub params: OptionParameters,
    pub result: PricingResult,
    pub curves: CurveSet,
}

// ── Messages INTO the engine (bounded channel) ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct EditOutcome {
    /// Fields that actually changed. Empty when the edit was a no-op.
    pub changed: Vec<ParamField>,
    pub snapshot: EngineSnapshot,
}

#[derive(Debug)]
pub enum EngineCommand {
    Apply {
        patch: ParamsPatch,
        reply: Option<oneshot::Sender<EditOutcome>>,
    },
    Reset {
        reply: Option<oneshot::Sender<EditOutcome>>,
    },
    Shutdown,
}

/// Commands a WebSocket client may send as text frames.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "set_params")]
    SetParams(ParamsPatch),
    #[serde(rename = "reset")]
    Reset,
}

impl From<ClientCommand> for EngineCommand {
    fn from(cmd: ClientCommand) -> Self {
        match cmd {
            ClientCommand::SetParams(patch) => EngineCommand::Apply { patch, reply: None },
            ClientCommand::Reset => EngineCommand::Reset { reply: None },
        }
    }
}

// ── Messages OUT of the engine ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Full state. Sent on connect and whenever a client fell behind.
    #[serde(rename = "snapshot")]
    Snapshot(Box<EngineSnapshot>),

    #[serde(rename = "field_changed")]
    FieldChanged {
        revision: u64,
        field: ParamField,
        params: OptionParameters,
    },

    #[serde(rename = "result_changed")]
    ResultChanged { revision: u64, result: PricingResult },

    #[serde(rename = "series_changed")]
    SeriesChanged {
        revision: u64,
        series: SeriesKind,
        points: Vec<SeriesPoint>,
    },

    #[serde(rename = "data_changed")]
    DataChanged { revision: u64, computed_at: String },
}

impl WsMessage {
    /// Render a notification against the snapshot published for it.
    pub fn from_notification(note: Notification, snapshot: &EngineSnapshot) -> Self {
        let revision = snapshot.revision;
        match note {
            Notification::FieldChanged(field) => WsMessage::FieldChanged {
                revision,
                field,
                params: snapshot.params,
            },
            Notification::ResultChanged => WsMessage::ResultChanged {
                revision,
                result: snapshot.result,
            },
            Notification::SeriesChanged(kind) => WsMessage::SeriesChanged {
                revision,
                series: kind,
                points: snapshot.curves.series(kind).to_vec(),
            },
            Notification::DataChanged => WsMessage::DataChanged {
                revision,
                computed_at: snapshot.computed_at.clone(),
            },
        }
    }
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub commands_received: AtomicU64,
    pub edits_applied: AtomicU64,
    pub edits_suppressed: AtomicU64,
    pub recomputes: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            commands_received: AtomicU64::new(0),
            edits_applied: AtomicU64::new(0),
            edits_suppressed: AtomicU64::new(0),
            recomputes: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state (channels, not locks) ──

pub struct AppState {
    // Engine -> readers: latest snapshot (watch = single producer, multi consumer)
    pub snapshot_tx: watch::Sender<EngineSnapshot>,
    pub snapshot_rx: watch::Receiver<EngineSnapshot>,

    // Engine -> WS clients: notification stream
    pub ws_tx: broadcast::Sender<WsMessage>,

    // Routes / WS clients -> Engine: bounded command channel
    pub command_tx: mpsc::Sender<EngineCommand>,

    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(
        initial: EngineSnapshot,
        broadcast_buffer: usize,
        command_tx: mpsc::Sender<EngineCommand>,
    ) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(broadcast_buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        Arc::new(Self {
            snapshot_tx,
            snapshot_rx,
            ws_tx,
            command_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = OptionParameters::default();
        assert_eq!(p.spot, 100.0);
        assert_eq!(p.strike, 100.0);
        assert_eq!(p.risk_free_rate, 0.05);
        assert_eq!(p.volatility, 0.2);
        assert_eq!(p.time_to_expiry, 1.0);
        assert!(p.is_call);
    }

    #[test]
    fn test_patch_rejects_non_finite() {
        let patch = ParamsPatch { volatility: Some(f64::NAN), ..Default::default() };
        assert!(matches!(patch.validate(), Err(EngineError::InvalidInput(_))));

        let patch = ParamsPatch { spot: Some(f64::NEG_INFINITY), ..Default::default() };
        assert!(patch.validate().is_err());

        let patch = ParamsPatch { spot: Some(-5.0), is_call: Some(false), ..Default::default() };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_patch_partial_json() {
        let patch: ParamsPatch = serde_json::from_str(r#"{"strike": 120.0}"#).unwrap();
        assert_eq!(patch.strike, Some(120.0));
        assert_eq!(patch.spot, None);
        assert!(!patch.is_empty());
        assert!(ParamsPatch::default().is_empty());
    }

    #[test]
    fn test_client_command_parse() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"set_params","spot":95.5,"is_call":false}"#).unwrap();
        assert_eq!(
            cmd,
            ClientCommand::SetParams(ParamsPatch {
                spot: Some(95.5),
                is_call: Some(false),
                ..Default::default()
            })
        );

        let cmd: ClientCommand = serde_json::from_str(r#"{"type":"reset"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Reset);

        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"liquidate"}"#).is_err());
    }

    #[test]
    fn test_series_kind_from_str() {
        assert_eq!("gamma".parse::<SeriesKind>().unwrap(), SeriesKind::Gamma);
        assert!("vega".parse::<SeriesKind>().is_err());
    }

    #[test]
    fn test_ws_message_tagging() {
        let snapshot = EngineSnapshot {
            revision: 7,
            computed_at: "2024-01-01T00:00:00+00:00".into(),
            params: OptionParameters::default(),
            result: PricingResult::default(),
            curves: CurveSet {
                price: vec![SeriesPoint { x: 60.0, y: 0.5 }],
                ..CurveSet::default()
            },
        };
        let msg = WsMessage::from_notification(Notification::SeriesChanged(SeriesKind::Price), &snapshot);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "series_changed");
        assert_eq!(json["series"], "price");
        assert_eq!(json["revision"], 7);
        assert_eq!(json["points"][0]["x"], 60.0);

        let msg = WsMessage::from_notification(Notification::FieldChanged(ParamField::RiskFreeRate), &snapshot);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "field_changed");
        assert_eq!(json["field"], "risk_free_rate");

        let json = serde_json::to_value(WsMessage::Snapshot(Box::new(snapshot))).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["revision"], 7);
        assert_eq!(json["curves"]["price"][0]["y"], 0.5);
    }
}
