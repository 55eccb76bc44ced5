use crate::errors::{EngineError, EngineResult};
use crate::state::{
    AppState, EditOutcome, EngineCommand, EngineSnapshot, OptionParameters, ParamsPatch,
    PricingResult, SeriesKind,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;
use tokio::sync::oneshot;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Parse(_) | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::ChannelClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// GET /api/state -- full snapshot (from watch channel, no lock)
pub async fn get_state(
    State(state): State<Arc<AppState>>,
) -> Json<EngineSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/params
pub async fn get_params(
    State(state): State<Arc<AppState>>,
) -> Json<OptionParameters> {
    Json(state.snapshot_rx.borrow().params)
}

/// GET /api/result -- price and Greeks
pub async fn get_result(
    State(state): State<Arc<AppState>>,
) -> Json<PricingResult> {
    Json(state.snapshot_rx.borrow().result)
}

/// GET /api/series/{kind} -- one plot series
pub async fn get_series(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> EngineResult<Json<serde_json::Value>> {
    let kind: SeriesKind = kind.parse()?;
    let (revision, points) = {
        let snapshot = state.snapshot_rx.borrow();
        (snapshot.revision, snapshot.curves.series(kind).to_vec())
    };
    Ok(Json(serde_json::json!({
        "series": kind,
        "revision": revision,
        "points": points,
    })))
}

/// POST /api/params -- partial edit; replies with what changed and the new snapshot
pub async fn post_params(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ParamsPatch>,
) -> EngineResult<Json<EditOutcome>> {
    patch.validate()?;
    let outcome = submit(&state, |reply| EngineCommand::Apply {
        patch,
        reply: Some(reply),
    })
    .await?;
    Ok(Json(outcome))
}

/// POST /api/reset
pub async fn post_reset(
    State(state): State<Arc<AppState>>,
) -> EngineResult<Json<EditOutcome>> {
    let outcome = submit(&state, |reply| EngineCommand::Reset { reply: Some(reply) }).await?;
    Ok(Json(outcome))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "commands_received": state.counters.commands_received.load(Relaxed),
        "edits_applied": state.counters.edits_applied.load(Relaxed),
        "edits_suppressed": state.counters.edits_suppressed.load(Relaxed),
        "recomputes": state.counters.recomputes.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}

/// Hand a command to the engine task and wait for its reply.
async fn submit(
    state: &AppState,
    make: impl FnOnce(oneshot::Sender<EditOutcome>) -> EngineCommand,
) -> EngineResult<EditOutcome> {
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .command_tx
        .send(make(reply_tx))
        .await
        .map_err(|_| EngineError::ChannelClosed("engine command channel".into()))?;
    reply_rx
        .await
        .map_err(|_| EngineError::ChannelClosed("engine dropped reply".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::curves::NUM_POINTS;
    use crate::engine::task::run_engine;
    use crate::engine::OptionEngine;
    use crate::server::api_router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn spawn_app() -> (Router, Arc<AppState>) {
        let (tx, rx) = mpsc::channel(16);
        let engine = OptionEngine::new();
        let state = AppState::new(engine.snapshot(), 64, tx);
        tokio::spawn(run_engine(engine, state.clone(), rx));
        (api_router(state.clone()), state)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_state_defaults() {
        let (app, _) = spawn_app();
        let (status, json) = call(&app, get("/api/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["revision"], 1);
        assert_eq!(json["params"]["spot"], 100.0);
        assert_eq!(json["params"]["is_call"], true);
        let price = json["result"]["price"].as_f64().unwrap();
        assert!((price - 10.45).abs() < 0.01);
        assert_eq!(json["curves"]["price"].as_array().unwrap().len(), NUM_POINTS + 1);
    }

    #[tokio::test]
    async fn test_params_and_result_endpoints() {
        let (app, _) = spawn_app();
        let (_, params) = call(&app, get("/api/params")).await;
        assert_eq!(params["risk_free_rate"], 0.05);
        assert_eq!(params["time_to_expiry"], 1.0);

        let (_, result) = call(&app, get("/api/result")).await;
        let delta = result["delta"].as_f64().unwrap();
        assert!((delta - 0.637).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_post_params_clamps_and_suppresses() {
        let (app, state) = spawn_app();

        let (status, json) = call(&app, post_json("/api/params", r#"{"spot": -5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed"], serde_json::json!(["spot"]));
        assert_eq!(json["snapshot"]["params"]["spot"], 0.01);
        assert_eq!(json["snapshot"]["revision"], 2);

        let (status, json) = call(&app, post_json("/api/params", r#"{"spot": -5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed"], serde_json::json!([]));
        assert_eq!(json["snapshot"]["revision"], 2);

        let (_, counters) = call(&app, get("/api/counters")).await;
        assert_eq!(counters["edits_applied"], 1);
        assert_eq!(counters["edits_suppressed"], 1);
        assert_eq!(state.snapshot_rx.borrow().params.spot, 0.01);
    }

    #[tokio::test]
    async fn test_zero_vol_edit() {
        let (app, _) = spawn_app();
        let (_, json) = call(&app, post_json("/api/params", r#"{"volatility": 0}"#)).await;
        assert_eq!(json["snapshot"]["params"]["volatility"], 0.01);
        let price = json["snapshot"]["result"]["price"].as_f64().unwrap();
        let intrinsic = 100.0 - 100.0 * (-0.05_f64).exp();
        assert!((price - intrinsic).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_series_endpoint() {
        let (app, _) = spawn_app();
        let (status, json) = call(&app, get("/api/series/delta")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["series"], "delta");
        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), NUM_POINTS + 1);
        assert_eq!(points[0]["x"], 60.0);

        let (status, json) = call(&app, get("/api/series/vega")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("vega"));
    }

    #[tokio::test]
    async fn test_reset_endpoint() {
        let (app, _) = spawn_app();
        call(
            &app,
            post_json("/api/params", r#"{"strike": 130, "is_call": false, "risk_free_rate": -0.01}"#),
        )
        .await;

        let (status, json) = call(&app, post_json("/api/reset", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["changed"].as_array().unwrap().len(), 6);
        assert_eq!(json["snapshot"]["params"]["strike"], 100.0);
        assert_eq!(json["snapshot"]["params"]["is_call"], true);

        let fresh = serde_json::to_value(OptionEngine::new().snapshot()).unwrap();
        assert_eq!(json["snapshot"]["result"], fresh["result"]);
        assert_eq!(json["snapshot"]["curves"], fresh["curves"]);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let (app, _) = spawn_app();
        let (status, _) = call(&app, post_json("/api/params", r#"{"spot": "#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, json) = call(&app, get("/api/state")).await;
        assert_eq!(json["revision"], 1);
    }

    #[tokio::test]
    async fn test_engine_gone_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let state = AppState::new(OptionEngine::new().snapshot(), 8, tx);
        let app = api_router(state);

        let (status, json) = call(&app, post_json("/api/params", r#"{"spot": 90}"#)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(json["error"].as_str().unwrap().contains("channel closed"));
    }
}
