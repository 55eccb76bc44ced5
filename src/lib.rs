//! Black-Scholes European option pricing engine with reactive recomputation.
//!
//! Edits go into a parameter store that clamps and de-duplicates them; every
//! accepted edit recomputes price, the five Greeks and the price/delta/gamma
//! plot curves, and reports what changed. The `server` module exposes the
//! engine to a front end over HTTP and WebSocket.

pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod server;
pub mod state;
