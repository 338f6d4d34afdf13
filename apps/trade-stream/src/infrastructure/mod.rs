//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Binance REST discovery, combined stream client and aggTrade decoder.
pub mod binance;

/// Subscriber registry and fan-out.
pub mod broadcast;

/// Replay cache stores (Redis, in-memory).
pub mod cache;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Reconnection backoff policy.
pub mod reconnect;

/// OpenTelemetry tracing integration.
pub mod telemetry;
