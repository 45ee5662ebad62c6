//! # Telemetry DAQ Core Library
//!
//! This crate is the core library for the `telemetry_daq` server. It ingests
//! streaming sensor telemetry (timestamped 3-axis readings pushed over
//! persistent TCP connections by many independent devices), keeps a bounded
//! in-memory time series per device, durably logs every accepted batch, and
//! makes the live state observable without ever blocking ingestion on a
//! consumer. Organizing the project as a library keeps the core testable in
//! isolation from the CLI binary and the device-simulator tool.
//!
//! ## Crate Structure
//!
//! - **`config`**: Strongly-typed layered configuration (TOML file,
//!   environment variables, CLI overrides applied by the binary).
//! - **`data`**: The data model (`Reading`), the bounded per-device series,
//!   the shared `DeviceRegistry`, and the durable sink implementations.
//! - **`error`**: The central `TelemetryError` enum and `AppResult` alias.
//! - **`network`**: The wire protocol (framing + payload parsing) and the
//!   TCP listener with its per-connection handlers.
//! - **`notify`**: The bounded best-effort notification queue connecting the
//!   ingestion path to observers.
//! - **`observer`**: The read-only observer facade and the periodic status
//!   reporter.
//! - **`tracing_setup`**: Structured logging initialization.
//! - **`validation`**: Small helpers for validating configuration values.
//!
//! Correctness comes from the registry and its lock; responsiveness comes
//! from the hint queue. The two are deliberately separate: the queue is
//! allowed to drop, the registry is not allowed to lie.

pub mod config;
pub mod data;
pub mod error;
pub mod network;
pub mod notify;
pub mod observer;
pub mod tracing_setup;
pub mod validation;
