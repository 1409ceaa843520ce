//! Tradewind: a deterministic backtesting and paper-trading execution core.
//!
//! The crate is split into three layers. `domain` holds the engine, ledger,
//! risk manager, strategies and simulated executor. `ports` defines the
//! traits the domain depends on (config, data, exchange, events, reports).
//! `adapters` provides concrete implementations of those ports.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
