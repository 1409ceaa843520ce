//! Core domain logic: market data types, strategies, risk controls, order
//! execution and the engine loop that ties them together.

pub mod bar;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod event;
pub mod executor;
pub mod feed;
pub mod ledger;
pub mod metrics;
pub mod order;
pub mod position;
pub mod report;
pub mod risk;
pub mod signal;
pub mod strategy;
