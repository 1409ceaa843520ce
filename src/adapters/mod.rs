//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report;
pub mod log_notifier;
pub mod paper_exchange;
pub mod polling_feed;
