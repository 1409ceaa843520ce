//! Configuration validation and typed section loading.
//!
//! Every run validates its config up front; the load_* functions then
//! assemble the typed configs the engine components take. Percentage knobs
//! that read as zero mean "disabled" where the type allows it.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::engine::{EngineConfig, HaltPolicy};
use crate::domain::error::TradewindError;
use crate::domain::executor::{ExecutionConfig, RetryPolicy};
use crate::domain::risk::RiskConfig;
use crate::domain::strategy::StrategyConfig;
use crate::ports::config_port::ConfigPort;

pub const MODE_BACKTEST: &str = "backtest";
pub const MODE_PAPER: &str = "paper";
pub const MODE_LIVE: &str = "live";

/// Validate every section a run in the given mode will read.
pub fn validate_run_config(config: &dyn ConfigPort, mode: &str) -> Result<(), TradewindError> {
    validate_trading_config(config)?;
    validate_strategy_config(config)?;
    validate_lookback(config)?;
    validate_risk_config(config)?;
    validate_execution_config(config)?;
    match mode {
        MODE_BACKTEST => validate_backtest_config(config)?,
        MODE_PAPER | MODE_LIVE => {
            validate_feed_config(config)?;
            validate_live_config(config)?;
        }
        other => {
            return Err(TradewindError::ConfigInvalid {
                section: "trading".to_string(),
                key: "mode".to_string(),
                reason: format!("unknown mode '{}'", other),
            })
        }
    }
    Ok(())
}

pub fn validate_trading_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    match config.get_string("trading", "symbol") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(TradewindError::ConfigMissing {
                section: "trading".to_string(),
                key: "symbol".to_string(),
            })
        }
    }
    match config.get_string("trading", "timeframe") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradewindError::ConfigMissing {
            section: "trading".to_string(),
            key: "timeframe".to_string(),
        }),
    }
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    let loaded = load_strategy_config(config);
    // The factory runs the per-variant parameter checks.
    crate::domain::strategy::build_strategy(&loaded).map(|_| ())
}

/// The history window must cover the strategy's warmup, or the run can
/// never produce a signal.
pub fn validate_lookback(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    let strategy = crate::domain::strategy::build_strategy(&load_strategy_config(config))?;
    let default_lookback = EngineConfig::default().lookback;
    let lookback = config.get_int("trading", "lookback", default_lookback as i64) as usize;
    if lookback < strategy.warmup_bars() {
        return Err(TradewindError::ConfigInvalid {
            section: "trading".to_string(),
            key: "lookback".to_string(),
            reason: format!(
                "lookback {} is below the {} bars {} needs to warm up",
                lookback,
                strategy.warmup_bars(),
                strategy.name()
            ),
        });
    }
    Ok(())
}

pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    for key in ["stop_loss_pct", "take_profit_pct", "trailing_distance_pct"] {
        let value = config.get_double("risk", key, 0.0);
        if value < 0.0 {
            return Err(TradewindError::ConfigInvalid {
                section: "risk".to_string(),
                key: key.to_string(),
                reason: format!("{} must be non-negative", key),
            });
        }
    }

    if config.get_bool("risk", "trailing_stop", false)
        && config.get_double("risk", "trailing_distance_pct", 0.0) <= 0.0
    {
        return Err(TradewindError::ConfigInvalid {
            section: "risk".to_string(),
            key: "trailing_distance_pct".to_string(),
            reason: "trailing_stop requires a positive trailing_distance_pct".to_string(),
        });
    }

    let max_dd = config.get_double("risk", "max_drawdown_pct", 0.0);
    if max_dd < 0.0 || max_dd >= 1.0 {
        return Err(TradewindError::ConfigInvalid {
            section: "risk".to_string(),
            key: "max_drawdown_pct".to_string(),
            reason: "max_drawdown_pct must be in [0, 1)".to_string(),
        });
    }

    match config
        .get_string("risk", "halt_policy")
        .unwrap_or_else(|| "stop".to_string())
        .as_str()
    {
        "stop" | "flat" => Ok(()),
        other => Err(TradewindError::ConfigInvalid {
            section: "risk".to_string(),
            key: "halt_policy".to_string(),
            reason: format!("halt_policy must be 'stop' or 'flat', got '{}'", other),
        }),
    }
}

pub fn validate_execution_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    for key in ["slippage_pct", "slippage_jitter_pct", "fee_pct"] {
        let value = config.get_double("execution", key, 0.0);
        if value < 0.0 {
            return Err(TradewindError::ConfigInvalid {
                section: "execution".to_string(),
                key: key.to_string(),
                reason: format!("{} must be non-negative", key),
            });
        }
    }

    let fraction = config.get_double("execution", "max_fill_fraction", 0.1);
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(TradewindError::ConfigInvalid {
            section: "execution".to_string(),
            key: "max_fill_fraction".to_string(),
            reason: "max_fill_fraction must be in (0, 1]".to_string(),
        });
    }

    let position_fraction = config.get_double("execution", "max_position_fraction", 0.5);
    if position_fraction <= 0.0 || position_fraction > 1.0 {
        return Err(TradewindError::ConfigInvalid {
            section: "execution".to_string(),
            key: "max_position_fraction".to_string(),
            reason: "max_position_fraction must be in (0, 1]".to_string(),
        });
    }

    if config.get_int("execution", "max_pending_bars", 5) < 1 {
        return Err(TradewindError::ConfigInvalid {
            section: "execution".to_string(),
            key: "max_pending_bars".to_string(),
            reason: "max_pending_bars must be at least 1".to_string(),
        });
    }
    if config.get_int("execution", "max_retries", 3) < 0 {
        return Err(TradewindError::ConfigInvalid {
            section: "execution".to_string(),
            key: "max_retries".to_string(),
            reason: "max_retries must be non-negative".to_string(),
        });
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    let initial_cash = config.get_double("backtest", "initial_cash", 0.0);
    if initial_cash <= 0.0 {
        return Err(TradewindError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_cash".to_string(),
            reason: "initial_cash must be positive".to_string(),
        });
    }

    match config.get_string("backtest", "data_dir") {
        Some(s) if !s.trim().is_empty() => {}
        _ => {
            return Err(TradewindError::ConfigMissing {
                section: "backtest".to_string(),
                key: "data_dir".to_string(),
            })
        }
    }

    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start >= end {
        return Err(TradewindError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}

pub fn validate_feed_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    if config.get_int("feed", "poll_interval_secs", 10) < 1 {
        return Err(TradewindError::ConfigInvalid {
            section: "feed".to_string(),
            key: "poll_interval_secs".to_string(),
            reason: "poll_interval_secs must be at least 1".to_string(),
        });
    }
    if config.get_int("feed", "max_consecutive_failures", 5) < 1 {
        return Err(TradewindError::ConfigInvalid {
            section: "feed".to_string(),
            key: "max_consecutive_failures".to_string(),
            reason: "max_consecutive_failures must be at least 1".to_string(),
        });
    }
    Ok(())
}

pub fn validate_live_config(config: &dyn ConfigPort) -> Result<(), TradewindError> {
    if config.get_int("live", "max_attempts", 3) < 1 {
        return Err(TradewindError::ConfigInvalid {
            section: "live".to_string(),
            key: "max_attempts".to_string(),
            reason: "max_attempts must be at least 1".to_string(),
        });
    }
    let base = config.get_int("live", "base_delay_ms", 500);
    let cap = config.get_int("live", "max_delay_ms", 10_000);
    if base < 1 || cap < base {
        return Err(TradewindError::ConfigInvalid {
            section: "live".to_string(),
            key: "base_delay_ms".to_string(),
            reason: "delays must satisfy 1 <= base_delay_ms <= max_delay_ms".to_string(),
        });
    }
    if config.get_int("live", "order_timeout_ms", 30_000) < 1 {
        return Err(TradewindError::ConfigInvalid {
            section: "live".to_string(),
            key: "order_timeout_ms".to_string(),
            reason: "order_timeout_ms must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, TradewindError> {
    match value {
        None => Err(TradewindError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            TradewindError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

fn date_to_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight always exists")
        .and_utc()
}

pub fn load_strategy_config(config: &dyn ConfigPort) -> StrategyConfig {
    let defaults = StrategyConfig::default();
    StrategyConfig {
        name: config
            .get_string("strategy", "name")
            .unwrap_or(defaults.name),
        fast_period: config.get_int("strategy", "fast_period", defaults.fast_period as i64)
            as usize,
        slow_period: config.get_int("strategy", "slow_period", defaults.slow_period as i64)
            as usize,
        rsi_period: config.get_int("strategy", "rsi_period", defaults.rsi_period as i64) as usize,
        oversold: config.get_double("strategy", "oversold", defaults.oversold),
        overbought: config.get_double("strategy", "overbought", defaults.overbought),
    }
}

pub fn load_risk_config(config: &dyn ConfigPort) -> RiskConfig {
    let optional = |key: &str| {
        let value = config.get_double("risk", key, 0.0);
        (value > 0.0).then_some(value)
    };
    RiskConfig {
        stop_loss_pct: optional("stop_loss_pct"),
        take_profit_pct: optional("take_profit_pct"),
        trailing_stop: config.get_bool("risk", "trailing_stop", false),
        trailing_distance_pct: config.get_double("risk", "trailing_distance_pct", 0.03),
        trailing_activation_pct: optional("trailing_activation_pct"),
        max_drawdown_pct: optional("max_drawdown_pct"),
    }
}

pub fn load_execution_config(config: &dyn ConfigPort) -> ExecutionConfig {
    let defaults = ExecutionConfig::default();
    ExecutionConfig {
        slippage_pct: config.get_double("execution", "slippage_pct", defaults.slippage_pct),
        slippage_jitter_pct: config.get_double(
            "execution",
            "slippage_jitter_pct",
            defaults.slippage_jitter_pct,
        ),
        slippage_seed: config.get_int("execution", "slippage_seed", defaults.slippage_seed as i64)
            as u64,
        fee_pct: config.get_double("execution", "fee_pct", defaults.fee_pct),
        max_fill_fraction: config.get_double(
            "execution",
            "max_fill_fraction",
            defaults.max_fill_fraction,
        ),
        max_pending_bars: config.get_int(
            "execution",
            "max_pending_bars",
            defaults.max_pending_bars as i64,
        ) as u32,
        max_retries: config.get_int("execution", "max_retries", defaults.max_retries as i64)
            as u32,
    }
}

pub fn load_engine_config(config: &dyn ConfigPort) -> EngineConfig {
    let defaults = EngineConfig::default();
    let halt_policy = match config
        .get_string("risk", "halt_policy")
        .unwrap_or_else(|| "stop".to_string())
        .as_str()
    {
        "flat" => HaltPolicy::Flat,
        _ => HaltPolicy::Stop,
    };
    EngineConfig {
        symbol: config
            .get_string("trading", "symbol")
            .unwrap_or(defaults.symbol),
        max_position_fraction: config.get_double(
            "execution",
            "max_position_fraction",
            defaults.max_position_fraction,
        ),
        allow_short: config.get_bool("trading", "allow_short", defaults.allow_short),
        halt_policy,
        lookback: config.get_int("trading", "lookback", defaults.lookback as i64) as usize,
    }
}

pub fn load_retry_policy(config: &dyn ConfigPort) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: config.get_int("live", "max_attempts", defaults.max_attempts as i64) as u32,
        base_delay: Duration::from_millis(config.get_int(
            "live",
            "base_delay_ms",
            defaults.base_delay.as_millis() as i64,
        ) as u64),
        max_delay: Duration::from_millis(config.get_int(
            "live",
            "max_delay_ms",
            defaults.max_delay.as_millis() as i64,
        ) as u64),
        timeout: Duration::from_millis(config.get_int(
            "live",
            "order_timeout_ms",
            defaults.timeout.as_millis() as i64,
        ) as u64),
    }
}

/// Settings for the `[backtest]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub initial_cash: f64,
    pub data_dir: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub fn load_backtest_settings(
    config: &dyn ConfigPort,
) -> Result<BacktestSettings, TradewindError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    Ok(BacktestSettings {
        initial_cash: config.get_double("backtest", "initial_cash", 10_000.0),
        data_dir: config
            .get_string("backtest", "data_dir")
            .unwrap_or_else(|| "data".to_string()),
        start: date_to_utc(start),
        end: date_to_utc(end),
    })
}

/// Settings for the `[feed]` section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSettings {
    pub poll_interval: Duration,
    pub max_consecutive_failures: u32,
}

pub fn load_feed_settings(config: &dyn ConfigPort) -> FeedSettings {
    FeedSettings {
        poll_interval: Duration::from_secs(
            config.get_int("feed", "poll_interval_secs", 10) as u64
        ),
        max_consecutive_failures: config.get_int("feed", "max_consecutive_failures", 5) as u32,
    }
}
