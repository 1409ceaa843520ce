//! Performance metrics over a finished run.

use serde::{Deserialize, Serialize};

use super::ledger::EquitySnapshot;
use super::position::ClosedTrade;

/// Bar periods per year for annualisation, from the configured timeframe.
/// Crypto markets trade continuously, so a day is 24 hours and a year 365
/// days. Unknown timeframes fall back to daily.
pub fn periods_per_year(timeframe: &str) -> f64 {
    match timeframe {
        "1m" => 365.0 * 24.0 * 60.0,
        "5m" => 365.0 * 24.0 * 12.0,
        "15m" => 365.0 * 24.0 * 4.0,
        "30m" => 365.0 * 24.0 * 2.0,
        "1h" => 365.0 * 24.0,
        "4h" => 365.0 * 6.0,
        "1d" => 365.0,
        "1w" => 52.0,
        _ => 365.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[EquitySnapshot],
        trades: &[ClosedTrade],
        initial_cash: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_cash);

        let total_return = if initial_cash > 0.0 {
            (final_equity - initial_cash) / initial_cash
        } else {
            0.0
        };

        let periods = equity_curve.len() as f64;
        let years = periods / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let max_drawdown = equity_curve
            .iter()
            .map(|p| p.drawdown)
            .fold(0.0_f64, f64::max);

        let (sharpe_ratio, sortino_ratio) = risk_adjusted(equity_curve, periods_per_year);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = trades_won + trades_lost + trades_breakeven;
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

fn risk_adjusted(equity_curve: &[EquitySnapshot], periods_per_year: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let sharpe = if stddev > 0.0 {
        (mean / stddev) * periods_per_year.sqrt()
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        (mean / downside_stddev) * periods_per_year.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
