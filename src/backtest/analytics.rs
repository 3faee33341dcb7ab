//! Backtest analytics and reporting

use super::{EngineState, TradeRecord};
use crate::strategy::ParameterSet;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading periods per year used to annualize the Sharpe ratio
const PERIODS_PER_YEAR: f64 = 252.0;

/// Complete backtest results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Strategy name
    pub strategy_name: String,
    /// Primary symbol
    pub symbol: String,
    /// Requested start time (ms)
    pub start_time: i64,
    /// Requested end time (ms)
    pub end_time: i64,
    /// Starting capital
    pub initial_balance: Decimal,
    /// Capital after realized, unrealized and fees
    pub final_balance: Decimal,
    /// (final - initial) / initial
    pub total_return: f64,
    /// Largest fractional decline from an equity peak
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio over per-trade returns
    pub sharpe_ratio: f64,
    /// Winning trades / total trades
    pub win_rate: f64,
    /// |sum of wins / sum of losses|
    pub profit_factor: f64,
    /// Number of fills
    pub trade_count: usize,
    /// Fills with positive realized P&L
    pub win_count: usize,
    /// Fills with negative realized P&L
    pub lose_count: usize,
    /// Mean P&L of winning fills
    pub avg_win: Decimal,
    /// Mean P&L of losing fills (negative)
    pub avg_lose: Decimal,
    /// Fees paid
    pub total_fees: Decimal,
    /// Strategy parameters used for the run
    pub parameters: ParameterSet,
    /// State the engine ended in
    pub final_state: EngineState,
    /// Every fill, in execution order
    pub trades: Vec<TradeRecord>,
}

/// Point on the equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurvePoint {
    /// Timestamp (ns)
    pub timestamp: i64,
    /// Equity after the trade
    pub equity: Decimal,
    /// (equity - initial) / initial
    pub cumulative_return: f64,
}

/// Point on the drawdown curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    /// Timestamp (ns)
    pub timestamp: i64,
    /// Highest equity so far
    pub peak: Decimal,
    /// (peak - equity) / peak
    pub drawdown: f64,
}

/// Pure performance calculations over a trade list
pub struct PerformanceAnalyzer;

impl PerformanceAnalyzer {
    /// Winning trades / total trades (0 with no trades)
    pub fn win_rate(trades: &[TradeRecord]) -> f64 {
        if trades.is_empty() {
            return 0.0;
        }
        let wins = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
        wins as f64 / trades.len() as f64
    }

    /// |sum of wins / sum of losses| (0 with no losses)
    pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
        let gross_profit: Decimal = trades
            .iter()
            .filter(|t| t.pnl > Decimal::ZERO)
            .map(|t| t.pnl)
            .sum();
        let gross_loss: Decimal = trades
            .iter()
            .filter(|t| t.pnl < Decimal::ZERO)
            .map(|t| t.pnl)
            .sum();

        if gross_loss.is_zero() {
            return 0.0;
        }
        // A tiny total loss can overflow the quotient
        gross_profit
            .checked_div(gross_loss)
            .and_then(|pf| pf.abs().to_f64())
            .unwrap_or(0.0)
    }

    /// Equity after each trade, starting with the initial balance
    ///
    /// Returns `trades.len() + 1` points, or none when there are no trades.
    pub fn equity_curve(trades: &[TradeRecord], initial_balance: Decimal) -> Vec<EquityCurvePoint> {
        let Some(first) = trades.first() else {
            return vec![];
        };

        let point = |timestamp: i64, equity: Decimal| EquityCurvePoint {
            timestamp,
            equity,
            cumulative_return: ratio(equity - initial_balance, initial_balance),
        };

        let mut curve = Vec::with_capacity(trades.len() + 1);
        curve.push(point(first.timestamp, initial_balance));

        let mut equity = initial_balance;
        for trade in trades {
            equity += trade.pnl;
            curve.push(point(trade.timestamp, equity));
        }
        curve
    }

    /// Fractional decline from the running peak at every equity point
    pub fn drawdown_curve(equity: &[EquityCurvePoint]) -> Vec<DrawdownPoint> {
        let mut peak = match equity.first() {
            Some(p) => p.equity,
            None => return vec![],
        };

        equity
            .iter()
            .map(|p| {
                peak = peak.max(p.equity);
                let drawdown = if peak > Decimal::ZERO {
                    ratio(peak - p.equity, peak).max(0.0)
                } else {
                    0.0
                };
                DrawdownPoint {
                    timestamp: p.timestamp,
                    peak,
                    drawdown,
                }
            })
            .collect()
    }

    /// Largest value on the drawdown curve
    pub fn max_drawdown(trades: &[TradeRecord], initial_balance: Decimal) -> f64 {
        let equity = Self::equity_curve(trades, initial_balance);
        Self::drawdown_curve(&equity)
            .iter()
            .map(|d| d.drawdown)
            .fold(0.0, f64::max)
    }

    /// Per-trade value returns `(v_i - v_{i-1}) / v_{i-1}`, `v = price * quantity`
    ///
    /// Pairs with a zero-valued predecessor, or whose quotient overflows, are
    /// skipped.
    pub fn trade_returns(trades: &[TradeRecord]) -> Vec<f64> {
        trades
            .windows(2)
            .filter_map(|w| {
                let prev = w[0].value();
                if prev.is_zero() {
                    return None;
                }
                (w[1].value() - prev).checked_div(prev)?.to_f64()
            })
            .collect()
    }

    /// Annualized Sharpe ratio of per-trade returns
    ///
    /// Zero with fewer than two returns, zero deviation, or a non-finite value.
    pub fn sharpe_ratio(trades: &[TradeRecord]) -> f64 {
        let returns = Self::trade_returns(trades);
        if returns.len() < 2 {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return 0.0;
        }

        let sharpe = mean / std_dev * PERIODS_PER_YEAR.sqrt();
        if sharpe.is_finite() {
            sharpe
        } else {
            0.0
        }
    }

    /// Mean P&L of winning trades
    pub fn avg_win(trades: &[TradeRecord]) -> Decimal {
        mean(trades.iter().map(|t| t.pnl).filter(|p| *p > Decimal::ZERO))
    }

    /// Mean P&L of losing trades (negative)
    pub fn avg_lose(trades: &[TradeRecord]) -> Decimal {
        mean(trades.iter().map(|t| t.pnl).filter(|p| *p < Decimal::ZERO))
    }

    /// Fill every trade-derived field of a result
    pub fn populate(result: &mut BacktestResult) {
        let trades = &result.trades;
        result.trade_count = trades.len();
        result.win_count = trades.iter().filter(|t| t.pnl > Decimal::ZERO).count();
        result.lose_count = trades.iter().filter(|t| t.pnl < Decimal::ZERO).count();
        result.win_rate = Self::win_rate(trades);
        result.profit_factor = Self::profit_factor(trades);
        result.max_drawdown = Self::max_drawdown(trades, result.initial_balance);
        result.sharpe_ratio = Self::sharpe_ratio(trades);
        result.avg_win = Self::avg_win(trades);
        result.avg_lose = Self::avg_lose(trades);
        result.total_fees = trades.iter().map(|t| t.fee).sum();
        result.total_return = ratio(
            result.final_balance - result.initial_balance,
            result.initial_balance,
        );
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    numerator
        .checked_div(denominator)
        .and_then(|q| q.to_f64())
        .unwrap_or(0.0)
}

fn mean(values: impl Iterator<Item = Decimal>) -> Decimal {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(count)
    }
}

impl BacktestResult {
    /// Net change in balance
    pub fn net_pnl(&self) -> Decimal {
        self.final_balance - self.initial_balance
    }

    /// Equity curve derived from the trade list
    pub fn equity_curve(&self) -> Vec<EquityCurvePoint> {
        PerformanceAnalyzer::equity_curve(&self.trades, self.initial_balance)
    }

    /// Drawdown curve derived from the trade list
    pub fn drawdown_curve(&self) -> Vec<DrawdownPoint> {
        PerformanceAnalyzer::drawdown_curve(&self.equity_curve())
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               BACKTEST RESULTS
══════════════════════════════════════════════════════
Strategy:         {} ({})
Final State:      {}

PERFORMANCE
───────────────────────────────────────────────────────
Initial Balance:  {:.2}
Final Balance:    {:.2}
Net P&L:          {:+.2} ({:+.2}%)
Sharpe Ratio:     {:.2}
Max Drawdown:     {:.2}%
Win Rate:         {:.1}%
Profit Factor:    {:.2}

ACTIVITY
───────────────────────────────────────────────────────
Total Trades:     {} ({} won / {} lost)
Avg Win:          {:.2}
Avg Loss:         {:.2}
Fees Paid:        {:.2}
══════════════════════════════════════════════════════
"#,
            self.strategy_name,
            self.symbol,
            self.final_state,
            self.initial_balance,
            self.final_balance,
            self.net_pnl(),
            self.total_return * 100.0,
            self.sharpe_ratio,
            self.max_drawdown * 100.0,
            self.win_rate * 100.0,
            self.profit_factor,
            self.trade_count,
            self.win_count,
            self.lose_count,
            self.avg_win,
            self.avg_lose,
            self.total_fees,
        )
    }
}
