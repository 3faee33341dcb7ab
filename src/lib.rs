//! backtest-lab: Strategy backtesting and parameter optimization
//!
//! This library provides the core components for:
//! - Event replay from pluggable market data sources
//! - Fill simulation with slippage, fees and position limits
//! - Position tracking with weighted-average or FIFO cost basis
//! - Performance analytics (equity, drawdown, Sharpe, win rate)
//! - Grid, genetic, random and Bayesian parameter search
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod data;
pub mod ledger;
pub mod optimize;
pub mod signal;
pub mod strategy;
pub mod telemetry;
