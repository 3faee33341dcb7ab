//! Integration tests for backtest-lab

mod common;
mod config_test;
mod engine_test;
mod optimizer_test;
