//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod regime;
pub mod scanner;
pub mod position;
pub mod exit;
pub mod execution;
pub mod portfolio;
pub mod journal;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod config_validation;
pub mod universe;
pub mod symbol_data;
pub mod error;
