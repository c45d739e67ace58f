//! Configuration validation.
//!
//! Runs before any bar is processed; every failure names the INI section and
//! key it came from.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::PulltraderError;
use crate::domain::exit::{ExitRules, ExitStrategy, TrailDistance, TrailingBracket};
use crate::domain::scanner::{BreakoutParams, PullbackParams, ScannerConfig};
use crate::domain::strategy::StrategyConfig;

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), PulltraderError> {
    validate_initial_capital(config)?;
    validate_costs(config)?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &StrategyConfig) -> Result<(), PulltraderError> {
    validate_sizing(config)?;
    match &config.scanner {
        ScannerConfig::Breakout(p) => validate_breakout(p)?,
        ScannerConfig::PullbackReversal(p) => validate_pullback(p)?,
    }
    validate_exit(&config.exit)?;
    validate_journal(config)?;
    if config.regime_sma_period == 0 {
        return Err(PulltraderError::invalid(
            "scanner",
            "regime_sma_period",
            "regime_sma_period must be at least 1",
        ));
    }
    Ok(())
}

fn validate_initial_capital(config: &BacktestConfig) -> Result<(), PulltraderError> {
    if !(config.initial_capital > 0.0) {
        return Err(PulltraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_costs(config: &BacktestConfig) -> Result<(), PulltraderError> {
    let exec = &config.execution;
    for (key, value) in [
        ("commission_per_trade", exec.commission_per_trade),
        ("commission_pct", exec.commission_pct),
        ("slippage_pct", exec.slippage_pct),
    ] {
        if !(value >= 0.0) {
            return Err(PulltraderError::invalid(
                "backtest",
                key,
                format!("{key} must be non-negative"),
            ));
        }
    }
    Ok(())
}

fn validate_dates(config: &BacktestConfig) -> Result<(), PulltraderError> {
    if let (Some(start), Some(end)) = (config.start_date, config.end_date)
        && start > end
    {
        return Err(PulltraderError::invalid(
            "backtest",
            "start_date",
            format!("start_date {start} is after end_date {end}"),
        ));
    }
    Ok(())
}

fn validate_fraction(section: &str, key: &str, value: f64) -> Result<(), PulltraderError> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(PulltraderError::invalid(
            section,
            key,
            format!("{key} must be in (0, 1], got {value}"),
        ));
    }
    Ok(())
}

fn validate_positive(section: &str, key: &str, value: f64) -> Result<(), PulltraderError> {
    if !(value > 0.0) {
        return Err(PulltraderError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn validate_count(section: &str, key: &str, value: usize) -> Result<(), PulltraderError> {
    if value == 0 {
        return Err(PulltraderError::invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

fn validate_sizing(config: &StrategyConfig) -> Result<(), PulltraderError> {
    let sizing = &config.sizing;
    validate_fraction("sizing", "position_size", sizing.position_size)?;
    validate_count("sizing", "max_positions", sizing.max_positions)?;
    for (grade, fraction) in &sizing.grade_fractions {
        let key = format!("grade_{}", grade.to_string().to_lowercase().replace('+', "_plus"));
        validate_fraction("sizing", &key, *fraction)?;
    }
    Ok(())
}

fn validate_breakout(p: &BreakoutParams) -> Result<(), PulltraderError> {
    const S: &str = "scanner";
    validate_count(S, "high_lookback", p.high_lookback)?;
    validate_count(S, "min_base_days", p.min_base_days)?;
    validate_count(S, "volume_lookback", p.volume_lookback)?;
    validate_count(S, "rs_lookback", p.rs_lookback)?;
    if p.min_base_days > p.max_base_days {
        return Err(PulltraderError::invalid(
            S,
            "min_base_days",
            format!(
                "min_base_days ({}) exceeds max_base_days ({})",
                p.min_base_days, p.max_base_days
            ),
        ));
    }
    validate_positive(S, "max_base_volatility_pct", p.max_base_volatility_pct)?;
    validate_positive(S, "volume_ratio", p.volume_ratio)?;
    if !(p.max_distance_from_high_pct >= 0.0) {
        return Err(PulltraderError::invalid(
            S,
            "max_distance_from_high_pct",
            "max_distance_from_high_pct must be non-negative",
        ));
    }
    Ok(())
}

fn validate_pullback(p: &PullbackParams) -> Result<(), PulltraderError> {
    const S: &str = "scanner";
    if p.window_start >= p.window_end {
        return Err(PulltraderError::invalid(
            S,
            "window_start",
            format!(
                "entry window {}-{} is empty",
                p.window_start.format("%H:%M"),
                p.window_end.format("%H:%M")
            ),
        ));
    }
    if !(0.0..1.0).contains(&p.min_close_location) {
        return Err(PulltraderError::invalid(
            S,
            "min_close_location",
            "min_close_location must be in [0, 1)",
        ));
    }
    validate_count(S, "trend_sma_period", p.trend_sma_period)?;
    if !(p.full_volume_ratio > 1.0) {
        return Err(PulltraderError::invalid(
            S,
            "full_volume_ratio",
            "full_volume_ratio must be greater than 1",
        ));
    }
    Ok(())
}

fn validate_trailing(key: &str, brackets: &[TrailingBracket]) -> Result<(), PulltraderError> {
    for pair in brackets.windows(2) {
        if pair[1].min_profit_pct <= pair[0].min_profit_pct {
            return Err(PulltraderError::invalid(
                "exit",
                key,
                "trailing brackets must be in increasing profit order",
            ));
        }
    }
    for bracket in brackets {
        let distance = match bracket.distance {
            TrailDistance::AtrMultiple(k) => k,
            TrailDistance::Percent(p) => p,
        };
        validate_positive("exit", key, distance)?;
    }
    Ok(())
}

fn validate_rules(rules: &ExitRules) -> Result<(), PulltraderError> {
    validate_positive("exit", "atr_stop_multiple", rules.atr_stop_multiple)?;
    validate_trailing("trailing", &rules.trailing)?;
    if let Some(days) = rules.max_hold_days {
        validate_count("exit", "max_hold_days", days)?;
    }
    Ok(())
}

fn validate_exit(exit: &ExitStrategy) -> Result<(), PulltraderError> {
    validate_rules(exit.rules())?;
    if let ExitStrategy::Scaled {
        levels,
        post_scale_trailing,
        ..
    } = exit
    {
        if levels.is_empty() {
            return Err(PulltraderError::invalid(
                "exit",
                "scale_levels",
                "scaled exits need at least one level",
            ));
        }
        for pair in levels.windows(2) {
            if pair[1].profit_pct <= pair[0].profit_pct {
                return Err(PulltraderError::invalid(
                    "exit",
                    "scale_levels",
                    "scale levels must be in increasing profit order",
                ));
            }
        }
        for level in levels {
            validate_positive("exit", "scale_levels", level.profit_pct)?;
            validate_fraction("exit", "scale_levels", level.fraction)?;
        }
        validate_trailing("post_scale_trailing", post_scale_trailing)?;
    }
    Ok(())
}

fn validate_journal(config: &StrategyConfig) -> Result<(), PulltraderError> {
    for bucket in &config.journal.time_buckets {
        if bucket.start >= bucket.end {
            return Err(PulltraderError::invalid(
                "journal",
                "time_buckets",
                format!("bucket {} has an empty range", bucket.label),
            ));
        }
    }
    Ok(())
}
