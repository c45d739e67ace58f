//! Performance statistics computed from a trade journal.
//!
//! Everything here is a pure function of the journal rows; nothing reads the
//! portfolio or bar data. Undefined ratios are reported as NaN, which the JSON
//! summary writes as `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::MetricsError;
use super::exit::ExitReason;
use super::journal::{NoTradeReason, TradeRecord};
use super::position::PositionId;
use super::signal::SetupGrade;

/// Two-sided 95% normal quantile.
const Z_95: f64 = 1.96;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityTercile {
    Low,
    Mid,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

/// Statistics for one slice of trades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub trades: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub expectancy_r: f64,
    pub net_pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub days: usize,
    pub no_trade_days: usize,
    pub no_trade_reasons: BTreeMap<NoTradeReason, usize>,
    pub entered_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub expectancy_r: f64,
    pub expectancy_ci95: Option<ConfidenceInterval>,
    pub profit_factor: f64,
    pub gross_pnl: f64,
    pub net_pnl: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
    pub max_consecutive_losses: usize,
    pub avg_hold_days: f64,
    pub avg_mae_r: f64,
    pub avg_mfe_r: f64,
    pub mfe_capture: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
    pub by_time_bucket: BTreeMap<String, BucketStats>,
    pub by_volatility: BTreeMap<VolatilityTercile, BucketStats>,
    pub by_grade: BTreeMap<SetupGrade, BucketStats>,
}

/// An entered trade with a known outcome.
#[derive(Debug, Clone, Copy)]
struct Closed<'a> {
    record: &'a TradeRecord,
    r: f64,
    net: f64,
}

fn nan_if_undefined(value: Result<f64, MetricsError>) -> f64 {
    value.unwrap_or(f64::NAN)
}

fn mean(values: &[f64], metric: &str) -> Result<f64, MetricsError> {
    if values.is_empty() {
        return Err(MetricsError::Undefined {
            metric: metric.to_string(),
            reason: "no trades".to_string(),
        });
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean R-multiple.
pub fn expectancy(r_multiples: &[f64]) -> Result<f64, MetricsError> {
    mean(r_multiples, "expectancy")
}

/// Gross winning net P&L over gross losing net P&L.
pub fn profit_factor(net_pnls: &[f64]) -> Result<f64, MetricsError> {
    let wins: f64 = net_pnls.iter().filter(|p| **p > 0.0).sum();
    let losses: f64 = net_pnls.iter().filter(|p| **p <= 0.0).map(|p| p.abs()).sum();
    if losses <= 0.0 {
        return Err(MetricsError::Undefined {
            metric: "profit_factor".to_string(),
            reason: "no losing P&L".to_string(),
        });
    }
    Ok(wins / losses)
}

/// Normal-approximation 95% interval on the mean R; needs two trades.
pub fn expectancy_ci95(r_multiples: &[f64]) -> Option<ConfidenceInterval> {
    let n = r_multiples.len();
    if n < 2 {
        return None;
    }
    let m = r_multiples.iter().sum::<f64>() / n as f64;
    let variance = r_multiples.iter().map(|r| (r - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    let half = Z_95 * variance.sqrt() / (n as f64).sqrt();
    Some(ConfidenceInterval {
        low: m - half,
        high: m + half,
    })
}

/// Peak-to-trough drop of cumulative P&L, starting from a peak of zero.
/// Zero or negative.
pub fn max_drawdown(pnls: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for pnl in pnls {
        cumulative += pnl;
        peak = peak.max(cumulative);
        worst = worst.min(cumulative - peak);
    }
    worst
}

/// Longest run of trades with net P&L of zero or less.
pub fn max_consecutive_losses(pnls: &[f64]) -> usize {
    let mut run = 0;
    let mut longest = 0;
    for pnl in pnls {
        if *pnl <= 0.0 {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

fn bucket_stats(trades: &[Closed<'_>]) -> BucketStats {
    let wins = trades.iter().filter(|t| t.record.is_win()).count();
    let rs: Vec<f64> = trades.iter().map(|t| t.r).collect();
    BucketStats {
        trades: trades.len(),
        wins,
        win_rate: if trades.is_empty() {
            f64::NAN
        } else {
            wins as f64 / trades.len() as f64
        },
        expectancy_r: nan_if_undefined(expectancy(&rs)),
        net_pnl: trades.iter().map(|t| t.net).sum(),
    }
}

fn group_by<K: Ord>(
    trades: &[Closed<'_>],
    key: impl Fn(&Closed<'_>) -> Option<K>,
) -> BTreeMap<K, BucketStats> {
    let mut groups: BTreeMap<K, Vec<Closed<'_>>> = BTreeMap::new();
    for trade in trades {
        if let Some(k) = key(trade) {
            groups.entry(k).or_default().push(*trade);
        }
    }
    groups
        .into_iter()
        .map(|(k, group)| (k, bucket_stats(&group)))
        .collect()
}

/// Rank-based volatility terciles over `atr_pct_of_price`.
fn volatility_terciles(trades: &[Closed<'_>]) -> BTreeMap<PositionId, VolatilityTercile> {
    let mut ranked: Vec<(f64, PositionId)> = trades
        .iter()
        .filter_map(|t| Some((t.record.atr_pct_of_price?, t.record.trade_id?)))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let n = ranked.len();
    ranked
        .into_iter()
        .enumerate()
        .map(|(rank, (_, id))| {
            let tercile = match rank * 3 / n {
                0 => VolatilityTercile::Low,
                1 => VolatilityTercile::Mid,
                _ => VolatilityTercile::High,
            };
            (id, tercile)
        })
        .collect()
}

impl Summary {
    pub fn compute(records: &[TradeRecord]) -> Self {
        let mut no_trade_reasons: BTreeMap<NoTradeReason, usize> = BTreeMap::new();
        for reason in records.iter().filter_map(|r| r.no_trade_reason) {
            *no_trade_reasons.entry(reason).or_default() += 1;
        }

        let mut closed: Vec<Closed<'_>> = records
            .iter()
            .filter(|r| r.entered)
            .filter_map(|record| {
                Some(Closed {
                    record,
                    r: record.r_multiple?,
                    net: record.net_pnl?,
                })
            })
            .collect();
        closed.sort_by(|a, b| {
            a.record
                .exit_time
                .cmp(&b.record.exit_time)
                .then(a.record.trade_id.cmp(&b.record.trade_id))
        });

        let rs: Vec<f64> = closed.iter().map(|t| t.r).collect();
        let nets: Vec<f64> = closed.iter().map(|t| t.net).collect();
        let win_pnls: Vec<f64> = closed
            .iter()
            .filter(|t| t.record.is_win())
            .map(|t| t.net)
            .collect();
        let loss_pnls: Vec<f64> = closed
            .iter()
            .filter(|t| t.record.is_loss())
            .map(|t| t.net)
            .collect();
        let maes: Vec<f64> = closed.iter().filter_map(|t| t.record.mae_r).collect();
        let mfes: Vec<f64> = closed.iter().filter_map(|t| t.record.mfe_r).collect();
        let holds: Vec<f64> = closed
            .iter()
            .filter_map(|t| t.record.hold_days.map(|d| d as f64))
            .collect();

        let expectancy_r = nan_if_undefined(expectancy(&rs));
        let avg_mfe_r = nan_if_undefined(mean(&mfes, "avg_mfe_r"));
        let mfe_capture = if avg_mfe_r > 0.0 {
            expectancy_r / avg_mfe_r
        } else {
            f64::NAN
        };

        let mut exit_reasons: BTreeMap<ExitReason, usize> = BTreeMap::new();
        for reason in closed.iter().filter_map(|t| t.record.exit_reason) {
            *exit_reasons.entry(reason).or_default() += 1;
        }

        let terciles = volatility_terciles(&closed);

        Summary {
            days: records.len(),
            no_trade_days: records.iter().filter(|r| !r.entered).count(),
            no_trade_reasons,
            entered_trades: records.iter().filter(|r| r.entered).count(),
            wins: win_pnls.len(),
            losses: loss_pnls.len(),
            win_rate: if closed.is_empty() {
                f64::NAN
            } else {
                win_pnls.len() as f64 / closed.len() as f64
            },
            expectancy_r,
            expectancy_ci95: expectancy_ci95(&rs),
            profit_factor: nan_if_undefined(profit_factor(&nets)),
            gross_pnl: closed.iter().filter_map(|t| t.record.gross_pnl).sum(),
            net_pnl: nets.iter().sum(),
            avg_win: nan_if_undefined(mean(&win_pnls, "avg_win")),
            avg_loss: nan_if_undefined(mean(&loss_pnls, "avg_loss")),
            largest_win: win_pnls.iter().copied().fold(0.0, f64::max),
            largest_loss: loss_pnls.iter().copied().fold(0.0, f64::min),
            max_drawdown: max_drawdown(&nets),
            max_consecutive_losses: max_consecutive_losses(&nets),
            avg_hold_days: nan_if_undefined(mean(&holds, "avg_hold_days")),
            avg_mae_r: nan_if_undefined(mean(&maes, "avg_mae_r")),
            avg_mfe_r,
            mfe_capture,
            exit_reasons,
            by_time_bucket: group_by(&closed, |t| t.record.entry_bucket.clone()),
            by_volatility: group_by(&closed, |t| {
                t.record.trade_id.and_then(|id| terciles.get(&id).copied())
            }),
            by_grade: group_by(&closed, |t| t.record.setup_grade),
        }
    }
}
