//! Backtest engine and event loop.
//!
//! Every symbol's bars are replayed on one merged timeline. At each timestamp,
//! for the symbols that have a bar there (in symbol order):
//!
//! 1. session bookkeeping and indicator update
//! 2. exits for positions opened on earlier bars
//! 3. admission of pending signals at this bar's open, then an exit review of
//!    the new positions on the same bar
//! 4. scanning for symbols that are flat and have not traded this session
//! 5. mark-to-market and an equity point
//! 6. one journal row for every symbol whose session ends on this bar
//!
//! The run is a pure fold over the inputs: identical inputs give identical
//! journals and summaries.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::domain::config_validation::{validate_backtest_config, validate_strategy_config};
use crate::domain::error::PulltraderError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::exit::{ExitAction, ExitContext};
use crate::domain::indicator::{IndicatorEngine, IndicatorSnapshot, Reading, Sma};
use crate::domain::journal::{NoTradeReason, TradeRecord, complete_records};
use crate::domain::metrics::Summary;
use crate::domain::ohlcv::Bar;
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::Position;
use crate::domain::regime::RegimeFilter;
use crate::domain::scanner::{ScanContext, ScanOutcome, Scanner};
use crate::domain::signal::{Signal, admission_order};
use crate::domain::strategy::{StrategyConfig, read, read_optional};
use crate::domain::symbol_data::{SymbolData, build_unified_timeline};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_date: None,
            end_date: None,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            execution: ExecutionConfig::default(),
        }
    }
}

impl BacktestConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PulltraderError> {
        const S: &str = "backtest";
        Ok(BacktestConfig {
            start_date: read_optional(config, S, "start_date", None)?,
            end_date: read_optional(config, S, "end_date", None)?,
            initial_capital: read(config, S, "initial_capital", DEFAULT_INITIAL_CAPITAL)?,
            execution: ExecutionConfig {
                commission_per_trade: read(config, S, "commission_per_trade", 0.0)?,
                commission_pct: read(config, S, "commission_pct", 0.0)?,
                slippage_pct: read(config, S, "slippage_pct", 0.0)?,
            },
        })
    }
}

/// Where a symbol stands within the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Scanning,
    SignalPending,
    PositionOpen,
    PositionClosed,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub journal: Vec<TradeRecord>,
    pub summary: Summary,
    pub equity_curve: Vec<EquityPoint>,
    pub closed_positions: Vec<Position>,
    pub final_equity: f64,
}

/// How far a setup got. When a session sees several no-trade reasons, the
/// furthest one is journaled.
fn reason_rank(reason: NoTradeReason) -> u8 {
    match reason {
        NoTradeReason::OutsideWindow => 0,
        NoTradeReason::NotReady => 1,
        NoTradeReason::NoSignal => 2,
        NoTradeReason::TrendFilter => 3,
        NoTradeReason::RegimeFilter => 4,
        NoTradeReason::GradeTooLow => 5,
        NoTradeReason::InsufficientCapital
        | NoTradeReason::MaxPositions
        | NoTradeReason::DuplicateSymbol => 6,
        NoTradeReason::SignalExpired | NoTradeReason::PositionOpen => 7,
    }
}

struct SymbolState<'a> {
    data: &'a SymbolData,
    indicators: IndicatorEngine,
    snapshot: Option<IndicatorSnapshot>,
    scanner: Scanner,
    /// Average of completed session closes, for scanners gated on a daily trend.
    daily_trend: Option<Sma>,
    session: Option<NaiveDate>,
    session_close: Option<f64>,
    phase: SessionPhase,
    held_at_open: bool,
    pending: Option<Signal>,
    reason: Option<NoTradeReason>,
    entry_index: Option<usize>,
    entered: Option<TradeRecord>,
    /// Journal row of an earlier session whose signal is still awaiting admission.
    deferred_row: Option<usize>,
}

impl<'a> SymbolState<'a> {
    fn new(data: &'a SymbolData, strategy: &StrategyConfig) -> Self {
        SymbolState {
            data,
            indicators: IndicatorEngine::new(),
            snapshot: None,
            scanner: Scanner::new(&strategy.scanner),
            daily_trend: strategy.scanner.daily_trend_period().map(Sma::new),
            session: None,
            session_close: None,
            phase: SessionPhase::Scanning,
            held_at_open: false,
            pending: None,
            reason: None,
            entry_index: None,
            entered: None,
            deferred_row: None,
        }
    }

    fn daily_trend(&self) -> Option<Reading> {
        self.daily_trend.as_ref().map(Sma::value)
    }

    fn begin_session(&mut self, bar: &Bar, has_position: bool) {
        if let (Some(sma), Some(close)) = (self.daily_trend.as_mut(), self.session_close.take()) {
            let _ = sma.update(close);
        }
        let session = bar.session();
        let trend = self.daily_trend();
        self.scanner.begin_session(session, bar.open, trend);
        self.session = Some(session);
        self.held_at_open = has_position;
        self.reason = None;
        self.entered = None;
        self.phase = if has_position {
            SessionPhase::PositionOpen
        } else if self.pending.is_some() {
            SessionPhase::SignalPending
        } else {
            SessionPhase::Scanning
        };
    }

    fn note(&mut self, reason: NoTradeReason) {
        let keep = self
            .reason
            .is_some_and(|current| reason_rank(current) > reason_rank(reason));
        if !keep {
            self.reason = Some(reason);
        }
    }

    /// Record the outcome of an admission attempt, either on the deferred row of
    /// the signal's session or on the current session.
    fn settle(&mut self, record: TradeRecord, journal: &mut [TradeRecord]) {
        if let Some(row) = self.deferred_row.take() {
            journal[row] = record;
        } else if record.entered {
            self.entered = Some(record);
        } else if let Some(reason) = record.no_trade_reason {
            self.note(reason);
        }
    }

    fn end_session(&mut self, is_final_bar: bool, journal: &mut Vec<TradeRecord>) {
        let Some(session) = self.session else {
            return;
        };
        let symbol = self.data.symbol.as_str();
        if let Some(signal) = self.pending.take() {
            if signal.session_scoped || is_final_bar {
                journal.push(TradeRecord::no_trade(
                    symbol,
                    session,
                    NoTradeReason::SignalExpired,
                    &signal.context,
                ));
            } else {
                // Settled when the next bar's open decides admission.
                self.deferred_row = Some(journal.len());
                journal.push(TradeRecord::no_trade(
                    symbol,
                    session,
                    NoTradeReason::NoSignal,
                    &signal.context,
                ));
                self.pending = Some(signal);
            }
            return;
        }

        let record = match self.entered.take() {
            Some(record) => record,
            None => {
                let holding = self.held_at_open
                    || matches!(
                        self.phase,
                        SessionPhase::PositionOpen | SessionPhase::PositionClosed
                    );
                let reason = if holding {
                    NoTradeReason::PositionOpen
                } else {
                    self.reason.unwrap_or(NoTradeReason::NoSignal)
                };
                TradeRecord::no_trade(symbol, session, reason, &self.scanner.session_context())
            }
        };
        journal.push(record);
    }
}

/// Review the open position in `state`'s symbol against the bar at `index`.
/// After a scale-out the remainder is reviewed again on the same bar, but only
/// for further levels and closes that do not depend on the moved stop.
fn review_exits(
    state: &mut SymbolState<'_>,
    index: usize,
    portfolio: &mut Portfolio,
    strategy: &StrategyConfig,
    execution: &ExecutionConfig,
) {
    let data = state.data;
    let bar = &data.bars[index];
    let (Some(entry), Some(snapshot)) = (state.entry_index, state.snapshot.as_ref()) else {
        return;
    };
    if !portfolio.has_position(&bar.symbol) {
        return;
    }
    portfolio.track_excursion(bar);

    let ctx = ExitContext {
        bar,
        since_entry: &data.bars[entry..=index],
        indicators: snapshot,
        is_session_last_bar: data.is_session_last(index),
        is_final_bar: index + 1 == data.bars.len(),
    };
    let mut scaled_this_bar = false;
    while let Some(position) = portfolio.get_position(&bar.symbol) {
        let decision = if scaled_this_bar {
            strategy.exit.decide_after_scale_out(position, &ctx)
        } else {
            strategy.exit.decide(position, &ctx)
        };
        if decision.is_hold() {
            break;
        }
        let partial = matches!(decision.action, ExitAction::ClosePartial { .. });
        let Some(fill) = portfolio.apply_exit(&bar.symbol, &decision, bar.timestamp, execution)
        else {
            break;
        };
        debug!(
            symbol = %bar.symbol,
            at = %bar.timestamp,
            reason = %fill.reason,
            shares = fill.shares,
            price = fill.price,
            "exit fill"
        );
        if !partial {
            break;
        }
        scaled_this_bar = true;
    }

    if !portfolio.has_position(&bar.symbol) {
        state.entry_index = None;
        state.phase = SessionPhase::PositionClosed;
    }
}

pub fn run_backtest(
    symbols: &[SymbolData],
    benchmark: Option<&[Bar]>,
    config: &BacktestConfig,
    strategy: &StrategyConfig,
) -> Result<BacktestResult, PulltraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(strategy)?;
    if symbols.iter().all(|s| s.bars.is_empty()) {
        return Err(PulltraderError::Data {
            reason: "no bars to replay".into(),
        });
    }

    let mut ordered: Vec<&SymbolData> = symbols.iter().collect();
    ordered.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    let mut states: Vec<SymbolState<'_>> = ordered
        .into_iter()
        .map(|data| SymbolState::new(data, strategy))
        .collect();

    let timeline = build_unified_timeline(symbols);
    let benchmark = benchmark.unwrap_or(&[]);
    let mut regime = RegimeFilter::new(strategy.regime_sma_period);
    let mut benchmark_cursor = 0;
    let mut portfolio = Portfolio::new(config.initial_capital, strategy.sizing.clone());
    let mut journal: Vec<TradeRecord> = Vec::new();
    let execution = &config.execution;
    let atr_stop_multiple = strategy.exit.rules().atr_stop_multiple;

    info!(
        strategy = %strategy.name(),
        symbols = states.len(),
        timestamps = timeline.len(),
        "starting backtest"
    );

    for &timestamp in &timeline {
        while benchmark_cursor < benchmark.len()
            && benchmark[benchmark_cursor].timestamp <= timestamp
        {
            regime.update(&benchmark[benchmark_cursor]);
            benchmark_cursor += 1;
        }
        let market_regime = regime.current();
        let benchmark_history = &benchmark[..benchmark_cursor];

        let active: Vec<(usize, usize)> = states
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.data.get_bar_index(timestamp).map(|idx| (i, idx)))
            .collect();

        // 1. sessions and indicators
        for &(i, idx) in &active {
            let state = &mut states[i];
            let data = state.data;
            let bar = &data.bars[idx];
            if state.session != Some(bar.session()) {
                portfolio.begin_session(&bar.symbol, bar.session());
                state.begin_session(bar, portfolio.has_position(&bar.symbol));
            }
            state.snapshot = Some(state.indicators.update(bar));
            state.session_close = Some(bar.close);
        }

        // 2. exits for positions opened earlier
        for &(i, idx) in &active {
            review_exits(&mut states[i], idx, &mut portfolio, strategy, execution);
        }

        // 3. admission at the open
        let mut admissions: Vec<(usize, usize, Signal)> = active
            .iter()
            .filter_map(|&(i, idx)| states[i].pending.take().map(|s| (i, idx, s)))
            .collect();
        admissions.sort_by(|a, b| admission_order(&a.2, &b.2));
        for (i, idx, signal) in admissions {
            let state = &mut states[i];
            let data = state.data;
            let bar = &data.bars[idx];
            match portfolio.open(&signal, bar.open, bar.timestamp, execution, atr_stop_multiple) {
                Ok(id) => {
                    let Some(position) = portfolio.get_position(&signal.symbol) else {
                        continue;
                    };
                    debug!(
                        symbol = %signal.symbol,
                        id,
                        grade = %signal.grade,
                        shares = position.initial_shares,
                        price = position.entry_price,
                        stop = position.initial_stop,
                        "entered"
                    );
                    let record = TradeRecord::entered(
                        signal.session(),
                        position,
                        Some(signal.atr / position.entry_price * 100.0),
                        strategy.journal.bucket_for(position.entry_time),
                    );
                    state.settle(record, &mut journal);
                    state.entry_index = Some(idx);
                    state.phase = SessionPhase::PositionOpen;
                    review_exits(state, idx, &mut portfolio, strategy, execution);
                }
                Err(reject) => {
                    debug!(symbol = %signal.symbol, %reject, "signal rejected");
                    let record = TradeRecord::no_trade(
                        &signal.symbol,
                        signal.session(),
                        reject.into(),
                        &signal.context,
                    );
                    state.settle(record, &mut journal);
                    state.phase = SessionPhase::Scanning;
                }
            }
        }

        // 4. scanning
        for &(i, idx) in &active {
            let state = &mut states[i];
            if state.phase != SessionPhase::Scanning {
                continue;
            }
            let data = state.data;
            let Some(snapshot) = state.snapshot.as_ref() else {
                continue;
            };
            let ctx = ScanContext {
                history: &data.bars[..=idx],
                indicators: snapshot,
                regime: market_regime,
                benchmark: benchmark_history,
            };
            match state.scanner.evaluate(&ctx) {
                ScanOutcome::Signal(signal) if signal.grade.is_tradeable() => {
                    debug!(
                        symbol = %signal.symbol,
                        at = %signal.timestamp,
                        score = signal.score,
                        grade = %signal.grade,
                        "signal"
                    );
                    state.pending = Some(signal);
                    state.phase = SessionPhase::SignalPending;
                }
                ScanOutcome::Signal(_) => state.note(NoTradeReason::GradeTooLow),
                ScanOutcome::NoSignal(reason) => state.note(reason),
            }
        }

        // 5. marks and equity
        let bars: Vec<&Bar> = active
            .iter()
            .map(|&(i, idx)| &states[i].data.bars[idx])
            .collect();
        portfolio.mark_to_market(&bars);
        portfolio.record_equity(timestamp);

        // 6. journal
        for &(i, idx) in &active {
            let state = &mut states[i];
            if state.data.is_session_last(idx) {
                let is_final_bar = idx + 1 == state.data.bars.len();
                state.end_session(is_final_bar, &mut journal);
            }
        }
    }

    journal.sort_by(|a, b| {
        a.trade_date
            .cmp(&b.trade_date)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    complete_records(&mut journal, &portfolio.closed);
    let summary = Summary::compute(&journal);
    let final_equity = portfolio.equity();

    info!(
        rows = journal.len(),
        trades = summary.entered_trades,
        net_pnl = summary.net_pnl,
        final_equity,
        "backtest complete"
    );

    Ok(BacktestResult {
        journal,
        summary,
        equity_curve: portfolio.equity_curve,
        closed_positions: portfolio.closed,
        final_equity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::exit::{ExitReason, ExitRules, ExitStrategy, ScaleLevel, StopMode};
    use crate::domain::indicator::test_bars::bar_at;
    use crate::domain::portfolio::SizingConfig;
    use crate::domain::scanner::{BreakoutParams, ScannerConfig};

    fn strategy() -> StrategyConfig {
        StrategyConfig {
            scanner: ScannerConfig::Breakout(BreakoutParams {
                max_base_volatility_pct: 5.0,
                ..BreakoutParams::default()
            }),
            ..StrategyConfig::default()
        }
    }

    /// 40 rising bars, a 20-bar base at 99..101, then a breakout on bar 60.
    fn breakout_bars(symbol: &str) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..40)
            .map(|i| {
                let close = 40.0 + 1.5 * i as f64;
                bar_at(i, close, close + 3.0, close - 3.0, close)
            })
            .collect();
        bars.extend((40..60).map(|i| bar_at(i, 100.0, 101.0, 99.0, 100.0)));
        let mut breakout = bar_at(60, 100.5, 103.5, 100.0, 103.0);
        breakout.volume = 3000;
        bars.push(breakout);
        for bar in &mut bars {
            bar.symbol = symbol.to_string();
        }
        bars
    }

    fn with_tail(symbol: &str, tail: &[(f64, f64, f64, f64)]) -> SymbolData {
        let mut bars = breakout_bars(symbol);
        for (k, &(o, h, l, c)) in tail.iter().enumerate() {
            let mut bar = bar_at(61 + k, o, h, l, c);
            bar.symbol = symbol.to_string();
            bars.push(bar);
        }
        SymbolData::new(symbol.to_string(), bars)
    }

    #[test]
    fn backtest_config_from_ini() {
        let ini = "[backtest]\ninitial_capital = 50000\nslippage_pct = 0.05\n\
                   start_date = 2020-01-02\n";
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let config = BacktestConfig::from_config(&adapter).unwrap();
        assert!((config.initial_capital - 50_000.0).abs() < f64::EPSILON);
        assert!((config.execution.slippage_pct - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2020, 1, 2));
        assert_eq!(config.end_date, None);
    }

    #[test]
    fn backtest_config_rejects_bad_date() {
        let adapter = FileConfigAdapter::from_string("[backtest]\nend_date = 2020/01/02\n").unwrap();
        assert!(matches!(
            BacktestConfig::from_config(&adapter),
            Err(PulltraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn flat_series_journals_every_session() {
        let bars: Vec<Bar> = (0..30).map(|i| bar_at(i, 50.0, 51.0, 49.0, 50.0)).collect();
        let data = SymbolData::new("TEST".into(), bars);
        let result =
            run_backtest(&[data], None, &BacktestConfig::default(), &strategy()).unwrap();

        assert_eq!(result.journal.len(), 30);
        assert!(result.journal.iter().all(|r| !r.entered));
        assert_eq!(
            result.journal[0].no_trade_reason,
            Some(NoTradeReason::NotReady)
        );
        assert_eq!(result.equity_curve.len(), 30);
        assert!((result.final_equity - DEFAULT_INITIAL_CAPITAL).abs() < f64::EPSILON);
    }

    #[test]
    fn breakout_enters_next_open_and_stops_out() {
        let data = with_tail(
            "QQQ",
            &[(103.2, 104.0, 102.5, 103.5), (95.0, 96.0, 90.0, 91.0)],
        );
        let result =
            run_backtest(&[data], None, &BacktestConfig::default(), &strategy()).unwrap();

        assert_eq!(result.journal.len(), 63);
        let entered: Vec<&TradeRecord> = result.journal.iter().filter(|r| r.entered).collect();
        assert_eq!(entered.len(), 1);
        let trade = entered[0];
        // Journaled on the signal session, filled at the next bar's open.
        assert_eq!(trade.trade_date, bar_at(60, 0.0, 0.0, 0.0, 0.0).session());
        assert_eq!(trade.entry_time, Some(bar_at(61, 0.0, 0.0, 0.0, 0.0).timestamp));
        assert!((trade.entry_price.unwrap() - 103.2).abs() < 1e-9);
        assert_eq!(trade.shares, Some(242));
        assert_eq!(trade.exit_reason, Some(ExitReason::HardStop));
        assert!((trade.exit_price.unwrap() - 91.0).abs() < 1e-9);
        assert!(trade.r_multiple.unwrap() < -1.0);

        assert_eq!(
            result.journal[61].no_trade_reason,
            Some(NoTradeReason::PositionOpen)
        );
        assert_eq!(
            result.journal[62].no_trade_reason,
            Some(NoTradeReason::PositionOpen)
        );
        assert_eq!(result.closed_positions.len(), 1);
        assert_eq!(result.summary.entered_trades, 1);
        assert_eq!(result.summary.losses, 1);
    }

    #[test]
    fn scale_out_bar_does_not_trip_the_breakeven_stop() {
        // The second tail bar trades below the 103.2 entry, then closes 8.5% up.
        let data = with_tail(
            "QQQ",
            &[
                (103.2, 104.0, 102.5, 103.5),
                (104.0, 112.0, 103.0, 112.0),
                (112.0, 113.0, 111.0, 112.5),
            ],
        );
        let strategy = StrategyConfig {
            exit: ExitStrategy::Scaled {
                rules: ExitRules {
                    stop_mode: StopMode::IntradayLow,
                    ..ExitRules::default()
                },
                levels: vec![ScaleLevel {
                    profit_pct: 8.0,
                    fraction: 0.25,
                }],
                post_scale_trailing: Vec::new(),
            },
            ..strategy()
        };
        let result = run_backtest(&[data], None, &BacktestConfig::default(), &strategy).unwrap();

        let position = &result.closed_positions[0];
        assert!((position.entry_price - 103.2).abs() < 1e-9);
        assert_eq!(position.fills.len(), 2);
        assert_eq!(position.fills[0].reason, ExitReason::ScaleOut);
        assert!((position.fills[0].price - 112.0).abs() < 1e-9);
        assert_eq!(position.fills[1].reason, ExitReason::EndOfTest);
        assert!((position.fills[1].price - 112.5).abs() < 1e-9);
        assert_eq!(position.closed_shares, position.initial_shares);
        assert!((position.stop_price - position.entry_price).abs() < 1e-9);
    }

    #[test]
    fn signal_on_final_bar_expires() {
        let data = SymbolData::new("QQQ".into(), breakout_bars("QQQ"));
        let result =
            run_backtest(&[data], None, &BacktestConfig::default(), &strategy()).unwrap();

        assert_eq!(result.journal.len(), 61);
        assert_eq!(
            result.journal[60].no_trade_reason,
            Some(NoTradeReason::SignalExpired)
        );
        assert!(result.closed_positions.is_empty());
    }

    #[test]
    fn open_position_is_closed_at_end_of_test() {
        let data = with_tail(
            "QQQ",
            &[(103.2, 104.0, 102.5, 103.5), (103.5, 105.0, 103.0, 104.5)],
        );
        let result =
            run_backtest(&[data], None, &BacktestConfig::default(), &strategy()).unwrap();
        let trade = result.journal.iter().find(|r| r.entered).unwrap();
        assert_eq!(trade.exit_reason, Some(ExitReason::EndOfTest));
        assert!((trade.exit_price.unwrap() - 104.5).abs() < 1e-9);
        assert!(result.final_equity > DEFAULT_INITIAL_CAPITAL);
    }

    #[test]
    fn position_cap_rejects_the_later_symbol() {
        let tail = [(103.2, 104.0, 102.5, 103.5), (103.5, 105.0, 103.0, 104.5)];
        let symbols = vec![with_tail("BBB", &tail), with_tail("AAA", &tail)];
        let strategy = StrategyConfig {
            sizing: SizingConfig {
                max_positions: 1,
                ..SizingConfig::default()
            },
            ..strategy()
        };
        let result =
            run_backtest(&symbols, None, &BacktestConfig::default(), &strategy).unwrap();

        let signal_day = bar_at(60, 0.0, 0.0, 0.0, 0.0).session();
        let rows: Vec<&TradeRecord> = result
            .journal
            .iter()
            .filter(|r| r.trade_date == signal_day)
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AAA");
        assert!(rows[0].entered);
        assert_eq!(rows[1].symbol, "BBB");
        assert_eq!(rows[1].no_trade_reason, Some(NoTradeReason::MaxPositions));
    }

    #[test]
    fn invalid_strategy_fails_before_replay() {
        let mut strategy = strategy();
        strategy.sizing.position_size = 0.0;
        let data = SymbolData::new("QQQ".into(), breakout_bars("QQQ"));
        assert!(matches!(
            run_backtest(&[data], None, &BacktestConfig::default(), &strategy),
            Err(PulltraderError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn empty_input_is_a_data_error() {
        assert!(matches!(
            run_backtest(&[], None, &BacktestConfig::default(), &strategy()),
            Err(PulltraderError::Data { .. })
        ));
    }
}
