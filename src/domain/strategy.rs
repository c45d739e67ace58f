//! Typed strategy configuration and its INI parsing.
//!
//! The INI layer is read through [`ConfigPort`]; list values use compact
//! strings:
//!
//! - trailing brackets: `0:atr:3.0,10:atr:2.0,15:pct:5`
//! - scale levels: `8:0.25,15:0.25,25:0.25`
//! - time buckets: `EARLY=09:30-10:30,MIDDAY=10:30-14:00`

use chrono::NaiveTime;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::domain::error::PulltraderError;
use crate::domain::exit::{
    ExitRules, ExitStrategy, MaBreak, MovingAverage, ScaleLevel, StopMode, TrailDistance,
    TrailingBracket,
};
use crate::domain::journal::{JournalConfig, TimeBucket};
use crate::domain::portfolio::{SizingBase, SizingConfig};
use crate::domain::scanner::{BreakoutParams, PullbackParams, ScannerConfig};
use crate::domain::signal::SetupGrade;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_REGIME_SMA_PERIOD: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub scanner: ScannerConfig,
    pub exit: ExitStrategy,
    pub sizing: SizingConfig,
    pub journal: JournalConfig,
    /// SMA period of the benchmark regime filter.
    pub regime_sma_period: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            scanner: ScannerConfig::default(),
            exit: ExitStrategy::Single(ExitRules::default()),
            sizing: SizingConfig::default(),
            journal: JournalConfig::default(),
            regime_sma_period: DEFAULT_REGIME_SMA_PERIOD,
        }
    }
}

impl StrategyConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PulltraderError> {
        Ok(StrategyConfig {
            scanner: scanner_from_config(config)?,
            exit: exit_from_config(config)?,
            sizing: sizing_from_config(config)?,
            journal: journal_from_config(config)?,
            regime_sma_period: read(
                config,
                "scanner",
                "regime_sma_period",
                DEFAULT_REGIME_SMA_PERIOD,
            )?,
        })
    }

    pub fn name(&self) -> String {
        let exit = match self.exit {
            ExitStrategy::Single(_) => "single",
            ExitStrategy::Scaled { .. } => "scaled",
        };
        format!("{}/{}", self.scanner.name(), exit)
    }
}

/// Read and parse `[section] key`, or `default` when absent.
pub(crate) fn read<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, PulltraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PulltraderError::invalid(section, key, format!("cannot parse '{raw}'"))),
    }
}

/// Like [`read`], but `none`/`off` (or an empty value) disable the setting.
pub(crate) fn read_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<T>,
) -> Result<Option<T>, PulltraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => {
            let raw = raw.trim();
            if raw.is_empty() || raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("off")
            {
                return Ok(None);
            }
            raw.parse().map(Some).map_err(|_| {
                PulltraderError::invalid(section, key, format!("cannot parse '{raw}'"))
            })
        }
    }
}

fn read_with<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<T, PulltraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => {
            parse(raw.trim()).map_err(|reason| PulltraderError::invalid(section, key, reason))
        }
    }
}

fn scanner_from_config(config: &dyn ConfigPort) -> Result<ScannerConfig, PulltraderError> {
    const S: &str = "scanner";
    let variant = config
        .get_string(S, "variant")
        .unwrap_or_else(|| "breakout".to_string());
    match variant.trim().to_lowercase().as_str() {
        "breakout" => {
            let d = BreakoutParams::default();
            Ok(ScannerConfig::Breakout(BreakoutParams {
                high_lookback: read(config, S, "high_lookback", d.high_lookback)?,
                max_distance_from_high_pct: read(
                    config,
                    S,
                    "max_distance_from_high_pct",
                    d.max_distance_from_high_pct,
                )?,
                min_base_days: read(config, S, "min_base_days", d.min_base_days)?,
                max_base_days: read(config, S, "max_base_days", d.max_base_days)?,
                max_base_volatility_pct: read(
                    config,
                    S,
                    "max_base_volatility_pct",
                    d.max_base_volatility_pct,
                )?,
                volume_lookback: read(config, S, "volume_lookback", d.volume_lookback)?,
                volume_ratio: read(config, S, "volume_ratio", d.volume_ratio)?,
                rs_lookback: read(config, S, "rs_lookback", d.rs_lookback)?,
                rs_full_credit_pct: read(config, S, "rs_full_credit_pct", d.rs_full_credit_pct)?,
                require_bull_regime: config.get_bool(S, "require_bull_regime", false),
            }))
        }
        "pullback" | "pullback_reversal" => {
            let d = PullbackParams::default();
            Ok(ScannerConfig::PullbackReversal(PullbackParams {
                window_start: read_with(config, S, "window_start", d.window_start, parse_time)?,
                window_end: read_with(config, S, "window_end", d.window_end, parse_time)?,
                min_close_location: read(config, S, "min_close_location", d.min_close_location)?,
                trend_sma_period: read(config, S, "trend_sma_period", d.trend_sma_period)?,
                full_volume_ratio: read(config, S, "full_volume_ratio", d.full_volume_ratio)?,
                require_bull_regime: config.get_bool(S, "require_bull_regime", false),
            }))
        }
        other => Err(PulltraderError::invalid(
            S,
            "variant",
            format!("unknown scanner '{other}' (expected breakout or pullback_reversal)"),
        )),
    }
}

fn exit_from_config(config: &dyn ConfigPort) -> Result<ExitStrategy, PulltraderError> {
    const S: &str = "exit";
    let d = ExitRules::default();

    let stop_mode = read_with(config, S, "stop_mode", d.stop_mode, |raw| {
        match raw.to_lowercase().as_str() {
            "close" => Ok(StopMode::Close),
            "intraday_low" | "low" => Ok(StopMode::IntradayLow),
            other => Err(format!("unknown stop mode '{other}' (expected close or intraday_low)")),
        }
    })?;

    let default_average = d.ma_break.map(|m| m.average);
    let average = read_with(config, S, "ma_break_average", default_average, |raw| {
        match raw.to_lowercase().as_str() {
            "ema20" | "ema" => Ok(Some(MovingAverage::Ema20)),
            "sma20" | "sma" => Ok(Some(MovingAverage::Sma20)),
            "none" | "off" | "" => Ok(None),
            other => Err(format!("unknown average '{other}' (expected ema20, sma20 or none)")),
        }
    })?;
    let ceiling_default = d.ma_break.map_or(5.0, |m| m.profit_ceiling_pct);
    let profit_ceiling_pct = read(config, S, "ma_break_profit_ceiling_pct", ceiling_default)?;

    let rules = ExitRules {
        stop_mode,
        atr_stop_multiple: read(config, S, "atr_stop_multiple", d.atr_stop_multiple)?,
        trailing: read_with(config, S, "trailing", d.trailing.clone(), parse_trailing)?,
        ma_break: average.map(|average| MaBreak {
            average,
            profit_ceiling_pct,
        }),
        lower_high_activation_pct: read_optional(
            config,
            S,
            "lower_high_activation_pct",
            d.lower_high_activation_pct,
        )?,
        max_hold_days: read_optional(config, S, "max_hold_days", d.max_hold_days)?,
        flatten_at_session_end: config.get_bool(S, "flatten_at_session_end", false),
    };

    let variant = config
        .get_string(S, "variant")
        .unwrap_or_else(|| "single".to_string());
    match variant.trim().to_lowercase().as_str() {
        "single" => Ok(ExitStrategy::Single(rules)),
        "scaled" => {
            let default_levels = vec![
                ScaleLevel {
                    profit_pct: 8.0,
                    fraction: 0.25,
                },
                ScaleLevel {
                    profit_pct: 15.0,
                    fraction: 0.25,
                },
                ScaleLevel {
                    profit_pct: 25.0,
                    fraction: 0.25,
                },
            ];
            Ok(ExitStrategy::Scaled {
                levels: read_with(config, S, "scale_levels", default_levels, parse_scale_levels)?,
                post_scale_trailing: read_with(
                    config,
                    S,
                    "post_scale_trailing",
                    Vec::new(),
                    parse_trailing,
                )?,
                rules: ExitRules {
                    lower_high_activation_pct: None,
                    ..rules
                },
            })
        }
        other => Err(PulltraderError::invalid(
            S,
            "variant",
            format!("unknown exit variant '{other}' (expected single or scaled)"),
        )),
    }
}

fn sizing_from_config(config: &dyn ConfigPort) -> Result<SizingConfig, PulltraderError> {
    const S: &str = "sizing";
    let d = SizingConfig::default();
    let base = read_with(config, S, "base", d.base, |raw| {
        match raw.to_lowercase().as_str() {
            "start" | "starting_capital" => Ok(SizingBase::StartingCapital),
            "equity" | "current_equity" => Ok(SizingBase::CurrentEquity),
            other => Err(format!("unknown sizing base '{other}' (expected start or equity)")),
        }
    })?;

    let mut grade_fractions = BTreeMap::new();
    for (key, grade) in [
        ("grade_a_plus", SetupGrade::APlus),
        ("grade_a", SetupGrade::A),
        ("grade_b", SetupGrade::B),
    ] {
        if let Some(fraction) = read_optional::<f64>(config, S, key, None)? {
            grade_fractions.insert(grade, fraction);
        }
    }

    Ok(SizingConfig {
        position_size: read(config, S, "position_size", d.position_size)?,
        base,
        max_positions: read(config, S, "max_positions", d.max_positions)?,
        grade_fractions,
    })
}

fn journal_from_config(config: &dyn ConfigPort) -> Result<JournalConfig, PulltraderError> {
    let d = JournalConfig::default();
    Ok(JournalConfig {
        time_buckets: read_with(
            config,
            "journal",
            "time_buckets",
            d.time_buckets,
            parse_time_buckets,
        )?,
    })
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| format!("invalid time '{raw}' (expected HH:MM)"))
}

fn parse_number<T: FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid {what} '{}'", raw.trim()))
}

fn entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// `min_profit_pct:atr|pct:value`, comma separated. `none` yields no brackets.
pub fn parse_trailing(raw: &str) -> Result<Vec<TrailingBracket>, String> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(Vec::new());
    }
    entries(raw)
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            let [profit, kind, value] = parts.as_slice() else {
                return Err(format!("invalid trailing bracket '{entry}'"));
            };
            let min_profit_pct = parse_number(profit, "profit threshold")?;
            let value: f64 = parse_number(value, "trail distance")?;
            let distance = match kind.trim().to_lowercase().as_str() {
                "atr" => TrailDistance::AtrMultiple(value),
                "pct" | "percent" => TrailDistance::Percent(value),
                other => return Err(format!("unknown trail distance '{other}'")),
            };
            Ok(TrailingBracket {
                min_profit_pct,
                distance,
            })
        })
        .collect()
}

/// `profit_pct:fraction`, comma separated.
pub fn parse_scale_levels(raw: &str) -> Result<Vec<ScaleLevel>, String> {
    entries(raw)
        .map(|entry| {
            let (profit, fraction) = entry
                .split_once(':')
                .ok_or_else(|| format!("invalid scale level '{entry}'"))?;
            Ok(ScaleLevel {
                profit_pct: parse_number(profit, "profit threshold")?,
                fraction: parse_number(fraction, "fraction")?,
            })
        })
        .collect()
}

/// `LABEL=HH:MM-HH:MM`, comma separated.
pub fn parse_time_buckets(raw: &str) -> Result<Vec<TimeBucket>, String> {
    entries(raw)
        .map(|entry| {
            let (label, range) = entry
                .split_once('=')
                .ok_or_else(|| format!("invalid time bucket '{entry}'"))?;
            let (start, end) = range
                .split_once('-')
                .ok_or_else(|| format!("invalid time range '{range}'"))?;
            Ok(TimeBucket {
                label: label.trim().to_string(),
                start: parse_time(start.trim())?,
                end: parse_time(end.trim())?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn adapter(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn defaults_without_sections() {
        let config = StrategyConfig::from_config(&adapter("")).unwrap();
        assert_eq!(config, StrategyConfig::default());
        assert_eq!(config.name(), "breakout/single");
    }

    #[test]
    fn parses_trailing_brackets() {
        let brackets = parse_trailing("0:atr:3.0, 10:atr:2.0, 15:pct:5").unwrap();
        assert_eq!(brackets.len(), 3);
        assert_eq!(brackets[2].distance, TrailDistance::Percent(5.0));
        assert!((brackets[1].min_profit_pct - 10.0).abs() < f64::EPSILON);
        assert!(parse_trailing("none").unwrap().is_empty());
        assert!(parse_trailing("10:foo:2").is_err());
        assert!(parse_trailing("10:atr").is_err());
    }

    #[test]
    fn parses_scale_levels_and_buckets() {
        let levels = parse_scale_levels("8:0.25,15:0.5").unwrap();
        assert_eq!(levels.len(), 2);
        assert!((levels[1].fraction - 0.5).abs() < f64::EPSILON);

        let buckets = parse_time_buckets("EARLY=09:30-10:30,LATE=14:00-16:00").unwrap();
        assert_eq!(buckets[0].label, "EARLY");
        assert_eq!(buckets[1].end, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert!(parse_time_buckets("EARLY 09:30").is_err());
    }

    #[test]
    fn pullback_scaled_from_ini() {
        let config = StrategyConfig::from_config(&adapter(
            r#"
[scanner]
variant = pullback_reversal
window_start = 09:45
window_end = 11:00
min_close_location = 0.65

[exit]
variant = scaled
stop_mode = intraday_low
scale_levels = 8:0.25,15:0.25
post_scale_trailing = 0:pct:4
ma_break_average = sma20
max_hold_days = none
flatten_at_session_end = true

[sizing]
base = equity
grade_a_plus = 0.4
"#,
        ))
        .unwrap();

        let ScannerConfig::PullbackReversal(params) = &config.scanner else {
            panic!("expected pullback scanner");
        };
        assert_eq!(params.window_start, NaiveTime::from_hms_opt(9, 45, 0).unwrap());
        assert!((params.min_close_location - 0.65).abs() < f64::EPSILON);

        let ExitStrategy::Scaled {
            rules,
            levels,
            post_scale_trailing,
        } = &config.exit
        else {
            panic!("expected scaled exit");
        };
        assert_eq!(rules.stop_mode, StopMode::IntradayLow);
        assert_eq!(rules.max_hold_days, None);
        assert!(rules.flatten_at_session_end);
        assert_eq!(rules.lower_high_activation_pct, None);
        assert_eq!(rules.ma_break.unwrap().average, MovingAverage::Sma20);
        assert_eq!(levels.len(), 2);
        assert_eq!(post_scale_trailing[0].distance, TrailDistance::Percent(4.0));

        assert_eq!(config.sizing.base, SizingBase::CurrentEquity);
        assert!((config.sizing.fraction_for(SetupGrade::APlus) - 0.4).abs() < f64::EPSILON);
        assert!((config.sizing.fraction_for(SetupGrade::B) - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.name(), "pullback/scaled");
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = StrategyConfig::from_config(&adapter("[exit]\natr_stop_multiple = wide\n"))
            .unwrap_err();
        assert!(matches!(err, PulltraderError::ConfigInvalid { .. }));

        let err = StrategyConfig::from_config(&adapter("[scanner]\nvariant = momentum\n"))
            .unwrap_err();
        assert!(err.to_string().contains("momentum"));
    }
}
