//! Fill simulation: commissions and slippage for long entries and exits.

/// Cost model applied to every fill.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_long_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Long exit (sell): execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_long_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

impl ExecutionConfig {
    pub fn entry_price(&self, market_price: f64) -> f64 {
        apply_slippage_long_entry(market_price, self.slippage_pct)
    }

    pub fn exit_price(&self, market_price: f64) -> f64 {
        apply_slippage_long_exit(market_price, self.slippage_pct)
    }

    pub fn commission(&self, trade_value: f64) -> f64 {
        calculate_commission(trade_value, self)
    }
}
