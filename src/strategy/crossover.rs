//! Moving-average crossover reference strategy

use super::{Strategy, StrategyConfig};
use crate::data::MarketEvent;
use crate::ledger::Position;
use crate::signal::{OrderSignal, Side};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;

/// Trend state derived from the two averages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Up,
    Down,
}

/// Goes long when the fast SMA is above the slow SMA, short when below
///
/// Parameters: `fast_period` (default 5), `slow_period` (default 20),
/// `order_size` (default 1). A signal is emitted whenever the trend changes,
/// sized to move the position to `+order_size` or `-order_size`.
pub struct MovingAverageCrossover {
    name: String,
    symbol: String,
    fast_period: usize,
    slow_period: usize,
    order_size: Decimal,
    prices: VecDeque<Decimal>,
    position: Decimal,
    trend: Option<Trend>,
    pending: Vec<OrderSignal>,
}

impl MovingAverageCrossover {
    /// Create an uninitialized strategy
    pub fn new() -> Self {
        Self {
            name: "ma_crossover".to_string(),
            symbol: String::new(),
            fast_period: 5,
            slow_period: 20,
            order_size: Decimal::ONE,
            prices: VecDeque::new(),
            position: Decimal::ZERO,
            trend: None,
            pending: vec![],
        }
    }

    /// Current window periods (fast, slow)
    pub fn periods(&self) -> (usize, usize) {
        (self.fast_period, self.slow_period)
    }

    fn average(values: impl Iterator<Item = Decimal>, count: usize) -> Decimal {
        values.sum::<Decimal>() / Decimal::from(count)
    }

    fn current_trend(&self) -> Option<Trend> {
        if self.prices.len() < self.slow_period {
            return None;
        }
        let slow = Self::average(self.prices.iter().copied(), self.slow_period);
        let fast = Self::average(
            self.prices.iter().skip(self.slow_period - self.fast_period).copied(),
            self.fast_period,
        );
        if fast > slow {
            Some(Trend::Up)
        } else if fast < slow {
            Some(Trend::Down)
        } else {
            self.trend
        }
    }
}

impl Default for MovingAverageCrossover {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self, config: &StrategyConfig) -> anyhow::Result<()> {
        let fast = config.parameter("fast_period", 5.0).round().max(1.0) as usize;
        let slow = config.parameter("slow_period", 20.0).round().max(1.0) as usize;
        let order_size = Decimal::from_f64(config.parameter("order_size", 1.0))
            .ok_or_else(|| anyhow::anyhow!("order_size is not representable"))?;
        if order_size <= Decimal::ZERO {
            anyhow::bail!("order_size must be positive, got {}", order_size);
        }

        if !config.name.is_empty() {
            self.name = config.name.clone();
        }
        self.symbol = config.symbol.clone();
        self.fast_period = fast.min(slow);
        self.slow_period = slow.max(fast);
        self.order_size = order_size;
        self.prices.clear();
        self.position = Decimal::ZERO;
        self.trend = None;
        self.pending.clear();

        tracing::debug!(
            fast = self.fast_period,
            slow = self.slow_period,
            order_size = %self.order_size,
            "Crossover strategy initialized"
        );
        Ok(())
    }

    fn on_event(&mut self, event: &MarketEvent) -> anyhow::Result<()> {
        if !self.symbol.is_empty() && event.symbol != self.symbol {
            return Ok(());
        }

        self.prices.push_back(event.price());
        while self.prices.len() > self.slow_period {
            self.prices.pop_front();
        }

        let Some(trend) = self.current_trend() else {
            return Ok(());
        };
        if self.trend == Some(trend) {
            return Ok(());
        }
        self.trend = Some(trend);

        let target = match trend {
            Trend::Up => self.order_size,
            Trend::Down => -self.order_size,
        };
        let delta = target - self.position;
        if !delta.is_zero() {
            let side = if delta > Decimal::ZERO { Side::Buy } else { Side::Sell };
            self.pending
                .push(OrderSignal::new(event.symbol.clone(), side, delta.abs()));
        }
        Ok(())
    }

    fn get_signals(&mut self) -> Vec<OrderSignal> {
        std::mem::take(&mut self.pending)
    }

    fn on_position_update(&mut self, position: &Position) {
        if self.symbol.is_empty() || position.symbol == self.symbol {
            self.position = position.size;
        }
    }
}
