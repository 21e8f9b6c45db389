//! Position-sizing and spread calculators.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizeInput {
    pub capital: f64,
    /// Percent of capital at risk, in (0, 100].
    pub risk_pct: f64,
    pub entry: f64,
    pub stop: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub units: f64,
    pub risk_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadInput {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub absolute: f64,
    /// Spread as a percentage of the midpoint.
    pub relative_pct: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    #[error("capital must be positive, got {0}")]
    NonPositiveCapital(f64),
    #[error("risk percent must be within (0, 100], got {0}")]
    RiskOutOfRange(f64),
    #[error("entry price must be positive, got {0}")]
    NonPositiveEntry(f64),
    #[error("stop price must not be negative, got {0}")]
    NegativeStop(f64),
    #[error("entry price {entry} must be above stop price {stop}")]
    EntryNotAboveStop { entry: f64, stop: f64 },
    #[error("bid must be positive, got {0}")]
    NonPositiveBid(f64),
    #[error("ask must be positive, got {0}")]
    NonPositiveAsk(f64),
    #[error("ask {ask} must not be below bid {bid}")]
    AskBelowBid { bid: f64, ask: f64 },
}

/// Units to buy so that a stop-out loses exactly `risk_pct` of capital:
/// `(capital * risk_pct / 100) / (entry - stop)`. Refuses entry <= stop,
/// so the division is never by zero or negative.
pub fn position_size(input: &PositionSizeInput) -> Result<PositionSize, CalcError> {
    if !input.capital.is_finite() || input.capital <= 0.0 {
        return Err(CalcError::NonPositiveCapital(input.capital));
    }
    if !input.risk_pct.is_finite() || input.risk_pct <= 0.0 || input.risk_pct > 100.0 {
        return Err(CalcError::RiskOutOfRange(input.risk_pct));
    }
    if !input.entry.is_finite() || input.entry <= 0.0 {
        return Err(CalcError::NonPositiveEntry(input.entry));
    }
    if !input.stop.is_finite() || input.stop < 0.0 {
        return Err(CalcError::NegativeStop(input.stop));
    }
    if input.entry <= input.stop {
        return Err(CalcError::EntryNotAboveStop {
            entry: input.entry,
            stop: input.stop,
        });
    }

    let risk_amount = input.capital * input.risk_pct / 100.0;
    Ok(PositionSize {
        units: risk_amount / (input.entry - input.stop),
        risk_amount,
    })
}

pub fn spread(input: &SpreadInput) -> Result<Spread, CalcError> {
    if !input.bid.is_finite() || input.bid <= 0.0 {
        return Err(CalcError::NonPositiveBid(input.bid));
    }
    if !input.ask.is_finite() || input.ask <= 0.0 {
        return Err(CalcError::NonPositiveAsk(input.ask));
    }
    if input.ask < input.bid {
        return Err(CalcError::AskBelowBid {
            bid: input.bid,
            ask: input.ask,
        });
    }

    let absolute = input.ask - input.bid;
    let midpoint = (input.ask + input.bid) / 2.0;
    Ok(Spread {
        absolute,
        relative_pct: absolute / midpoint * 100.0,
    })
}
