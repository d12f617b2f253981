//! `EngineSignal` — candidate trade proposal consumed once by the Gatekeeper
//! (spec §3).

use serde::{Deserialize, Serialize};

use gk_units::Direction;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EngineKind {
    Trend,
    Range,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// Coarse regime hint the signal-generating engine believes it's operating
/// under. Purely advisory input to Gate 2/3's regime resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeHint {
    TrendUp,
    TrendDown,
    Range,
    BreakoutUp,
    BreakoutDown,
    Noise,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalContext {
    pub expected_holding_hours: f64,
    pub regime_hint: Option<RegimeHint>,
    pub setup_id: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalConstraints {
    pub rr_min_engine: f64,
    pub sl_min_atr_mult: f64,
    pub sl_max_atr_mult: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineSignal {
    pub instrument: String,
    pub engine: EngineKind,
    pub direction: Direction,
    pub levels: Levels,
    pub context: SignalContext,
    pub constraints: SignalConstraints,
}

/// Signal-shape validation error (spec §3 validator: LONG => TP>entry>SL;
/// SHORT => TP<entry<SL).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalValidationError {
    LongLevelsNotMonotone { entry: String, tp: String, sl: String },
    ShortLevelsNotMonotone { entry: String, tp: String, sl: String },
    NonFiniteLevel,
}

impl std::fmt::Display for SignalValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LongLevelsNotMonotone { entry, tp, sl } => {
                write!(f, "LONG requires TP > entry > SL, got entry={entry} tp={tp} sl={sl}")
            }
            Self::ShortLevelsNotMonotone { entry, tp, sl } => {
                write!(f, "SHORT requires TP < entry < SL, got entry={entry} tp={tp} sl={sl}")
            }
            Self::NonFiniteLevel => write!(f, "one or more levels is NaN/inf"),
        }
    }
}

impl std::error::Error for SignalValidationError {}

impl EngineSignal {
    pub fn validate_levels(&self) -> Result<(), SignalValidationError> {
        let Levels { entry_price, stop_loss, take_profit } = self.levels;
        if ![entry_price, stop_loss, take_profit].iter().all(|v| v.is_finite()) {
            return Err(SignalValidationError::NonFiniteLevel);
        }
        match self.direction {
            Direction::Long => {
                if !(take_profit > entry_price && entry_price > stop_loss) {
                    return Err(SignalValidationError::LongLevelsNotMonotone {
                        entry: entry_price.to_string(),
                        tp: take_profit.to_string(),
                        sl: stop_loss.to_string(),
                    });
                }
            }
            Direction::Short => {
                if !(take_profit < entry_price && entry_price < stop_loss) {
                    return Err(SignalValidationError::ShortLevelsNotMonotone {
                        entry: entry_price.to_string(),
                        tp: take_profit.to_string(),
                        sl: stop_loss.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(direction: Direction, entry: f64, tp: f64, sl: f64) -> EngineSignal {
        EngineSignal {
            instrument: "BTCUSDT".into(),
            engine: EngineKind::Trend,
            direction,
            levels: Levels { entry_price: entry, stop_loss: sl, take_profit: tp },
            context: SignalContext { expected_holding_hours: 6.0, regime_hint: None, setup_id: "s1".into() },
            constraints: SignalConstraints { rr_min_engine: 1.5, sl_min_atr_mult: 0.5, sl_max_atr_mult: 3.0 },
        }
    }

    #[test]
    fn long_requires_tp_gt_entry_gt_sl() {
        assert!(signal(Direction::Long, 100.0, 106.0, 98.0).validate_levels().is_ok());
        assert!(signal(Direction::Long, 100.0, 98.0, 106.0).validate_levels().is_err());
    }

    #[test]
    fn short_requires_tp_lt_entry_lt_sl() {
        assert!(signal(Direction::Short, 100.0, 94.0, 102.0).validate_levels().is_ok());
        assert!(signal(Direction::Short, 100.0, 102.0, 94.0).validate_levels().is_err());
    }

    #[test]
    fn rejects_non_finite_levels() {
        assert_eq!(
            signal(Direction::Long, 100.0, f64::NAN, 98.0).validate_levels(),
            Err(SignalValidationError::NonFiniteLevel)
        );
    }
}
