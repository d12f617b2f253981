//! gk-domain
//!
//! Immutable domain entities and snapshot plumbing (spec §3, §4.4 C4 + C12).
//! Every entity here is a frozen value object; an "update" always produces a
//! new version carrying a successor `SnapshotId`.

pub mod ids;
pub mod market;
pub mod mle;
pub mod portfolio;
pub mod signal;
pub mod states;

pub use ids::{LogicalClock, LogicalClockMs, MarketDataId, PortfolioId, SnapshotId, SnapshotRegistry};
pub use market::{CorrelationContext, DataQualityInputs, DerivativesInfo, LiquidityInfo, MarketState, PriceInfo, VolatilityInfo};
pub use mle::{MleDecision, MleOutput, MleValidationError};
pub use portfolio::{ClusterId, EquityState, OperationalState, Position, PositionId, PortfolioState, RiskAggregates};
pub use signal::{EngineKind, EngineSignal, Levels, RegimeHint, SignalConstraints, SignalContext, SignalValidationError};
pub use states::{DrpState, ManualHalts, MlOpsState, RecoveryCause, TradingMode};
