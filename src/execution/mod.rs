// Per-cycle orchestration: source fallback and the concurrent evaluation pass
pub mod cycle;
pub mod price_feed;

pub use cycle::{AssetOutcome, AssetResult, CycleReport, LiveStatus, SignalCycle};
pub use price_feed::{PriceFeed, Resolved};
