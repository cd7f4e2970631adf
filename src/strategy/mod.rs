// Alert decision module: thresholds, crossings and the cooldown state machine
pub mod decision;
pub mod signals;

pub use decision::{AlertPhase, DecisionEngine};
pub use signals::{detect_crossings, strongest, Thresholds};
