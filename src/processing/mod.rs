//! Per-reading analysis
//!
//! - `classifier`: threshold rules → `AnomalyStatus`
//! - `history`: bounded recent-reading window
//! - `prediction`: trend heuristic → `FailurePrediction`

pub mod classifier;
pub mod history;
pub mod prediction;

pub use classifier::AnomalyClassifier;
pub use history::{HistoryWindow, MetricStats, WindowStats};
pub use prediction::{FailurePredictor, FixedJitter, JitterSource, RandomJitter};
