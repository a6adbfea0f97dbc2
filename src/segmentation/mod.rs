pub mod algorithm;
pub mod config;
pub mod eligibility;

pub use algorithm::segment_history;
pub use config::{EligibilityRules, SegmentationConfig};
pub use eligibility::{filter_eligible, projected_total};
