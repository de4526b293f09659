pub mod config;
pub mod creative;
pub mod dataset;
pub mod drafter;
pub mod error;
pub mod evidence;
pub mod insight;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod planner;
pub mod ranking;
pub mod report;
pub mod scorer;
pub mod window;

pub use config::AnalysisConfig;
pub use dataset::{Dataset, Dimension};
pub use error::{InsightError, Result};
pub use pipeline::Pipeline;
pub use report::Report;
