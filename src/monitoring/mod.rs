pub mod logging;
pub mod stats;

pub use stats::PipelineStats;
