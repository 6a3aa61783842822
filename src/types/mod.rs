//! Response types produced by the analysis model

mod analysis;

pub use analysis::{AnalysisResult, format_analysis};
