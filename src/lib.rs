//! Codeflow - code explanation and flowchart generation
//!
//! This library sends source code (or an image of it) to a hosted model and
//! turns the reply into an explanation, complexity estimates, an optimization
//! tip and a Mermaid flowchart that can be rendered and exported.

// Allow certain clippy warnings that are either stylistic or from external dependencies
#![allow(clippy::uninlined_format_args)] // Style preference
#![allow(clippy::format_push_string)] // Performance improvement but stylistic
#![allow(clippy::return_self_not_must_use)] // Builder pattern is clear enough
#![allow(clippy::items_after_statements)] // Locally-scoped use statements are fine
#![allow(clippy::too_many_arguments)] // Some functions legitimately need many params

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod diagram;
pub mod logger;
pub mod orchestrator;
pub mod types;
pub mod ui;
pub mod watcher;

// Re-export important structs and functions for easier testing
pub use client::{AnalysisClient, Analyzer, ClientError, ModelBackend, OcrError};
pub use config::{Config, ProviderConfig};
pub use diagram::{DiagramRenderer, Drawing, Exporter};
pub use orchestrator::{AnalysisError, AnalysisState, ConnectivityMonitor, Orchestrator};
pub use types::{AnalysisResult, format_analysis};
