//! Compute module for the GPU transformation stage.
//!
//! The transformation itself is an opaque external tool: it reads a staged
//! directory, takes one processing parameter (e.g. a model name), and writes
//! a fixed set of named artifacts. This module provides the `Processor` trait
//! and `CommandProcessor`, which runs the configured tool and collects the
//! artifacts with their on-disk sizes.
//!
//! # Example
//!
//! ```ignore
//! use spindle_core::compute::{CommandProcessor, ComputeConfig, Processor, ProcessingJob};
//!
//! let processor = CommandProcessor::new(config);
//! let result = processor.process(job).await?;
//! for artifact in &result.artifacts {
//!     println!("{} ({} bytes)", artifact.name, artifact.byte_size);
//! }
//! ```

mod command_processor;
mod config;
mod error;
mod traits;
mod types;

pub use command_processor::{collect_artifacts, CommandProcessor};
pub use config::ComputeConfig;
pub use error::ProcessorError;
pub use traits::Processor;
pub use types::{Artifact, ProcessingJob, ProcessingResult};
