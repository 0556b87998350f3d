//! `quill-pipeline`: turns an agent plus an optional topic and keyword into
//! a finished article with SEO metadata.
//!
//! The pipeline is an explicit state machine ([`PipelineStep`]); a
//! [`PipelineRun`] records how far it got so a retried job can either start
//! over or resume from the step that failed.

pub mod error;
pub mod generator;
pub mod prompts;
pub mod state;
pub mod title;

pub use error::{PipelineError, Result};
pub use generator::{ContentGenerator, GeneratedContent};
pub use state::{PipelineRun, PipelineStep};
pub use title::extract_title;
