//! Document conversion through the active pandoc.
//!
//! The core does not convert documents itself. It resolves a PDF engine,
//! builds the pandoc command line and runs it with a timeout through the
//! same [`CommandRunner`](crate::platform::CommandRunner) the probes use.

mod converter;
pub mod engines;
mod types;

pub use converter::Converter;
pub use engines::{default_engine, engines_for_format, PdfEngine};
pub use types::{build_arguments, ConversionOutcome, ConversionRequest};
