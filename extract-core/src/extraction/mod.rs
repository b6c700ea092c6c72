//! Sub-proof extraction from Lean sources.
//!
//! One file goes through four passes:
//!
//! 1. [`instrument`] marks candidate tactics with `to_theorem`
//! 2. [`granularity`] optionally keeps only markers guarding long enough blocks
//! 3. the annotated source is submitted once to a Lean REPL session
//! 4. [`diagnostics`] groups the response by site and re-checks every
//!    candidate through a [`Verify`] implementation
//!
//! ## Example
//!
//! ```rust,ignore
//! use extract_core::extraction::{instrument, TacticMatcher};
//!
//! let matcher = TacticMatcher::with_defaults()?;
//! let out = instrument(&source.lines, &aux_block, &matcher);
//! println!("{} candidate sites", out.marker_count);
//! ```

pub mod diagnostics;
pub mod granularity;
pub mod instrument;
#[cfg(test)]
mod proptest;
pub mod types;
pub mod verify;

pub use diagnostics::{extract_records, group, reconstruct, Extraction, MessageGroup, PartialRecord};
pub use granularity::{filter_by_length, graded_variants, marker_count};
pub use instrument::{instrument, InstrumentationState, InstrumentedSource, TacticMatcher, MARKER};
pub use types::{ExtractionRecord, Library, SourceFile};
pub use verify::{SessionVerifier, Verify};
