//! The conversational core of SousChef.
//!
//! A turn flows through four stages:
//!
//! 1. **Classify** the incoming text into an intent category
//! 2. **Summarize** (when enough turns have accumulated) the older part of
//!    the log into a rolling summary
//! 3. **Assemble** the exact prompt entries for the model call: recipe
//!    context, formatting instructions, summary, and a bounded history
//!    window
//! 4. **Call** the model and persist both sides of the exchange
//!
//! The stages live in their own modules; [`ChatEngine`] wires them
//! together and is the only entry point the surrounding application needs.

pub mod classifier;
pub mod context;
pub mod engine;
pub mod summarizer;

pub use classifier::classify;
pub use context::{ContextBuilder, ContextInput};
pub use engine::ChatEngine;
