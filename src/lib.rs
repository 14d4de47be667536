//! Reqsmith - batch review processing with pluggable external operations
//!
//! Reqsmith accepts a batch of work items (app reviews, free-form
//! descriptions, draft issue titles) and processes them asynchronously:
//! classification and generation through an LLM inference backend, and
//! per-item sync into an issue tracker. A single dispatch loop claims the
//! pending job from the store and drives it through its state machine while
//! callers poll for incremental progress over HTTP.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod store;
pub mod tracker;

pub use error::{ReqsmithError, Result};
