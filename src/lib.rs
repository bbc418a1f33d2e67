//! Survey Wizard - multi-step survey engine
//!
//! Durable answer store, step graph with branching, per-step validation and
//! the final multipart submission.

pub mod config;
pub mod consent;
pub mod links;
pub mod logging;
pub mod store;
pub mod submission;
pub mod validation;
pub mod wizard;
