//! Prompt System - Template loading and rendering
//!
//! This module loads the Execute/Verify/classification templates and renders
//! them with absolute paths and counters using Handlebars.

mod loader;
mod render;

pub use loader::{CLASSIFY_SCOPE_TEMPLATE, EXECUTE_TEMPLATE, PromptLoader, VERIFY_TEMPLATE};
pub use render::{PromptContext, PromptRenderer};
