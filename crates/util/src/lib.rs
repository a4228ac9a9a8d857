//! Leaf helpers shared by the stepweave engine and CLI.
//!
//! Nothing in this crate knows about plans, ledgers, or placeholders; it only
//! shapes text and paths.

pub mod json_repair;
pub mod path_processing;
pub mod text_processing;

pub use json_repair::{parse_repaired_json, repair_json};
pub use path_processing::expand_tilde;
pub use text_processing::{redact_json_value, redact_sensitive};
