//! Data models
//!
//! The raw schema description handed over by the parser, the decoded
//! validator tree, and the normalized schema model built from them.

pub mod description;
pub mod schema;
pub mod validator;

// Re-export commonly used types
pub use description::*;
pub use schema::*;
pub use validator::{ObjectProperty, Validator};
