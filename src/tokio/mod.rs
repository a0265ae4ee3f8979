//! Async variants, enabled by the `async` feature
pub mod discovery;
