//! HTTP request handlers.

pub mod collection;
pub mod health;
pub mod sequence;
