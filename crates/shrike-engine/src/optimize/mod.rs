//! Optimization passes that rewrite the program graph
//!
//! Each pass publishes its reference changes as one level of the
//! [`GraphLens`](crate::lens::GraphLens) chain.

mod publicizer;
mod signature_pool;

pub use publicizer::{Publicizer, PublicizerOutcome, PublicizerStats};
pub use signature_pool::SignaturePool;
