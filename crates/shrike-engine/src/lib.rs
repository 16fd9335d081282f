//! Shrike optimizer engine
//!
//! This crate holds the whole-program optimizer built on top of
//! `shrike-bytecode`:
//! - **Graph**: interned items, class definitions, method bodies and the
//!   class hierarchy (`graph` module)
//! - **Lens**: the chain of reference rewrites published by passes (`lens`
//!   module)
//! - **Shaking**: the enqueuer, keep rules and enqueuer analyses (`shaking`
//!   module)
//! - **Optimize**: the publicizer (`optimize` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use shrike_engine::{EngineOptions, Program, Session};
//!
//! let options = EngineOptions::from_file(Path::new("shrike.toml"))?;
//! let mut session = Session::new(program, options);
//! let summary = session.optimize()?;
//! let units = session.encode_method(main)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

/// Engine options
pub mod config;

/// Engine error types
pub mod error;

/// Program graph
pub mod graph;

/// Graph lens chain
pub mod lens;

/// Optimization passes
pub mod optimize;

/// Optimization session
pub mod session;

/// Tree shaking
pub mod shaking;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{AssertionHandler, ConfigError, EngineOptions, KeepOptions, PublicizerOptions};
pub use error::{EngineError, EngineResult};
pub use graph::{
    AccessFlags, ClassDef, ClassKind, Code, EncodedField, EncodedMethod, FieldId, ItemFactory,
    MethodId, Program, RegisterCode, StackInstr, TypeId,
};
pub use lens::{Change, ChangeSet, GraphLens, LensBuilder, LensError};
pub use optimize::{Publicizer, PublicizerOutcome, PublicizerStats, SignaturePool};
pub use session::{OptimizeSummary, Session};
pub use shaking::{
    Enqueuer, EnqueuerAnalysis, EnqueuerResult, KeepOracle, LiveSet, OptimizationFeedback, RootSet,
};
