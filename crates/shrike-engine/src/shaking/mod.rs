//! Tree shaking
//!
//! The enqueuer computes which classes, methods and fields are reachable
//! from the keep-rule roots. Entities outside the resulting [`LiveSet`] are
//! ignored by later passes and never encoded.

pub mod analysis;
mod enqueuer;
mod keep;
mod live;
mod worklist;

pub use analysis::{
    ClassInitializerAssertionEnablingAnalysis, EnqueuerAnalysis, EnqueuerContext, ProgramMethod,
};
pub use enqueuer::{Enqueuer, EnqueuerResult, EnqueuerState};
pub use keep::{KeepOracle, RootSet};
pub use live::{LiveSet, OptimizationFeedback};
pub use worklist::{EnqueuerAction, EnqueuerWorklist, LiveReason};
