//! Pluggable enqueuer analyses
//!
//! Analyses observe the trace as it happens. They may read the program and
//! the live set, record [`OptimizationFeedback`], and enqueue more work, but
//! never remove anything from the live set.

mod assertions;

pub use assertions::ClassInitializerAssertionEnablingAnalysis;

use super::live::{LiveSet, OptimizationFeedback};
use super::worklist::EnqueuerWorklist;
use crate::error::EngineResult;
use crate::graph::{ClassDef, EncodedMethod, FieldId, FieldResolution, MethodId, Program};

/// A live method definition together with its holder
#[derive(Debug, Clone, Copy)]
pub struct ProgramMethod<'a> {
    /// The declaring class
    pub holder: &'a ClassDef,
    /// The method definition
    pub definition: &'a EncodedMethod,
}

impl ProgramMethod<'_> {
    /// The method reference
    pub fn reference(&self) -> MethodId {
        self.definition.method
    }
}

/// What an analysis can see and touch during a callback
pub struct EnqueuerContext<'a> {
    /// The traced program
    pub program: &'a Program,
    /// Everything marked live so far
    pub live: &'a LiveSet,
    /// Feedback for later passes
    pub feedback: &'a mut OptimizationFeedback,
    /// Pending work
    pub worklist: &'a mut EnqueuerWorklist,
}

/// Enqueuer hook contract. Every hook defaults to doing nothing; an error
/// aborts the trace.
pub trait EnqueuerAnalysis: Send {
    /// Name used in diagnostics
    fn name(&self) -> &'static str;

    /// Called once for each method definition that becomes live, after its
    /// body has been traced
    fn process_newly_live_method(
        &mut self,
        _method: ProgramMethod<'_>,
        _cx: &mut EnqueuerContext<'_>,
    ) -> EngineResult<()> {
        Ok(())
    }

    /// Called for every traced static field read
    fn trace_static_field_read(
        &mut self,
        _field: FieldId,
        _resolution: Option<FieldResolution>,
        _context: Option<MethodId>,
        _cx: &mut EnqueuerContext<'_>,
    ) -> EngineResult<()> {
        Ok(())
    }
}
