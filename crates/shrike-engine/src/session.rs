//! Optimization session
//!
//! A [`Session`] owns the program under optimization, the engine options and
//! the current [`GraphLens`]. Passes run against the session in order: the
//! enqueuer computes the live set, the publicizer relaxes access and extends
//! the lens, and bodies are encoded through the lens last.

use crate::config::EngineOptions;
use crate::error::EngineResult;
use crate::graph::{Code, MethodId, Program};
use crate::lens::{rewrite::rewrite_code, GraphLens};
use crate::optimize::{Publicizer, PublicizerStats};
use crate::shaking::{
    ClassInitializerAssertionEnablingAnalysis, Enqueuer, EnqueuerResult, KeepOracle, LiveSet,
    OptimizationFeedback, RootSet,
};
use parking_lot::RwLock;

/// Summary of a full [`Session::optimize`] run
#[derive(Debug, Clone)]
pub struct OptimizeSummary {
    /// Enqueuer actions processed
    pub processed_actions: usize,
    /// Publicizer statistics, `None` when the publicizer is disabled
    pub publicizer: Option<PublicizerStats>,
    /// Lens depth after all passes
    pub lens_depth: usize,
}

/// A program together with the state accumulated by optimization passes
pub struct Session {
    program: Program,
    options: EngineOptions,
    lens: RwLock<GraphLens>,
    enqueuer_result: Option<EnqueuerResult>,
}

impl Session {
    /// Start a session with the identity lens
    pub fn new(program: Program, options: EngineOptions) -> Self {
        Self {
            program,
            options,
            lens: RwLock::new(GraphLens::identity()),
            enqueuer_result: None,
        }
    }

    /// The program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The program, mutably
    pub fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    /// The engine options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// A snapshot of the current lens
    pub fn current_lens(&self) -> GraphLens {
        self.lens.read().clone()
    }

    /// Replace the current lens with one built on top of it
    pub fn install_lens(&self, lens: GraphLens) {
        let mut current = self.lens.write();
        tracing::debug!(from = current.depth(), to = lens.depth(), "installing lens");
        *current = lens;
    }

    /// Live set from the last enqueuer run
    pub fn live_set(&self) -> Option<&LiveSet> {
        self.enqueuer_result.as_ref().map(|result| &result.live)
    }

    /// Feedback from the last enqueuer run
    pub fn feedback(&self) -> Option<&OptimizationFeedback> {
        self.enqueuer_result.as_ref().map(|result| &result.feedback)
    }

    /// Build the root set described by the keep options
    pub fn root_set(&mut self) -> EngineResult<RootSet> {
        Ok(RootSet::from_options(
            &self.options.keep,
            self.program.items_mut(),
        )?)
    }

    /// Trace the program from `roots` with the configured analyses
    pub fn run_enqueuer(&mut self, roots: &RootSet) -> EngineResult<&EnqueuerResult> {
        let handlers = self
            .options
            .resolve_assertion_handlers(self.program.items_mut())?;

        let mut enqueuer = Enqueuer::new(&self.program);
        enqueuer.register_analysis(Box::new(ClassInitializerAssertionEnablingAnalysis::new(
            self.program.items(),
            handlers,
        )));
        let result = enqueuer.trace(roots)?;
        Ok(self.enqueuer_result.insert(result))
    }

    /// Run the publicizer, restricted to the live set when one exists.
    ///
    /// Returns `None` when the publicizer is disabled.
    pub fn run_publicizer(&mut self, keep: &dyn KeepOracle) -> EngineResult<Option<PublicizerStats>> {
        if !self.options.publicizer.enabled {
            tracing::info!("publicizer disabled");
            return Ok(None);
        }

        let mut publicizer = Publicizer::new(keep, self.options.worker_threads());
        if let Some(result) = &self.enqueuer_result {
            publicizer = publicizer.with_live_set(&result.live);
        }
        let previous = self.current_lens();
        let outcome = publicizer.run(&mut self.program, &previous)?;
        self.install_lens(outcome.lens);
        Ok(Some(outcome.stats))
    }

    /// Encode a register body through the current lens.
    ///
    /// Returns `None` for methods without a definition, without a body or
    /// with a stack body, and for methods outside the live set once the
    /// enqueuer has run.
    pub fn encode_method(&self, method: MethodId) -> EngineResult<Option<Vec<u16>>> {
        if let Some(live) = self.live_set() {
            if !live.is_live_method(method) {
                tracing::debug!(
                    method = %self.program.items().method_to_string(method),
                    "skipping dead method"
                );
                return Ok(None);
            }
        }
        let Some((_, definition)) = self.program.method_definition(method) else {
            return Ok(None);
        };
        let Some(code) = &definition.code else {
            return Ok(None);
        };
        let lens = self.current_lens();
        match rewrite_code(code, &lens)? {
            Code::Register(body) => Ok(Some(shrike_bytecode::encode_all(&body.instructions))),
            Code::Stack(_) => Ok(None),
        }
    }

    /// Rewrite a body through the current lens without encoding it
    pub fn rewritten_code(&self, method: MethodId) -> EngineResult<Option<Code>> {
        let lens = self.current_lens();
        self.program
            .method_definition(method)
            .and_then(|(_, definition)| definition.code.as_ref())
            .map(|code| rewrite_code(code, &lens))
            .transpose()
    }

    /// Run the enqueuer and the publicizer with the configured keep rules
    pub fn optimize(&mut self) -> EngineResult<OptimizeSummary> {
        let _span = tracing::info_span!("optimize").entered();
        let roots = self.root_set()?;
        let processed_actions = self.run_enqueuer(&roots)?.processed;
        let publicizer = self.run_publicizer(&roots)?;
        Ok(OptimizeSummary {
            processed_actions,
            publicizer,
            lens_depth: self.lens.read().depth(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PublicizerOptions;
    use crate::graph::{AccessFlags, ClassDef, EncodedMethod};

    fn single_class_program() -> (Program, MethodId) {
        let mut program = Program::new();
        let items = program.items_mut();
        let object = items.known().object_type;
        let a = items.create_type("LA;");
        let helper = items.parse_method("LA;->helper()V").unwrap();
        program
            .add_class(
                ClassDef::program(a)
                    .extends(object)
                    .method(EncodedMethod::new(helper, AccessFlags::PRIVATE)),
            )
            .unwrap();
        (program, helper)
    }

    #[test]
    fn test_disabled_publicizer_keeps_identity_lens() {
        let (program, _) = single_class_program();
        let options = EngineOptions {
            publicizer: PublicizerOptions { enabled: false },
            ..EngineOptions::default()
        };
        let mut session = Session::new(program, options);
        let stats = session.run_publicizer(&RootSet::new()).unwrap();
        assert!(stats.is_none());
        assert!(session.current_lens().is_identity());
    }

    #[test]
    fn test_publicizer_installs_lens() {
        let (program, helper) = single_class_program();
        let mut session = Session::new(program, EngineOptions::default());
        let stats = session.run_publicizer(&RootSet::new()).unwrap().unwrap();

        assert_eq!(stats.publicized_methods, 1);
        let lens = session.current_lens();
        assert_eq!(lens.depth(), 1);
        assert_eq!(lens.resolve_method(helper), helper);
    }

    #[test]
    fn test_encode_missing_method() {
        let (program, _) = single_class_program();
        let mut session = Session::new(program, EngineOptions::default());
        let other = session.program_mut().items_mut().parse_method("LB;->x()V").unwrap();
        assert_eq!(session.encode_method(other).unwrap(), None);
    }
}
