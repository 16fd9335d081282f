//! Worklist-driven reachability analysis

use super::analysis::{EnqueuerAnalysis, EnqueuerContext, ProgramMethod};
use super::keep::RootSet;
use super::live::{LiveSet, OptimizationFeedback};
use super::worklist::{EnqueuerAction, EnqueuerWorklist, LiveReason};
use crate::error::{EngineError, EngineResult};
use crate::graph::{Code, FieldId, MethodId, Program, RegisterCode, StackInstr, TypeId};
use rustc_hash::FxHashSet;
use shrike_bytecode::{Instruction, InvokeKind, Opcode, ReferenceKind};

/// Lifecycle of an [`Enqueuer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuerState {
    /// Created, analyses may still be registered
    Idle,
    /// Draining the worklist
    Running,
    /// The worklist is empty
    Fixpoint,
    /// Results were handed out
    Done,
}

/// Outcome of a trace
#[derive(Debug, Clone)]
pub struct EnqueuerResult {
    /// Everything proven reachable
    pub live: LiveSet,
    /// Facts recorded by analyses
    pub feedback: OptimizationFeedback,
    /// Number of actions processed
    pub processed: usize,
}

/// Computes the live subset of a program from its roots.
pub struct Enqueuer<'a> {
    program: &'a Program,
    state: EnqueuerState,
    live: LiveSet,
    feedback: OptimizationFeedback,
    worklist: EnqueuerWorklist,
    analyses: Vec<Box<dyn EnqueuerAnalysis>>,
    /// Virtually invoked references, in first-seen order
    virtual_targets: Vec<MethodId>,
    virtual_target_set: FxHashSet<MethodId>,
}

impl<'a> Enqueuer<'a> {
    /// Create an enqueuer over `program`
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            state: EnqueuerState::Idle,
            live: LiveSet::new(),
            feedback: OptimizationFeedback::new(),
            worklist: EnqueuerWorklist::new(),
            analyses: Vec::new(),
            virtual_targets: Vec::new(),
            virtual_target_set: FxHashSet::default(),
        }
    }

    /// Register an analysis. Analyses are notified in registration order.
    pub fn register_analysis(&mut self, analysis: Box<dyn EnqueuerAnalysis>) -> &mut Self {
        self.analyses.push(analysis);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> EnqueuerState {
        self.state
    }

    /// Trace the program from `roots` to a fixpoint
    pub fn trace(&mut self, roots: &RootSet) -> EngineResult<EnqueuerResult> {
        if self.state != EnqueuerState::Idle {
            return Err(EngineError::EnqueuerReused);
        }
        let _span = tracing::info_span!("enqueuer").entered();
        self.state = EnqueuerState::Running;

        self.seed(roots);
        let mut processed = 0;
        while let Some(action) = self.worklist.poll() {
            processed += 1;
            self.process(action)?;
        }

        self.state = EnqueuerState::Fixpoint;
        tracing::info!(
            processed,
            classes = self.live.classes().count(),
            methods = self.live.methods().count(),
            fields = self.live.fields().count(),
            "enqueuer reached fixpoint"
        );

        let result = EnqueuerResult {
            live: std::mem::take(&mut self.live),
            feedback: std::mem::take(&mut self.feedback),
            processed,
        };
        self.state = EnqueuerState::Done;
        Ok(result)
    }

    fn seed(&mut self, roots: &RootSet) {
        let items = self.program.items();
        for &ty in &roots.classes {
            self.worklist.enqueue(EnqueuerAction::MarkInstantiated(ty));
        }
        for &method in &roots.methods {
            if self.program.method_definition(method).is_some() {
                self.worklist.enqueue(EnqueuerAction::MarkMethodLive {
                    method,
                    reason: LiveReason::KeepRule,
                });
            } else {
                tracing::debug!(
                    method = %items.method_to_string(method),
                    "keep rule names a method without definition"
                );
            }
        }
        for &field in &roots.fields {
            self.worklist.enqueue(EnqueuerAction::MarkFieldLive(field));
        }
    }

    fn process(&mut self, action: EnqueuerAction) -> EngineResult<()> {
        match action {
            EnqueuerAction::MarkClassLive(ty) => {
                self.mark_class_live(ty);
                Ok(())
            }
            EnqueuerAction::MarkInstantiated(ty) => {
                self.mark_instantiated(ty);
                Ok(())
            }
            EnqueuerAction::MarkMethodLive { method, reason } => self.mark_method_live(method, reason),
            EnqueuerAction::MarkFieldLive(field) => {
                self.mark_field_live(field);
                Ok(())
            }
            EnqueuerAction::TraceInvoke {
                kind,
                method,
                context,
            } => {
                self.trace_invoke(kind, method, context);
                Ok(())
            }
            EnqueuerAction::TraceStaticFieldRead { field, context } => {
                self.trace_static_field_read(field, context)
            }
            EnqueuerAction::TraceStaticFieldWrite { field, .. }
            | EnqueuerAction::TraceInstanceFieldRead { field, .. }
            | EnqueuerAction::TraceInstanceFieldWrite { field, .. } => {
                self.trace_field_access(field);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Marking
    // ========================================================================

    fn mark_class_live(&mut self, ty: TypeId) {
        if !self.live.mark_class(ty) {
            return;
        }
        let program = self.program;
        let Some(class) = program.definition_for(ty) else {
            return;
        };

        if let Some(super_type) = class.super_type {
            self.worklist.enqueue(EnqueuerAction::MarkClassLive(super_type));
        }
        for &interface in &class.interfaces {
            self.worklist.enqueue(EnqueuerAction::MarkClassLive(interface));
        }
        if class.is_program_class() {
            let items = program.items();
            if let Some(clinit) = class
                .direct_methods
                .iter()
                .find(|m| items.is_class_initializer(m.method))
            {
                self.worklist.enqueue(EnqueuerAction::MarkMethodLive {
                    method: clinit.method,
                    reason: LiveReason::ClassInitializer,
                });
            }
        }
    }

    fn mark_instantiated(&mut self, ty: TypeId) {
        if !self.live.mark_instantiated(ty) {
            return;
        }
        self.worklist.enqueue(EnqueuerAction::MarkClassLive(ty));

        // Calls traced before this type was instantiated may dispatch to it.
        let targets = self.virtual_targets.clone();
        for target in targets {
            self.enqueue_override(ty, target);
        }
    }

    fn mark_method_live(&mut self, method: MethodId, reason: LiveReason) -> EngineResult<()> {
        let program = self.program;
        let Some((holder, definition)) = program.method_definition(method) else {
            return Ok(());
        };
        if !self.live.mark_method(method) {
            return Ok(());
        }
        tracing::trace!(
            method = %program.items().method_to_string(method),
            ?reason,
            "method live"
        );
        self.worklist.enqueue(EnqueuerAction::MarkClassLive(holder.ty));

        if !holder.is_program_class() {
            return Ok(());
        }
        if let Some(code) = &definition.code {
            self.trace_code(method, code)?;
        }

        let program_method = ProgramMethod { holder, definition };
        self.notify(|analysis, cx| analysis.process_newly_live_method(program_method, cx))
    }

    fn mark_field_live(&mut self, field: FieldId) {
        if self.live.mark_field(field) {
            let holder = self.program.items().field(field).holder;
            self.worklist.enqueue(EnqueuerAction::MarkClassLive(holder));
        }
    }

    // ========================================================================
    // Tracing
    // ========================================================================

    fn trace_code(&mut self, context: MethodId, code: &Code) -> EngineResult<()> {
        match code {
            Code::Stack(instructions) => {
                for instruction in instructions {
                    if let Some(action) = stack_action(instruction, context) {
                        self.worklist.enqueue(action);
                    }
                }
                Ok(())
            }
            Code::Register(body) => {
                for instruction in &body.instructions {
                    if let Some(action) = register_action(instruction, body, context)? {
                        self.worklist.enqueue(action);
                    }
                }
                Ok(())
            }
        }
    }

    fn trace_invoke(&mut self, kind: InvokeKind, method: MethodId, context: Option<MethodId>) {
        let program = self.program;
        let resolved = match kind {
            InvokeKind::Direct => program.method_definition(method),
            _ => program.resolve_method(method),
        };
        match resolved {
            Some((_, definition)) => {
                self.worklist.enqueue(EnqueuerAction::MarkMethodLive {
                    method: definition.method,
                    reason: LiveReason::Invoke(kind),
                });
            }
            None => tracing::trace!(
                method = %program.items().method_to_string(method),
                ?context,
                "invoke target has no definition"
            ),
        }

        if matches!(kind, InvokeKind::Virtual | InvokeKind::Interface)
            && self.virtual_target_set.insert(method)
        {
            self.virtual_targets.push(method);
            let instantiated: Vec<TypeId> = self.live.instantiated().collect();
            for ty in instantiated {
                self.enqueue_override(ty, method);
            }
        }
    }

    /// Mark the definition `ty` dispatches `target` to, if `ty` is a subtype
    /// of the target's holder
    fn enqueue_override(&mut self, ty: TypeId, target: MethodId) {
        let program = self.program;
        let holder = program.items().method(target).holder;
        if !program.is_subtype_of(ty, holder) {
            return;
        }
        if let Some((_, definition)) = program.dispatch_method(ty, target) {
            self.worklist.enqueue(EnqueuerAction::MarkMethodLive {
                method: definition.method,
                reason: LiveReason::Override,
            });
        }
    }

    fn trace_static_field_read(&mut self, field: FieldId, context: Option<MethodId>) -> EngineResult<()> {
        let resolution = self.program.resolve_field(field);
        if let Some(resolved) = resolution {
            self.worklist.enqueue(EnqueuerAction::MarkFieldLive(resolved.field));
        }
        self.notify(|analysis, cx| analysis.trace_static_field_read(field, resolution, context, cx))
    }

    fn trace_field_access(&mut self, field: FieldId) {
        if let Some(resolved) = self.program.resolve_field(field) {
            self.worklist.enqueue(EnqueuerAction::MarkFieldLive(resolved.field));
        }
    }

    fn notify<F>(&mut self, mut hook: F) -> EngineResult<()>
    where
        F: FnMut(&mut Box<dyn EnqueuerAnalysis>, &mut EnqueuerContext<'_>) -> EngineResult<()>,
    {
        let mut cx = EnqueuerContext {
            program: self.program,
            live: &self.live,
            feedback: &mut self.feedback,
            worklist: &mut self.worklist,
        };
        for analysis in self.analyses.iter_mut() {
            if let Err(error) = hook(analysis, &mut cx) {
                tracing::error!(analysis = analysis.name(), %error, "analysis aborted the trace");
                return Err(EngineError::Analysis {
                    analysis: analysis.name(),
                    source: Box::new(error),
                });
            }
        }
        Ok(())
    }
}

fn stack_action(instruction: &StackInstr, context: MethodId) -> Option<EnqueuerAction> {
    let context = Some(context);
    Some(match *instruction {
        StackInstr::Invoke { kind, method } => EnqueuerAction::TraceInvoke {
            kind,
            method,
            context,
        },
        StackInstr::StaticGet(field) => EnqueuerAction::TraceStaticFieldRead { field, context },
        StackInstr::StaticPut(field) => EnqueuerAction::TraceStaticFieldWrite { field, context },
        StackInstr::InstanceGet(field) => EnqueuerAction::TraceInstanceFieldRead { field, context },
        StackInstr::InstancePut(field) => EnqueuerAction::TraceInstanceFieldWrite { field, context },
        StackInstr::New(ty) => EnqueuerAction::MarkInstantiated(ty),
        StackInstr::ConstClass(ty) => EnqueuerAction::MarkClassLive(ty),
        _ => return None,
    })
}

fn register_action(
    instruction: &Instruction,
    body: &RegisterCode,
    context: MethodId,
) -> EngineResult<Option<EnqueuerAction>> {
    let opcode = instruction.opcode();
    let Some(reference_kind) = opcode.reference_kind() else {
        return Ok(None);
    };
    let index = instruction.pool_index().unwrap_or(u32::MAX) as usize;
    let context = Some(context);

    let action = match reference_kind {
        ReferenceKind::String => return Ok(None),
        ReferenceKind::Type => {
            let ty = pool_entry(&body.refs.types, index, instruction)?;
            if opcode == Opcode::NewInstance {
                EnqueuerAction::MarkInstantiated(ty)
            } else {
                EnqueuerAction::MarkClassLive(ty)
            }
        }
        ReferenceKind::Field => {
            let field = pool_entry(&body.refs.fields, index, instruction)?;
            if opcode.is_static_get() {
                EnqueuerAction::TraceStaticFieldRead { field, context }
            } else if opcode.is_static_put() {
                EnqueuerAction::TraceStaticFieldWrite { field, context }
            } else if opcode.is_instance_get() {
                EnqueuerAction::TraceInstanceFieldRead { field, context }
            } else {
                EnqueuerAction::TraceInstanceFieldWrite { field, context }
            }
        }
        ReferenceKind::Method => {
            let method = pool_entry(&body.refs.methods, index, instruction)?;
            match opcode.invoke_kind() {
                Some(kind) => EnqueuerAction::TraceInvoke {
                    kind,
                    method,
                    context,
                },
                None => return Ok(None),
            }
        }
    };
    Ok(Some(action))
}

fn pool_entry<T: Copy>(table: &[T], index: usize, instruction: &Instruction) -> EngineResult<T> {
    table.get(index).copied().ok_or_else(|| {
        EngineError::broken_graph(format!(
            "{} references pool index {} outside the reference table",
            instruction, index
        ))
    })
}
