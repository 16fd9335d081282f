//! Detection of class initializers that compute the assertion status
//!
//! Compilers lower `assert` by caching `desiredAssertionStatus()` in a static
//! boolean during class initialization. Reading that field means assertion
//! failures can be reported at run time, so the configured assertion
//! handlers must be kept live.

use super::{EnqueuerAnalysis, EnqueuerContext, ProgramMethod};
use crate::error::EngineResult;
use crate::graph::{
    Code, FieldId, FieldResolution, ItemFactory, KnownItems, MethodId, StackInstr, StackKind,
};
use shrike_bytecode::InvokeKind;

/// What javac emits after `desiredAssertionStatus()`:
/// `ifne L; iconst_1; goto M; L: iconst_0; M: putstatic $assertionsDisabled`
const JAVAC_SEQUENCE: [StackKind; 5] = [
    StackKind::If,
    StackKind::Const,
    StackKind::Goto,
    StackKind::Const,
    StackKind::StaticPut,
];

/// Coverage probe JaCoCo may inject into the javac sequence
const JACOCO_PROBE: [StackKind; 4] = [
    StackKind::Load,
    StackKind::Const,
    StackKind::Const,
    StackKind::ArrayStore,
];

/// The branch-free form the optimizer itself writes back: `iconst_1; ixor; putstatic`
const REWRITTEN_SEQUENCE: [StackKind; 3] = [
    StackKind::Const,
    StackKind::LogicalBinop,
    StackKind::StaticPut,
];

/// Keeps assertion handlers live and reports class initializers that
/// compute the assertion status.
#[derive(Debug, Clone)]
pub struct ClassInitializerAssertionEnablingAnalysis {
    known: KnownItems,
    assertion_handlers: Vec<MethodId>,
}

impl ClassInitializerAssertionEnablingAnalysis {
    /// Create the analysis for the given handler methods
    pub fn new(items: &ItemFactory, assertion_handlers: Vec<MethodId>) -> Self {
        Self {
            known: items.known(),
            assertion_handlers,
        }
    }

    /// `$assertionsDisabled:Z` on any holder
    fn is_using_java_assertions_disabled_field(&self, items: &ItemFactory, field: FieldId) -> bool {
        let field = items.field(field);
        field.name == self.known.assertions_disabled_name && field.ty == self.known.boolean_type
    }

    /// Exactly `kotlin._Assertions.ENABLED:Z`
    fn is_using_kotlin_assertions_enabled_field(&self, field: FieldId) -> bool {
        field == self.known.kotlin_assertions_enabled
    }

    fn is_desired_assertion_status_call(&self, instruction: &StackInstr) -> bool {
        matches!(
            instruction,
            StackInstr::Invoke { kind: InvokeKind::Virtual, method }
                if *method == self.known.desired_assertion_status
        )
    }

    fn has_javac_clinit_assertion_code(&self, items: &ItemFactory, code: &[StackInstr]) -> bool {
        for (i, instruction) in code.iter().enumerate() {
            if self.is_desired_assertion_status_call(instruction) {
                let field = match_javac_sequence(code, i + 1)
                    .or_else(|| match_rewritten_sequence(code, i + 1));
                if let Some(field) = field {
                    return self.is_using_java_assertions_disabled_field(items, field);
                }
            }
            // Straight-line prefix only.
            if instruction.is_jump() {
                return false;
            }
        }
        false
    }

    fn has_kotlinc_clinit_assertion_code(
        &self,
        items: &ItemFactory,
        method: ProgramMethod<'_>,
        code: &[StackInstr],
    ) -> bool {
        if method.holder.ty != self.known.kotlin_assertions_type {
            return false;
        }
        for pair in code.windows(2) {
            let (instruction, next) = (&pair[0], &pair[1]);
            if self.is_desired_assertion_status_call(instruction) {
                if let Some(field) = next.static_put_field() {
                    if items.field(field).name == self.known.enabled_name {
                        return true;
                    }
                }
            }
            if instruction.is_jump() {
                return false;
            }
        }
        false
    }
}

impl EnqueuerAnalysis for ClassInitializerAssertionEnablingAnalysis {
    fn name(&self) -> &'static str {
        "class-initializer-assertion-enabling"
    }

    fn process_newly_live_method(
        &mut self,
        method: ProgramMethod<'_>,
        cx: &mut EnqueuerContext<'_>,
    ) -> EngineResult<()> {
        let items = cx.program.items();
        let reference = method.reference();
        if !items.is_class_initializer(reference) {
            return Ok(());
        }
        let Some(code) = method.definition.code.as_ref().and_then(Code::as_stack) else {
            return Ok(());
        };

        if self.has_javac_clinit_assertion_code(items, code)
            || self.has_kotlinc_clinit_assertion_code(items, method, code)
        {
            tracing::debug!(
                method = %items.method_to_string(reference),
                "class initializer computes assertion status"
            );
            cx.feedback.set_initializer_enabling_assertions(reference);
        }
        Ok(())
    }

    fn trace_static_field_read(
        &mut self,
        field: FieldId,
        _resolution: Option<FieldResolution>,
        context: Option<MethodId>,
        cx: &mut EnqueuerContext<'_>,
    ) -> EngineResult<()> {
        let items = cx.program.items();
        if self.is_using_java_assertions_disabled_field(items, field)
            || self.is_using_kotlin_assertions_enabled_field(field)
        {
            for &handler in &self.assertion_handlers {
                if cx.worklist.enqueue_trace_invoke_static(handler, context) {
                    tracing::debug!(
                        field = %items.field_to_string(field),
                        handler = %items.method_to_string(handler),
                        "assertion status read keeps handler live"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Whether `code[from..]` starts with exactly `sequence`
fn skip_sequence(sequence: &[StackKind], code: &[StackInstr], from: usize) -> bool {
    code.get(from..from + sequence.len()).map_or(false, |window| {
        window
            .iter()
            .zip(sequence)
            .all(|(instruction, &kind)| instruction.kind() == kind)
    })
}

/// Match the javac sequence starting at `from`, ignoring markers and an
/// embedded JaCoCo probe. Returns the field written by the final `putstatic`.
fn match_javac_sequence(code: &[StackInstr], from: usize) -> Option<FieldId> {
    let mut next = 0;
    let mut last = None;
    let mut i = from;

    while i < code.len() && next < JAVAC_SEQUENCE.len() {
        let mut instruction = &code[i];
        last = Some(instruction);
        if instruction.is_marker() {
            i += 1;
            continue;
        }
        if instruction.kind() != JAVAC_SEQUENCE[next] {
            if instruction.kind() == JACOCO_PROBE[0] && skip_sequence(&JACOCO_PROBE, code, i) {
                i += JACOCO_PROBE.len();
                if i >= code.len() {
                    break;
                }
                instruction = &code[i];
                last = Some(instruction);
            }
            if instruction.is_marker() {
                i += 1;
                continue;
            }
            if instruction.kind() != JAVAC_SEQUENCE[next] {
                break;
            }
        }
        next += 1;
        i += 1;
    }

    if next == JAVAC_SEQUENCE.len() {
        last.and_then(StackInstr::static_put_field)
    } else {
        None
    }
}

/// Match the rewritten sequence starting at `from`, ignoring loads and stores
fn match_rewritten_sequence(code: &[StackInstr], from: usize) -> Option<FieldId> {
    let mut next = 0;
    let mut last = None;

    for instruction in code.iter().skip(from) {
        if next == REWRITTEN_SEQUENCE.len() {
            break;
        }
        last = Some(instruction);
        if matches!(instruction.kind(), StackKind::Load | StackKind::Store) {
            continue;
        }
        if instruction.kind() != REWRITTEN_SEQUENCE[next] {
            break;
        }
        next += 1;
    }

    if next == REWRITTEN_SEQUENCE.len() {
        last.and_then(StackInstr::static_put_field)
    } else {
        None
    }
}
