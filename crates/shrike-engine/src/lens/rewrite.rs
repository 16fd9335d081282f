//! Rewriting method bodies through a lens before encoding

use super::GraphLens;
use crate::error::{EngineError, EngineResult};
use crate::graph::{Code, ReferenceTable, RegisterCode, StackInstr};
use shrike_bytecode::Instruction;

/// Rewrite every member reference of `code` through `lens`.
///
/// Invoke kinds follow the lens history, so calls to publicized methods
/// become virtual calls.
pub fn rewrite_code(code: &Code, lens: &GraphLens) -> EngineResult<Code> {
    if lens.is_identity() {
        return Ok(code.clone());
    }
    match code {
        Code::Stack(instructions) => Ok(Code::Stack(
            instructions
                .iter()
                .map(|instruction| rewrite_stack_instr(instruction, lens))
                .collect(),
        )),
        Code::Register(body) => rewrite_register_code(body, lens).map(Code::Register),
    }
}

fn rewrite_stack_instr(instruction: &StackInstr, lens: &GraphLens) -> StackInstr {
    match *instruction {
        StackInstr::Invoke { kind, method } => {
            let lookup = lens.lookup_method(method);
            StackInstr::Invoke {
                kind: lookup.rewrite_invoke(kind),
                method: lookup.method,
            }
        }
        StackInstr::StaticGet(field) => StackInstr::StaticGet(lens.resolve_field(field)),
        StackInstr::StaticPut(field) => StackInstr::StaticPut(lens.resolve_field(field)),
        StackInstr::InstanceGet(field) => StackInstr::InstanceGet(lens.resolve_field(field)),
        StackInstr::InstancePut(field) => StackInstr::InstancePut(lens.resolve_field(field)),
        _ => instruction.clone(),
    }
}

fn rewrite_register_code(body: &RegisterCode, lens: &GraphLens) -> EngineResult<RegisterCode> {
    let instructions = body
        .instructions
        .iter()
        .map(|instruction| rewrite_invoke_opcode(instruction, &body.refs, lens))
        .collect::<EngineResult<Vec<_>>>()?;

    let refs = ReferenceTable {
        strings: body.refs.strings.clone(),
        types: body.refs.types.clone(),
        fields: body
            .refs
            .fields
            .iter()
            .map(|&field| lens.resolve_field(field))
            .collect(),
        methods: body
            .refs
            .methods
            .iter()
            .map(|&method| lens.resolve_method(method))
            .collect(),
    };

    Ok(RegisterCode::new(body.registers, instructions, refs))
}

fn rewrite_invoke_opcode(
    instruction: &Instruction,
    refs: &ReferenceTable,
    lens: &GraphLens,
) -> EngineResult<Instruction> {
    let opcode = instruction.opcode();
    let Some(kind) = opcode.invoke_kind() else {
        return Ok(*instruction);
    };

    let method = instruction
        .pool_index()
        .and_then(|index| refs.methods.get(index as usize))
        .ok_or_else(|| {
            EngineError::broken_graph(format!(
                "{} references a method outside the reference table",
                instruction
            ))
        })?;

    let rewritten = lens.lookup_method(*method).rewrite_invoke(kind);
    if rewritten == kind {
        return Ok(*instruction);
    }
    match opcode.with_invoke_kind(rewritten) {
        Some(opcode) => Ok(instruction.with_opcode(opcode)?),
        None => Err(EngineError::broken_graph(format!(
            "no {:?} form of {}",
            rewritten,
            opcode.name()
        ))),
    }
}
