//! Semantic verifier.
//!
//! Verification is all-or-nothing: the first violated invariant is
//! returned. Within a function, operand provenance and dominance run
//! first, then block structure (names, parents, terminators), then
//! per-instruction typing, so type inference never walks an undominated
//! use chain.

use rustc_hash::FxHashSet;
use tir_analysis::{DominanceAnalysis, DominatorTree, FunctionAnalysis};
use tir_core::{
    BlockId, Definition, FuncId, Function, InstId, Module, Type,
};

mod check;
mod error;

pub use error::VerificationError;

/// Verify a whole module.
pub fn verify_module(module: &Module) -> Result<(), VerificationError> {
    tracing::debug!(module = module.name(), "verifying module");
    verify_type_names(module)?;
    verify_global_names(module)?;

    for (_, variable) in module.variables() {
        if let Some(name) = &variable.name {
            check_name(name)?;
        }
        if !variable.ty.is_valid(module, false) {
            return Err(VerificationError::InvalidType {
                ty: variable.ty.display(module).to_string(),
                context: "global variable".to_string(),
            });
        }
    }

    for &func in module.function_ids() {
        verify_function(module, func)?;
    }
    Ok(())
}

/// Verify a single function.
pub fn verify_function(module: &Module, func: FuncId) -> Result<(), VerificationError> {
    let function = module.function(func);
    if let Some(name) = &function.name {
        check_name(name)?;
    }

    let is_declaration = function.declaration_kind.is_some();
    for ty in function.argument_types() {
        check_type(module, ty, is_declaration, "function signature")?;
    }
    check_type(module, function.return_type(), is_declaration, "function signature")?;

    if let Some(kind) = &function.declaration_kind {
        if !function.block_ids().is_empty() {
            return Err(VerificationError::DeclarationWithBody { function: func });
        }
        if let tir_core::DeclarationKind::Adjoint(config) = kind {
            let expected = expected_adjoint_type(module, func, config)?;
            if expected != function.ty() {
                return Err(VerificationError::AdjointSignatureMismatch {
                    function: func,
                    expected: expected.display(module).to_string(),
                });
            }
        }
        return Ok(());
    }

    let Some(entry) = function.entry() else {
        return Err(VerificationError::EmptyBody { function: func });
    };
    if function.block_argument_types(entry) != function.argument_types() {
        return Err(VerificationError::EntryArgumentMismatch { function: func });
    }

    // Function-level checks run first: operand provenance and dominance
    // (so `return %0.1` before its definition reports use-before-def, not
    // a terminator-placement error), then block structure, then typing.
    let dominance = DominanceAnalysis::run(module, func);
    for &block in function.block_ids() {
        for &inst in function.block(block).insts() {
            verify_operand_provenance(function, inst, &dominance)?;
        }
    }
    for &block in function.block_ids() {
        verify_block_structure(function, block)?;
    }
    for &block in function.block_ids() {
        for &inst in function.block(block).insts() {
            check::verify_instruction(module, function, inst)?;
        }
    }
    Ok(())
}

fn verify_type_names(module: &Module) -> Result<(), VerificationError> {
    let mut seen = FxHashSet::default();
    let names = module
        .aliases()
        .map(|(_, a)| a.name.clone())
        .chain(module.structs().map(|(_, s)| s.name.clone()))
        .chain(module.enums().map(|(_, e)| e.name.clone()));
    for name in names {
        check_name(&name)?;
        if !seen.insert(name.clone()) {
            return Err(VerificationError::RedefinedName { name });
        }
    }
    for (_, st) in module.structs() {
        for (field, ty) in &st.fields {
            check_name(field)?;
            check_type(module, ty, false, "struct field")?;
        }
    }
    for (_, en) in module.enums() {
        for (case, payload) in &en.cases {
            check_name(case)?;
            for ty in payload {
                check_type(module, ty, false, "enum case")?;
            }
        }
    }
    Ok(())
}

fn verify_global_names(module: &Module) -> Result<(), VerificationError> {
    let mut seen = FxHashSet::default();
    let names = module
        .variables()
        .filter_map(|(_, v)| v.name.clone())
        .chain(module.functions().filter_map(|(_, f)| f.name.clone()));
    for name in names {
        check_name(&name)?;
        if !seen.insert(name.clone()) {
            return Err(VerificationError::RedefinedName { name });
        }
    }
    Ok(())
}

fn verify_block_structure(function: &Function, block: BlockId) -> Result<(), VerificationError> {
    let data = function.block(block);
    if let Some(name) = &data.name {
        check_name(name)?;
    }

    let mut local_names = FxHashSet::default();
    for &arg in data.args() {
        let argument = function.argument(arg);
        if argument.block() != block {
            return Err(VerificationError::ArgumentParentMismatch { block });
        }
        if let Some(name) = &argument.name {
            check_name(name)?;
            if !local_names.insert(name.clone()) {
                return Err(VerificationError::RedefinedName { name: name.clone() });
            }
        }
    }

    let insts = data.insts();
    let Some((&last, rest)) = insts.split_last() else {
        return Err(VerificationError::MissingTerminator { block });
    };
    for &inst in rest {
        if function.instruction(inst).kind.is_terminator() {
            return Err(VerificationError::TerminatorNotLast { block });
        }
    }
    if !function.instruction(last).kind.is_terminator() {
        return Err(VerificationError::MissingTerminator { block });
    }

    for &inst in insts {
        let instruction = function.instruction(inst);
        if instruction.block() != block {
            return Err(VerificationError::InstructionParentMismatch { inst, block });
        }
        if let Some(name) = &instruction.name {
            check_name(name)?;
            if !local_names.insert(name.clone()) {
                return Err(VerificationError::RedefinedName { name: name.clone() });
            }
        }
    }
    Ok(())
}

/// Every operand definition must live in this function and properly
/// dominate its user.
fn verify_operand_provenance(
    function: &Function,
    inst: InstId,
    dominance: &DominatorTree,
) -> Result<(), VerificationError> {
    for operand in function.instruction(inst).kind.operands() {
        let Some(definition) = operand.as_definition() else {
            continue;
        };
        match definition {
            Definition::Instruction(def) => {
                if !function.contains_instruction(def) {
                    return Err(VerificationError::DanglingUse { inst });
                }
                if !dominance.properly_dominates(definition, inst, function) {
                    return Err(VerificationError::UseBeforeDef { inst, definition });
                }
            }
            Definition::Argument(def) => {
                if !function.contains_argument(def) {
                    return Err(VerificationError::DanglingUse { inst });
                }
                if !dominance.properly_dominates(definition, inst, function) {
                    return Err(VerificationError::UseBeforeDef { inst, definition });
                }
            }
            Definition::Variable(_) | Definition::Function(_) => {}
        }
    }
    Ok(())
}

/// Synthesise the type an adjoint declaration must have.
fn expected_adjoint_type(
    module: &Module,
    function: FuncId,
    config: &tir_core::AdjointConfig,
) -> Result<Type, VerificationError> {
    let invalid = || VerificationError::AdjointConfigurationInvalid { function };
    let primal = module.function(config.primal);

    let differentiated_output = match config.source_index {
        Some(index) => match primal.return_type() {
            Type::Tuple(elements) => elements.get(index).cloned().ok_or_else(invalid)?,
            _ => return Err(invalid()),
        },
        None => primal.return_type().clone(),
    };

    let mut arguments = primal.argument_types().to_vec();
    if config.seedable {
        arguments.push(differentiated_output.clone());
    }

    let wrt: Vec<usize> = match &config.argument_indices {
        Some(indices) => indices.clone(),
        None => (0..primal.argument_types().len()).collect(),
    };
    let mut results = Vec::new();
    for index in wrt {
        results.push(
            primal
                .argument_types()
                .get(index)
                .cloned()
                .ok_or_else(invalid)?,
        );
    }
    for &kept in &config.kept_indices {
        let output = match primal.return_type() {
            Type::Tuple(elements) => elements.get(kept).cloned().ok_or_else(invalid)?,
            other if kept == 0 => other.clone(),
            _ => return Err(invalid()),
        };
        results.push(output);
    }
    let result = if results.len() == 1 {
        results.remove(0)
    } else {
        Type::Tuple(results)
    };
    Ok(Type::function(arguments, result))
}

/// Identifier names match `[A-Za-z_][A-Za-z0-9_.]*`.
fn check_name(name: &str) -> Result<(), VerificationError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(VerificationError::InvalidName {
            name: name.to_string(),
        })
    }
}

fn check_type(
    module: &Module,
    ty: &Type,
    allow_opaque: bool,
    context: &str,
) -> Result<(), VerificationError> {
    if ty.is_valid(module, allow_opaque) {
        Ok(())
    } else {
        Err(VerificationError::InvalidType {
            ty: ty.display(module).to_string(),
            context: context.to_string(),
        })
    }
}
