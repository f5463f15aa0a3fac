//! Literal broadcasting promotion.
//!
//! For each broadcastable instruction (numeric binary, boolean binary,
//! compare), a tensor-typed operand that is a scalar-valued literal — or
//! the result of a `literal` instruction holding a scalar value — is
//! replaced by a scalar-typed literal carrying the same value. Later
//! broadcasting work shrinks and equal literals become CSE-able. The
//! instruction's result type is never changed: a promotion that would
//! change it is skipped.

use tir_analysis::{BlockTransform, PassManager};
use tir_core::{
    BlockId, Definition, FuncId, InstId, InstructionKind, Literal, Module, Type, Use, infer_type,
};

pub struct LiteralBroadcastingPromotion;

impl LiteralBroadcastingPromotion {
    /// The scalar-typed replacement for a promotable operand, if any.
    fn promoted(module: &Module, func: FuncId, operand: &Use) -> Option<Use> {
        let function = module.function(func);
        let (ty, literal) = match operand {
            Use::Literal(ty, literal) => (ty.clone(), literal.clone()),
            Use::Definition(Definition::Instruction(inst)) => {
                match &function.instruction(*inst).kind {
                    InstructionKind::Literal(literal, ty) => (ty.clone(), literal.clone()),
                    _ => return None,
                }
            }
            _ => return None,
        };
        let (shape, dtype) = ty.tensor_type()?;
        let scalar_valued = matches!(literal, Literal::Scalar(_) | Literal::Bool(_));
        if !scalar_valued {
            return None;
        }
        // Already a scalar-typed literal use: nothing to do.
        if shape.is_scalar() && matches!(operand, Use::Literal(_, _)) {
            return None;
        }
        Some(Use::Literal(Type::scalar(dtype), literal))
    }

    fn promote_instruction(module: &mut Module, func: FuncId, inst: InstId) -> bool {
        let function = module.function(func);
        let kind = &function.instruction(inst).kind;
        let operands: Vec<Use> = match kind {
            InstructionKind::NumericBinary(_, a, b)
            | InstructionKind::BooleanBinary(_, a, b)
            | InstructionKind::Compare(_, a, b) => vec![a.clone(), b.clone()],
            _ => return false,
        };

        let original_ty = infer_type(kind, module, function);
        let mut candidate = kind.clone();
        let mut promoted_any = false;
        for operand in &operands {
            if let Some(replacement) = Self::promoted(module, func, operand) {
                candidate.substitute(&replacement, operand);
                promoted_any = true;
            }
        }
        if !promoted_any {
            return false;
        }
        if infer_type(&candidate, module, function) != original_ty {
            tracing::trace!(?inst, "skipping promotion that would change the result type");
            return false;
        }
        module.function_mut(func).instruction_mut(inst).kind = candidate;
        true
    }
}

impl BlockTransform for LiteralBroadcastingPromotion {
    fn run(
        module: &mut Module,
        func: FuncId,
        block: BlockId,
        _passes: &mut PassManager,
    ) -> bool {
        let insts: Vec<InstId> = module.function(func).block(block).insts().to_vec();
        let mut changed = false;
        for inst in insts {
            changed |= Self::promote_instruction(module, func, inst);
        }
        changed
    }
}
