//! Values: literals, definitions, and uses.
//!
//! A `Use` is an operand reference — either an immediate literal carrying
//! its type, or a reference to a definition (argument, instruction, global
//! variable, function). Equality is structural throughout.

use std::cell::RefCell;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::entity::{ArgId, FuncId, InstId, VarId};

thread_local! {
    /// Instructions whose type is currently being inferred, for cyclic
    /// operand-chain detection.
    static INFERENCE_STACK: RefCell<FxHashSet<InstId>> = RefCell::new(FxHashSet::default());
}
use crate::function::Function;
use crate::module::Module;
use crate::types::Type;

/// A scalar numeric literal.
///
/// Floats compare and hash by bit pattern so that uses are structurally
/// comparable; `Int(1)` and `Float(1.0)` are distinct values.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Number {}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
        }
    }
}

/// A literal value. Aggregate literals nest uses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Undefined,
    Zero,
    Null,
    Bool(bool),
    Scalar(Number),
    Tensor(Vec<Use>),
    Tuple(Vec<Use>),
    Array(Vec<Use>),
    Struct(Vec<(String, Use)>),
    Case(String, Vec<Use>),
}

impl Literal {
    /// Aggregate literals contain nested uses.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Literal::Tensor(_)
                | Literal::Tuple(_)
                | Literal::Array(_)
                | Literal::Struct(_)
                | Literal::Case(_, _)
        )
    }

    /// Collect every use nested in this literal, recursively.
    pub fn collect_uses(&self, out: &mut SmallVec<[Use; 4]>) {
        match self {
            Literal::Undefined
            | Literal::Zero
            | Literal::Null
            | Literal::Bool(_)
            | Literal::Scalar(_) => {}
            Literal::Tensor(elements) | Literal::Tuple(elements) | Literal::Array(elements) => {
                for element in elements {
                    element.collect_into(out);
                }
            }
            Literal::Struct(fields) => {
                for (_, value) in fields {
                    value.collect_into(out);
                }
            }
            Literal::Case(_, payload) => {
                for value in payload {
                    value.collect_into(out);
                }
            }
        }
    }

    /// Replace every nested use equal to `old` with `new`, recursively.
    pub fn substitute(&mut self, new: &Use, old: &Use) {
        match self {
            Literal::Undefined
            | Literal::Zero
            | Literal::Null
            | Literal::Bool(_)
            | Literal::Scalar(_) => {}
            Literal::Tensor(elements) | Literal::Tuple(elements) | Literal::Array(elements) => {
                for element in elements {
                    element.substitute(new, old);
                }
            }
            Literal::Struct(fields) => {
                for (_, value) in fields {
                    value.substitute(new, old);
                }
            }
            Literal::Case(_, payload) => {
                for value in payload {
                    value.substitute(new, old);
                }
            }
        }
    }
}

/// A value-producing entity referenced by a use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Definition {
    Argument(ArgId),
    Instruction(InstId),
    Variable(VarId),
    Function(FuncId),
}

/// An operand reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Use {
    Literal(Type, Literal),
    Definition(Definition),
}

impl Use {
    pub fn argument(id: ArgId) -> Use {
        Use::Definition(Definition::Argument(id))
    }

    pub fn instruction(id: InstId) -> Use {
        Use::Definition(Definition::Instruction(id))
    }

    pub fn variable(id: VarId) -> Use {
        Use::Definition(Definition::Variable(id))
    }

    pub fn function(id: FuncId) -> Use {
        Use::Definition(Definition::Function(id))
    }

    pub fn as_definition(&self) -> Option<Definition> {
        match self {
            Use::Definition(definition) => Some(*definition),
            Use::Literal(_, _) => None,
        }
    }

    /// The type this use yields: the literal's type, or the definition's.
    ///
    /// A global variable's use-type is a pointer to its storage. A use
    /// whose inference recurses into its own definition (a cyclic operand
    /// chain, rejected later by the verifier) has no finite type and
    /// yields `Invalid`.
    pub fn ty(&self, module: &Module, function: &Function) -> Type {
        match self {
            Use::Literal(ty, _) => ty.clone(),
            Use::Definition(Definition::Argument(id)) => function.argument(*id).ty.clone(),
            Use::Definition(Definition::Instruction(id)) => {
                let entered = INFERENCE_STACK.with(|stack| stack.borrow_mut().insert(*id));
                if !entered {
                    return Type::Invalid;
                }
                let ty = function.instruction(*id).ty(module, function);
                INFERENCE_STACK.with(|stack| stack.borrow_mut().remove(id));
                ty
            }
            Use::Definition(Definition::Variable(id)) => {
                Type::pointer(module.variable(*id).ty.clone())
            }
            Use::Definition(Definition::Function(id)) => module.function(*id).ty(),
        }
    }

    /// If this use is `old`, replace it with `new`; recurse into aggregate
    /// literal payloads either way.
    pub fn substitute(&mut self, new: &Use, old: &Use) {
        if self == old {
            *self = new.clone();
            return;
        }
        if let Use::Literal(_, literal) = self {
            literal.substitute(new, old);
        }
    }

    /// Collect this use and any uses nested in an aggregate literal.
    pub fn collect_into(&self, out: &mut SmallVec<[Use; 4]>) {
        out.push(self.clone());
        if let Use::Literal(_, literal) = self {
            literal.collect_uses(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use tir_common::DataType;

    fn scalar_use(value: i64) -> Use {
        Use::Literal(Type::scalar(DataType::Int(32)), Literal::Scalar(Number::Int(value)))
    }

    #[test]
    fn number_equality_is_bitwise_for_floats() {
        assert_eq!(Number::Float(1.0), Number::Float(1.0));
        assert_ne!(Number::Float(0.0), Number::Float(-0.0));
        assert_ne!(Number::Int(1), Number::Float(1.0));
    }

    #[test]
    fn substitution_reaches_nested_aggregates() {
        let old = Use::instruction(InstId::from_index(0));
        let new = scalar_use(7);
        let mut tensor = Use::Literal(
            Type::Tensor(tir_common::TensorShape::new([2]), DataType::Int(32)),
            Literal::Tensor(vec![old.clone(), scalar_use(1)]),
        );
        tensor.substitute(&new, &old);
        match &tensor {
            Use::Literal(_, Literal::Tensor(elements)) => {
                assert_eq!(elements[0], new);
                assert_eq!(elements[1], scalar_use(1));
            }
            other => panic!("unexpected use: {other:?}"),
        }
    }
}
