//! The intrinsic registry collaborator.
//!
//! Intrinsics are externally registered builtin operations keyed by
//! opcode string. The registry is injected at module construction; there
//! is no process-wide mutable registry.

use std::sync::Arc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tir_common::DataType;

use crate::types::Type;

/// An externally registered builtin operation.
pub trait Intrinsic: Send + Sync {
    /// The opcode string this intrinsic is keyed by.
    fn opcode(&self) -> &str;

    /// The result type for the given argument types, or `Type::Invalid`
    /// when the arguments do not fit.
    fn result_type(&self, args: &[Type]) -> Type;
}

/// A name-keyed collection of intrinsics.
#[derive(Default)]
pub struct IntrinsicRegistry {
    intrinsics: FxHashMap<String, Arc<dyn Intrinsic>>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        IntrinsicRegistry::default()
    }

    /// Register an intrinsic under its opcode. Later registrations win.
    pub fn register(&mut self, intrinsic: Arc<dyn Intrinsic>) {
        self.intrinsics
            .insert(intrinsic.opcode().to_string(), intrinsic);
    }

    /// Look up an intrinsic by opcode.
    pub fn intrinsic(&self, named: &str) -> Option<&Arc<dyn Intrinsic>> {
        self.intrinsics.get(named)
    }
}

/// Element-wise unary intrinsic over numeric tensors: result type equals
/// the argument type.
struct ElementwiseUnary {
    opcode: &'static str,
    float_only: bool,
}

impl Intrinsic for ElementwiseUnary {
    fn opcode(&self) -> &str {
        self.opcode
    }

    fn result_type(&self, args: &[Type]) -> Type {
        match args {
            [arg] => match arg.tensor_type() {
                Some((shape, dtype)) if dtype.is_numeric() => {
                    if self.float_only && !matches!(dtype, DataType::Float(_)) {
                        return Type::Invalid;
                    }
                    Type::tensor(shape, dtype)
                }
                _ => Type::Invalid,
            },
            _ => Type::Invalid,
        }
    }
}

/// Binary scalar intrinsic usable as a reduction combinator:
/// `(scalar, scalar) -> scalar` over a numeric data type.
struct ScalarBinary {
    opcode: &'static str,
}

impl Intrinsic for ScalarBinary {
    fn opcode(&self) -> &str {
        self.opcode
    }

    fn result_type(&self, args: &[Type]) -> Type {
        match args {
            [a, b] if a == b => match a.tensor_type() {
                Some((shape, dtype)) if shape.is_scalar() && dtype.is_numeric() => {
                    Type::scalar(dtype)
                }
                _ => Type::Invalid,
            },
            _ => Type::Invalid,
        }
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<IntrinsicRegistry>> = Lazy::new(|| {
    let mut registry = IntrinsicRegistry::new();
    registry.register(Arc::new(ElementwiseUnary {
        opcode: "relu",
        float_only: false,
    }));
    registry.register(Arc::new(ElementwiseUnary {
        opcode: "softmax",
        float_only: true,
    }));
    registry.register(Arc::new(ScalarBinary { opcode: "mean" }));
    Arc::new(registry)
});

/// The default registry: `relu`, `softmax`, and the `mean` combinator.
pub fn default_registry() -> Arc<IntrinsicRegistry> {
    DEFAULT_REGISTRY.clone()
}
