//! The IR type system.
//!
//! Types are structural except for struct/enum/alias, which are interned
//! handles into module-owned tables. `Bool` is the canonical rank-0 bool
//! tensor: the `tensor` constructor normalises `([], bool)` to `Bool`, so
//! every type has exactly one textual spelling.

use tir_common::{DataType, TensorShape};

use crate::entity::{AliasId, EnumId, StructId};
use crate::module::Module;
use crate::value::Use;

/// One step of an element-path into an aggregate type.
///
/// `Index` applies to tuples, tensors (dropping the leading dimension) and
/// arrays; `Name` applies to structs; `Value` (a dynamic int index) applies
/// to tensors and arrays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKey {
    Index(usize),
    Name(String),
    Value(Use),
}

/// A type in the IR.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    Bool,
    Tensor(TensorShape, DataType),
    Tuple(Vec<Type>),
    Array(usize, Box<Type>),
    Function(Vec<Type>, Box<Type>),
    Pointer(Box<Type>),
    Box(Box<Type>),
    Struct(StructId),
    Enum(EnumId),
    Alias(AliasId),
    Stack,
    Invalid,
}

impl Type {
    /// Create a tensor type, normalising the rank-0 bool tensor to `Bool`.
    pub fn tensor(shape: TensorShape, dtype: DataType) -> Type {
        if shape.is_scalar() && dtype.is_bool() {
            Type::Bool
        } else {
            Type::Tensor(shape, dtype)
        }
    }

    /// The scalar (rank-0) tensor type of a data type.
    pub fn scalar(dtype: DataType) -> Type {
        Type::tensor(TensorShape::scalar(), dtype)
    }

    pub fn pointer(element: Type) -> Type {
        Type::Pointer(Box::new(element))
    }

    pub fn boxed(element: Type) -> Type {
        Type::Box(Box::new(element))
    }

    pub fn function(arguments: Vec<Type>, result: Type) -> Type {
        Type::Function(arguments, Box::new(result))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// A scalar is a rank-0 tensor.
    pub fn is_scalar(&self) -> bool {
        match self {
            Type::Bool => true,
            Type::Tensor(shape, _) => shape.is_scalar(),
            _ => false,
        }
    }

    /// Extract the shape and data type if this is a tensor type.
    ///
    /// `Bool` extracts as the scalar bool tensor.
    pub fn tensor_type(&self) -> Option<(TensorShape, DataType)> {
        match self {
            Type::Bool => Some((TensorShape::scalar(), DataType::Bool)),
            Type::Tensor(shape, dtype) => Some((shape.clone(), *dtype)),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Type> {
        match self {
            Type::Pointer(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_box(&self) -> Option<&Type> {
        match self {
            Type::Box(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Function(arguments, result) => Some((arguments, result)),
            _ => None,
        }
    }

    /// Resolve the top-level alias chain. Opaque aliases stay unchanged;
    /// a cyclic alias chain resolves to `Invalid`.
    pub fn unaliased(&self, module: &Module) -> Type {
        let mut current = self.clone();
        let mut visited: smallvec::SmallVec<[AliasId; 4]> = smallvec::SmallVec::new();
        loop {
            match current {
                Type::Alias(id) => {
                    if visited.contains(&id) {
                        return Type::Invalid;
                    }
                    visited.push(id);
                    match module.alias(id).underlying.clone() {
                        Some(underlying) => current = underlying,
                        None => return Type::Alias(id),
                    }
                }
                other => return other,
            }
        }
    }

    /// A type is valid iff all component types are valid and all aliases
    /// resolve. Opaque aliases are valid only where `allow_opaque` holds
    /// (function declarations).
    pub fn is_valid(&self, module: &Module, allow_opaque: bool) -> bool {
        match self {
            Type::Invalid => false,
            Type::Void | Type::Bool | Type::Stack | Type::Struct(_) | Type::Enum(_) => true,
            Type::Tensor(_, dtype) => match dtype {
                DataType::Int(width) => *width > 0,
                _ => true,
            },
            Type::Tuple(elements) => elements.iter().all(|t| t.is_valid(module, allow_opaque)),
            Type::Array(_, element) | Type::Pointer(element) | Type::Box(element) => {
                element.is_valid(module, allow_opaque)
            }
            Type::Function(arguments, result) => {
                arguments.iter().all(|t| t.is_valid(module, allow_opaque))
                    && result.is_valid(module, allow_opaque)
            }
            Type::Alias(_) => match self.unaliased(module) {
                Type::Alias(_) => allow_opaque,
                Type::Invalid => false,
                resolved => resolved.is_valid(module, allow_opaque),
            },
        }
    }

    /// Look up the element type at a key path. Returns `None` when the path
    /// is not well-formed for this type.
    pub fn element_type(&self, module: &Module, keys: &[ElementKey]) -> Option<Type> {
        let mut current = self.unaliased(module);
        for key in keys {
            current = match (key, &current) {
                (ElementKey::Index(i), Type::Tuple(elements)) => elements.get(*i)?.clone(),
                (ElementKey::Index(i), Type::Tensor(shape, dtype)) => {
                    if shape.is_scalar() || *i >= shape[0] {
                        return None;
                    }
                    Type::tensor(shape.dropping_dimension(0)?, *dtype)
                }
                (ElementKey::Index(i), Type::Array(count, element)) => {
                    if i >= count {
                        return None;
                    }
                    (**element).clone()
                }
                (ElementKey::Name(name), Type::Struct(id)) => {
                    module.struct_type(*id).fields.get(name)?.clone()
                }
                (ElementKey::Value(_), Type::Tensor(shape, dtype)) => {
                    if shape.is_scalar() {
                        return None;
                    }
                    Type::tensor(shape.dropping_dimension(0)?, *dtype)
                }
                (ElementKey::Value(_), Type::Array(_, element)) => (**element).clone(),
                _ => return None,
            };
            current = current.unaliased(module);
        }
        Some(current)
    }

    /// Conformance is strict equality after canonicalisation.
    pub fn conforms_to(&self, other: &Type, module: &Module) -> bool {
        self.unaliased(module) == other.unaliased(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tir_common::FloatPrecision;

    #[test]
    fn scalar_bool_tensor_normalises_to_bool() {
        assert_eq!(Type::scalar(DataType::Bool), Type::Bool);
        assert!(Type::Bool.is_scalar());
        let (shape, dtype) = Type::Bool.tensor_type().unwrap();
        assert!(shape.is_scalar());
        assert_eq!(dtype, DataType::Bool);
    }

    #[test]
    fn scalar_numeric_tensor_stays_a_tensor() {
        let f32_scalar = Type::scalar(DataType::Float(FloatPrecision::Single));
        assert!(matches!(f32_scalar, Type::Tensor(_, _)));
        assert!(f32_scalar.is_scalar());
    }
}
