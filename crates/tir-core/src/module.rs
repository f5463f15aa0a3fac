//! Modules: the top-level IR container.
//!
//! A module owns its functions, global variables and nominal types in
//! tombstone arenas with insertion-order vectors. Nominal types are
//! referenced by handle from `Type`; name tables map identifiers to
//! handles. The intrinsic registry is injected at construction.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::entity::{AliasId, Arena, EnumId, FuncId, StructId, VarId};
use crate::function::Function;
use crate::intrinsics::IntrinsicRegistry;
use crate::types::Type;

/// Compilation stage of a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Optimizable,
}

impl Stage {
    pub const fn keyword(self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Optimizable => "optimizable",
        }
    }
}

/// A named type alias. `underlying == None` is an opaque alias, legal
/// only in declaration positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAlias {
    pub name: String,
    pub underlying: Option<Type>,
}

/// A nominal struct type with ordered, uniquely named fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: IndexMap<String, Type>,
}

/// A nominal enum type with ordered, uniquely named cases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub cases: IndexMap<String, Vec<Type>>,
}

/// A global variable.
#[derive(Clone, Debug)]
pub struct Variable {
    pub name: Option<String>,
    pub ty: Type,
}

/// Handle to a nominal type registered in a module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeHandle {
    Alias(AliasId),
    Struct(StructId),
    Enum(EnumId),
}

impl TypeHandle {
    /// The `Type` referring to this nominal type.
    pub fn ty(self) -> Type {
        match self {
            TypeHandle::Alias(id) => Type::Alias(id),
            TypeHandle::Struct(id) => Type::Struct(id),
            TypeHandle::Enum(id) => Type::Enum(id),
        }
    }
}

/// A named global value: a function or a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalValue {
    Function(FuncId),
    Variable(VarId),
}

/// The top-level IR container.
pub struct Module {
    name: String,
    pub stage: Stage,
    intrinsics: Arc<IntrinsicRegistry>,
    functions: Arena<FuncId, Function>,
    function_order: Vec<FuncId>,
    variables: Arena<VarId, Variable>,
    variable_order: Vec<VarId>,
    aliases: Arena<AliasId, TypeAlias>,
    alias_order: Vec<AliasId>,
    structs: Arena<StructId, StructType>,
    struct_order: Vec<StructId>,
    enums: Arena<EnumId, EnumType>,
    enum_order: Vec<EnumId>,
    type_names: FxHashMap<String, TypeHandle>,
    global_names: FxHashMap<String, GlobalValue>,
    version: u64,
}

impl Module {
    pub fn new(name: impl Into<String>, stage: Stage, intrinsics: Arc<IntrinsicRegistry>) -> Self {
        Module {
            name: name.into(),
            stage,
            intrinsics,
            functions: Arena::new(),
            function_order: Vec::new(),
            variables: Arena::new(),
            variable_order: Vec::new(),
            aliases: Arena::new(),
            alias_order: Vec::new(),
            structs: Arena::new(),
            struct_order: Vec::new(),
            enums: Arena::new(),
            enum_order: Vec::new(),
            type_names: FxHashMap::default(),
            global_names: FxHashMap::default(),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intrinsics(&self) -> &IntrinsicRegistry {
        &self.intrinsics
    }

    /// Module epoch for analysis-cache invalidation: changes whenever the
    /// module structure or any contained function changes.
    pub fn epoch(&self) -> u64 {
        self.functions
            .iter()
            .fold(self.version, |acc, (_, f)| acc.wrapping_add(f.version()))
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub fn add_function(&mut self, function: Function) -> FuncId {
        self.bump();
        let name = function.name.clone();
        let id = self.functions.insert(function);
        self.function_order.push(id);
        if let Some(name) = name {
            self.global_names.insert(name, GlobalValue::Function(id));
        }
        id
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id]
    }

    /// Function ids in source order.
    pub fn function_ids(&self) -> &[FuncId] {
        &self.function_order
    }

    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> + '_ {
        self.function_order
            .iter()
            .map(move |&id| (id, &self.functions[id]))
    }

    pub fn function_index(&self, id: FuncId) -> Option<usize> {
        self.function_order.iter().position(|&f| f == id)
    }

    pub fn function_named(&self, name: &str) -> Option<FuncId> {
        match self.global_names.get(name) {
            Some(GlobalValue::Function(id)) => Some(*id),
            _ => None,
        }
    }

    // =========================================================================
    // Variables
    // =========================================================================

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.bump();
        let name = variable.name.clone();
        let id = self.variables.insert(variable);
        self.variable_order.push(id);
        if let Some(name) = name {
            self.global_names.insert(name, GlobalValue::Variable(id));
        }
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id]
    }

    /// Variable ids in source order.
    pub fn variable_ids(&self) -> &[VarId] {
        &self.variable_order
    }

    pub fn variables(&self) -> impl Iterator<Item = (VarId, &Variable)> + '_ {
        self.variable_order
            .iter()
            .map(move |&id| (id, &self.variables[id]))
    }

    pub fn variable_index(&self, id: VarId) -> Option<usize> {
        self.variable_order.iter().position(|&v| v == id)
    }

    pub fn variable_named(&self, name: &str) -> Option<VarId> {
        match self.global_names.get(name) {
            Some(GlobalValue::Variable(id)) => Some(*id),
            _ => None,
        }
    }

    /// Look up any global value by name.
    pub fn global_named(&self, name: &str) -> Option<GlobalValue> {
        self.global_names.get(name).copied()
    }

    /// The combined global index space: variables in order, then
    /// functions in order (anonymous `@N` references).
    pub fn global_by_index(&self, index: usize) -> Option<GlobalValue> {
        if index < self.variable_order.len() {
            Some(GlobalValue::Variable(self.variable_order[index]))
        } else {
            self.function_order
                .get(index - self.variable_order.len())
                .map(|&f| GlobalValue::Function(f))
        }
    }

    /// Index of a global in the combined index space.
    pub fn global_index(&self, global: GlobalValue) -> Option<usize> {
        match global {
            GlobalValue::Variable(id) => self.variable_index(id),
            GlobalValue::Function(id) => self
                .function_index(id)
                .map(|i| i + self.variable_order.len()),
        }
    }

    // =========================================================================
    // Nominal types
    // =========================================================================

    pub fn add_alias(&mut self, alias: TypeAlias) -> AliasId {
        self.bump();
        let name = alias.name.clone();
        let id = self.aliases.insert(alias);
        self.alias_order.push(id);
        self.type_names.insert(name, TypeHandle::Alias(id));
        id
    }

    pub fn add_struct(&mut self, struct_type: StructType) -> StructId {
        self.bump();
        let name = struct_type.name.clone();
        let id = self.structs.insert(struct_type);
        self.struct_order.push(id);
        self.type_names.insert(name, TypeHandle::Struct(id));
        id
    }

    pub fn add_enum(&mut self, enum_type: EnumType) -> EnumId {
        self.bump();
        let name = enum_type.name.clone();
        let id = self.enums.insert(enum_type);
        self.enum_order.push(id);
        self.type_names.insert(name, TypeHandle::Enum(id));
        id
    }

    pub fn alias(&self, id: AliasId) -> &TypeAlias {
        &self.aliases[id]
    }

    pub fn alias_mut(&mut self, id: AliasId) -> &mut TypeAlias {
        self.bump();
        &mut self.aliases[id]
    }

    pub fn struct_type(&self, id: StructId) -> &StructType {
        &self.structs[id]
    }

    pub fn struct_type_mut(&mut self, id: StructId) -> &mut StructType {
        self.bump();
        &mut self.structs[id]
    }

    pub fn enum_type(&self, id: EnumId) -> &EnumType {
        &self.enums[id]
    }

    pub fn enum_type_mut(&mut self, id: EnumId) -> &mut EnumType {
        self.bump();
        &mut self.enums[id]
    }

    pub fn aliases(&self) -> impl Iterator<Item = (AliasId, &TypeAlias)> + '_ {
        self.alias_order.iter().map(move |&id| (id, &self.aliases[id]))
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &StructType)> + '_ {
        self.struct_order.iter().map(move |&id| (id, &self.structs[id]))
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &EnumType)> + '_ {
        self.enum_order.iter().map(move |&id| (id, &self.enums[id]))
    }

    pub fn type_named(&self, name: &str) -> Option<TypeHandle> {
        self.type_names.get(name).copied()
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Allocate a fresh global name: the base itself, then `base_0`, …
    pub fn make_fresh_global_name(&self, base: &str) -> String {
        if !self.global_names.contains_key(base) {
            return base.to_string();
        }
        let mut counter = 0usize;
        loop {
            let candidate = format!("{base}_{counter}");
            if !self.global_names.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}
