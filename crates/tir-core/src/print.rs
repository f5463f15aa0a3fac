//! Textual IR printing.
//!
//! The printer is the inverse of the parser: `parse(print(m))` yields a
//! structurally equal module (anonymous names are re-derived from
//! container order). Nominal types and unnamed values need module and
//! function context, so printing goes through display adapters rather
//! than bare `Display` impls.

use std::fmt::{self, Display, Formatter};

use rustc_hash::FxHashMap;

use crate::entity::{ArgId, BlockId, InstId};
use crate::function::{DeclarationKind, Function, FunctionAttributes};
use crate::instruction::InstructionKind;
use crate::module::{GlobalValue, Module};
use crate::ops::ReductionCombinator;
use crate::types::{ElementKey, Type};
use crate::value::{Definition, Literal, Use};
use tir_common::TensorShape;

impl Module {
    /// Display adapter for the whole module.
    pub fn display(&self) -> ModulePrinter<'_> {
        ModulePrinter { module: self }
    }
}

impl Type {
    /// Display adapter resolving nominal type names through the module.
    pub fn display<'a>(&'a self, module: &'a Module) -> TypePrinter<'a> {
        TypePrinter { module, ty: self }
    }
}

pub struct TypePrinter<'a> {
    module: &'a Module,
    ty: &'a Type,
}

impl Display for TypePrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_type(f, self.module, self.ty)
    }
}

fn write_type(f: &mut Formatter<'_>, module: &Module, ty: &Type) -> fmt::Result {
    match ty {
        Type::Void => write!(f, "void"),
        Type::Bool => write!(f, "bool"),
        Type::Stack => write!(f, "stack"),
        Type::Invalid => write!(f, "invalid"),
        Type::Tensor(shape, dtype) => {
            if shape.is_scalar() {
                write!(f, "{dtype}")
            } else {
                write!(f, "tensor<{shape} x {dtype}>")
            }
        }
        Type::Tuple(elements) => {
            write!(f, "(")?;
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_type(f, module, element)?;
            }
            write!(f, ")")
        }
        Type::Array(count, element) => {
            write!(f, "[{count} x ")?;
            write_type(f, module, element)?;
            write!(f, "]")
        }
        Type::Function(arguments, result) => {
            write!(f, "(")?;
            for (i, argument) in arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_type(f, module, argument)?;
            }
            write!(f, ") -> ")?;
            write_type(f, module, result)
        }
        Type::Pointer(element) => {
            write!(f, "*")?;
            write_type(f, module, element)
        }
        Type::Box(element) => {
            write!(f, "box{{")?;
            write_type(f, module, element)?;
            write!(f, "}}")
        }
        Type::Struct(id) => write!(f, "${}", module.struct_type(*id).name),
        Type::Enum(id) => write!(f, "${}", module.enum_type(*id).name),
        Type::Alias(id) => write!(f, "${}", module.alias(*id).name),
    }
}

pub struct ModulePrinter<'a> {
    module: &'a Module,
}

impl Display for ModulePrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let module = self.module;
        writeln!(f, "module \"{}\"", escape(module.name()))?;
        writeln!(f, "stage {}", module.stage.keyword())?;

        for (_, alias) in module.aliases() {
            writeln!(f)?;
            match &alias.underlying {
                Some(ty) => writeln!(f, "type ${} = {}", alias.name, ty.display(module))?,
                None => writeln!(f, "type ${}", alias.name)?,
            }
        }
        for (_, st) in module.structs() {
            writeln!(f)?;
            writeln!(f, "struct ${} {{", st.name)?;
            for (field, ty) in &st.fields {
                writeln!(f, "    #{field}: {}", ty.display(module))?;
            }
            writeln!(f, "}}")?;
        }
        for (_, en) in module.enums() {
            writeln!(f)?;
            writeln!(f, "enum ${} {{", en.name)?;
            for (case, payload) in &en.cases {
                write!(f, "    ?{case}")?;
                if !payload.is_empty() {
                    write!(f, "(")?;
                    for (i, ty) in payload.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", ty.display(module))?;
                    }
                    write!(f, ")")?;
                }
                writeln!(f)?;
            }
            writeln!(f, "}}")?;
        }

        for (id, variable) in module.variables() {
            writeln!(f)?;
            match &variable.name {
                Some(name) => {
                    writeln!(f, "var @{name}: {}", variable.ty.display(module))?;
                }
                None => {
                    let index = module
                        .global_index(GlobalValue::Variable(id))
                        .unwrap_or_default();
                    writeln!(f, "var @{index}: {}", variable.ty.display(module))?;
                }
            }
        }

        for (id, function) in module.functions() {
            writeln!(f)?;
            let printer = FunctionPrinter::new(module, function);
            printer.write(f, module.global_index(GlobalValue::Function(id)))?;
        }
        Ok(())
    }
}

/// Per-function printing context: anonymous indices derived from order.
struct FunctionPrinter<'a> {
    module: &'a Module,
    function: &'a Function,
    block_pos: FxHashMap<BlockId, usize>,
    inst_pos: FxHashMap<InstId, (usize, usize)>,
    arg_pos: FxHashMap<ArgId, (usize, usize)>,
}

impl<'a> FunctionPrinter<'a> {
    fn new(module: &'a Module, function: &'a Function) -> Self {
        let mut block_pos = FxHashMap::default();
        let mut inst_pos = FxHashMap::default();
        let mut arg_pos = FxHashMap::default();
        for (bi, (block_id, block)) in function.blocks().enumerate() {
            block_pos.insert(block_id, bi);
            for (ai, &arg) in block.args().iter().enumerate() {
                arg_pos.insert(arg, (bi, ai));
            }
            for (ii, &inst) in block.insts().iter().enumerate() {
                inst_pos.insert(inst, (bi, ii));
            }
        }
        FunctionPrinter {
            module,
            function,
            block_pos,
            inst_pos,
            arg_pos,
        }
    }

    fn write(&self, f: &mut Formatter<'_>, global_index: Option<usize>) -> fmt::Result {
        let function = self.function;
        if function.attributes.contains(FunctionAttributes::INLINE) {
            writeln!(f, "!inline")?;
        }
        match &function.declaration_kind {
            Some(DeclarationKind::External) => write!(f, "[extern] ")?,
            Some(DeclarationKind::Adjoint(config)) => {
                write!(f, "[adjoint ")?;
                self.write_global(f, GlobalValue::Function(config.primal))?;
                if let Some(source) = config.source_index {
                    write!(f, " from {source}")?;
                }
                if let Some(indices) = &config.argument_indices {
                    write!(f, " wrt ")?;
                    write_indices(f, indices)?;
                }
                if !config.kept_indices.is_empty() {
                    write!(f, " keeping ")?;
                    write_indices(f, &config.kept_indices)?;
                }
                if config.seedable {
                    write!(f, " seedable")?;
                }
                write!(f, "] ")?;
            }
            None => {}
        }
        write!(f, "func ")?;
        match &function.name {
            Some(name) => write!(f, "@{name}")?,
            None => write!(f, "@{}", global_index.unwrap_or_default())?,
        }
        write!(f, ": {}", function.ty().display(self.module))?;
        if function.block_ids().is_empty() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;
        for (bi, (block_id, block)) in function.blocks().enumerate() {
            match &block.name {
                Some(name) => write!(f, "'{name}(")?,
                None => write!(f, "'{bi}(")?,
            }
            for (i, &arg) in block.args().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                self.write_value(f, &Use::argument(arg))?;
                write!(f, ": {}", function.argument(arg).ty.display(self.module))?;
            }
            writeln!(f, "):")?;
            for &inst_id in block.insts() {
                let inst = function.instruction(inst_id);
                write!(f, "    ")?;
                let ty = inst.ty(self.module, function);
                if !ty.is_void() {
                    self.write_value(f, &Use::instruction(inst_id))?;
                    write!(f, " = ")?;
                }
                self.write_kind(f, &inst.kind)?;
                writeln!(f)?;
            }
        }
        writeln!(f, "}}")
    }

    fn write_global(&self, f: &mut Formatter<'_>, global: GlobalValue) -> fmt::Result {
        let name = match global {
            GlobalValue::Function(id) => self.module.function(id).name.clone(),
            GlobalValue::Variable(id) => self.module.variable(id).name.clone(),
        };
        match name {
            Some(name) => write!(f, "@{name}"),
            None => write!(f, "@{}", self.module.global_index(global).unwrap_or_default()),
        }
    }

    /// Write the value part of a use (no type annotation).
    fn write_value(&self, f: &mut Formatter<'_>, value: &Use) -> fmt::Result {
        match value {
            Use::Literal(_, literal) => self.write_literal(f, literal),
            Use::Definition(Definition::Argument(id)) => {
                match &self.function.argument(*id).name {
                    Some(name) => write!(f, "%{name}"),
                    None => {
                        let (bi, ai) = self.arg_pos.get(id).copied().unwrap_or_default();
                        write!(f, "%{bi}^{ai}")
                    }
                }
            }
            Use::Definition(Definition::Instruction(id)) => {
                match &self.function.instruction(*id).name {
                    Some(name) => write!(f, "%{name}"),
                    None => {
                        let (bi, ii) = self.inst_pos.get(id).copied().unwrap_or_default();
                        write!(f, "%{bi}.{ii}")
                    }
                }
            }
            Use::Definition(Definition::Variable(id)) => {
                self.write_global(f, GlobalValue::Variable(*id))
            }
            Use::Definition(Definition::Function(id)) => {
                self.write_global(f, GlobalValue::Function(*id))
            }
        }
    }

    /// Write a use as `value: type`.
    fn write_use(&self, f: &mut Formatter<'_>, value: &Use) -> fmt::Result {
        self.write_value(f, value)?;
        write!(f, ": {}", value.ty(self.module, self.function).display(self.module))
    }

    fn write_uses(&self, f: &mut Formatter<'_>, values: &[Use]) -> fmt::Result {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            self.write_use(f, value)?;
        }
        Ok(())
    }

    fn write_literal(&self, f: &mut Formatter<'_>, literal: &Literal) -> fmt::Result {
        match literal {
            Literal::Undefined => write!(f, "undefined"),
            Literal::Zero => write!(f, "zero"),
            Literal::Null => write!(f, "null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Scalar(n) => write!(f, "{n}"),
            Literal::Tensor(elements) => {
                write!(f, "<")?;
                self.write_uses(f, elements)?;
                write!(f, ">")
            }
            Literal::Tuple(elements) => {
                write!(f, "(")?;
                self.write_uses(f, elements)?;
                write!(f, ")")
            }
            Literal::Array(elements) => {
                write!(f, "[")?;
                self.write_uses(f, elements)?;
                write!(f, "]")
            }
            Literal::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "#{name} = ")?;
                    self.write_use(f, value)?;
                }
                write!(f, "}}")
            }
            Literal::Case(name, payload) => {
                write!(f, "?{name}")?;
                if !payload.is_empty() {
                    write!(f, "(")?;
                    self.write_uses(f, payload)?;
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }

    fn write_block_ref(&self, f: &mut Formatter<'_>, block: BlockId) -> fmt::Result {
        match &self.function.block(block).name {
            Some(name) => write!(f, "'{name}"),
            None => write!(f, "'{}", self.block_pos.get(&block).copied().unwrap_or_default()),
        }
    }

    fn write_destination(
        &self,
        f: &mut Formatter<'_>,
        block: BlockId,
        args: &[Use],
    ) -> fmt::Result {
        self.write_block_ref(f, block)?;
        write!(f, "(")?;
        self.write_uses(f, args)?;
        write!(f, ")")
    }

    fn write_combinator(&self, f: &mut Formatter<'_>, combinator: &ReductionCombinator) -> fmt::Result {
        match combinator {
            ReductionCombinator::Numeric(op) => write!(f, "{}", op.opcode()),
            ReductionCombinator::Boolean(op) => write!(f, "{}", op.opcode()),
            ReductionCombinator::NumericBuiltin(opcode) => {
                write!(f, "builtin \"{}\"", escape(opcode))
            }
            ReductionCombinator::Function(value) => self.write_use(f, value),
        }
    }

    fn write_keys(&self, f: &mut Formatter<'_>, keys: &[ElementKey]) -> fmt::Result {
        for (i, key) in keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match key {
                ElementKey::Index(index) => write!(f, "{index}")?,
                ElementKey::Name(name) => write!(f, "#{name}")?,
                ElementKey::Value(value) => self.write_use(f, value)?,
            }
        }
        Ok(())
    }

    fn write_shape(&self, f: &mut Formatter<'_>, shape: &TensorShape) -> fmt::Result {
        // `Display` for shapes already spells the scalar shape as the
        // `scalar` keyword.
        write!(f, "{shape}")
    }

    fn write_kind(&self, f: &mut Formatter<'_>, kind: &InstructionKind) -> fmt::Result {
        match kind {
            InstructionKind::Literal(literal, ty) => {
                write!(f, "literal ")?;
                self.write_literal(f, literal)?;
                write!(f, ": {}", ty.display(self.module))
            }
            InstructionKind::NumericUnary(op, a) => {
                write!(f, "{} ", op.opcode())?;
                self.write_use(f, a)
            }
            InstructionKind::NumericBinary(op, a, b) => {
                write!(f, "{} ", op.opcode())?;
                self.write_use(f, a)?;
                write!(f, ", ")?;
                self.write_use(f, b)
            }
            InstructionKind::BooleanBinary(op, a, b) => {
                write!(f, "{} ", op.opcode())?;
                self.write_use(f, a)?;
                write!(f, ", ")?;
                self.write_use(f, b)
            }
            InstructionKind::Compare(op, a, b) => {
                write!(f, "{} ", op.opcode())?;
                self.write_use(f, a)?;
                write!(f, ", ")?;
                self.write_use(f, b)
            }
            InstructionKind::Not(a) => {
                write!(f, "not ")?;
                self.write_use(f, a)
            }
            InstructionKind::Dot(a, b) => {
                write!(f, "dot ")?;
                self.write_use(f, a)?;
                write!(f, ", ")?;
                self.write_use(f, b)
            }
            InstructionKind::Concatenate(values, axis) => {
                write!(f, "concatenate ")?;
                self.write_uses(f, values)?;
                write!(f, " along {axis}")
            }
            InstructionKind::Transpose(a) => {
                write!(f, "transpose ")?;
                self.write_use(f, a)
            }
            InstructionKind::Reverse(a, dims) => {
                write!(f, "reverse ")?;
                self.write_use(f, a)?;
                write!(f, " along ")?;
                write_indices(f, dims)
            }
            InstructionKind::Slice(a, lower, upper) => {
                write!(f, "slice ")?;
                self.write_use(f, a)?;
                write!(f, " from {lower} upto {upper}")
            }
            InstructionKind::Random(shape, lo, hi) => {
                write!(f, "random ")?;
                self.write_shape(f, shape)?;
                write!(f, " from ")?;
                self.write_use(f, lo)?;
                write!(f, " upto ")?;
                self.write_use(f, hi)
            }
            InstructionKind::Select(left, right, flags) => {
                write!(f, "select ")?;
                self.write_use(f, left)?;
                write!(f, ", ")?;
                self.write_use(f, right)?;
                write!(f, " by ")?;
                self.write_use(f, flags)
            }
            InstructionKind::Reduce(combinator, value, initial, dims) => {
                write!(f, "reduce ")?;
                self.write_use(f, value)?;
                write!(f, " by ")?;
                self.write_combinator(f, combinator)?;
                write!(f, " init ")?;
                self.write_use(f, initial)?;
                write!(f, " along ")?;
                write_indices(f, dims)
            }
            InstructionKind::Scan(combinator, value, dims) => {
                write!(f, "scan ")?;
                self.write_use(f, value)?;
                write!(f, " by ")?;
                self.write_combinator(f, combinator)?;
                write!(f, " along ")?;
                write_indices(f, dims)
            }
            InstructionKind::ReduceWindow(combinator, value, initial, dims, strides, padding) => {
                write!(f, "reduceWindow ")?;
                self.write_use(f, value)?;
                write!(f, " by ")?;
                self.write_combinator(f, combinator)?;
                write!(f, " init ")?;
                self.write_use(f, initial)?;
                write!(f, " dims ")?;
                self.write_shape(f, dims)?;
                write!(f, " strides ")?;
                write_indices(f, strides)?;
                write!(f, " padding {}", padding.keyword())
            }
            InstructionKind::Convolve {
                lhs,
                kernel,
                strides,
                padding,
                left_dilation,
                right_dilation,
                groups,
            } => {
                write!(f, "convolve ")?;
                self.write_use(f, lhs)?;
                write!(f, " kernel ")?;
                self.write_use(f, kernel)?;
                if let Some(strides) = strides {
                    write!(f, " strides ")?;
                    write_indices(f, strides)?;
                }
                if let Some(padding) = padding {
                    write!(f, " padding ")?;
                    for (i, (low, high)) in padding.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "({low}, {high})")?;
                    }
                }
                if let Some(dilation) = left_dilation {
                    write!(f, " leftDilation ")?;
                    write_indices(f, dilation)?;
                }
                if let Some(dilation) = right_dilation {
                    write!(f, " rightDilation ")?;
                    write_indices(f, dilation)?;
                }
                if let Some(groups) = groups {
                    write!(f, " groups {groups}")?;
                }
                Ok(())
            }
            InstructionKind::Rank(a) => {
                write!(f, "rank ")?;
                self.write_use(f, a)
            }
            InstructionKind::Shape(a) => {
                write!(f, "shape ")?;
                self.write_use(f, a)
            }
            InstructionKind::UnitCount(a) => {
                write!(f, "unitCount ")?;
                self.write_use(f, a)
            }
            InstructionKind::PadShape(a, at) => {
                write!(f, "padShape ")?;
                self.write_use(f, a)?;
                write!(f, " at {at}")
            }
            InstructionKind::SqueezeShape(a, at) => {
                write!(f, "squeezeShape ")?;
                self.write_use(f, a)?;
                write!(f, " at {at}")
            }
            InstructionKind::ShapeCast(a, shape) => {
                write!(f, "shapeCast ")?;
                self.write_use(f, a)?;
                write!(f, " to ")?;
                self.write_shape(f, shape)
            }
            InstructionKind::BitCast(a, ty) => {
                write!(f, "bitCast ")?;
                self.write_use(f, a)?;
                write!(f, " to {}", ty.display(self.module))
            }
            InstructionKind::DataTypeCast(a, dtype) => {
                write!(f, "dataTypeCast ")?;
                self.write_use(f, a)?;
                write!(f, " to {dtype}")
            }
            InstructionKind::Extract { from, keys } => {
                write!(f, "extract ")?;
                self.write_keys(f, keys)?;
                write!(f, " from ")?;
                self.write_use(f, from)
            }
            InstructionKind::Insert { source, to, keys } => {
                write!(f, "insert ")?;
                self.write_use(f, source)?;
                write!(f, " to ")?;
                self.write_use(f, to)?;
                write!(f, " at ")?;
                self.write_keys(f, keys)
            }
            InstructionKind::Apply(callee, arguments) => {
                write!(f, "apply ")?;
                self.write_use(f, callee)?;
                write!(f, "(")?;
                self.write_uses(f, arguments)?;
                write!(f, ")")
            }
            InstructionKind::AllocateStack(ty, count) => {
                write!(f, "allocateStack {} count {count}", ty.display(self.module))
            }
            InstructionKind::AllocateHeap(ty, count) => {
                write!(f, "allocateHeap {} count ", ty.display(self.module))?;
                self.write_use(f, count)
            }
            InstructionKind::AllocateBox(ty) => {
                write!(f, "allocateBox {}", ty.display(self.module))
            }
            InstructionKind::ProjectBox(a) => {
                write!(f, "projectBox ")?;
                self.write_use(f, a)
            }
            InstructionKind::Load(a) => {
                write!(f, "load ")?;
                self.write_use(f, a)
            }
            InstructionKind::Store(value, pointer) => {
                write!(f, "store ")?;
                self.write_use(f, value)?;
                write!(f, " to ")?;
                self.write_use(f, pointer)
            }
            InstructionKind::ElementPointer(pointer, keys) => {
                write!(f, "elementPointer ")?;
                self.write_use(f, pointer)?;
                write!(f, " at ")?;
                self.write_keys(f, keys)
            }
            InstructionKind::Copy { from, to, count } => {
                write!(f, "copy from ")?;
                self.write_use(f, from)?;
                write!(f, " to ")?;
                self.write_use(f, to)?;
                write!(f, " count ")?;
                self.write_use(f, count)
            }
            InstructionKind::CreateStack => write!(f, "createStack"),
            InstructionKind::DestroyStack(a) => {
                write!(f, "destroyStack ")?;
                self.write_use(f, a)
            }
            InstructionKind::Push(value, stack) => {
                write!(f, "push ")?;
                self.write_use(f, value)?;
                write!(f, " to ")?;
                self.write_use(f, stack)
            }
            InstructionKind::Pop(ty, stack) => {
                write!(f, "pop {} from ", ty.display(self.module))?;
                self.write_use(f, stack)
            }
            InstructionKind::Retain(a) => {
                write!(f, "retain ")?;
                self.write_use(f, a)
            }
            InstructionKind::Release(a) => {
                write!(f, "release ")?;
                self.write_use(f, a)
            }
            InstructionKind::Deallocate(a) => {
                write!(f, "deallocate ")?;
                self.write_use(f, a)
            }
            InstructionKind::Branch(target, args) => {
                write!(f, "branch ")?;
                self.write_destination(f, *target, args)
            }
            InstructionKind::Conditional {
                condition,
                then_block,
                then_args,
                else_block,
                else_args,
            } => {
                write!(f, "conditional ")?;
                self.write_use(f, condition)?;
                write!(f, " then ")?;
                self.write_destination(f, *then_block, then_args)?;
                write!(f, " else ")?;
                self.write_destination(f, *else_block, else_args)
            }
            InstructionKind::BranchEnum(value, cases) => {
                write!(f, "branchEnum ")?;
                self.write_use(f, value)?;
                for (case, block) in cases {
                    write!(f, " case ?{case} ")?;
                    self.write_block_ref(f, *block)?;
                }
                Ok(())
            }
            InstructionKind::Return(value) => match value {
                Some(value) => {
                    write!(f, "return ")?;
                    self.write_use(f, value)
                }
                None => write!(f, "return"),
            },
            InstructionKind::Trap => write!(f, "trap"),
            InstructionKind::Builtin(opcode, arguments) => {
                write!(f, "builtin \"{}\"(", escape(opcode))?;
                self.write_uses(f, arguments)?;
                write!(f, ")")
            }
        }
    }
}

fn write_indices(f: &mut Formatter<'_>, indices: &[usize]) -> fmt::Result {
    for (i, index) in indices.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{index}")?;
    }
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}
