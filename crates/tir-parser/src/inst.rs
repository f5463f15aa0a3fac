//! Phase 2 instruction parsing: result bindings, operands, literals,
//! element keys, reduction combinators and branch destinations.

use tir_common::Span;
use tir_core::{
    BlockId, BooleanBinaryOp, ComparisonOp, Definition, ElementKey, InstructionKind, Literal,
    Number, NumericBinaryOp, NumericUnaryOp, Padding, ReductionCombinator, Type, Use,
};

use crate::error::ParseError;
use crate::parser::Parser;
use crate::token::TokenKind;

/// How an instruction line binds its result.
enum ResultSpec {
    None,
    Named(String, Span),
    Anonymous { block: usize, inst: usize, span: Span },
}

impl Parser {
    pub(crate) fn parse_instruction(&mut self) -> Result<(), ParseError> {
        let result = self.parse_result_spec();

        let opcode_span = self.current_span();
        let opcode = match self.next()?.kind {
            TokenKind::Word(word) => word,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "an opcode".to_string(),
                    found: other.describe(),
                    span: opcode_span,
                });
            }
        };
        let kind = self.parse_kind(&opcode, opcode_span)?;
        if !matches!(
            self.peek_kind(),
            None | Some(TokenKind::Newline) | Some(TokenKind::RBrace)
        ) {
            return Err(ParseError::InvalidOperands {
                opcode,
                span: self.current_span(),
            });
        }

        // Locate this instruction's placeholder slot.
        let (func, block_pos, inst_pos) = {
            let ctx = self.require_ctx()?;
            (ctx.func, ctx.block_pos, ctx.completed[ctx.block_pos])
        };
        let function = self.module.function(func);
        let block_id = function.block_ids()[block_pos];
        let inst_id = match function.block(block_id).insts().get(inst_pos) {
            Some(&id) => id,
            None => {
                return Err(ParseError::InvalidInstructionIndex {
                    index: inst_pos,
                    span: opcode_span,
                });
            }
        };

        let name = match result {
            ResultSpec::None => None,
            ResultSpec::Anonymous { block, inst, span } => {
                if block != block_pos {
                    return Err(ParseError::InvalidBasicBlockIndex { index: block, span });
                }
                if inst != inst_pos {
                    return Err(ParseError::InvalidInstructionIndex { index: inst, span });
                }
                None
            }
            ResultSpec::Named(name, span) => {
                let ctx = self.require_ctx()?;
                if ctx.values.contains_key(&name) {
                    return Err(ParseError::RedefinedIdentifier { name, span });
                }
                let ty = tir_core::infer_type(&kind, &self.module, function);
                if ty.is_void() {
                    return Err(ParseError::CannotNameVoidValue { name, span });
                }
                Some(name)
            }
        };

        let function = self.module.function_mut(func);
        let instruction = function.instruction_mut(inst_id);
        instruction.kind = kind;
        instruction.name = name.clone();

        let ctx = self.require_ctx_mut()?;
        if let Some(name) = name {
            ctx.values.insert(name, Definition::Instruction(inst_id));
        }
        ctx.completed[block_pos] += 1;
        self.expect_line_end()
    }

    fn parse_result_spec(&mut self) -> ResultSpec {
        let span = self.current_span();
        match (self.peek_kind(), self.peek_kind_at(1)) {
            (Some(TokenKind::Local(name)), Some(TokenKind::Equal)) => {
                let name = name.clone();
                self.bump();
                self.bump();
                ResultSpec::Named(name, span)
            }
            (Some(&TokenKind::InstRef { block, inst }), Some(TokenKind::Equal)) => {
                self.bump();
                self.bump();
                ResultSpec::Anonymous { block, inst, span }
            }
            _ => ResultSpec::None,
        }
    }

    // =========================================================================
    // Kinds
    // =========================================================================

    fn parse_kind(&mut self, opcode: &str, span: Span) -> Result<InstructionKind, ParseError> {
        if let Some(op) = NumericUnaryOp::from_opcode(opcode) {
            return Ok(InstructionKind::NumericUnary(op, self.parse_use()?));
        }
        if let Some(op) = NumericBinaryOp::from_opcode(opcode) {
            let a = self.parse_use()?;
            self.expect_punct(&TokenKind::Comma, "','")?;
            let b = self.parse_use()?;
            return Ok(InstructionKind::NumericBinary(op, a, b));
        }
        if let Some(op) = BooleanBinaryOp::from_opcode(opcode) {
            let a = self.parse_use()?;
            self.expect_punct(&TokenKind::Comma, "','")?;
            let b = self.parse_use()?;
            return Ok(InstructionKind::BooleanBinary(op, a, b));
        }
        if let Some(op) = ComparisonOp::from_opcode(opcode) {
            let a = self.parse_use()?;
            self.expect_punct(&TokenKind::Comma, "','")?;
            let b = self.parse_use()?;
            return Ok(InstructionKind::Compare(op, a, b));
        }

        match opcode {
            "literal" => {
                let literal = self.parse_literal_value()?;
                self.expect_punct(&TokenKind::Colon, "':'")?;
                let ty = self.parse_type()?;
                Ok(InstructionKind::Literal(literal, ty))
            }
            "not" => Ok(InstructionKind::Not(self.parse_use()?)),
            "dot" => {
                let a = self.parse_use()?;
                self.expect_punct(&TokenKind::Comma, "','")?;
                let b = self.parse_use()?;
                Ok(InstructionKind::Dot(a, b))
            }
            "concatenate" => {
                let mut values = vec![self.parse_use()?];
                while self.eat_punct(&TokenKind::Comma) {
                    values.push(self.parse_use()?);
                }
                self.expect_word("along")?;
                let axis = self.parse_index()?;
                Ok(InstructionKind::Concatenate(values, axis))
            }
            "transpose" => Ok(InstructionKind::Transpose(self.parse_use()?)),
            "reverse" => {
                let value = self.parse_use()?;
                self.expect_word("along")?;
                let dims = self.parse_index_list()?;
                Ok(InstructionKind::Reverse(value, dims))
            }
            "slice" => {
                let value = self.parse_use()?;
                self.expect_word("from")?;
                let lower = self.parse_index()?;
                self.expect_word("upto")?;
                let upper = self.parse_index()?;
                Ok(InstructionKind::Slice(value, lower, upper))
            }
            "random" => {
                let shape = self.parse_shape()?;
                self.expect_word("from")?;
                let lo = self.parse_use()?;
                self.expect_word("upto")?;
                let hi = self.parse_use()?;
                Ok(InstructionKind::Random(shape, lo, hi))
            }
            "select" => {
                let left = self.parse_use()?;
                self.expect_punct(&TokenKind::Comma, "','")?;
                let right = self.parse_use()?;
                self.expect_word("by")?;
                let flags = self.parse_use()?;
                Ok(InstructionKind::Select(left, right, flags))
            }
            "reduce" => {
                let value = self.parse_use()?;
                self.expect_word("by")?;
                let combinator = self.parse_combinator()?;
                self.expect_word("init")?;
                let initial = self.parse_use()?;
                self.expect_word("along")?;
                let dims = self.parse_index_list()?;
                Ok(InstructionKind::Reduce(combinator, value, initial, dims))
            }
            "scan" => {
                let value = self.parse_use()?;
                self.expect_word("by")?;
                let combinator = self.parse_combinator()?;
                self.expect_word("along")?;
                let dims = self.parse_index_list()?;
                Ok(InstructionKind::Scan(combinator, value, dims))
            }
            "reduceWindow" => {
                let value = self.parse_use()?;
                self.expect_word("by")?;
                let combinator = self.parse_combinator()?;
                self.expect_word("init")?;
                let initial = self.parse_use()?;
                self.expect_word("dims")?;
                let dims = self.parse_shape()?;
                self.expect_word("strides")?;
                let strides = self.parse_index_list()?;
                self.expect_word("padding")?;
                let padding_span = self.current_span();
                let padding = match self.next()?.kind {
                    TokenKind::Word(w) => Padding::from_keyword(&w).ok_or(
                        ParseError::UnexpectedToken {
                            expected: "'none', 'half' or 'full'".to_string(),
                            found: format!("'{w}'"),
                            span: padding_span,
                        },
                    )?,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "a padding rule".to_string(),
                            found: other.describe(),
                            span: padding_span,
                        });
                    }
                };
                Ok(InstructionKind::ReduceWindow(
                    combinator, value, initial, dims, strides, padding,
                ))
            }
            "convolve" => {
                let lhs = self.parse_use()?;
                self.expect_word("kernel")?;
                let kernel = self.parse_use()?;
                let mut strides = None;
                let mut padding = None;
                let mut left_dilation = None;
                let mut right_dilation = None;
                let mut groups = None;
                if self.eat_word("strides") {
                    strides = Some(self.parse_index_list()?);
                }
                if self.eat_word("padding") {
                    padding = Some(self.parse_padding_pairs()?);
                }
                if self.eat_word("leftDilation") {
                    left_dilation = Some(self.parse_index_list()?);
                }
                if self.eat_word("rightDilation") {
                    right_dilation = Some(self.parse_index_list()?);
                }
                if self.eat_word("groups") {
                    groups = Some(self.parse_index()?);
                }
                Ok(InstructionKind::Convolve {
                    lhs,
                    kernel,
                    strides,
                    padding,
                    left_dilation,
                    right_dilation,
                    groups,
                })
            }
            "rank" => Ok(InstructionKind::Rank(self.parse_use()?)),
            "shape" => Ok(InstructionKind::Shape(self.parse_use()?)),
            "unitCount" => Ok(InstructionKind::UnitCount(self.parse_use()?)),
            "padShape" => {
                let value = self.parse_use()?;
                self.expect_word("at")?;
                let at = self.parse_index()?;
                Ok(InstructionKind::PadShape(value, at))
            }
            "squeezeShape" => {
                let value = self.parse_use()?;
                self.expect_word("at")?;
                let at = self.parse_index()?;
                Ok(InstructionKind::SqueezeShape(value, at))
            }
            "shapeCast" => {
                let value = self.parse_use()?;
                self.expect_word("to")?;
                let shape = self.parse_shape()?;
                Ok(InstructionKind::ShapeCast(value, shape))
            }
            "bitCast" => {
                let value = self.parse_use()?;
                self.expect_word("to")?;
                let ty = self.parse_type()?;
                Ok(InstructionKind::BitCast(value, ty))
            }
            "dataTypeCast" => {
                let value = self.parse_use()?;
                self.expect_word("to")?;
                let dtype = self.parse_data_type()?;
                Ok(InstructionKind::DataTypeCast(value, dtype))
            }
            "extract" => {
                let keys = self.parse_element_keys()?;
                self.expect_word("from")?;
                let from = self.parse_use()?;
                Ok(InstructionKind::Extract { from, keys })
            }
            "insert" => {
                let source = self.parse_use()?;
                self.expect_word("to")?;
                let to = self.parse_use()?;
                self.expect_word("at")?;
                let keys = self.parse_element_keys()?;
                Ok(InstructionKind::Insert { source, to, keys })
            }
            "apply" => {
                let callee = self.parse_use()?;
                self.expect_punct(&TokenKind::LParen, "'('")?;
                let arguments = self.parse_use_list_until_rparen()?;
                Ok(InstructionKind::Apply(callee, arguments))
            }
            "allocateStack" => {
                let ty = self.parse_type()?;
                self.expect_word("count")?;
                let count = self.parse_index()?;
                Ok(InstructionKind::AllocateStack(ty, count))
            }
            "allocateHeap" => {
                let ty = self.parse_type()?;
                self.expect_word("count")?;
                let count = self.parse_use()?;
                Ok(InstructionKind::AllocateHeap(ty, count))
            }
            "allocateBox" => Ok(InstructionKind::AllocateBox(self.parse_type()?)),
            "projectBox" => Ok(InstructionKind::ProjectBox(self.parse_use()?)),
            "load" => Ok(InstructionKind::Load(self.parse_use()?)),
            "store" => {
                let value = self.parse_use()?;
                self.expect_word("to")?;
                let pointer = self.parse_use()?;
                Ok(InstructionKind::Store(value, pointer))
            }
            "elementPointer" => {
                let pointer = self.parse_use()?;
                self.expect_word("at")?;
                let keys = self.parse_element_keys()?;
                Ok(InstructionKind::ElementPointer(pointer, keys))
            }
            "copy" => {
                self.expect_word("from")?;
                let from = self.parse_use()?;
                self.expect_word("to")?;
                let to = self.parse_use()?;
                self.expect_word("count")?;
                let count = self.parse_use()?;
                Ok(InstructionKind::Copy { from, to, count })
            }
            "createStack" => Ok(InstructionKind::CreateStack),
            "destroyStack" => Ok(InstructionKind::DestroyStack(self.parse_use()?)),
            "push" => {
                let value = self.parse_use()?;
                self.expect_word("to")?;
                let stack = self.parse_use()?;
                Ok(InstructionKind::Push(value, stack))
            }
            "pop" => {
                let ty = self.parse_type()?;
                self.expect_word("from")?;
                let stack = self.parse_use()?;
                Ok(InstructionKind::Pop(ty, stack))
            }
            "retain" => Ok(InstructionKind::Retain(self.parse_use()?)),
            "release" => Ok(InstructionKind::Release(self.parse_use()?)),
            "deallocate" => Ok(InstructionKind::Deallocate(self.parse_use()?)),
            "branch" => {
                let (target, args) = self.parse_destination()?;
                Ok(InstructionKind::Branch(target, args))
            }
            "conditional" => {
                let condition = self.parse_use()?;
                self.expect_word("then")?;
                let (then_block, then_args) = self.parse_destination()?;
                self.expect_word("else")?;
                let (else_block, else_args) = self.parse_destination()?;
                Ok(InstructionKind::Conditional {
                    condition,
                    then_block,
                    then_args,
                    else_block,
                    else_args,
                })
            }
            "branchEnum" => {
                let value = self.parse_use()?;
                let mut cases = Vec::new();
                while self.eat_word("case") {
                    let case_span = self.current_span();
                    let case = match self.next()?.kind {
                        TokenKind::Case(name) => name,
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "a '?case' name".to_string(),
                                found: other.describe(),
                                span: case_span,
                            });
                        }
                    };
                    let block = self.parse_block_ref()?;
                    cases.push((case, block));
                }
                if cases.is_empty() {
                    return Err(ParseError::InvalidOperands {
                        opcode: "branchEnum".to_string(),
                        span,
                    });
                }
                Ok(InstructionKind::BranchEnum(value, cases))
            }
            "return" => {
                if matches!(
                    self.peek_kind(),
                    None | Some(TokenKind::Newline) | Some(TokenKind::RBrace)
                ) {
                    Ok(InstructionKind::Return(None))
                } else {
                    Ok(InstructionKind::Return(Some(self.parse_use()?)))
                }
            }
            "trap" => Ok(InstructionKind::Trap),
            "builtin" => {
                let name_span = self.current_span();
                let name = match self.next()?.kind {
                    TokenKind::Str(name) => name,
                    other => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "an intrinsic name string".to_string(),
                            found: other.describe(),
                            span: name_span,
                        });
                    }
                };
                if self.module.intrinsics().intrinsic(&name).is_none() {
                    return Err(ParseError::UndefinedIntrinsic {
                        name,
                        span: name_span,
                    });
                }
                self.expect_punct(&TokenKind::LParen, "'('")?;
                let arguments = self.parse_use_list_until_rparen()?;
                Ok(InstructionKind::Builtin(name, arguments))
            }
            _ => Err(ParseError::UnexpectedToken {
                expected: "an opcode".to_string(),
                found: format!("'{opcode}'"),
                span,
            }),
        }
    }

    fn parse_padding_pairs(&mut self) -> Result<Vec<(usize, usize)>, ParseError> {
        let mut pairs = Vec::new();
        loop {
            self.expect_punct(&TokenKind::LParen, "'('")?;
            let low = self.parse_index()?;
            self.expect_punct(&TokenKind::Comma, "','")?;
            let high = self.parse_index()?;
            self.expect_punct(&TokenKind::RParen, "')'")?;
            pairs.push((low, high));
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        Ok(pairs)
    }

    // =========================================================================
    // Uses
    // =========================================================================

    pub(crate) fn parse_use(&mut self) -> Result<Use, ParseError> {
        let span = self.current_span();
        let value = self.parse_value_form()?;
        self.expect_punct(&TokenKind::Colon, "':'")?;
        let annotation = self.parse_type()?;
        match value {
            ValueForm::Literal(literal) => Ok(Use::Literal(annotation, literal)),
            ValueForm::Definition { definition, check } => {
                if check {
                    let func = self.require_ctx()?.func;
                    let function = self.module.function(func);
                    let actual = Use::Definition(definition).ty(&self.module, function);
                    if !annotation.conforms_to(&actual, &self.module) {
                        return Err(ParseError::TypeMismatch {
                            expected: actual.display(&self.module).to_string(),
                            span,
                        });
                    }
                }
                Ok(Use::Definition(definition))
            }
        }
    }

    fn parse_use_list_until_rparen(&mut self) -> Result<Vec<Use>, ParseError> {
        let mut uses = Vec::new();
        if self.eat_punct(&TokenKind::RParen) {
            return Ok(uses);
        }
        loop {
            uses.push(self.parse_use()?);
            if !self.eat_punct(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_punct(&TokenKind::RParen, "')'")?;
        Ok(uses)
    }

    fn parse_value_form(&mut self) -> Result<ValueForm, ParseError> {
        let span = self.current_span();
        match self.peek_kind().cloned() {
            Some(TokenKind::Integer(v)) => {
                self.bump();
                Ok(ValueForm::Literal(Literal::Scalar(Number::Int(v))))
            }
            Some(TokenKind::Float(v)) => {
                self.bump();
                Ok(ValueForm::Literal(Literal::Scalar(Number::Float(v))))
            }
            Some(TokenKind::Word(w)) => {
                let literal = match w.as_str() {
                    "true" => Literal::Bool(true),
                    "false" => Literal::Bool(false),
                    "undefined" => Literal::Undefined,
                    "zero" => Literal::Zero,
                    "null" => Literal::Null,
                    _ => {
                        return Err(ParseError::UnexpectedToken {
                            expected: "a value".to_string(),
                            found: format!("'{w}'"),
                            span,
                        });
                    }
                };
                self.bump();
                Ok(ValueForm::Literal(literal))
            }
            Some(TokenKind::LAngle) => {
                self.bump();
                let mut elements = Vec::new();
                if !self.eat_punct(&TokenKind::RAngle) {
                    loop {
                        elements.push(self.parse_use()?);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RAngle, "'>'")?;
                }
                Ok(ValueForm::Literal(Literal::Tensor(elements)))
            }
            Some(TokenKind::LParen) => {
                self.bump();
                let mut elements = Vec::new();
                if !self.eat_punct(&TokenKind::RParen) {
                    loop {
                        elements.push(self.parse_use()?);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RParen, "')'")?;
                }
                Ok(ValueForm::Literal(Literal::Tuple(elements)))
            }
            Some(TokenKind::LBracket) => {
                self.bump();
                let mut elements = Vec::new();
                if !self.eat_punct(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_use()?);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RBracket, "']'")?;
                }
                Ok(ValueForm::Literal(Literal::Array(elements)))
            }
            Some(TokenKind::LBrace) => {
                self.bump();
                let mut fields = Vec::new();
                if !self.eat_punct(&TokenKind::RBrace) {
                    loop {
                        let field_span = self.current_span();
                        let field = match self.next()?.kind {
                            TokenKind::Field(name) => name,
                            other => {
                                return Err(ParseError::UnexpectedToken {
                                    expected: "a '#field' name".to_string(),
                                    found: other.describe(),
                                    span: field_span,
                                });
                            }
                        };
                        self.expect_punct(&TokenKind::Equal, "'='")?;
                        let value = self.parse_use()?;
                        fields.push((field, value));
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RBrace, "'}'")?;
                }
                Ok(ValueForm::Literal(Literal::Struct(fields)))
            }
            Some(TokenKind::Case(name)) => {
                self.bump();
                let mut payload = Vec::new();
                if self.eat_punct(&TokenKind::LParen) {
                    payload = self.parse_use_list_until_rparen()?;
                }
                Ok(ValueForm::Literal(Literal::Case(name, payload)))
            }
            Some(TokenKind::Local(name)) => {
                self.bump();
                let ctx = self.require_ctx()?;
                match ctx.values.get(&name) {
                    Some(&definition) => Ok(ValueForm::Definition {
                        definition,
                        check: true,
                    }),
                    None => Err(ParseError::UndefinedIdentifier { name, span }),
                }
            }
            Some(TokenKind::InstRef { block, inst }) => {
                self.bump();
                self.resolve_inst_ref(block, inst, span)
            }
            Some(TokenKind::ArgRef { block, arg }) => {
                self.bump();
                self.resolve_arg_ref(block, arg, span)
            }
            Some(TokenKind::Global(name)) => {
                self.bump();
                match self.module.global_named(&name) {
                    Some(tir_core::GlobalValue::Function(f)) => Ok(ValueForm::Definition {
                        definition: Definition::Function(f),
                        check: true,
                    }),
                    Some(tir_core::GlobalValue::Variable(v)) => Ok(ValueForm::Definition {
                        definition: Definition::Variable(v),
                        check: true,
                    }),
                    None => Err(ParseError::UndefinedIdentifier { name, span }),
                }
            }
            Some(TokenKind::GlobalIndex(index)) => {
                self.bump();
                match self.module.global_by_index(index) {
                    Some(tir_core::GlobalValue::Function(f)) => Ok(ValueForm::Definition {
                        definition: Definition::Function(f),
                        check: true,
                    }),
                    Some(tir_core::GlobalValue::Variable(v)) => Ok(ValueForm::Definition {
                        definition: Definition::Variable(v),
                        check: true,
                    }),
                    None => Err(ParseError::InvalidFunctionIndex { index, span }),
                }
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "a value".to_string(),
                found: other.describe(),
                span,
            }),
            None => Err(ParseError::UnexpectedEndOfInput {
                expected: "a value".to_string(),
            }),
        }
    }

    /// `%B.I`: B must not exceed the current block, I must be within block
    /// B's instruction range. References at or past the current
    /// instruction are forward references: they resolve, but their type
    /// annotation cannot be checked yet (the verifier rejects them as
    /// use-before-def).
    fn resolve_inst_ref(
        &mut self,
        block: usize,
        inst: usize,
        span: Span,
    ) -> Result<ValueForm, ParseError> {
        let ctx = self.require_ctx()?;
        if block > ctx.block_pos {
            return Err(ParseError::InvalidBasicBlockIndex { index: block, span });
        }
        let forward = block == ctx.block_pos && inst >= ctx.completed[block];
        let func = ctx.func;
        let function = self.module.function(func);
        let block_id = function.block_ids()[block];
        match function.block(block_id).insts().get(inst) {
            Some(&inst_id) => Ok(ValueForm::Definition {
                definition: Definition::Instruction(inst_id),
                check: !forward,
            }),
            None => Err(ParseError::InvalidInstructionIndex { index: inst, span }),
        }
    }

    fn resolve_arg_ref(
        &mut self,
        block: usize,
        arg: usize,
        span: Span,
    ) -> Result<ValueForm, ParseError> {
        let ctx = self.require_ctx()?;
        let func = ctx.func;
        let function = self.module.function(func);
        let Some(&block_id) = function.block_ids().get(block) else {
            return Err(ParseError::InvalidBasicBlockIndex { index: block, span });
        };
        match function.block(block_id).args().get(arg) {
            Some(&arg_id) => Ok(ValueForm::Definition {
                definition: Definition::Argument(arg_id),
                check: true,
            }),
            None => Err(ParseError::InvalidArgumentIndex { index: arg, span }),
        }
    }

    // =========================================================================
    // Literals, keys, combinators, destinations
    // =========================================================================

    fn parse_literal_value(&mut self) -> Result<Literal, ParseError> {
        match self.parse_value_form()? {
            ValueForm::Literal(literal) => Ok(literal),
            ValueForm::Definition { .. } => Err(ParseError::UnexpectedIdentifierKind {
                expected: "a literal",
                span: self.current_span(),
            }),
        }
    }

    fn parse_element_keys(&mut self) -> Result<Vec<ElementKey>, ParseError> {
        let mut keys = vec![self.parse_element_key()?];
        while self.eat_punct(&TokenKind::Comma) {
            keys.push(self.parse_element_key()?);
        }
        Ok(keys)
    }

    fn parse_element_key(&mut self) -> Result<ElementKey, ParseError> {
        match (self.peek_kind(), self.peek_kind_at(1)) {
            (Some(TokenKind::Integer(_)), kind) if kind != Some(&TokenKind::Colon) => {
                Ok(ElementKey::Index(self.parse_index()?))
            }
            (Some(TokenKind::Field(name)), _) => {
                let name = name.clone();
                self.bump();
                Ok(ElementKey::Name(name))
            }
            _ => Ok(ElementKey::Value(self.parse_use()?)),
        }
    }

    fn parse_combinator(&mut self) -> Result<ReductionCombinator, ParseError> {
        let span = self.current_span();
        match self.peek_kind().cloned() {
            Some(TokenKind::Word(w)) => {
                if let Some(op) = NumericBinaryOp::from_opcode(&w) {
                    self.bump();
                    return Ok(ReductionCombinator::Numeric(op));
                }
                if let Some(op) = BooleanBinaryOp::from_opcode(&w) {
                    self.bump();
                    return Ok(ReductionCombinator::Boolean(op));
                }
                if w == "builtin" {
                    self.bump();
                    let name_span = self.current_span();
                    let name = match self.next()?.kind {
                        TokenKind::Str(name) => name,
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "an intrinsic name string".to_string(),
                                found: other.describe(),
                                span: name_span,
                            });
                        }
                    };
                    if self.module.intrinsics().intrinsic(&name).is_none() {
                        return Err(ParseError::UndefinedIntrinsic {
                            name,
                            span: name_span,
                        });
                    }
                    return Ok(ReductionCombinator::NumericBuiltin(name));
                }
                Err(ParseError::InvalidReductionCombinator { span })
            }
            Some(
                TokenKind::Local(_)
                | TokenKind::InstRef { .. }
                | TokenKind::ArgRef { .. }
                | TokenKind::Global(_)
                | TokenKind::GlobalIndex(_),
            ) => Ok(ReductionCombinator::Function(self.parse_use()?)),
            _ => Err(ParseError::InvalidReductionCombinator { span }),
        }
    }

    fn parse_block_ref(&mut self) -> Result<BlockId, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Block(name) => {
                let ctx = self.require_ctx()?;
                match ctx.blocks_by_name.get(&name) {
                    Some(&block) => Ok(block),
                    None => Err(ParseError::UndefinedIdentifier { name, span }),
                }
            }
            TokenKind::BlockIndex(index) => {
                let ctx = self.require_ctx()?;
                let function = self.module.function(ctx.func);
                match function.block_ids().get(index) {
                    Some(&block) => Ok(block),
                    None => Err(ParseError::InvalidBasicBlockIndex { index, span }),
                }
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "a basic block reference".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    fn parse_destination(&mut self) -> Result<(BlockId, Vec<Use>), ParseError> {
        let block = self.parse_block_ref()?;
        self.expect_punct(&TokenKind::LParen, "'('")?;
        let args = self.parse_use_list_until_rparen()?;
        Ok((block, args))
    }

    // =========================================================================
    // Context access
    // =========================================================================

    pub(crate) fn require_ctx(&self) -> Result<&crate::parser::FunctionContext, ParseError> {
        self.ctx
            .as_ref()
            .ok_or(ParseError::AnonymousIdentifierNotInLocal {
                span: self.current_span(),
            })
    }

    fn require_ctx_mut(&mut self) -> Result<&mut crate::parser::FunctionContext, ParseError> {
        let span = self.current_span();
        self.ctx
            .as_mut()
            .ok_or(ParseError::AnonymousIdentifierNotInLocal { span })
    }
}

enum ValueForm {
    Literal(Literal),
    Definition { definition: Definition, check: bool },
}
