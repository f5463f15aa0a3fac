//! The LL parser.
//!
//! Parsing is two-phase. Phase 1 (`scan`) sweeps the token stream with a
//! saved cursor and registers nominal type names, global prototypes
//! (variables and full function signatures) and per-function block and
//! instruction prototypes, so forward references resolve. Phase 2 walks
//! the declarations in order and completes the prototypes by index.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tir_common::{DataType, Span, TensorShape};
use tir_core::{
    BlockId, Definition, FuncId, GlobalValue, IntrinsicRegistry, Module, Stage, Type, TypeHandle,
    default_registry,
};

use crate::error::{Error, ParseError};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Parse a module from source text using the default intrinsic registry.
pub fn parse_module(source: &str) -> Result<Module, Error> {
    parse_module_with(source, default_registry())
}

/// Parse a module from source text with an explicit intrinsic registry.
pub fn parse_module_with(
    source: &str,
    intrinsics: Arc<IntrinsicRegistry>,
) -> Result<Module, Error> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens, intrinsics);
    let module = parser.parse()?;
    Ok(module)
}

/// Per-function parsing state.
pub(crate) struct FunctionContext {
    pub func: FuncId,
    /// Named local values (block arguments and completed instructions).
    pub values: FxHashMap<String, Definition>,
    pub blocks_by_name: FxHashMap<String, BlockId>,
    /// Index of the block currently being completed.
    pub block_pos: usize,
    /// Number of completed instructions per block.
    pub completed: Vec<usize>,
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pub(crate) pos: usize,
    intrinsics: Arc<IntrinsicRegistry>,
    pub(crate) module: Module,
    pub(crate) ctx: Option<FunctionContext>,
}

impl Parser {
    fn new(tokens: Vec<Token>, intrinsics: Arc<IntrinsicRegistry>) -> Self {
        let module = Module::new(String::new(), Stage::Raw, intrinsics.clone());
        Parser {
            tokens,
            pos: 0,
            intrinsics,
            // The real name and stage are parsed from the header.
            module,
            ctx: None,
        }
    }

    fn parse(&mut self) -> Result<Module, ParseError> {
        self.parse_header()?;
        let declarations_start = self.pos;

        tracing::debug!("phase 1: scanning symbols");
        self.scan_types()?;
        self.pos = declarations_start;
        self.scan_globals()?;
        self.pos = declarations_start;

        tracing::debug!("phase 2: parsing bodies");
        self.parse_declarations()?;

        let placeholder = Module::new("", Stage::Raw, self.intrinsics.clone());
        Ok(std::mem::replace(&mut self.module, placeholder))
    }

    fn parse_header(&mut self) -> Result<(), ParseError> {
        self.skip_newlines();
        self.expect_word("module")?;
        let name = match self.next()?.kind {
            TokenKind::Str(name) => name,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "module name string".to_string(),
                    found: other.describe(),
                    span: self.previous_span(),
                });
            }
        };
        self.expect_line_end()?;
        self.skip_newlines();
        self.expect_word("stage")?;
        let stage_span = self.current_span();
        let stage = match self.next()?.kind {
            TokenKind::Word(w) if w == "raw" => Stage::Raw,
            TokenKind::Word(w) if w == "optimizable" => Stage::Optimizable,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "'raw' or 'optimizable'".to_string(),
                    found: other.describe(),
                    span: stage_span,
                });
            }
        };
        self.expect_line_end()?;
        self.module = Module::new(name, stage, self.intrinsics.clone());
        Ok(())
    }

    // =========================================================================
    // Phase 2: declarations in order
    // =========================================================================

    fn parse_declarations(&mut self) -> Result<(), ParseError> {
        let mut function_counter = 0usize;
        loop {
            self.skip_newlines();
            let Some(kind) = self.peek_kind().cloned() else {
                return Ok(());
            };
            match &kind {
                TokenKind::Word(w) if w == "type" => self.complete_alias()?,
                TokenKind::Word(w) if w == "struct" => self.complete_struct()?,
                TokenKind::Word(w) if w == "enum" => self.complete_enum()?,
                TokenKind::Word(w) if w == "var" => self.skip_line(),
                TokenKind::Word(w) if w == "func" => {
                    self.complete_function(function_counter)?;
                    function_counter += 1;
                }
                TokenKind::Attribute(_) | TokenKind::LBracket => {
                    self.complete_function(function_counter)?;
                    function_counter += 1;
                }
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "a top-level declaration".to_string(),
                        found: other.describe(),
                        span: self.current_span(),
                    });
                }
            }
        }
    }

    fn complete_alias(&mut self) -> Result<(), ParseError> {
        self.expect_word("type")?;
        let (name, span) = self.expect_type_name()?;
        let Some(TypeHandle::Alias(id)) = self.module.type_named(&name) else {
            return Err(ParseError::UndefinedNominalType { name, span });
        };
        if self.eat_punct(&TokenKind::Equal) {
            let underlying = self.parse_type()?;
            self.module.alias_mut(id).underlying = Some(underlying);
        }
        self.expect_line_end()
    }

    fn complete_struct(&mut self) -> Result<(), ParseError> {
        self.expect_word("struct")?;
        let (name, span) = self.expect_type_name()?;
        let Some(TypeHandle::Struct(id)) = self.module.type_named(&name) else {
            return Err(ParseError::UndefinedNominalType { name, span });
        };
        self.expect_punct(&TokenKind::LBrace, "'{'")?;
        let mut fields = indexmap::IndexMap::new();
        loop {
            self.skip_newlines();
            if self.eat_punct(&TokenKind::RBrace) {
                break;
            }
            let field_span = self.current_span();
            let field = match self.next()?.kind {
                TokenKind::Field(f) => f,
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "a '#field' name".to_string(),
                        found: other.describe(),
                        span: field_span,
                    });
                }
            };
            self.expect_punct(&TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            if fields.insert(field.clone(), ty).is_some() {
                return Err(ParseError::RedefinedIdentifier {
                    name: field,
                    span: field_span,
                });
            }
            self.expect_line_end()?;
        }
        self.module.struct_type_mut(id).fields = fields;
        self.expect_line_end()
    }

    fn complete_enum(&mut self) -> Result<(), ParseError> {
        self.expect_word("enum")?;
        let (name, span) = self.expect_type_name()?;
        let Some(TypeHandle::Enum(id)) = self.module.type_named(&name) else {
            return Err(ParseError::UndefinedNominalType { name, span });
        };
        self.expect_punct(&TokenKind::LBrace, "'{'")?;
        let mut cases = indexmap::IndexMap::new();
        loop {
            self.skip_newlines();
            if self.eat_punct(&TokenKind::RBrace) {
                break;
            }
            let case_span = self.current_span();
            let case = match self.next()?.kind {
                TokenKind::Case(c) => c,
                other => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "a '?case' name".to_string(),
                        found: other.describe(),
                        span: case_span,
                    });
                }
            };
            let mut payload = Vec::new();
            if self.eat_punct(&TokenKind::LParen) {
                if !self.eat_punct(&TokenKind::RParen) {
                    loop {
                        payload.push(self.parse_type()?);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RParen, "')'")?;
                }
            }
            if cases.insert(case.clone(), payload).is_some() {
                return Err(ParseError::RedefinedIdentifier {
                    name: case,
                    span: case_span,
                });
            }
            self.expect_line_end()?;
        }
        self.module.enum_type_mut(id).cases = cases;
        self.expect_line_end()
    }

    // =========================================================================
    // Functions (phase 2)
    // =========================================================================

    fn complete_function(&mut self, function_counter: usize) -> Result<(), ParseError> {
        let func = match self.module.function_ids().get(function_counter) {
            Some(&f) => f,
            None => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a function declaration".to_string(),
                    found: "end of prototypes".to_string(),
                    span: self.current_span(),
                });
            }
        };

        let mut attributes = tir_core::FunctionAttributes::empty();
        while let Some(TokenKind::Attribute(_)) = self.peek_kind() {
            let token = self.next()?;
            if let TokenKind::Attribute(name) = token.kind {
                match name.as_str() {
                    "inline" => attributes |= tir_core::FunctionAttributes::INLINE,
                    _ => {
                        return Err(ParseError::InvalidAttributeArguments { span: token.span });
                    }
                }
            }
            if !self.at_line_end() {
                return Err(ParseError::InvalidAttributeArguments {
                    span: self.current_span(),
                });
            }
            self.skip_newlines();
        }

        let declaration_kind = if self.eat_punct(&TokenKind::LBracket) {
            Some(self.parse_declaration_kind()?)
        } else {
            None
        };

        self.expect_word("func")?;
        // Prototype scanning already registered the name and signature.
        self.next()?;
        self.expect_punct(&TokenKind::Colon, "':'")?;
        let _ = self.parse_type()?;

        {
            let function = self.module.function_mut(func);
            function.attributes = attributes;
            function.declaration_kind = declaration_kind;
        }

        if matches!(self.peek_kind(), Some(TokenKind::LBrace)) {
            let brace_span = self.current_span();
            if self.module.function(func).declaration_kind.is_some() {
                return Err(ParseError::DeclarationCannotHaveBody { span: brace_span });
            }
            self.bump();
            self.parse_function_body(func)?;
        }
        self.expect_line_end()
    }

    fn parse_declaration_kind(&mut self) -> Result<tir_core::DeclarationKind, ParseError> {
        let keyword_span = self.current_span();
        let keyword = match self.next()?.kind {
            TokenKind::Word(w) => w,
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "'extern' or 'adjoint'".to_string(),
                    found: other.describe(),
                    span: keyword_span,
                });
            }
        };
        let kind = match keyword.as_str() {
            "extern" => tir_core::DeclarationKind::External,
            "adjoint" => {
                let primal = self.parse_function_ref()?;
                let mut source_index = None;
                let mut argument_indices = None;
                let mut kept_indices = Vec::new();
                let mut seedable = false;
                loop {
                    match self.peek_kind() {
                        Some(TokenKind::Word(w)) if w == "from" => {
                            self.bump();
                            source_index = Some(self.parse_index()?);
                        }
                        Some(TokenKind::Word(w)) if w == "wrt" => {
                            self.bump();
                            argument_indices = Some(self.parse_index_list()?);
                        }
                        Some(TokenKind::Word(w)) if w == "keeping" => {
                            self.bump();
                            kept_indices = self.parse_index_list()?;
                        }
                        Some(TokenKind::Word(w)) if w == "seedable" => {
                            self.bump();
                            seedable = true;
                        }
                        _ => break,
                    }
                }
                tir_core::DeclarationKind::Adjoint(tir_core::AdjointConfig {
                    primal,
                    source_index,
                    argument_indices,
                    kept_indices,
                    seedable,
                })
            }
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "'extern' or 'adjoint'".to_string(),
                    found: format!("'{keyword}'"),
                    span: keyword_span,
                });
            }
        };
        self.expect_punct(&TokenKind::RBracket, "']'")?;
        Ok(kind)
    }

    /// A reference to a function in global scope (adjoint primal).
    fn parse_function_ref(&mut self) -> Result<FuncId, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Global(name) => match self.module.global_named(&name) {
                Some(GlobalValue::Function(f)) => Ok(f),
                Some(GlobalValue::Variable(_)) => Err(ParseError::UnexpectedIdentifierKind {
                    expected: "a function",
                    span,
                }),
                None => Err(ParseError::UndefinedIdentifier { name, span }),
            },
            TokenKind::GlobalIndex(index) => match self.module.global_by_index(index) {
                Some(GlobalValue::Function(f)) => Ok(f),
                Some(GlobalValue::Variable(_)) => Err(ParseError::UnexpectedIdentifierKind {
                    expected: "a function",
                    span,
                }),
                None => Err(ParseError::InvalidFunctionIndex { index, span }),
            },
            TokenKind::Local(_) | TokenKind::InstRef { .. } | TokenKind::ArgRef { .. } => {
                Err(ParseError::AnonymousIdentifierNotInLocal { span })
            }
            other => Err(ParseError::UnexpectedToken {
                expected: "a function reference".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    fn parse_function_body(&mut self, func: FuncId) -> Result<(), ParseError> {
        let function = self.module.function(func);
        let mut values = FxHashMap::default();
        let mut blocks_by_name = FxHashMap::default();
        for (block_id, block) in function.blocks() {
            if let Some(name) = &block.name {
                blocks_by_name.insert(name.clone(), block_id);
            }
            for &arg in block.args() {
                if let Some(name) = &function.argument(arg).name {
                    values.insert(name.clone(), Definition::Argument(arg));
                }
            }
        }
        let completed = vec![0usize; function.block_ids().len()];
        self.ctx = Some(FunctionContext {
            func,
            values,
            blocks_by_name,
            block_pos: 0,
            completed,
        });

        let mut block_counter = 0usize;
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenKind::RBrace) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Block(_)) | Some(TokenKind::BlockIndex(_)) => {
                    self.skip_block_header()?;
                    if let Some(ctx) = self.ctx.as_mut() {
                        ctx.block_pos = block_counter;
                    }
                    block_counter += 1;
                    self.parse_block_instructions()?;
                }
                Some(_) => {
                    return Err(ParseError::NotInBasicBlock {
                        span: self.current_span(),
                    });
                }
                None => {
                    return Err(ParseError::UnexpectedEndOfInput {
                        expected: "'}'".to_string(),
                    });
                }
            }
        }
        self.ctx = None;
        Ok(())
    }

    /// Phase 2 re-walks a block header already materialised by phase 1.
    fn skip_block_header(&mut self) -> Result<(), ParseError> {
        self.next()?;
        if self.eat_punct(&TokenKind::LParen) {
            let mut depth = 1usize;
            while depth > 0 {
                match self.next()?.kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => depth -= 1,
                    _ => {}
                }
            }
        }
        self.expect_punct(&TokenKind::Colon, "':'")?;
        Ok(())
    }

    fn parse_block_instructions(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                None
                | Some(TokenKind::RBrace)
                | Some(TokenKind::Block(_))
                | Some(TokenKind::BlockIndex(_)) => return Ok(()),
                Some(_) => {
                    self.parse_instruction()?;
                }
            }
        }
    }

    // =========================================================================
    // Types
    // =========================================================================

    pub(crate) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Word(word) => match word.as_str() {
                "void" => Ok(Type::Void),
                "stack" => Ok(Type::Stack),
                "tensor" => {
                    self.expect_punct(&TokenKind::LAngle, "'<'")?;
                    let shape = self.parse_nonscalar_shape()?;
                    self.expect_word("x")?;
                    let dtype = self.parse_data_type()?;
                    self.expect_punct(&TokenKind::RAngle, "'>'")?;
                    Ok(Type::tensor(shape, dtype))
                }
                "box" => {
                    self.expect_punct(&TokenKind::LBrace, "'{'")?;
                    let element = self.parse_type()?;
                    self.expect_punct(&TokenKind::RBrace, "'}'")?;
                    Ok(Type::boxed(element))
                }
                other => match DataType::parse(other) {
                    Some(dtype) => Ok(Type::scalar(dtype)),
                    None => Err(ParseError::UnexpectedToken {
                        expected: "a type".to_string(),
                        found: format!("'{other}'"),
                        span,
                    }),
                },
            },
            TokenKind::LParen => {
                let mut elements = Vec::new();
                if !self.eat_punct(&TokenKind::RParen) {
                    loop {
                        elements.push(self.parse_type()?);
                        if !self.eat_punct(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect_punct(&TokenKind::RParen, "')'")?;
                }
                if self.eat_punct(&TokenKind::Arrow) {
                    let result = self.parse_type()?;
                    Ok(Type::function(elements, result))
                } else {
                    Ok(Type::Tuple(elements))
                }
            }
            TokenKind::LBracket => {
                let count = self.parse_index()?;
                self.expect_word("x")?;
                let element = self.parse_type()?;
                self.expect_punct(&TokenKind::RBracket, "']'")?;
                Ok(Type::Array(count, Box::new(element)))
            }
            TokenKind::Star => {
                let element = self.parse_type()?;
                Ok(Type::pointer(element))
            }
            TokenKind::TypeName(name) => match self.module.type_named(&name) {
                Some(handle) => Ok(handle.ty()),
                None => Err(ParseError::UndefinedNominalType { name, span }),
            },
            other => Err(ParseError::UnexpectedToken {
                expected: "a type".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    fn parse_nonscalar_shape(&mut self) -> Result<TensorShape, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Integer(value) if value >= 0 => {
                Ok(TensorShape::new([value as usize]))
            }
            TokenKind::Dimensions(dims) => Ok(TensorShape::new(dims)),
            other => Err(ParseError::UnexpectedToken {
                expected: "tensor dimensions".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    /// Shape operand: `scalar`, a single dimension, or a dimension run.
    pub(crate) fn parse_shape(&mut self) -> Result<TensorShape, ParseError> {
        if self.at_word("scalar") {
            self.bump();
            return Ok(TensorShape::scalar());
        }
        self.parse_nonscalar_shape()
    }

    pub(crate) fn parse_data_type(&mut self) -> Result<DataType, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Word(word) => match DataType::parse(&word) {
                Some(dtype) => Ok(dtype),
                None => Err(ParseError::UnexpectedToken {
                    expected: "a data type".to_string(),
                    found: format!("'{word}'"),
                    span,
                }),
            },
            other => Err(ParseError::UnexpectedToken {
                expected: "a data type".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    pub(crate) fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    pub(crate) fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    pub(crate) fn next(&mut self) -> Result<Token, ParseError> {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                Ok(token.clone())
            }
            None => Err(ParseError::UnexpectedEndOfInput {
                expected: "more input".to_string(),
            }),
        }
    }

    pub(crate) fn bump(&mut self) {
        self.pos += 1;
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    fn previous_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    pub(crate) fn at_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Word(w)) if w == word)
    }

    pub(crate) fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_word(&mut self, word: &str) -> Result<Span, ParseError> {
        let span = self.current_span();
        if self.eat_word(word) {
            Ok(span)
        } else {
            Err(self.unexpected(&format!("'{word}'")))
        }
    }

    pub(crate) fn eat_punct(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_punct(
        &mut self,
        kind: &TokenKind,
        expected: &str,
    ) -> Result<Span, ParseError> {
        let span = self.current_span();
        if self.eat_punct(kind) {
            Ok(span)
        } else {
            Err(self.unexpected(expected))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek_kind() {
            Some(kind) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: kind.describe(),
                span: self.current_span(),
            },
            None => ParseError::UnexpectedEndOfInput {
                expected: expected.to_string(),
            },
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), Some(TokenKind::Newline)) {
            self.pos += 1;
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek_kind(), None | Some(TokenKind::Newline))
    }

    /// Consume a line terminator: a newline, or (without consuming) a
    /// closing brace or end of input.
    pub(crate) fn expect_line_end(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Newline) => {
                self.skip_newlines();
                Ok(())
            }
            Some(TokenKind::RBrace) | None => Ok(()),
            Some(_) => Err(self.unexpected("end of line")),
        }
    }

    /// Skip to (and over) the end of the current line, leaving a closing
    /// brace at depth 0 unconsumed. Braces opened within the line (struct
    /// literals, box types) are balanced through.
    pub(crate) fn skip_line(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Newline => {
                    self.pos += 1;
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.pos += 1;
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    pub(crate) fn expect_type_name(&mut self) -> Result<(String, Span), ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::TypeName(name) => Ok((name, span)),
            other => Err(ParseError::UnexpectedToken {
                expected: "a '$type' name".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    /// A non-negative integer.
    pub(crate) fn parse_index(&mut self) -> Result<usize, ParseError> {
        let span = self.current_span();
        match self.next()?.kind {
            TokenKind::Integer(value) if value >= 0 => Ok(value as usize),
            other => Err(ParseError::UnexpectedToken {
                expected: "a non-negative integer".to_string(),
                found: other.describe(),
                span,
            }),
        }
    }

    pub(crate) fn parse_index_list(&mut self) -> Result<Vec<usize>, ParseError> {
        let mut indices = vec![self.parse_index()?];
        while self.eat_punct(&TokenKind::Comma) {
            indices.push(self.parse_index()?);
        }
        Ok(indices)
    }
}
