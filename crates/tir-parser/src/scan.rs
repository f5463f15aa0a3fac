//! Phase 1: symbol scanning.
//!
//! Runs over the token stream with a saved cursor (the caller restores
//! the position afterwards) and registers, in this order:
//! 1. all nominal type names (aliases, structs, enums), as placeholders;
//! 2. all variables and function prototypes (full signature types), plus
//!    per-function basic-block prototypes (named, typed arguments) and
//!    instruction slots, so forward references resolve in phase 2.

use tir_core::{Function, StructType, Type, TypeAlias, Variable};

use crate::error::ParseError;
use crate::parser::Parser;
use crate::token::TokenKind;

impl Parser {
    /// Phase 1a: register nominal type names and check declaration order.
    pub(crate) fn scan_types(&mut self) -> Result<(), ParseError> {
        let mut seen_values = false;
        loop {
            self.skip_newlines();
            let Some(kind) = self.peek_kind().cloned() else {
                return Ok(());
            };
            match &kind {
                TokenKind::Word(w) if w == "type" => {
                    let span = self.current_span();
                    if seen_values {
                        return Err(ParseError::TypeDeclarationNotBeforeValues { span });
                    }
                    self.bump();
                    let (name, name_span) = self.expect_type_name()?;
                    if self.module.type_named(&name).is_some() {
                        return Err(ParseError::RedefinedIdentifier {
                            name,
                            span: name_span,
                        });
                    }
                    self.module.add_alias(TypeAlias {
                        name,
                        underlying: None,
                    });
                    self.skip_line();
                }
                TokenKind::Word(w) if w == "struct" || w == "enum" => {
                    let span = self.current_span();
                    if seen_values {
                        return Err(ParseError::TypeDeclarationNotBeforeValues { span });
                    }
                    let is_struct = w == "struct";
                    self.bump();
                    let (name, name_span) = self.expect_type_name()?;
                    if self.module.type_named(&name).is_some() {
                        return Err(ParseError::RedefinedIdentifier {
                            name,
                            span: name_span,
                        });
                    }
                    if is_struct {
                        self.module.add_struct(StructType {
                            name,
                            fields: indexmap::IndexMap::new(),
                        });
                    } else {
                        self.module.add_enum(tir_core::EnumType {
                            name,
                            cases: indexmap::IndexMap::new(),
                        });
                    }
                    self.skip_line();
                }
                TokenKind::Word(w) if w == "var" || w == "func" => {
                    seen_values = true;
                    self.skip_line();
                }
                TokenKind::Attribute(_) | TokenKind::LBracket => {
                    seen_values = true;
                    self.skip_line();
                }
                _ => self.skip_line(),
            }
        }
    }

    /// Phase 1b: register globals and per-function prototypes.
    pub(crate) fn scan_globals(&mut self) -> Result<(), ParseError> {
        let mut seen_function = false;
        loop {
            self.skip_newlines();
            let Some(kind) = self.peek_kind().cloned() else {
                return Ok(());
            };
            match &kind {
                TokenKind::Word(w) if w == "type" => self.skip_line(),
                TokenKind::Word(w) if w == "struct" || w == "enum" => self.skip_line(),
                TokenKind::Word(w) if w == "var" => {
                    let span = self.current_span();
                    if seen_function {
                        return Err(ParseError::VariableAfterFunction { span });
                    }
                    self.bump();
                    self.scan_variable()?;
                }
                TokenKind::Word(w) if w == "func" => {
                    seen_function = true;
                    self.bump();
                    self.scan_function()?;
                }
                TokenKind::Attribute(_) => {
                    // Attribute lines belong to the next function.
                    self.skip_line();
                }
                TokenKind::LBracket => {
                    // Declaration-kind bracket; resolved in phase 2.
                    while let Some(kind) = self.peek_kind() {
                        let done = matches!(kind, TokenKind::RBracket);
                        self.bump();
                        if done {
                            break;
                        }
                    }
                }
                _ => self.skip_line(),
            }
        }
    }

    fn scan_variable(&mut self) -> Result<(), ParseError> {
        let span = self.current_span();
        let name = match self.next()?.kind {
            TokenKind::Global(name) => {
                if self.module.global_named(&name).is_some() {
                    return Err(ParseError::RedefinedIdentifier { name, span });
                }
                Some(name)
            }
            TokenKind::GlobalIndex(index) => {
                if index != self.module.variable_ids().len() {
                    return Err(ParseError::InvalidVariableIndex { index, span });
                }
                None
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a '@variable' name".to_string(),
                    found: other.describe(),
                    span,
                });
            }
        };
        self.expect_punct(&TokenKind::Colon, "':'")?;
        let ty = self.parse_type()?;
        self.module.add_variable(Variable { name, ty });
        self.expect_line_end()
    }

    fn scan_function(&mut self) -> Result<(), ParseError> {
        let span = self.current_span();
        let global_count = self.module.variable_ids().len() + self.module.function_ids().len();
        let name = match self.next()?.kind {
            TokenKind::Global(name) => {
                if self.module.global_named(&name).is_some() {
                    return Err(ParseError::RedefinedIdentifier { name, span });
                }
                Some(name)
            }
            TokenKind::GlobalIndex(index) => {
                if index != global_count {
                    return Err(ParseError::InvalidFunctionIndex { index, span });
                }
                None
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a '@function' name".to_string(),
                    found: other.describe(),
                    span,
                });
            }
        };
        self.expect_punct(&TokenKind::Colon, "':'")?;
        let type_span = self.current_span();
        let signature = self.parse_type()?;
        let Type::Function(argument_types, return_type) = signature else {
            return Err(ParseError::NotFunctionType { span: type_span });
        };
        let func = self
            .module
            .add_function(Function::new(name, argument_types, *return_type));

        if matches!(self.peek_kind(), Some(TokenKind::LBrace)) {
            self.bump();
            self.scan_function_body(func)?;
        }
        self.expect_line_end()
    }

    /// Scan a function body for block prototypes and instruction counts.
    fn scan_function_body(&mut self, func: tir_core::FuncId) -> Result<(), ParseError> {
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                Some(TokenKind::RBrace) => {
                    self.bump();
                    return Ok(());
                }
                Some(TokenKind::Block(_)) | Some(TokenKind::BlockIndex(_)) => {
                    self.scan_block(func)?;
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
    }

    fn scan_block(&mut self, func: tir_core::FuncId) -> Result<(), ParseError> {
        let span = self.current_span();
        let block_index = self.module.function(func).block_ids().len();
        let name = match self.next()?.kind {
            TokenKind::Block(name) => {
                let function = self.module.function(func);
                let duplicate = function
                    .blocks()
                    .any(|(_, b)| b.name.as_deref() == Some(name.as_str()));
                if duplicate {
                    return Err(ParseError::RedefinedIdentifier { name, span });
                }
                Some(name)
            }
            TokenKind::BlockIndex(index) => {
                if index != block_index {
                    return Err(ParseError::InvalidBasicBlockIndex { index, span });
                }
                None
            }
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a basic block label".to_string(),
                    found: other.describe(),
                    span,
                });
            }
        };
        let block = self.module.function_mut(func).append_block(name);

        // Argument list, when present.
        if self.eat_punct(&TokenKind::LParen) {
            if !self.eat_punct(&TokenKind::RParen) {
                let mut arg_index = 0usize;
                loop {
                    let arg_span = self.current_span();
                    let arg_name = match self.next()?.kind {
                        TokenKind::Local(name) => {
                            let function = self.module.function(func);
                            let duplicate = function.blocks().any(|(_, b)| {
                                b.args()
                                    .iter()
                                    .any(|&a| function.argument(a).name.as_deref() == Some(&name))
                            });
                            if duplicate {
                                return Err(ParseError::RedefinedIdentifier {
                                    name,
                                    span: arg_span,
                                });
                            }
                            Some(name)
                        }
                        TokenKind::ArgRef { block: b, arg } => {
                            if b != block_index {
                                return Err(ParseError::InvalidBasicBlockIndex {
                                    index: b,
                                    span: arg_span,
                                });
                            }
                            if arg != arg_index {
                                return Err(ParseError::InvalidArgumentIndex {
                                    index: arg,
                                    span: arg_span,
                                });
                            }
                            None
                        }
                        other => {
                            return Err(ParseError::UnexpectedToken {
                                expected: "a block argument".to_string(),
                                found: other.describe(),
                                span: arg_span,
                            });
                        }
                    };
                    self.expect_punct(&TokenKind::Colon, "':'")?;
                    let ty = self.parse_type()?;
                    self.module
                        .function_mut(func)
                        .append_argument(block, arg_name, ty);
                    arg_index += 1;
                    if !self.eat_punct(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_punct(&TokenKind::RParen, "')'")?;
            }
        }
        self.expect_punct(&TokenKind::Colon, "':'")?;

        // Count instruction lines and create placeholder slots, completed
        // by index in phase 2.
        loop {
            self.skip_newlines();
            match self.peek_kind() {
                None
                | Some(TokenKind::RBrace)
                | Some(TokenKind::Block(_))
                | Some(TokenKind::BlockIndex(_)) => break,
                Some(_) => {
                    self.module.function_mut(func).append_instruction(
                        block,
                        None,
                        tir_core::InstructionKind::Trap,
                    );
                    self.skip_line();
                }
            }
        }
        Ok(())
    }
}
