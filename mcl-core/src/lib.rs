//! # MCL - a chemistry modeling language
//!
//! MCL models chemistry-like computations: substances with a quantity, a
//! physical unit and temperature/pressure metadata, plain numbers and
//! strings, reaction definitions and invocations, mixing and balancing, and
//! structured control flow. This crate is the language's front and middle
//! end.
//!
//! ## Example
//!
//! ```mcl
//! sustancia h2 cantidad = 2 mol @ [25 gradC, 1 atm];
//! sustancia o2 cantidad = 1 mol;
//! numero x = 2 fusionar 3;
//! si (h2.temp > 20) { mostrar("caliente", h2); }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! MCL Source (.mcl)
//!     ↓ lexer (+ keyword trie)
//! Token Stream
//!     ↓ parser (inline checks, fills the symbol table)
//! AST + SymbolTable
//!     ↓ semantic analyzer (collects every violation)
//! Validated AST
//!     ↓ global optimizer (fold + propagate)
//! Optimized AST
//!     ↓ code generator
//! Polish / P-code / Triples / Quadruples
//!     ↓ peephole optimizer
//! Optimized P-code
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod optimizer;
pub mod parser;
pub mod symbols;
pub mod token;
pub mod trie;
pub mod types;

use serde::Serialize;

pub use ast::{BinOp, Block, CmpOp, Condition, Conjunction, Expr, Program, Property, Stmt, Target};
pub use codegen::{CodeGenerator, IntermediateCode, Quad, Triple};
pub use config::{Config, OutputFormat};
pub use error::{Error, Errors, Result};
pub use lexer::{Lexer, Span};
pub use optimizer::{GlobalOptimizer, PeepholeResult};
pub use parser::Parser;
pub use symbols::{Symbol, SymbolKind, SymbolTable};
pub use token::{Token, TokenKind};
pub use types::checker::SemanticAnalyzer;
pub use types::{Type, Unit};

/// Scan source text into tokens. Never fails: malformed input becomes
/// `Unknown` tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

/// Parse tokens into a program and the symbol table built along the way
pub fn parse(tokens: &[Token]) -> Result<(Program, SymbolTable)> {
    let mut symbols = SymbolTable::new();
    let program = Parser::new(tokens, &mut symbols).parse()?;
    Ok((program, symbols))
}

/// Run the standalone semantic pass and return every violation found
pub fn analyze(program: &Program, symbols: &mut SymbolTable) -> Errors {
    SemanticAnalyzer::new(symbols).analyze(program)
}

pub fn optimize_global(program: &Program) -> Program {
    GlobalOptimizer::new().optimize(program)
}

pub fn generate(program: &Program) -> IntermediateCode {
    CodeGenerator::new().generate(program)
}

pub fn optimize_peephole<S: AsRef<str>>(pcode: &[S]) -> PeepholeResult {
    optimizer::peephole::optimize(pcode)
}

/// Lex, parse and analyze
pub fn check(source: &str) -> std::result::Result<(Program, SymbolTable), Errors> {
    check_with_config(source, &Config::default())
}

/// Lex and parse; the semantic pass runs only when the configuration
/// enables it
pub fn check_with_config(source: &str, config: &Config) -> std::result::Result<(Program, SymbolTable), Errors> {
    let tokens = tokenize(source);
    let (program, mut symbols) = parse(&tokens)?;
    if !config.pipeline.semantic_pass {
        return Ok((program, symbols));
    }
    analyze(&program, &mut symbols).into_result((program, symbols))
}

/// Everything the pipeline produced for one source unit
#[derive(Debug, Clone, Serialize)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
    /// Same as `program` when the global optimizer is disabled
    pub optimized: Program,
    pub symbols: SymbolTable,
    pub code: IntermediateCode,
    /// P-code after the peephole pass; nothing removed when it is disabled
    pub peephole: PeepholeResult,
}

/// Run the full pipeline with the default configuration
pub fn compile(source: &str) -> std::result::Result<Compilation, Errors> {
    compile_with_config(source, &Config::default())
}

/// Run the full pipeline. Invalid programs never reach the optimizers or
/// the code generator.
pub fn compile_with_config(source: &str, config: &Config) -> std::result::Result<Compilation, Errors> {
    let tokens = tokenize(source);
    let (program, mut symbols) = parse(&tokens)?;

    if config.pipeline.semantic_pass {
        let errors = analyze(&program, &mut symbols);
        if !errors.is_empty() {
            return Err(errors);
        }
    }

    let optimized = if config.pipeline.global_optimizer {
        optimize_global(&program)
    } else {
        program.clone()
    };
    let code = generate(&optimized);
    let peephole = if config.pipeline.peephole {
        optimize_peephole(&code.pcode)
    } else {
        PeepholeResult { code: code.pcode.clone(), removed: Vec::new() }
    };

    Ok(Compilation { tokens, program, optimized, symbols, code, peephole })
}
