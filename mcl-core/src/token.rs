//! Token model for MCL
//!
//! Tokens keep their raw lexeme, their source span and a stable category
//! code. The code tables below are part of MCL's external interface and must
//! not be renumbered.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::lexer::Span;

/// Reserved words and their category codes
pub const RESERVED_WORDS: &[(&str, u16)] = &[
    ("sustancia", 1010),
    ("numero", 1015),
    ("cadena", 1017),
    ("cantidad", 1020),
    ("PLANCK", 1025),
    ("AVOGADRO", 1026),
    ("PI", 1027),
    ("mostrar", 1090),
    ("mezclar", 1100),
    ("reaccionar", 1110),
    ("balancear", 1120),
    ("si", 1130),
    ("sino", 1140),
    ("repetir", 1150),
    ("hacer", 1160),
    ("mientras", 1170),
    ("detener", 1180),
    ("y", 1190),
    ("o", 1200),
];

/// Verbal operator aliases and the symbolic operator each one stands for
pub const VERBAL_OPERATORS: &[(&str, &str)] = &[
    ("fusionar", "+"),
    ("separar", "-"),
    ("catalizar", "*"),
    ("diluir", "/"),
];

/// Physical units and their category codes
pub const UNITS: &[(&str, u16)] = &[
    ("mol", 1030),
    ("gramo", 1040),
    ("atm", 1050),
    ("gradC", 1060),
    ("gradF", 1070),
    ("gradK", 1080),
];

pub const OPERATORS: &[(&str, u16)] = &[
    ("=", 2010),
    ("->", 2020),
    ("+", 2030),
    ("*", 2040),
    ("-", 2050),
    ("/", 2060),
    ("@", 2070),
    ("<", 2080),
    (">", 2090),
    ("<=", 2100),
    (">=", 2110),
    ("!=", 2120),
    ("==", 2130),
];

pub const PUNCTUATION: &[(&str, u16)] = &[(";", 3010), (",", 3020), (".", 3030), ("#", 3040), (":", 3050)];

pub const BRACES: &[(&str, u16)] = &[("{", 4010), ("}", 4020)];

pub const BRACKETS: &[(&str, u16)] = &[("(", 5010), (")", 5020), ("[", 5030), ("]", 5040)];

/// First code handed out to identifiers
pub const FIRST_IDENTIFIER_CODE: u16 = 6001;

/// First code handed out to numeric literals
pub const FIRST_NUMBER_CODE: u16 = 7001;

/// Lexeme class of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    ReservedWord,
    Identifier,
    Number,
    Operator,
    Punctuation,
    Brace,
    Bracket,
    Unit,
    String,
    Comment,
    Unknown,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::ReservedWord => "RESERVED_WORD",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::Number => "NUMBER",
            TokenKind::Operator => "OPERATOR",
            TokenKind::Punctuation => "PUNCTUATION",
            TokenKind::Brace => "BRACE",
            TokenKind::Bracket => "BRACKET",
            TokenKind::Unit => "UNIT",
            TokenKind::String => "STRING",
            TokenKind::Comment => "COMMENT",
            TokenKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A classified lexeme
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
    /// Category code; `None` for strings, comments and unknown lexemes
    pub code: Option<u16>,
}

impl Token {
    pub fn is(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.kind == kind && self.lexeme == lexeme
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{:<14} {:<20} {}", self.kind, self.lexeme, code),
            None => write!(f, "{:<14} {}", self.kind, self.lexeme),
        }
    }
}

/// Looks up the fixed code of a lexeme in one of the code tables
pub fn fixed_code(table: &[(&str, u16)], lexeme: &str) -> Option<u16> {
    table.iter().find(|(word, _)| *word == lexeme).map(|(_, code)| *code)
}

/// Symbolic operator a verbal alias stands for
pub fn verbal_operator(word: &str) -> Option<&'static str> {
    VERBAL_OPERATORS.iter().find(|(alias, _)| *alias == word).map(|(_, op)| *op)
}

/// Hands out identifier and number codes; the same lexeme always gets the
/// same code for the lifetime of the registry.
#[derive(Debug, Clone)]
pub struct CodeRegistry {
    identifiers: HashMap<String, u16>,
    numbers: HashMap<String, u16>,
    next_identifier: u16,
    next_number: u16,
}

impl Default for CodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self {
            identifiers: HashMap::new(),
            numbers: HashMap::new(),
            next_identifier: FIRST_IDENTIFIER_CODE,
            next_number: FIRST_NUMBER_CODE,
        }
    }

    pub fn identifier(&mut self, lexeme: &str) -> u16 {
        Self::assign(&mut self.identifiers, &mut self.next_identifier, lexeme)
    }

    pub fn number(&mut self, lexeme: &str) -> u16 {
        Self::assign(&mut self.numbers, &mut self.next_number, lexeme)
    }

    fn assign(codes: &mut HashMap<String, u16>, next: &mut u16, lexeme: &str) -> u16 {
        if let Some(code) = codes.get(lexeme) {
            return *code;
        }
        let code = *next;
        *next += 1;
        codes.insert(lexeme.to_string(), code);
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reuses_codes() {
        let mut registry = CodeRegistry::new();
        assert_eq!(registry.identifier("h2"), 6001);
        assert_eq!(registry.identifier("o2"), 6002);
        assert_eq!(registry.identifier("h2"), 6001);
        assert_eq!(registry.number("2"), 7001);
        assert_eq!(registry.number("2.5"), 7002);
        assert_eq!(registry.number("2"), 7001);
    }

    #[test]
    fn test_fixed_codes() {
        assert_eq!(fixed_code(RESERVED_WORDS, "sustancia"), Some(1010));
        assert_eq!(fixed_code(UNITS, "gradK"), Some(1080));
        assert_eq!(fixed_code(OPERATORS, "=="), Some(2130));
        assert_eq!(fixed_code(PUNCTUATION, ":"), Some(3050));
        assert_eq!(fixed_code(BRACKETS, "]"), Some(5040));
        assert_eq!(fixed_code(OPERATORS, "=>"), None);
    }

    #[test]
    fn test_verbal_operators_share_symbolic_codes() {
        for (alias, op) in VERBAL_OPERATORS {
            assert_eq!(verbal_operator(alias), Some(*op));
            assert!(fixed_code(OPERATORS, op).is_some());
        }
        assert_eq!(verbal_operator("mezclar"), None);
    }
}
