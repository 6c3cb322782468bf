//! Lexer for MCL
//!
//! Tokenizes MCL source into a stream of classified tokens. Lexing never
//! fails: malformed words, unterminated strings and stray characters come out
//! as [`TokenKind::Unknown`] tokens for later stages to report.

use logos::Logos;
use serde::Serialize;

use crate::token::{
    fixed_code, CodeRegistry, Token, TokenKind, BRACES, BRACKETS, OPERATORS, PUNCTUATION,
    RESERVED_WORDS, UNITS,
};
use crate::trie::{Keyword, KeywordTrie};

/// Raw character-class scan. Words start on any letter and end at whitespace or at one of
/// `" = { } [ ] ( ) ; , . : #`; everything else belongs to the word.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Scan {
    #[regex(r##"\p{Alphabetic}[^ \t\r\n\f"={}\[\]();,.:#]*"##)]
    Word,

    #[regex(r"[0-9]+(\.[0-9]*)?")]
    Number,

    #[regex(r#""[^"]*""#)]
    Text,

    #[regex(r#""[^"]*"#)]
    OpenText,

    #[regex(r"#[^\n]*")]
    Comment,

    #[token("->")]
    #[token("<=")]
    #[token(">=")]
    #[token("!=")]
    #[token("==")]
    #[token("=")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("@")]
    #[token("<")]
    #[token(">")]
    Operator,

    #[token(";")]
    #[token(",")]
    #[token(".")]
    #[token(":")]
    Punctuation,

    #[token("{")]
    #[token("}")]
    Brace,

    #[token("(")]
    #[token(")")]
    #[token("[")]
    #[token("]")]
    Bracket,
}

/// Source location span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self { start, end, line, col }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, col: 0 }
    }
}

pub struct Lexer {
    source: String,
    trie: KeywordTrie,
    codes: CodeRegistry,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            trie: KeywordTrie::new(),
            codes: CodeRegistry::new(),
        }
    }

    /// Tokenize the whole source
    pub fn tokenize(&mut self) -> Vec<Token> {
        let source = std::mem::take(&mut self.source);
        let mut tokens = Vec::new();
        let mut lex = Scan::lexer(&source);

        // Pre-compute line starts for fast line/col lookup
        let line_starts: Vec<usize> = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        while let Some(scanned) = lex.next() {
            let byte_span = lex.span();
            match scanned {
                Ok(scan) => {
                    let (line, col) = offset_to_line_col(&line_starts, byte_span.start);
                    let span = Span::new(byte_span.start, byte_span.end, line, col);
                    tokens.push(self.classify(scan, lex.slice(), span));
                }
                Err(()) => {
                    // One unknown token per unmatched character
                    let start = byte_span.start;
                    let mut end = byte_span.end;
                    if let Some(c) = source[start..].chars().next() {
                        let char_end = start + c.len_utf8();
                        if char_end > end {
                            lex.bump(char_end - end);
                            end = char_end;
                        }
                    }
                    for (offset, c) in source[start..end].char_indices() {
                        let at = start + offset;
                        let (line, col) = offset_to_line_col(&line_starts, at);
                        tokens.push(Token {
                            kind: TokenKind::Unknown,
                            lexeme: c.to_string(),
                            span: Span::new(at, at + c.len_utf8(), line, col),
                            code: None,
                        });
                    }
                }
            }
        }

        self.source = source;
        tracing::debug!(tokens = tokens.len(), "tokenized source");
        tokens
    }

    fn classify(&mut self, scan: Scan, lexeme: &str, span: Span) -> Token {
        let (kind, text, code) = match scan {
            Scan::Word => return self.classify_word(lexeme, span),
            Scan::Number => (TokenKind::Number, lexeme, Some(self.codes.number(lexeme))),
            Scan::Text => (TokenKind::String, lexeme, None),
            Scan::OpenText => (TokenKind::Unknown, lexeme, None),
            Scan::Comment => (TokenKind::Comment, lexeme, None),
            Scan::Operator => (TokenKind::Operator, lexeme, fixed_code(OPERATORS, lexeme)),
            Scan::Punctuation => (TokenKind::Punctuation, lexeme, fixed_code(PUNCTUATION, lexeme)),
            Scan::Brace => (TokenKind::Brace, lexeme, fixed_code(BRACES, lexeme)),
            Scan::Bracket => (TokenKind::Bracket, lexeme, fixed_code(BRACKETS, lexeme)),
        };
        Token { kind, lexeme: text.to_string(), span, code }
    }

    fn classify_word(&mut self, lexeme: &str, span: Span) -> Token {
        let malformed = lexeme.chars().any(|c| !(c.is_alphanumeric() || c == '_'));
        if malformed {
            return Token { kind: TokenKind::Unknown, lexeme: lexeme.to_string(), span, code: None };
        }

        match self.trie.classify(lexeme) {
            Some(Keyword::Reserved(word)) => Token {
                kind: TokenKind::ReservedWord,
                lexeme: word.to_string(),
                span,
                code: fixed_code(RESERVED_WORDS, word),
            },
            Some(Keyword::Unit(word)) => Token {
                kind: TokenKind::Unit,
                lexeme: word.to_string(),
                span,
                code: fixed_code(UNITS, word),
            },
            Some(Keyword::Verbal(op)) => Token {
                kind: TokenKind::Operator,
                lexeme: op.to_string(),
                span,
                code: fixed_code(OPERATORS, op),
            },
            None => Token {
                kind: TokenKind::Identifier,
                lexeme: lexeme.to_string(),
                span,
                code: Some(self.codes.identifier(lexeme)),
            },
        }
    }
}

/// Convert byte offset to line and column (1-indexed)
fn offset_to_line_col(line_starts: &[usize], offset: usize) -> (usize, usize) {
    let line = line_starts.partition_point(|&start| start <= offset);
    let line_start = line_starts.get(line.saturating_sub(1)).copied().unwrap_or(0);
    let col = offset - line_start + 1;
    (line, col)
}
