//! Prefix tree over reserved words, verbal operators and unit names
//!
//! Used by the lexer to classify word runs with longest-match semantics.

use std::collections::HashMap;

use crate::token::{RESERVED_WORDS, UNITS, VERBAL_OPERATORS};

/// What a complete trie entry stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Reserved(&'static str),
    Unit(&'static str),
    /// Verbal alias, carrying the symbolic operator it maps to
    Verbal(&'static str),
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    entry: Option<Keyword>,
}

#[derive(Debug)]
pub struct KeywordTrie {
    root: TrieNode,
}

impl Default for KeywordTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordTrie {
    /// Builds the trie over every MCL keyword
    pub fn new() -> Self {
        let mut trie = Self { root: TrieNode::default() };
        for (word, _) in RESERVED_WORDS {
            trie.insert(word, Keyword::Reserved(word));
        }
        for (word, op) in VERBAL_OPERATORS {
            trie.insert(word, Keyword::Verbal(op));
        }
        for (word, _) in UNITS {
            trie.insert(word, Keyword::Unit(word));
        }
        trie
    }

    fn insert(&mut self, word: &str, keyword: Keyword) {
        let mut node = &mut self.root;
        for c in word.chars() {
            node = node.children.entry(c).or_default();
        }
        node.entry = Some(keyword);
    }

    /// Longest keyword that is a prefix of `text`, with its byte length.
    ///
    /// The walk stops at the first character that is neither alphanumeric
    /// nor `_`.
    pub fn longest_match(&self, text: &str) -> Option<(Keyword, usize)> {
        let mut node = &self.root;
        let mut best = None;
        for (offset, c) in text.char_indices() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            match node.children.get(&c) {
                Some(next) => node = next,
                None => break,
            }
            if let Some(keyword) = node.entry {
                best = Some((keyword, offset + c.len_utf8()));
            }
        }
        best
    }

    /// Keyword spelled exactly by `word`; a word that merely starts with a
    /// keyword does not match.
    pub fn classify(&self, word: &str) -> Option<Keyword> {
        match self.longest_match(word) {
            Some((keyword, len)) if len == word.len() => Some(keyword),
            _ => None,
        }
    }
}
