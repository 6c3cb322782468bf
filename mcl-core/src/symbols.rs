//! Scoped symbol table
//!
//! A stack of scopes mapping names to symbol records. Lookup searches from the
//! innermost scope outwards; insertion always targets the innermost scope. The
//! outermost scope is never popped and holds the built-in constants.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::ast::{join_reagents, Block, Expr, Metadata, Reagent};
use crate::types::{Type, Typed, Unit};

/// Built-in numeric constants, present in the outermost scope
pub const BUILTIN_CONSTANTS: &[(&str, &str)] = &[
    ("PLANCK", "6.62607015e-34"),
    ("AVOGADRO", "6.02214076e23"),
    ("PI", "3.141592653589793"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstanceInfo {
    pub quantity: String,
    pub unit: Option<Unit>,
    pub metadata: Vec<Metadata>,
}

impl SubstanceInfo {
    /// Fresh substance with quantity 0, no unit and no metadata
    pub fn empty() -> Self {
        Self { quantity: "0".to_string(), unit: None, metadata: Vec::new() }
    }

    /// Metadata entry tagged with `unit`, if declared
    pub fn metadata_slot(&self, unit: Unit) -> Option<&Metadata> {
        self.metadata.iter().find(|meta| meta.unit == unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionInfo {
    pub reactants: Vec<Reagent>,
    pub products: Vec<Reagent>,
    pub body: Block,
}

/// One fixed-shape record per symbol kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SymbolKind {
    Substance(SubstanceInfo),
    Number { value: Expr },
    Text { value: String },
    Reaction(ReactionInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn substance(name: impl Into<String>, info: SubstanceInfo) -> Self {
        Self { name: name.into(), kind: SymbolKind::Substance(info) }
    }

    pub fn number(name: impl Into<String>, value: Expr) -> Self {
        Self { name: name.into(), kind: SymbolKind::Number { value } }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), kind: SymbolKind::Text { value: value.into() } }
    }

    pub fn reaction(name: impl Into<String>, info: ReactionInfo) -> Self {
        Self { name: name.into(), kind: SymbolKind::Reaction(info) }
    }

    pub fn ty(&self) -> Type {
        match self.kind {
            SymbolKind::Substance(_) => Type::Substance,
            SymbolKind::Number { .. } => Type::Number,
            SymbolKind::Text { .. } => Type::String,
            SymbolKind::Reaction(_) => Type::Reaction,
        }
    }

    /// Unit of a substance symbol; every other kind is unitless
    pub fn unit(&self) -> Option<Unit> {
        match &self.kind {
            SymbolKind::Substance(info) => info.unit,
            _ => None,
        }
    }

    pub fn typed(&self) -> Typed {
        Typed::new(self.ty(), self.unit())
    }

    pub fn as_substance(&self) -> Option<&SubstanceInfo> {
        match &self.kind {
            SymbolKind::Substance(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_substance_mut(&mut self) -> Option<&mut SubstanceInfo> {
        match &mut self.kind {
            SymbolKind::Substance(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_reaction(&self) -> Option<&ReactionInfo> {
        match &self.kind {
            SymbolKind::Reaction(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_reaction_mut(&mut self) -> Option<&mut ReactionInfo> {
        match &mut self.kind {
            SymbolKind::Reaction(info) => Some(info),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<12} {:<10} ", self.name, self.ty())?;
        match &self.kind {
            SymbolKind::Substance(info) => {
                write!(f, "quantity={}", info.quantity)?;
                if let Some(unit) = info.unit {
                    write!(f, " unit={}", unit)?;
                }
                if !info.metadata.is_empty() {
                    let meta: Vec<String> = info.metadata.iter().map(Metadata::to_string).collect();
                    write!(f, " metadata=[{}]", meta.join(", "))?;
                }
                Ok(())
            }
            SymbolKind::Number { value } => match value.as_num() {
                Some(literal) => write!(f, "value={}", literal),
                None => write!(f, "value=<expr>"),
            },
            SymbolKind::Text { value } => write!(f, "value={}", value),
            SymbolKind::Reaction(info) => write!(
                f,
                "{} -> {}",
                join_reagents(&info.reactants),
                join_reagents(&info.products)
            ),
        }
    }
}

/// Stack of scopes
#[derive(Debug, Clone, Serialize)]
pub struct SymbolTable {
    scopes: Vec<BTreeMap<String, Symbol>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Table with a single outermost scope holding the built-in constants
    pub fn new() -> Self {
        let mut table = Self { scopes: vec![BTreeMap::new()] };
        for (name, value) in BUILTIN_CONSTANTS {
            table.insert(Symbol::number(*name, Expr::num(*value)));
        }
        table
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
        tracing::trace!(depth = self.scopes.len(), "entered scope");
    }

    /// Discards the innermost scope. The outermost scope is never popped.
    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            tracing::trace!(depth = self.scopes.len(), "exited scope");
        }
    }

    /// Inserts into the innermost scope, replacing any symbol of the same
    /// name there
    pub fn insert(&mut self, symbol: Symbol) {
        tracing::trace!(name = %symbol.name, ty = %symbol.ty(), depth = self.scopes.len(), "inserted symbol");
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(symbol.name.clone(), symbol);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    pub fn exists_in_current(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|scope| scope.contains_key(name))
    }

    /// Number of open scopes, the outermost included
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

/// Per-scope report
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, scope) in self.scopes.iter().enumerate() {
            writeln!(f, "scope {} ({} symbols)", depth, scope.len())?;
            for symbol in scope.values() {
                writeln!(f, "  {}", symbol)?;
            }
        }
        Ok(())
    }
}
