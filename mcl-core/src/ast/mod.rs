//! Abstract Syntax Tree definitions for MCL
//!
//! The AST represents the structure of MCL programs after parsing. Nodes are
//! plain values: the global optimizer builds new trees instead of mutating
//! existing ones.

use serde::Serialize;
use std::fmt;

use crate::types::Unit;

/// A complete MCL program
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A `{ ... }` block
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}

/// A `(value, unit)` metadata entry attached to a substance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub value: String,
    pub unit: Unit,
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// `[coefficient] name` entry of a reaction signature or invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reagent {
    pub coefficient: String,
    pub name: String,
}

impl Reagent {
    pub fn new(coefficient: impl Into<String>, name: impl Into<String>) -> Self {
        Self { coefficient: coefficient.into(), name: name.into() }
    }
}

impl fmt::Display for Reagent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.coefficient, self.name)
    }
}

/// Comma-joined reagent list, as it appears in IR output
pub fn join_reagents(reagents: &[Reagent]) -> String {
    reagents.iter().map(Reagent::to_string).collect::<Vec<_>>().join(",")
}

/// `sustancia NAME cantidad = NUMBER [UNIT] [@ [ ... ]];`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstanceDecl {
    pub name: String,
    pub quantity: String,
    pub unit: Option<Unit>,
    pub metadata: Vec<Metadata>,
}

/// `reaccionar NAME [ reactants -> products ] { body }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionDef {
    pub name: String,
    pub reactants: Vec<Reagent>,
    pub products: Vec<Reagent>,
    pub body: Block,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    Substance(SubstanceDecl),

    /// `numero NAME = expr;`
    Number { name: String, value: Expr },

    /// `cadena NAME = "text";` with the literal kept quote-delimited
    Text { name: String, value: String },

    /// `target = expr;`
    Assign { target: Target, value: Expr },

    Reaction(ReactionDef),

    /// `name [ args ];`
    Call { name: String, args: Vec<Reagent> },

    /// `mezclar ( expr ) -> target;`
    Mix { value: Expr, target: String },

    /// `balancear expr;`
    Balance(Expr),

    /// `mostrar ( args );`
    Show(Vec<Expr>),

    If {
        condition: Condition,
        then_block: Block,
        else_block: Option<Block>,
    },

    /// `repetir { ... } mientras (cond);` loops until the condition holds
    RepeatUntil { condition: Condition, body: Block },

    /// `hacer { ... } mientras (cond);` loops while the condition holds
    DoWhile { condition: Condition, body: Block },

    /// `detener;`
    Stop,

    Block(Block),

    /// `# ...` comment, kept as written
    Comment(String),

    /// A bare name used as a statement: `name;`
    Expr(Expr),

    /// A lone `;`
    Empty,
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Target {
    Name(String),
    Property { name: String, property: Property },
}

/// Substance properties reachable through `.` or `=>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    Cant,
    Temp,
    Presion,
}

impl Property {
    pub const METADATA: [Property; 2] = [Property::Temp, Property::Presion];

    pub fn from_name(name: &str) -> Option<Property> {
        match name {
            "cant" => Some(Property::Cant),
            "temp" => Some(Property::Temp),
            "presion" => Some(Property::Presion),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Property::Cant => "cant",
            Property::Temp => "temp",
            Property::Presion => "presion",
        }
    }

    /// Unit tag of the metadata slot backing this property; `cant` has none
    pub fn metadata_unit(&self) -> Option<Unit> {
        match self {
            Property::Cant => None,
            Property::Temp => Some(Unit::GradC),
            Property::Presion => Some(Unit::Atm),
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Var(String),
    /// Numeric literal, kept as its source text
    Num(String),
    /// String literal, quote-delimited
    Text(String),
    Property { name: String, property: Property },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn num(literal: impl Into<String>) -> Self {
        Expr::Num(literal.into())
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn as_num(&self) -> Option<&str> {
        match self {
            Expr::Num(literal) => Some(literal),
            _ => None,
        }
    }

    /// Operand names of an `a + b` over two bare variables
    pub fn as_var_sum(&self) -> Option<(&str, &str)> {
        match self {
            Expr::Binary { op: BinOp::Add, left, right } => match (left.as_ref(), right.as_ref()) {
                (Expr::Var(a), Expr::Var(b)) => Some((a, b)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl BinOp {
    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        match symbol {
            "+" => Some(BinOp::Add),
            "-" => Some(BinOp::Sub),
            "*" => Some(BinOp::Mul),
            "/" => Some(BinOp::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }

    pub fn is_additive(&self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub)
    }

    /// Applies the operator to two numeric literals.
    ///
    /// Returns `None` when either literal does not parse or the result is not
    /// finite (division by zero, overflow). Integral results are rendered
    /// without a fractional part.
    pub fn fold(&self, left: &str, right: &str) -> Option<String> {
        let l: f64 = left.parse().ok()?;
        let r: f64 = right.parse().ok()?;
        let value = match self {
            BinOp::Add => l + r,
            BinOp::Sub => l - r,
            BinOp::Mul => l * r,
            BinOp::Div if r == 0.0 => return None,
            BinOp::Div => l / r,
        };
        if !value.is_finite() {
            return None;
        }
        // no "-0"
        let value = if value == 0.0 { 0.0 } else { value };
        Some(format!("{}", value))
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Boolean conditions of `si`, `repetir` and `hacer`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Compare { op: CmpOp, left: Expr, right: Expr },
    Logic {
        conj: Conjunction,
        left: Box<Condition>,
        right: Box<Condition>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CmpOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl CmpOp {
    pub fn from_symbol(symbol: &str) -> Option<CmpOp> {
        match symbol {
            "==" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Le),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `y` / `o`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Conjunction {
    #[serde(rename = "y")]
    And,
    #[serde(rename = "o")]
    Or,
}

impl Conjunction {
    pub fn from_keyword(word: &str) -> Option<Conjunction> {
        match word {
            "y" => Some(Conjunction::And),
            "o" => Some(Conjunction::Or),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Conjunction::And => "y",
            Conjunction::Or => "o",
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ===== Tree rendering =====

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = depth * 2)
}

fn write_block(f: &mut fmt::Formatter<'_>, label: &str, block: &Block, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    writeln!(f, "{}", label)?;
    for stmt in &block.statements {
        write_stmt(f, stmt, depth + 1)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter<'_>, stmt: &Stmt, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match stmt {
        Stmt::Substance(decl) => {
            write!(f, "SUBSTANCE {} {}", decl.name, decl.quantity)?;
            if let Some(unit) = decl.unit {
                write!(f, " {}", unit)?;
            }
            writeln!(f)?;
            for meta in &decl.metadata {
                indent(f, depth + 1)?;
                writeln!(f, "META {} {}", meta.value, meta.unit)?;
            }
            Ok(())
        }
        Stmt::Number { name, value } => {
            writeln!(f, "NUMBER {}", name)?;
            write_expr(f, value, depth + 1)
        }
        Stmt::Text { name, value } => writeln!(f, "STRING {} {}", name, value),
        Stmt::Assign { target, value } => {
            match target {
                Target::Name(name) => writeln!(f, "ASSIGN {}", name)?,
                Target::Property { name, property } => writeln!(f, "ASSIGN {}.{}", name, property)?,
            }
            write_expr(f, value, depth + 1)
        }
        Stmt::Reaction(def) => {
            writeln!(
                f,
                "REACTION {} [{} -> {}]",
                def.name,
                join_reagents(&def.reactants),
                join_reagents(&def.products)
            )?;
            write_block(f, "BLOCK", &def.body, depth + 1)
        }
        Stmt::Call { name, args } => writeln!(f, "CALL {} [{}]", name, join_reagents(args)),
        Stmt::Mix { value, target } => {
            writeln!(f, "MIX -> {}", target)?;
            write_expr(f, value, depth + 1)
        }
        Stmt::Balance(value) => {
            writeln!(f, "BALANCE")?;
            write_expr(f, value, depth + 1)
        }
        Stmt::Show(args) => {
            writeln!(f, "SHOW")?;
            for arg in args {
                write_expr(f, arg, depth + 1)?;
            }
            Ok(())
        }
        Stmt::If { condition, then_block, else_block } => {
            writeln!(f, "IF")?;
            write_condition(f, condition, depth + 1)?;
            write_block(f, "THEN", then_block, depth + 1)?;
            if let Some(else_block) = else_block {
                write_block(f, "ELSE", else_block, depth + 1)?;
            }
            Ok(())
        }
        Stmt::RepeatUntil { condition, body } => {
            writeln!(f, "REPEAT_UNTIL")?;
            write_condition(f, condition, depth + 1)?;
            write_block(f, "BLOCK", body, depth + 1)
        }
        Stmt::DoWhile { condition, body } => {
            writeln!(f, "DO_WHILE")?;
            write_condition(f, condition, depth + 1)?;
            write_block(f, "BLOCK", body, depth + 1)
        }
        Stmt::Stop => writeln!(f, "STOP"),
        Stmt::Block(block) => {
            writeln!(f, "BLOCK")?;
            for stmt in &block.statements {
                write_stmt(f, stmt, depth + 1)?;
            }
            Ok(())
        }
        Stmt::Comment(text) => writeln!(f, "COMMENT {}", text),
        Stmt::Expr(expr) => {
            writeln!(f, "EXPR")?;
            write_expr(f, expr, depth + 1)
        }
        Stmt::Empty => writeln!(f, "EMPTY"),
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match expr {
        Expr::Var(name) => writeln!(f, "VAR {}", name),
        Expr::Num(literal) => writeln!(f, "NUM {}", literal),
        Expr::Text(literal) => writeln!(f, "TEXT {}", literal),
        Expr::Property { name, property } => writeln!(f, "PROP {}.{}", name, property),
        Expr::Binary { op, left, right } => {
            writeln!(f, "BIN_OP {}", op)?;
            write_expr(f, left, depth + 1)?;
            write_expr(f, right, depth + 1)
        }
    }
}

fn write_condition(f: &mut fmt::Formatter<'_>, condition: &Condition, depth: usize) -> fmt::Result {
    indent(f, depth)?;
    match condition {
        Condition::Compare { op, left, right } => {
            writeln!(f, "COND {}", op)?;
            write_expr(f, left, depth + 1)?;
            write_expr(f, right, depth + 1)
        }
        Condition::Logic { conj, left, right } => {
            writeln!(f, "LOGIC {}", conj)?;
            write_condition(f, left, depth + 1)?;
            write_condition(f, right, depth + 1)
        }
    }
}

/// Indented one-node-per-line tree view
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PROGRAM")?;
        for stmt in &self.statements {
            write_stmt(f, stmt, 1)?;
        }
        Ok(())
    }
}
