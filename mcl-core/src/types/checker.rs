//! Semantic analyzer for MCL programs
//!
//! A second pass over an already-parsed program. It re-derives types and
//! units with the same rule table the parser uses, but records every
//! violation instead of stopping at the first one.
//!
//! The analyzer runs against the symbol table the parser left behind, in
//! which only the outermost scope survives. It does not open scopes of its
//! own, so names declared inside blocks resolve to nothing here: they type as
//! `unknown`, and a `numero` declared inside a block is reported as not
//! declared.

use super::rules::{self, Violation};
use super::{unit_name, Type, Typed};
use crate::ast::{Block, Condition, Expr, Metadata, Program, Property, Stmt, SubstanceDecl, Target};
use crate::error::{Error, Errors};
use crate::symbols::{SubstanceInfo, Symbol, SymbolTable};

pub struct SemanticAnalyzer<'a> {
    symbols: &'a mut SymbolTable,
    errors: Errors,
}

impl<'a> SemanticAnalyzer<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        Self { symbols, errors: Errors::new() }
    }

    /// Walk the whole program and return every violation found, in order
    pub fn analyze(mut self, program: &Program) -> Errors {
        self.check_stmts(&program.statements);
        tracing::debug!(errors = self.errors.len(), "semantic analysis finished");
        self.errors
    }

    fn report(&mut self, message: impl Into<String>) {
        self.errors.push(Error::semantic(message));
    }

    fn report_violation(&mut self, violation: &Violation) {
        self.report(violation.to_string());
    }

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.check_stmts(&block.statements);
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Substance(decl) => self.check_substance(decl),
            Stmt::Number { name, value } => {
                if self.symbols.lookup(name).is_none() {
                    self.report(format!("Variable '{}' not declared", name));
                    return;
                }
                if self.infer(value).ty != Type::Number {
                    self.report(format!("Expression for number '{}' must be numeric", name));
                }
            }
            Stmt::Text { name, value } => {
                let quoted = value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
                if !quoted {
                    self.report(format!("String value of '{}' is not valid", name));
                }
            }
            Stmt::Assign { target: Target::Property { name, property }, value } => {
                self.check_property_assignment(name, *property, value)
            }
            Stmt::Assign { target: Target::Name(name), value } => self.check_assignment(name, value),
            Stmt::Reaction(def) => {
                for param in def.reactants.iter().chain(&def.products) {
                    if self.symbols.lookup(&param.name).and_then(Symbol::as_substance).is_none() {
                        self.report(format!("Parameter '{}' is not a valid substance", param.name));
                    }
                }
                self.check_block(&def.body);
            }
            Stmt::Call { name, args } => {
                let Some(info) = self.symbols.lookup(name).and_then(Symbol::as_reaction) else {
                    self.report(format!("Reaction '{}' not declared", name));
                    return;
                };
                let expected = info.reactants.len();
                if args.len() != expected {
                    self.report(format!(
                        "Reaction '{}' expects {} arguments, got {}",
                        name,
                        expected,
                        args.len()
                    ));
                }
            }
            Stmt::Mix { value, target } => self.check_mix(value, target),
            Stmt::Balance(value) => {
                let typed = self.infer(value);
                if typed.ty != Type::Substance {
                    self.report(format!("Expression in 'balancear' must be a substance, not {}", typed.ty));
                }
            }
            Stmt::Show(args) => {
                for arg in args {
                    if matches!(arg, Expr::Text(_)) {
                        continue;
                    }
                    let typed = self.infer(arg);
                    if !matches!(typed.ty, Type::Substance | Type::Number | Type::String) {
                        self.report(format!(
                            "Argument of 'mostrar' must be substance, number or string, not {}",
                            typed.ty
                        ));
                    }
                }
            }
            Stmt::If { condition, then_block, else_block } => {
                self.check_condition(condition);
                self.check_block(then_block);
                if let Some(else_block) = else_block {
                    self.check_block(else_block);
                }
            }
            Stmt::RepeatUntil { condition, body } | Stmt::DoWhile { condition, body } => {
                self.check_condition(condition);
                self.check_block(body);
            }
            Stmt::Block(block) => self.check_block(block),
            Stmt::Stop | Stmt::Comment(_) | Stmt::Expr(_) | Stmt::Empty => {}
        }
    }

    fn check_substance(&mut self, decl: &SubstanceDecl) {
        if decl.quantity.parse::<f64>().is_err() {
            self.report(format!("Quantity '{}' is not a valid number", decl.quantity));
        }
        for meta in &decl.metadata {
            if meta.value.parse::<f64>().is_err() {
                self.report(format!("Metadata '{}' is not a valid number", meta.value));
            }
            if !meta.unit.is_metadata_tag() {
                self.report(format!("Metadata unit '{}' is not valid", meta.unit));
            }
        }
    }

    fn check_assignment(&mut self, name: &str, value: &Expr) {
        let Some(symbol) = self.symbols.lookup(name) else {
            self.report(format!("Variable '{}' not declared", name));
            return;
        };
        let declared = symbol.typed();
        let typed = self.infer(value);
        if typed.ty != declared.ty {
            self.report(format!(
                "Incompatible type in assignment: {} is {}, expression is {}",
                name, declared.ty, typed.ty
            ));
        }
        if declared.ty == Type::Substance {
            if let (Some(expected), Some(found)) = (declared.unit, typed.unit) {
                if expected != found {
                    self.report(format!(
                        "Unit mismatch: {} uses {}, expression uses {}",
                        name, expected, found
                    ));
                }
            }
        }
    }

    fn check_property_assignment(&mut self, name: &str, property: Property, value: &Expr) {
        let Some(symbol) = self.symbols.lookup(name) else {
            self.report(format!("Variable '{}' not declared", name));
            return;
        };
        let Some(info) = symbol.as_substance() else {
            self.report(format!("'{}' must be a substance to assign property '{}'", name, property));
            return;
        };
        let unit = info.unit;
        let has_slot = property.metadata_unit().is_some_and(|tag| info.metadata_slot(tag).is_some());

        let typed = self.infer(value);
        if typed.ty != Type::Number {
            self.report(format!(
                "Assignment to '{}.{}' must be numeric, not {}",
                name, property, typed.ty
            ));
        }
        match property.metadata_unit() {
            None => {
                if let (Some(expected), Some(found)) = (unit, typed.unit) {
                    if expected != found {
                        self.report(format!(
                            "Unit mismatch: '{}' uses {}, expression uses {}",
                            name, expected, found
                        ));
                    }
                }
            }
            Some(tag) => {
                if typed.unit != Some(tag) {
                    self.report(format!(
                        "Unit mismatch: '{}' requires {}, expression uses {}",
                        property,
                        tag,
                        unit_name(typed.unit)
                    ));
                }
                if !has_slot {
                    self.report_violation(&Violation::UndefinedProperty { name: name.to_string(), property });
                }
            }
        }
    }

    fn check_mix(&mut self, value: &Expr, target: &str) {
        let typed = self.infer(value);
        if typed.ty != Type::Substance {
            self.report(format!("Expression in 'mezclar' must be a substance, not {}", typed.ty));
        }

        match self.symbols.lookup(target) {
            None => self.symbols.insert(Symbol::substance(target, SubstanceInfo::empty())),
            Some(symbol) => match symbol.as_substance() {
                None => {
                    self.report(format!("Target '{}' is not a valid substance", target));
                    return;
                }
                Some(info) => {
                    if let (Some(expected), Some(found)) = (info.unit, typed.unit) {
                        if expected != found {
                            self.report(format!(
                                "Unit mismatch in 'mezclar': target uses {}, expression uses {}",
                                expected, found
                            ));
                        }
                    }
                }
            },
        }

        // Mixing two named substances gives the target a zero placeholder for
        // every metadata slot both of them declare
        if let Some((left, right)) = value.as_var_sum() {
            let (Some(left), Some(right)) = (self.symbols.lookup(left), self.symbols.lookup(right)) else {
                return;
            };
            let slots = |symbol: &Symbol| -> Vec<Metadata> {
                symbol.as_substance().map(|info| info.metadata.clone()).unwrap_or_default()
            };
            let right_slots = slots(right);
            let mut common: Vec<Metadata> = Vec::new();
            for meta in slots(left) {
                let shared = right_slots.iter().any(|other| other.unit == meta.unit);
                if shared && !common.iter().any(|seen| seen.unit == meta.unit) {
                    common.push(Metadata { value: "0".to_string(), unit: meta.unit });
                }
            }
            if let Some(info) = self.symbols.lookup_mut(target).and_then(Symbol::as_substance_mut) {
                info.metadata = common;
            }
        }
    }

    fn check_condition(&mut self, condition: &Condition) {
        let typed = self.infer_condition(condition);
        if typed.ty != Type::Boolean {
            self.report(format!("Condition must be boolean, not {}", typed.ty));
        }
    }

    /// Operands are resolved so that bad property reads surface; units are
    /// not compared here, since reaction parameters carry none
    fn infer_condition(&mut self, condition: &Condition) -> Typed {
        match condition {
            Condition::Compare { left, right, .. } => {
                self.infer(left);
                self.infer(right);
                Typed::boolean()
            }
            Condition::Logic { left, right, .. } => {
                let left = self.infer_condition(left);
                let right = self.infer_condition(right);
                if left.ty == Type::Boolean && right.ty == Type::Boolean {
                    Typed::boolean()
                } else {
                    Typed::unknown()
                }
            }
        }
    }

    fn infer(&mut self, expr: &Expr) -> Typed {
        match expr {
            // unresolved names stay silent here; the parser already
            // rejected the ones it could see
            Expr::Var(name) => self.symbols.lookup(name).map(Symbol::typed).unwrap_or_else(Typed::unknown),
            Expr::Num(_) => Typed::number(),
            Expr::Text(_) => Typed::string(),
            Expr::Property { name, property } => {
                match rules::property(name, *property, self.symbols.lookup(name)) {
                    Ok(typed) => typed,
                    Err(violation) => {
                        self.report_violation(&violation);
                        Typed::unknown()
                    }
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.infer(left);
                let right = self.infer(right);
                match rules::binary(*op, left, right) {
                    Ok(typed) => typed,
                    Err(violation) => {
                        self.report_violation(&violation);
                        violation.recovered()
                    }
                }
            }
        }
    }
}
