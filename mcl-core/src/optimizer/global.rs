//! Global (AST-level) optimizer
//!
//! Constant folding replaces every `Binary` node whose operands are both
//! numeric literals with the literal result. Constant propagation collects
//! one flat table of every number declaration or plain assignment whose value
//! is a literal (the last one in source order wins) and substitutes those
//! literals for every variable reference in the program.
//!
//! Propagation is not flow-sensitive: a reassignment later in the program
//! does not stop earlier uses from receiving the collected value.

use std::collections::BTreeMap;

use crate::ast::*;

#[derive(Debug, Default)]
pub struct GlobalOptimizer {
    constants: BTreeMap<String, String>,
    rounds: usize,
}

impl GlobalOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds, then repeats collect, propagate and fold until the tree stops
    /// changing. The input is left untouched.
    pub fn optimize(&mut self, program: &Program) -> Program {
        let mut current = rewrite_program(program, &fold);
        self.rounds = 0;
        loop {
            self.rounds += 1;
            self.constants.clear();
            collect_block(&current.statements, &mut self.constants);

            let constants = &self.constants;
            let propagated = rewrite_program(&current, &|expr: &Expr| propagate(expr, constants));
            let next = rewrite_program(&propagated, &fold);
            if next == current {
                tracing::debug!(
                    rounds = self.rounds,
                    constants = self.constants.len(),
                    "global optimization reached a fixed point"
                );
                return next;
            }
            current = next;
        }
    }

    /// Constants collected in the last round
    pub fn constants(&self) -> &BTreeMap<String, String> {
        &self.constants
    }

    /// Collect/propagate/fold rounds run by the last `optimize` call
    pub fn rounds(&self) -> usize {
        self.rounds
    }
}

// ===== Expression rewrites =====

/// Bottom-up constant folding
pub fn fold(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary { op, left, right } => {
            let left = fold(left);
            let right = fold(right);
            if let (Some(a), Some(b)) = (left.as_num(), right.as_num()) {
                if let Some(value) = op.fold(a, b) {
                    return Expr::Num(value);
                }
            }
            Expr::binary(*op, left, right)
        }
        other => other.clone(),
    }
}

fn propagate(expr: &Expr, constants: &BTreeMap<String, String>) -> Expr {
    match expr {
        Expr::Var(name) => match constants.get(name) {
            Some(value) => Expr::Num(value.clone()),
            None => expr.clone(),
        },
        Expr::Binary { op, left, right } => {
            Expr::binary(*op, propagate(left, constants), propagate(right, constants))
        }
        other => other.clone(),
    }
}

// ===== Tree walking =====

fn collect_block(statements: &[Stmt], constants: &mut BTreeMap<String, String>) {
    for stmt in statements {
        match stmt {
            Stmt::Number { name, value: Expr::Num(literal) }
            | Stmt::Assign { target: Target::Name(name), value: Expr::Num(literal) } => {
                constants.insert(name.clone(), literal.clone());
            }
            Stmt::Reaction(def) => collect_block(&def.body.statements, constants),
            Stmt::If { then_block, else_block, .. } => {
                collect_block(&then_block.statements, constants);
                if let Some(else_block) = else_block {
                    collect_block(&else_block.statements, constants);
                }
            }
            Stmt::RepeatUntil { body, .. } | Stmt::DoWhile { body, .. } | Stmt::Block(body) => {
                collect_block(&body.statements, constants)
            }
            _ => {}
        }
    }
}

fn rewrite_program(program: &Program, f: &dyn Fn(&Expr) -> Expr) -> Program {
    Program { statements: rewrite_statements(&program.statements, f) }
}

fn rewrite_statements(statements: &[Stmt], f: &dyn Fn(&Expr) -> Expr) -> Vec<Stmt> {
    statements.iter().map(|stmt| rewrite_stmt(stmt, f)).collect()
}

fn rewrite_block(block: &Block, f: &dyn Fn(&Expr) -> Expr) -> Block {
    Block::new(rewrite_statements(&block.statements, f))
}

fn rewrite_stmt(stmt: &Stmt, f: &dyn Fn(&Expr) -> Expr) -> Stmt {
    match stmt {
        Stmt::Number { name, value } => Stmt::Number { name: name.clone(), value: f(value) },
        Stmt::Assign { target, value } => Stmt::Assign { target: target.clone(), value: f(value) },
        Stmt::Reaction(def) => Stmt::Reaction(ReactionDef { body: rewrite_block(&def.body, f), ..def.clone() }),
        Stmt::Mix { value, target } => Stmt::Mix { value: f(value), target: target.clone() },
        Stmt::Balance(value) => Stmt::Balance(f(value)),
        Stmt::Show(args) => Stmt::Show(args.iter().map(f).collect()),
        Stmt::If { condition, then_block, else_block } => Stmt::If {
            condition: rewrite_condition(condition, f),
            then_block: rewrite_block(then_block, f),
            else_block: else_block.as_ref().map(|block| rewrite_block(block, f)),
        },
        Stmt::RepeatUntil { condition, body } => Stmt::RepeatUntil {
            condition: rewrite_condition(condition, f),
            body: rewrite_block(body, f),
        },
        Stmt::DoWhile { condition, body } => Stmt::DoWhile {
            condition: rewrite_condition(condition, f),
            body: rewrite_block(body, f),
        },
        Stmt::Block(block) => Stmt::Block(rewrite_block(block, f)),
        Stmt::Expr(expr) => Stmt::Expr(f(expr)),
        Stmt::Substance(_)
        | Stmt::Text { .. }
        | Stmt::Call { .. }
        | Stmt::Stop
        | Stmt::Comment(_)
        | Stmt::Empty => stmt.clone(),
    }
}

fn rewrite_condition(condition: &Condition, f: &dyn Fn(&Expr) -> Expr) -> Condition {
    match condition {
        Condition::Compare { op, left, right } => Condition::Compare { op: *op, left: f(left), right: f(right) },
        Condition::Logic { conj, left, right } => Condition::Logic {
            conj: *conj,
            left: Box::new(rewrite_condition(left, f)),
            right: Box::new(rewrite_condition(right, f)),
        },
    }
}
