//! Intermediate code generator for MCL
//!
//! Lowers a validated program into four parallel representations in a single
//! walk: prefix ("polish") notation, linear P-code, triples and quadruples.
//! Temporaries are named `T<n>` and labels `L<n>`, each with its own counter
//! starting at 0 for the whole run.

use serde::Serialize;
use std::fmt;

use crate::ast::*;

/// `(op, arg1, arg2)` with its position in the triple list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Triple {
    pub index: usize,
    pub op: String,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
}

/// `(op, arg1, arg2, result)` with its position in the quadruple list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quad {
    pub index: usize,
    pub op: String,
    pub arg1: Option<String>,
    pub arg2: Option<String>,
    pub result: Option<String>,
}

fn slot(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ({}, {}, {})", self.index, self.op, slot(&self.arg1), slot(&self.arg2))
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ({}, {}, {}, {})",
            self.index,
            self.op,
            slot(&self.arg1),
            slot(&self.arg2),
            slot(&self.result)
        )
    }
}

/// The four representations of one program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntermediateCode {
    pub polish: Vec<String>,
    pub pcode: Vec<String>,
    pub triples: Vec<Triple>,
    pub quads: Vec<Quad>,
}

#[derive(Debug, Default)]
pub struct CodeGenerator {
    next_temp: usize,
    next_label: usize,
    code: IntermediateCode,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(mut self, program: &Program) -> IntermediateCode {
        for stmt in &program.statements {
            self.lower_stmt(stmt);
        }
        tracing::debug!(
            polish = self.code.polish.len(),
            pcode = self.code.pcode.len(),
            triples = self.code.triples.len(),
            quads = self.code.quads.len(),
            "generated intermediate code"
        );
        self.code
    }

    // ===== Emission =====

    fn polish(&mut self, line: impl Into<String>) {
        self.code.polish.push(line.into());
    }

    fn pcode(&mut self, line: impl Into<String>) {
        self.code.pcode.push(line.into());
    }

    fn triple(&mut self, op: &str, arg1: Option<&str>, arg2: Option<&str>) {
        let index = self.code.triples.len();
        self.code.triples.push(Triple {
            index,
            op: op.to_string(),
            arg1: arg1.map(str::to_string),
            arg2: arg2.map(str::to_string),
        });
    }

    fn quad(&mut self, op: &str, arg1: Option<&str>, arg2: Option<&str>, result: Option<&str>) {
        let index = self.code.quads.len();
        self.code.quads.push(Quad {
            index,
            op: op.to_string(),
            arg1: arg1.map(str::to_string),
            arg2: arg2.map(str::to_string),
            result: result.map(str::to_string),
        });
    }

    /// Same record as a triple and as a quadruple
    fn record(&mut self, op: &str, arg1: Option<&str>, arg2: Option<&str>, result: Option<&str>) {
        self.triple(op, arg1, arg2);
        self.quad(op, arg1, arg2, result);
    }

    fn label(&mut self, label: &str) {
        self.polish(format!("{}:", label));
        self.pcode(format!("{}:", label));
        self.record("LABEL", Some(label), None, None);
    }

    fn jump(&mut self, label: &str) {
        self.polish(format!("GOTO {}", label));
        self.pcode(format!("JMP {}", label));
        self.record("JMP", Some(label), None, None);
    }

    fn fresh_temp(&mut self) -> String {
        let temp = format!("T{}", self.next_temp);
        self.next_temp += 1;
        temp
    }

    fn fresh_label(&mut self) -> String {
        let label = format!("L{}", self.next_label);
        self.next_label += 1;
        label
    }

    // ===== Statements =====

    fn lower_block(&mut self, block: &Block) {
        for stmt in &block.statements {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Substance(decl) => {
                let value = format!("{}{}", decl.quantity, decl.unit.map(|u| u.lexeme()).unwrap_or(""));
                self.polish(format!("DECLARE sustancia {} = {}", decl.name, value));
                self.pcode(format!("DECL {} sustancia", decl.name));
                self.record("DECL", Some(&decl.name), Some(&value), None);
                for meta in &decl.metadata {
                    let meta = meta.to_string();
                    self.polish(format!("META {} {}", decl.name, meta));
                    self.pcode(format!("META {} {}", decl.name, meta));
                    self.record("META", Some(&decl.name), Some(&meta), None);
                }
            }
            Stmt::Number { name, value } => {
                let result = self.lower_expr(value);
                self.polish(format!("DECLARE numero {} = {}", name, result));
                self.declare_and_store(name, "numero", &result);
            }
            Stmt::Text { name, value } => {
                self.polish(format!("DECLARE cadena {} = {}", name, value));
                self.declare_and_store(name, "cadena", value);
            }
            Stmt::Assign { target: Target::Name(name), value } => {
                let result = self.lower_expr(value);
                self.polish(format!("{} = {}", name, result));
                self.pcode(format!("STO {} {}", name, result));
                self.record("=", Some(name), Some(&result), None);
            }
            Stmt::Assign { target: Target::Property { name, property }, value } => {
                let result = self.lower_expr(value);
                self.set_property(name, *property, &result);
            }
            Stmt::Reaction(def) => {
                self.polish(format!(
                    "FUNCTION {}({} -> {})",
                    def.name,
                    join_reagents(&def.reactants),
                    join_reagents(&def.products)
                ));
                self.pcode(format!("FUNC {}", def.name));
                self.record("FUNC", Some(&def.name), None, None);
                self.lower_block(&def.body);
                self.polish("END_FUNCTION");
                self.pcode("END");
                self.record("END", None, None, None);
            }
            Stmt::Call { name, args } => {
                let args = join_reagents(args);
                self.polish(format!("CALL {}({})", name, args));
                self.pcode(format!("CALL {} {}", name, args));
                self.record("CALL", Some(name), Some(&args), None);
            }
            Stmt::Mix { value, target } => self.lower_mix(value, target),
            Stmt::Balance(value) => {
                let result = self.lower_expr(value);
                self.polish(format!("BALANCEAR {}", result));
                self.pcode(format!("BAL {}", result));
                self.record("BAL", Some(&result), None, None);
            }
            Stmt::Show(args) => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| match arg {
                        Expr::Text(text) => text.clone(),
                        other => self.lower_expr(other),
                    })
                    .collect();
                let args = args.join(",");
                self.polish(format!("MOSTRAR {}", args));
                self.pcode(format!("PRINT {}", args));
                self.record("PRINT", Some(&args), None, None);
            }
            Stmt::If { condition, then_block, else_block } => {
                let cond = self.lower_condition(condition);
                let then_label = self.fresh_label();
                let end_label = self.fresh_label();
                let else_label = match else_block {
                    Some(_) => self.fresh_label(),
                    None => end_label.clone(),
                };

                self.polish(format!("IF {} GOTO {}", cond, then_label));
                self.pcode(format!("JMP_IF {} {}", cond, then_label));
                self.record("JMP_IF", Some(&cond), Some(&then_label), None);
                self.jump(&else_label);
                self.label(&then_label);
                self.lower_block(then_block);
                if let Some(else_block) = else_block {
                    self.jump(&end_label);
                    self.label(&else_label);
                    self.lower_block(else_block);
                }
                self.label(&end_label);
            }
            Stmt::RepeatUntil { condition, body } => {
                let start_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.label(&start_label);
                self.lower_block(body);
                let cond = self.lower_condition(condition);
                self.jump_if_not(&cond, &start_label);
                self.label(&end_label);
            }
            Stmt::DoWhile { condition, body } => {
                let start_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.label(&start_label);
                let cond = self.lower_condition(condition);
                self.jump_if_not(&cond, &end_label);
                self.lower_block(body);
                self.jump(&start_label);
                self.label(&end_label);
            }
            Stmt::Stop => {
                self.polish("BREAK");
                self.pcode("BRK");
                self.record("BRK", None, None, None);
            }
            Stmt::Block(block) => self.lower_block(block),
            Stmt::Comment(text) => {
                self.polish(format!("// {}", text));
                self.pcode(format!("// {}", text));
                self.record("COMMENT", Some(text), None, None);
            }
            Stmt::Expr(expr) => {
                self.lower_expr(expr);
            }
            Stmt::Empty => {}
        }
    }

    fn declare_and_store(&mut self, name: &str, type_name: &str, value: &str) {
        self.pcode(format!("DECL {} {}", name, type_name));
        self.pcode(format!("STO {} {}", name, value));
        self.record("DECL", Some(name), Some(type_name), None);
        self.record("=", Some(name), Some(value), None);
    }

    fn set_property(&mut self, name: &str, property: Property, value: &str) {
        let qualified = format!("{}.{}", name, property);
        self.polish(format!("{} = {}", qualified, value));
        self.pcode(format!("SET_PROP {} {} {}", name, property, value));
        self.triple("SET_PROP", Some(&qualified), Some(value));
        self.quad("SET_PROP", Some(name), Some(property.name()), Some(value));
    }

    fn jump_if_not(&mut self, cond: &str, label: &str) {
        self.polish(format!("IF_NOT {} GOTO {}", cond, label));
        self.pcode(format!("JMP_IF_NOT {} {}", cond, label));
        self.record("JMP_IF_NOT", Some(cond), Some(label), None);
    }

    /// `MIX`, plus an average of `temp` and `presion` into the target when
    /// two named substances are summed
    fn lower_mix(&mut self, value: &Expr, target: &str) {
        let result = self.lower_expr(value);
        self.polish(format!("MEZCLAR {} -> {}", result, target));
        self.pcode(format!("MIX {} {}", result, target));
        self.record("MIX", Some(&result), Some(target), None);

        let Some((left, right)) = value.as_var_sum() else {
            return;
        };
        for property in Property::METADATA {
            let temp = self.fresh_temp();
            let left_prop = format!("{}.{}", left, property);
            let right_prop = format!("{}.{}", right, property);
            self.polish(format!("{} = AVG({}, {})", temp, left_prop, right_prop));
            self.pcode(format!("AVG_PROP {} {} {} {}", left, right, property, temp));
            self.record("AVG_PROP", Some(&left_prop), Some(&right_prop), Some(&temp));

            let qualified = format!("{}.{}", target, property);
            self.polish(format!("SET {} = {}", qualified, temp));
            self.pcode(format!("SET_PROP {} {} {}", target, property, temp));
            self.triple("SET_PROP", Some(&qualified), Some(&temp));
            self.quad("SET_PROP", Some(target), Some(property.name()), Some(&temp));
        }
    }

    // ===== Expressions =====

    /// Lowers an expression and returns the operand naming its value
    fn lower_expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Var(name) => name.clone(),
            Expr::Num(literal) | Expr::Text(literal) => literal.clone(),
            Expr::Property { name, property } => {
                let temp = self.fresh_temp();
                self.polish(format!("{} = {}.{}", temp, name, property));
                self.pcode(format!("GET_PROP {} {} {}", name, property, temp));
                self.record("GET_PROP", Some(name), Some(property.name()), Some(&temp));
                temp
            }
            Expr::Binary { op, left, right } => {
                let l = self.lower_expr(left);
                let r = self.lower_expr(right);
                if let (Some(a), Some(b)) = (left.as_num(), right.as_num()) {
                    if let Some(folded) = op.fold(a, b) {
                        return folded;
                    }
                }
                let temp = self.fresh_temp();
                self.polish(format!("{} = {}", temp, prefix(expr)));
                self.pcode(format!("OP {} {} {} {}", op, l, r, temp));
                self.record(op.symbol(), Some(&l), Some(&r), Some(&temp));
                temp
            }
        }
    }

    fn lower_condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::Compare { op, left, right } => {
                let l = self.lower_expr(left);
                let r = self.lower_expr(right);
                let temp = self.fresh_temp();
                self.polish(format!("{} = {} {} {}", temp, l, op, r));
                self.pcode(format!("CMP {} {} {} {}", op, l, r, temp));
                self.record(op.symbol(), Some(&l), Some(&r), Some(&temp));
                temp
            }
            Condition::Logic { conj, left, right } => {
                let l = self.lower_condition(left);
                let r = self.lower_condition(right);
                let temp = self.fresh_temp();
                self.polish(format!("{} = {} {} {}", temp, l, conj, r));
                self.pcode(format!("LOG {} {} {} {}", conj, l, r, temp));
                self.record(conj.keyword(), Some(&l), Some(&r), Some(&temp));
                temp
            }
        }
    }
}

/// Strict prefix rendering of an expression tree
pub fn prefix(expr: &Expr) -> String {
    match expr {
        Expr::Var(name) => name.clone(),
        Expr::Num(literal) | Expr::Text(literal) => literal.clone(),
        Expr::Property { name, property } => format!("{}.{}", name, property),
        Expr::Binary { op, left, right } => format!("{} {} {}", op, prefix(left), prefix(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Unit;

    fn generate(statements: Vec<Stmt>) -> IntermediateCode {
        CodeGenerator::new().generate(&Program { statements })
    }

    fn compare(op: CmpOp, left: &str, right: &str) -> Condition {
        Condition::Compare { op, left: Expr::var(left), right: Expr::num(right) }
    }

    #[test]
    fn test_number_declaration() {
        let code = generate(vec![Stmt::Number { name: "x".into(), value: Expr::num("5") }]);
        assert_eq!(code.polish, vec!["DECLARE numero x = 5"]);
        assert_eq!(code.pcode, vec!["DECL x numero", "STO x 5"]);
        assert_eq!(code.triples.iter().map(Triple::to_string).collect::<Vec<_>>(), vec![
            "0: (DECL, x, numero)",
            "1: (=, x, 5)",
        ]);
        assert_eq!(code.quads[1].to_string(), "1: (=, x, 5, -)");
    }

    #[test]
    fn test_literal_operands_fold() {
        let value = Expr::binary(BinOp::Add, Expr::num("2"), Expr::num("3"));
        let code = generate(vec![Stmt::Number { name: "x".into(), value }]);
        assert_eq!(code.polish, vec!["DECLARE numero x = 5"]);
        assert_eq!(code.triples.len(), 2);
    }

    #[test]
    fn test_binary_operation_uses_temporary() {
        let value = Expr::binary(
            BinOp::Mul,
            Expr::binary(BinOp::Add, Expr::var("a"), Expr::var("b")),
            Expr::num("2"),
        );
        let code = generate(vec![Stmt::Balance(value)]);
        assert_eq!(code.polish, vec!["T0 = + a b", "T1 = * + a b 2", "BALANCEAR T1"]);
        assert_eq!(code.pcode, vec!["OP + a b T0", "OP * T0 2 T1", "BAL T1"]);
        assert_eq!(code.quads[1].to_string(), "1: (*, T0, 2, T1)");
        assert_eq!(code.triples[2].to_string(), "2: (BAL, T1, -)");
    }

    #[test]
    fn test_substance_declaration_with_metadata() {
        let code = generate(vec![Stmt::Substance(SubstanceDecl {
            name: "h2".into(),
            quantity: "2".into(),
            unit: Some(Unit::Mol),
            metadata: vec![Metadata { value: "25".into(), unit: Unit::GradC }],
        })]);
        assert_eq!(code.polish, vec!["DECLARE sustancia h2 = 2mol", "META h2 25gradC"]);
        assert_eq!(code.pcode, vec!["DECL h2 sustancia", "META h2 25gradC"]);
        assert_eq!(code.triples[0].to_string(), "0: (DECL, h2, 2mol)");
    }

    #[test]
    fn test_property_access_and_assignment() {
        let code = generate(vec![Stmt::Assign {
            target: Target::Property { name: "a".into(), property: Property::Temp },
            value: Expr::Property { name: "b".into(), property: Property::Temp },
        }]);
        assert_eq!(code.polish, vec!["T0 = b.temp", "a.temp = T0"]);
        assert_eq!(code.pcode, vec!["GET_PROP b temp T0", "SET_PROP a temp T0"]);
        assert_eq!(code.triples[1].to_string(), "1: (SET_PROP, a.temp, T0)");
        assert_eq!(code.quads[1].to_string(), "1: (SET_PROP, a, temp, T0)");
    }

    #[test]
    fn test_if_without_else() {
        let code = generate(vec![Stmt::If {
            condition: compare(CmpOp::Gt, "x", "0"),
            then_block: Block::new(vec![Stmt::Stop]),
            else_block: None,
        }]);
        assert_eq!(
            code.pcode,
            vec!["CMP > x 0 T0", "JMP_IF T0 L0", "JMP L1", "L0:", "BRK", "L1:"]
        );
        assert_eq!(
            code.polish,
            vec!["T0 = x > 0", "IF T0 GOTO L0", "GOTO L1", "L0:", "BREAK", "L1:"]
        );
    }

    #[test]
    fn test_if_with_else() {
        let code = generate(vec![Stmt::If {
            condition: compare(CmpOp::Eq, "x", "1"),
            then_block: Block::new(vec![Stmt::Stop]),
            else_block: Some(Block::new(vec![Stmt::Comment("otro".into())])),
        }]);
        assert_eq!(
            code.pcode,
            vec!["CMP == x 1 T0", "JMP_IF T0 L0", "JMP L2", "L0:", "BRK", "JMP L1", "L2:", "// otro", "L1:"]
        );
    }

    #[test]
    fn test_repeat_until() {
        let code = generate(vec![Stmt::RepeatUntil {
            condition: compare(CmpOp::Ge, "i", "3"),
            body: Block::new(vec![Stmt::Stop]),
        }]);
        assert_eq!(code.pcode, vec!["L0:", "BRK", "CMP >= i 3 T0", "JMP_IF_NOT T0 L0", "L1:"]);
    }

    #[test]
    fn test_do_while() {
        let code = generate(vec![Stmt::DoWhile {
            condition: compare(CmpOp::Lt, "i", "3"),
            body: Block::new(vec![Stmt::Stop]),
        }]);
        assert_eq!(
            code.pcode,
            vec!["L0:", "CMP < i 3 T0", "JMP_IF_NOT T0 L1", "BRK", "JMP L0", "L1:"]
        );
        assert_eq!(code.triples.len(), code.pcode.len());
        assert!(code.triples.iter().enumerate().all(|(i, t)| t.index == i));
    }

    #[test]
    fn test_logic_condition() {
        let condition = Condition::Logic {
            conj: Conjunction::And,
            left: Box::new(compare(CmpOp::Gt, "x", "0")),
            right: Box::new(compare(CmpOp::Lt, "x", "9")),
        };
        let code = generate(vec![Stmt::If { condition, then_block: Block::default(), else_block: None }]);
        assert_eq!(&code.pcode[..3], &["CMP > x 0 T0", "CMP < x 9 T1", "LOG y T0 T1 T2"]);
        assert_eq!(code.polish[2], "T2 = T0 y T1");
    }

    #[test]
    fn test_mix_of_named_substances_averages_metadata() {
        let code = generate(vec![Stmt::Mix {
            value: Expr::binary(BinOp::Add, Expr::var("a"), Expr::var("b")),
            target: "c".into(),
        }]);
        assert_eq!(
            code.pcode,
            vec![
                "OP + a b T0",
                "MIX T0 c",
                "AVG_PROP a b temp T1",
                "SET_PROP c temp T1",
                "AVG_PROP a b presion T2",
                "SET_PROP c presion T2",
            ]
        );
        assert_eq!(code.polish[2], "T1 = AVG(a.temp, b.temp)");
        assert_eq!(code.polish[3], "SET c.temp = T1");
        assert_eq!(code.quads[2].to_string(), "2: (AVG_PROP, a.temp, b.temp, T1)");
    }

    #[test]
    fn test_reaction_call_and_show() {
        let code = generate(vec![
            Stmt::Reaction(ReactionDef {
                name: "agua".into(),
                reactants: vec![Reagent::new("2", "h2"), Reagent::new("1", "o2")],
                products: vec![Reagent::new("2", "h2o")],
                body: Block::new(vec![Stmt::Show(vec![Expr::Text("\"listo\"".into()), Expr::var("h2")])]),
            }),
            Stmt::Call { name: "agua".into(), args: vec![Reagent::new("2", "h2"), Reagent::new("1", "o2")] },
        ]);
        assert_eq!(
            code.polish,
            vec![
                "FUNCTION agua(2h2,1o2 -> 2h2o)",
                "MOSTRAR \"listo\",h2",
                "END_FUNCTION",
                "CALL agua(2h2,1o2)",
            ]
        );
        assert_eq!(code.pcode, vec!["FUNC agua", "PRINT \"listo\",h2", "END", "CALL agua 2h2,1o2"]);
    }

    #[test]
    fn test_expression_and_empty_statements_emit_nothing() {
        let code = generate(vec![Stmt::Expr(Expr::var("x")), Stmt::Empty]);
        assert_eq!(code, IntermediateCode::default());
    }
}
