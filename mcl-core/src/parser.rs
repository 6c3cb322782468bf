//! Parser for MCL
//!
//! Recursive descent with one token of lookahead. Every production builds its
//! AST fragment and validates it against the live symbol table at the same
//! time: declarations are inserted as soon as they are parsed, and uses are
//! resolved, typed and unit-checked on the spot. Parsing stops at the first
//! violation; there is no recovery and no partial tree.

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::Span;
use crate::symbols::{ReactionInfo, SubstanceInfo, Symbol, SymbolTable};
use crate::token::{Token, TokenKind};
use crate::types::rules::{self, Violation};
use crate::types::{unit_name, Type, Typed, Unit};

/// Built-in constants that may appear where a name is expected
const CONSTANTS: [&str; 3] = ["PLANCK", "AVOGADRO", "PI"];

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    symbols: &'a mut SymbolTable,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], symbols: &'a mut SymbolTable) -> Self {
        Self { tokens, pos: 0, symbols }
    }

    /// Parse the whole token stream.
    ///
    /// On error the symbol table is unwound back to the depth it had on
    /// entry; declarations made before the error stay in place.
    pub fn parse(&mut self) -> Result<Program> {
        let depth = self.symbols.depth();
        let result = self.parse_program();
        if result.is_err() {
            while self.symbols.depth() > depth {
                self.symbols.exit_scope();
            }
        }
        result
    }

    fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_stmt()?);
        }
        tracing::debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    // ===== Statements =====

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let Some(token) = self.peek() else {
            return Err(self.error("Unexpected end of input"));
        };

        match token.kind {
            TokenKind::ReservedWord => match token.lexeme.as_str() {
                "sustancia" => self.parse_substance(),
                "numero" => self.parse_number(),
                "cadena" => self.parse_text(),
                "reaccionar" => self.parse_reaction(),
                "balancear" => self.parse_balance(),
                "mostrar" => self.parse_show(),
                "mezclar" => self.parse_mix(),
                "repetir" => self.parse_repeat(),
                "hacer" => self.parse_do_while(),
                "detener" => self.parse_stop(),
                "si" => self.parse_if(),
                other => Err(self.error(format!("Unexpected statement '{}'", other))),
            },
            TokenKind::Identifier => {
                if self.peek_at(1).is_some_and(|t| t.is(TokenKind::Bracket, "[")) {
                    self.parse_call()
                } else {
                    self.parse_assign_or_expr()
                }
            }
            TokenKind::Punctuation if token.lexeme == ";" => {
                self.advance();
                Ok(Stmt::Empty)
            }
            TokenKind::Comment => {
                let text = token.lexeme.trim_start_matches('#').trim().to_string();
                self.advance();
                Ok(Stmt::Comment(text))
            }
            TokenKind::Brace if token.lexeme == "{" => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Unknown => Err(self.error(format!("Unrecognized lexeme '{}'", token.lexeme))),
            _ => Err(self.error(format!("Unexpected statement '{}'", token.lexeme))),
        }
    }

    /// `sustancia NAME cantidad = NUMBER [UNIT] [@ [ NUMBER UNIT, ... ]];`
    fn parse_substance(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "sustancia")?;
        let name = self.expect_kind(TokenKind::Identifier)?;
        self.ensure_undeclared(&name)?;
        self.expect(TokenKind::ReservedWord, "cantidad")?;
        self.expect(TokenKind::Operator, "=")?;

        let quantity = self.expect_kind(TokenKind::Number)?;
        if quantity.parse::<f64>().is_err() {
            return Err(self.error(format!("Quantity '{}' is not a valid number", quantity)));
        }

        let unit = if self.check_kind(TokenKind::Unit) {
            let lexeme = self.expect_kind(TokenKind::Unit)?;
            Some(self.unit(&lexeme)?)
        } else {
            None
        };

        let mut metadata = Vec::new();
        if self.check(TokenKind::Operator, "@") {
            self.advance();
            self.expect(TokenKind::Bracket, "[")?;
            loop {
                let value = self.expect_kind(TokenKind::Number)?;
                if value.parse::<f64>().is_err() {
                    return Err(self.error(format!("Metadata '{}' is not a valid number", value)));
                }
                let lexeme = self.expect_kind(TokenKind::Unit)?;
                let unit = self.unit(&lexeme)?;
                if !unit.is_metadata_tag() {
                    return Err(self.error(format!("Unit '{}' is not valid for metadata", unit)));
                }
                metadata.push(Metadata { value, unit });
                if !self.check(TokenKind::Punctuation, ",") {
                    break;
                }
                self.advance();
            }
            self.expect(TokenKind::Bracket, "]")?;
        }
        self.expect(TokenKind::Punctuation, ";")?;

        let info = SubstanceInfo { quantity: quantity.clone(), unit, metadata: metadata.clone() };
        self.symbols.insert(Symbol::substance(name.clone(), info));
        Ok(Stmt::Substance(SubstanceDecl { name, quantity, unit, metadata }))
    }

    /// `numero NAME = expr;`
    fn parse_number(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "numero")?;
        let name = self.expect_kind(TokenKind::Identifier)?;
        self.ensure_undeclared(&name)?;
        self.expect(TokenKind::Operator, "=")?;
        let (value, typed) = self.parse_expr()?;
        if typed.ty != Type::Number {
            return Err(self.error(format!("Expression must be of type number, not {}", typed.ty)));
        }
        self.expect(TokenKind::Punctuation, ";")?;

        self.symbols.insert(Symbol::number(name.clone(), value.clone()));
        Ok(Stmt::Number { name, value })
    }

    /// `cadena NAME = "text";`
    fn parse_text(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "cadena")?;
        let name = self.expect_kind(TokenKind::Identifier)?;
        self.ensure_undeclared(&name)?;
        self.expect(TokenKind::Operator, "=")?;
        let value = self.expect_kind(TokenKind::String)?;
        self.expect(TokenKind::Punctuation, ";")?;

        self.symbols.insert(Symbol::text(name.clone(), value.clone()));
        Ok(Stmt::Text { name, value })
    }

    /// `name = expr;`, `name.prop = expr;`, `name=>prop = expr;` or `name;`
    fn parse_assign_or_expr(&mut self) -> Result<Stmt> {
        let name = self.expect_kind(TokenKind::Identifier)?;

        if self.at_property_access() {
            self.skip_property_access();
            let property = self.parse_property(&name)?;
            self.expect(TokenKind::Operator, "=")?;
            let (value, typed) = self.parse_expr()?;
            self.check_property_assignment(&name, property, typed)?;
            self.expect(TokenKind::Punctuation, ";")?;
            return Ok(Stmt::Assign { target: Target::Property { name, property }, value });
        }

        if self.check(TokenKind::Operator, "=") {
            self.advance();
            let (value, typed) = self.parse_expr()?;
            let symbol = self
                .symbols
                .lookup(&name)
                .ok_or_else(|| self.error(format!("Variable '{}' not declared for assignment", name)))?;
            if typed.ty != symbol.ty() {
                return Err(self.error(format!(
                    "Incompatible assignment: '{}' is {}, expression is {}",
                    name,
                    symbol.ty(),
                    typed.ty
                )));
            }
            if let (Some(expected), Some(found)) = (symbol.unit(), typed.unit) {
                if expected != found {
                    return Err(self.error(format!(
                        "Unit mismatch: '{}' has '{}', expression has '{}'",
                        name, expected, found
                    )));
                }
            }
            self.expect(TokenKind::Punctuation, ";")?;
            return Ok(Stmt::Assign { target: Target::Name(name), value });
        }

        if self.symbols.lookup(&name).is_none() {
            return Err(self.error(format!("Variable '{}' not declared", name)));
        }
        self.expect(TokenKind::Punctuation, ";")?;
        Ok(Stmt::Expr(Expr::Var(name)))
    }

    fn check_property_assignment(&self, name: &str, property: Property, typed: Typed) -> Result<()> {
        let symbol = self
            .symbols
            .lookup(name)
            .ok_or_else(|| self.error(format!("Variable '{}' not declared for assignment", name)))?;
        let info = symbol.as_substance().ok_or_else(|| {
            self.error(format!("'{}' must be a substance to assign property '{}'", name, property))
        })?;

        if typed.ty != Type::Number {
            return Err(self.error(format!(
                "Assignment to '{}' must be of type number, not {}",
                property, typed.ty
            )));
        }

        match property.metadata_unit() {
            None => {
                if let (Some(expected), Some(found)) = (info.unit, typed.unit) {
                    if expected != found {
                        return Err(self.error(format!(
                            "Unit mismatch: '{}' has '{}', expression has '{}'",
                            name, expected, found
                        )));
                    }
                }
            }
            Some(tag) => {
                if typed.unit != Some(tag) {
                    return Err(self.error(format!(
                        "Unit mismatch: '{}' requires '{}', expression has '{}'",
                        property,
                        tag,
                        unit_name(typed.unit)
                    )));
                }
                if info.metadata_slot(tag).is_none() {
                    let violation = Violation::UndefinedProperty { name: name.to_string(), property };
                    return Err(self.error(violation.to_string()));
                }
            }
        }
        Ok(())
    }

    /// `reaccionar NAME [ reactants -> products ] { body }`
    fn parse_reaction(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "reaccionar")?;
        let name = self.expect_kind(TokenKind::Identifier)?;
        if self.symbols.exists_in_current(&name) {
            return Err(self.error(format!("Reaction '{}' already declared", name)));
        }
        self.expect(TokenKind::Bracket, "[")?;
        let reactants = self.parse_reagents()?;
        self.expect(TokenKind::Operator, "->")?;
        let products = self.parse_reagents()?;
        self.expect(TokenKind::Bracket, "]")?;

        self.symbols.insert(Symbol::reaction(
            name.clone(),
            ReactionInfo { reactants: reactants.clone(), products: products.clone(), body: Block::default() },
        ));

        // Parameters shadow the outer substances they name
        self.symbols.enter_scope();
        for param in reactants.iter().chain(&products) {
            if self.symbols.exists_in_current(&param.name) {
                return Err(self.error(format!("Duplicate parameter '{}'", param.name)));
            }
            self.symbols.insert(Symbol::substance(param.name.clone(), SubstanceInfo::empty()));
        }
        let body = self.parse_block()?;
        self.symbols.exit_scope();

        if let Some(info) = self.symbols.lookup_mut(&name).and_then(Symbol::as_reaction_mut) {
            info.body = body.clone();
        }

        Ok(Stmt::Reaction(ReactionDef { name, reactants, products, body }))
    }

    /// `name [ args ];` restating the declared reactants exactly
    fn parse_call(&mut self) -> Result<Stmt> {
        let name = self.expect_kind(TokenKind::Identifier)?;
        let expected = match self.symbols.lookup(&name).and_then(Symbol::as_reaction) {
            Some(info) => info.reactants.clone(),
            None => return Err(self.error(format!("Reaction '{}' not declared", name))),
        };
        self.expect(TokenKind::Bracket, "[")?;
        let args = self.parse_reagents()?;
        self.expect(TokenKind::Bracket, "]")?;
        self.expect(TokenKind::Punctuation, ";")?;

        if args.len() != expected.len() {
            return Err(self.error(format!(
                "Reaction '{}' expects {} reactants, got {}",
                name,
                expected.len(),
                args.len()
            )));
        }
        if let Some((want, got)) = expected.iter().zip(&args).find(|(want, got)| want != got) {
            return Err(self.error(format!("Expected reactant {}, found {}", want, got)));
        }
        Ok(Stmt::Call { name, args })
    }

    /// `mezclar ( expr ) -> target;`
    fn parse_mix(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "mezclar")?;
        self.expect(TokenKind::Bracket, "(")?;
        let (value, typed) = self.parse_expr()?;
        self.expect(TokenKind::Bracket, ")")?;
        self.expect(TokenKind::Operator, "->")?;
        let target = self.expect_kind(TokenKind::Identifier)?;

        let target_unit = match self.symbols.lookup(&target) {
            None => {
                self.symbols.insert(Symbol::substance(target.clone(), SubstanceInfo::empty()));
                None
            }
            Some(symbol) => match symbol.as_substance() {
                Some(info) => info.unit,
                None => return Err(self.error(format!("Target '{}' is not a declared substance", target))),
            },
        };

        if typed.ty != Type::Substance {
            return Err(self.error(format!(
                "Expression in 'mezclar' must be of type substance, not {}",
                typed.ty
            )));
        }
        if let (Some(expected), Some(found)) = (target_unit, typed.unit) {
            if expected != found {
                return Err(self.error(format!(
                    "Unit mismatch: target has '{}', expression has '{}'",
                    expected, found
                )));
            }
        }
        self.expect(TokenKind::Punctuation, ";")?;
        Ok(Stmt::Mix { value, target })
    }

    /// `balancear expr;`
    fn parse_balance(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "balancear")?;
        let (value, typed) = self.parse_expr()?;
        self.expect(TokenKind::Punctuation, ";")?;
        if typed.ty != Type::Substance {
            return Err(self.error(format!(
                "Expression in 'balancear' must be of type substance, not {}",
                typed.ty
            )));
        }
        Ok(Stmt::Balance(value))
    }

    /// `mostrar ( arg, ... );`
    fn parse_show(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "mostrar")?;
        self.expect(TokenKind::Bracket, "(")?;
        let mut args = Vec::new();
        loop {
            if self.check_kind(TokenKind::String) {
                let text = self.expect_kind(TokenKind::String)?;
                args.push(Expr::Text(text));
            } else {
                let (arg, typed) = self.parse_expr()?;
                if !matches!(typed.ty, Type::Substance | Type::Number | Type::String) {
                    return Err(self.error(format!(
                        "Arguments of 'mostrar' must be substance, number or string, not {}",
                        typed.ty
                    )));
                }
                args.push(arg);
            }
            if !self.check(TokenKind::Punctuation, ",") {
                break;
            }
            self.advance();
        }
        self.expect(TokenKind::Bracket, ")")?;
        self.expect(TokenKind::Punctuation, ";")?;
        Ok(Stmt::Show(args))
    }

    /// `si (cond) { ... } [sino { ... }]`
    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "si")?;
        let condition = self.parse_parenthesized_condition()?;
        let then_block = self.parse_block()?;
        let else_block = if self.check(TokenKind::ReservedWord, "sino") {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::If { condition, then_block, else_block })
    }

    /// `repetir { ... } mientras (cond);`
    fn parse_repeat(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "repetir")?;
        let (body, condition) = self.parse_loop_tail()?;
        Ok(Stmt::RepeatUntil { condition, body })
    }

    /// `hacer { ... } mientras (cond);`
    fn parse_do_while(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "hacer")?;
        let (body, condition) = self.parse_loop_tail()?;
        Ok(Stmt::DoWhile { condition, body })
    }

    fn parse_loop_tail(&mut self) -> Result<(Block, Condition)> {
        let body = self.parse_block()?;
        self.expect(TokenKind::ReservedWord, "mientras")?;
        let condition = self.parse_parenthesized_condition()?;
        self.expect(TokenKind::Punctuation, ";")?;
        Ok((body, condition))
    }

    fn parse_stop(&mut self) -> Result<Stmt> {
        self.expect(TokenKind::ReservedWord, "detener")?;
        self.expect(TokenKind::Punctuation, ";")?;
        Ok(Stmt::Stop)
    }

    /// `{ stmt* }` in a scope of its own
    fn parse_block(&mut self) -> Result<Block> {
        self.expect(TokenKind::Brace, "{")?;
        self.symbols.enter_scope();
        let mut statements = Vec::new();
        while !self.check(TokenKind::Brace, "}") {
            if self.is_at_end() {
                return Err(self.error("Expected '}', found end of input"));
            }
            statements.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::Brace, "}")?;
        self.symbols.exit_scope();
        Ok(Block::new(statements))
    }

    /// `[coefficient] name (, [coefficient] name)*`, each naming a substance
    fn parse_reagents(&mut self) -> Result<Vec<Reagent>> {
        let mut reagents = Vec::new();
        loop {
            let coefficient = if self.check_kind(TokenKind::Number) {
                self.expect_kind(TokenKind::Number)?
            } else {
                "1".to_string()
            };
            let name = self.expect_kind(TokenKind::Identifier)?;
            if self.symbols.lookup(&name).and_then(Symbol::as_substance).is_none() {
                return Err(self.error(format!("Reactant '{}' is not a declared substance", name)));
            }
            reagents.push(Reagent { coefficient, name });
            if !self.check(TokenKind::Punctuation, ",") {
                break;
            }
            self.advance();
        }
        Ok(reagents)
    }

    // ===== Conditions =====

    fn parse_parenthesized_condition(&mut self) -> Result<Condition> {
        self.expect(TokenKind::Bracket, "(")?;
        let condition = self.parse_condition()?;
        self.expect(TokenKind::Bracket, ")")?;
        Ok(condition)
    }

    /// `expr CMP expr ((y|o) cond)*`; a chain groups to the right, so
    /// `a y b o c` is `a y (b o c)`
    fn parse_condition(&mut self) -> Result<Condition> {
        let (left, left_ty) = self.parse_expr()?;
        let op = match self.peek() {
            Some(token) if token.kind == TokenKind::Operator => CmpOp::from_symbol(&token.lexeme),
            _ => None,
        };
        let Some(op) = op else {
            let found = self.peek().map(|t| t.lexeme.clone()).unwrap_or_default();
            return Err(self.error(format!("Invalid comparison operator '{}'", found)));
        };
        self.advance();
        let (right, right_ty) = self.parse_expr()?;
        rules::compare(left_ty, right_ty).map_err(|v| self.violation(v))?;

        let mut condition = Condition::Compare { op, left, right };
        while let Some(conj) = self.peek_conjunction() {
            self.advance();
            let next = self.parse_condition()?;
            condition = Condition::Logic { conj, left: Box::new(condition), right: Box::new(next) };
        }
        Ok(condition)
    }

    fn peek_conjunction(&self) -> Option<Conjunction> {
        self.peek()
            .filter(|t| t.kind == TokenKind::ReservedWord)
            .and_then(|t| Conjunction::from_keyword(&t.lexeme))
    }

    // ===== Expressions =====

    /// `term (('+'|'-') term)*`
    fn parse_expr(&mut self) -> Result<(Expr, Typed)> {
        let (mut expr, mut typed) = self.parse_term()?;
        while let Some(op) = self.peek_binop(BinOp::is_additive) {
            self.advance();
            let (right, right_ty) = self.parse_term()?;
            typed = rules::binary(op, typed, right_ty).map_err(|v| self.violation(v))?;
            expr = Expr::binary(op, expr, right);
        }
        Ok((expr, typed))
    }

    /// `factor (('*'|'/') factor)*`
    fn parse_term(&mut self) -> Result<(Expr, Typed)> {
        let (mut expr, mut typed) = self.parse_factor()?;
        while let Some(op) = self.peek_binop(|op| !op.is_additive()) {
            self.advance();
            let (right, right_ty) = self.parse_factor()?;
            typed = rules::binary(op, typed, right_ty).map_err(|v| self.violation(v))?;
            expr = Expr::binary(op, expr, right);
        }
        Ok((expr, typed))
    }

    fn peek_binop(&self, accept: impl Fn(&BinOp) -> bool) -> Option<BinOp> {
        self.peek()
            .filter(|t| t.kind == TokenKind::Operator)
            .and_then(|t| BinOp::from_symbol(&t.lexeme))
            .filter(accept)
    }

    /// `name [('.'|'=>') property] | number | string | '(' expr ')'`
    fn parse_factor(&mut self) -> Result<(Expr, Typed)> {
        let Some(token) = self.peek() else {
            return Err(self.error("Unexpected end of input in expression"));
        };

        let is_constant = token.kind == TokenKind::ReservedWord && CONSTANTS.contains(&token.lexeme.as_str());
        if token.kind == TokenKind::Identifier || is_constant {
            return self.parse_name();
        }

        match token.kind {
            TokenKind::Number => {
                let literal = token.lexeme.clone();
                self.advance();
                Ok((Expr::Num(literal), Typed::number()))
            }
            TokenKind::String => {
                let literal = token.lexeme.clone();
                self.advance();
                Ok((Expr::Text(literal), Typed::string()))
            }
            TokenKind::Bracket if token.lexeme == "(" => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::Bracket, ")")?;
                Ok(inner)
            }
            _ => Err(self.error(format!("Unexpected factor '{}'", token.lexeme))),
        }
    }

    /// A declared name, optionally followed by a property access
    fn parse_name(&mut self) -> Result<(Expr, Typed)> {
        let name = match self.advance() {
            Some(token) => token.lexeme.clone(),
            None => return Err(self.error("Unexpected end of input in expression")),
        };
        let typed = match self.symbols.lookup(&name) {
            Some(symbol) => symbol.typed(),
            None => return Err(self.error(format!("Variable '{}' not declared", name))),
        };
        if self.at_property_access() {
            self.skip_property_access();
            let property = self.parse_property(&name)?;
            let typed = rules::property(&name, property, self.symbols.lookup(&name))
                .map_err(|v| self.violation(v))?;
            return Ok((Expr::Property { name, property }, typed));
        }
        Ok((Expr::Var(name), typed))
    }

    fn parse_property(&mut self, name: &str) -> Result<Property> {
        let property = self.expect_kind(TokenKind::Identifier)?;
        Property::from_name(&property).ok_or_else(|| {
            self.error(format!("Unknown property '{}' for substance '{}'", property, name))
        })
    }

    /// `.` or `=>`, the latter spelled as `=` immediately followed by `>`
    fn at_property_access(&self) -> bool {
        self.check(TokenKind::Punctuation, ".") || self.at_arrow()
    }

    fn at_arrow(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some(eq), Some(gt)) => {
                eq.is(TokenKind::Operator, "=") && gt.is(TokenKind::Operator, ">") && eq.span.end == gt.span.start
            }
            _ => false,
        }
    }

    fn skip_property_access(&mut self) {
        if self.at_arrow() {
            self.advance();
        }
        self.advance();
    }

    // ===== Helper Methods =====

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, kind: TokenKind, lexeme: &str) -> bool {
        self.peek().is_some_and(|t| t.is(kind, lexeme))
    }

    fn check_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn expect(&mut self, kind: TokenKind, lexeme: &str) -> Result<()> {
        if self.check(kind, lexeme) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}', found {}", lexeme, self.found())))
        }
    }

    /// Consume a token of `kind` and return its lexeme
    fn expect_kind(&mut self, kind: TokenKind) -> Result<String> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.advance();
                Ok(token.lexeme.clone())
            }
            _ => Err(self.error(format!("Expected {}, found {}", describe(kind), self.found()))),
        }
    }

    fn ensure_undeclared(&self, name: &str) -> Result<()> {
        if self.symbols.exists_in_current(name) {
            return Err(self.error(format!("Identifier '{}' already declared", name)));
        }
        Ok(())
    }

    fn unit(&self, lexeme: &str) -> Result<Unit> {
        Unit::from_lexeme(lexeme).ok_or_else(|| self.error(format!("Unknown unit '{}'", lexeme)))
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token.lexeme),
            None => "end of input".to_string(),
        }
    }

    fn violation(&self, violation: Violation) -> Error {
        self.error(violation.to_string())
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let span = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy);
        Error::syntax(message, self.pos, span)
    }
}

fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::ReservedWord => "reserved word",
        TokenKind::Identifier => "identifier",
        TokenKind::Number => "number",
        TokenKind::Operator => "operator",
        TokenKind::Punctuation => "punctuation",
        TokenKind::Brace => "brace",
        TokenKind::Bracket => "bracket",
        TokenKind::Unit => "unit",
        TokenKind::String => "string",
        TokenKind::Comment => "comment",
        TokenKind::Unknown => "unknown lexeme",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_with(source: &str, symbols: &mut SymbolTable) -> Result<Program> {
        let tokens = Lexer::new(source).tokenize();
        Parser::new(&tokens, symbols).parse()
    }

    fn parse(source: &str) -> Result<Program> {
        parse_with(source, &mut SymbolTable::new())
    }

    fn parse_err(source: &str) -> String {
        match parse(source) {
            Ok(program) => panic!("expected an error, got {:?}", program),
            Err(err) => err.message().to_string(),
        }
    }

    #[test]
    fn test_parse_substance() {
        let mut symbols = SymbolTable::new();
        let program = parse_with("sustancia h2 cantidad=2 mol;", &mut symbols).unwrap();
        assert_eq!(
            program.statements,
            vec![Stmt::Substance(SubstanceDecl {
                name: "h2".into(),
                quantity: "2".into(),
                unit: Some(Unit::Mol),
                metadata: vec![],
            })]
        );
        assert_eq!(symbols.lookup("h2").and_then(Symbol::unit), Some(Unit::Mol));
    }

    #[test]
    fn test_parse_substance_metadata() {
        let program = parse("sustancia agua cantidad = 1.5 gramo @ [25 gradC, 1 atm];").unwrap();
        match &program.statements[0] {
            Stmt::Substance(decl) => {
                assert_eq!(decl.metadata.len(), 2);
                assert_eq!(decl.metadata[0], Metadata { value: "25".into(), unit: Unit::GradC });
                assert_eq!(decl.metadata[1], Metadata { value: "1".into(), unit: Unit::Atm });
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_metadata_unit_restricted() {
        let msg = parse_err("sustancia a cantidad = 1 mol @ [3 mol];");
        assert!(msg.contains("not valid for metadata"), "{}", msg);
    }

    #[test]
    fn test_duplicate_declaration() {
        let msg = parse_err("numero x = 1; numero x = 2;");
        assert_eq!(msg, "Identifier 'x' already declared");
    }

    #[test]
    fn test_verbal_operator_expression() {
        let program = parse("numero x = 2 fusionar 3;").unwrap();
        assert_eq!(
            program.statements[0],
            Stmt::Number { name: "x".into(), value: Expr::binary(BinOp::Add, Expr::num("2"), Expr::num("3")) }
        );
    }

    #[test]
    fn test_precedence_and_associativity() {
        let program = parse("numero x = 1 - 2 - 3 * 4;").unwrap();
        let expected = Expr::binary(
            BinOp::Sub,
            Expr::binary(BinOp::Sub, Expr::num("1"), Expr::num("2")),
            Expr::binary(BinOp::Mul, Expr::num("3"), Expr::num("4")),
        );
        assert_eq!(program.statements[0], Stmt::Number { name: "x".into(), value: expected });
    }

    #[test]
    fn test_unit_mismatch_is_rejected() {
        let msg = parse_err("sustancia a cantidad = 1 mol; sustancia b cantidad = 1 gramo; balancear a fusionar b;");
        assert_eq!(msg, "Unit mismatch: mol and gramo");
    }

    #[test]
    fn test_substance_times_number() {
        assert!(parse("sustancia a cantidad = 1 mol; balancear a * 2;").is_ok());
        let msg = parse_err("sustancia a cantidad = 1 mol; balancear 2 * a;");
        assert!(msg.starts_with("Operator '*' is not valid"), "{}", msg);
    }

    #[test]
    fn test_number_requires_numeric_expression() {
        let msg = parse_err("sustancia a cantidad = 1 mol; numero n = a;");
        assert_eq!(msg, "Expression must be of type number, not substance");
    }

    #[test]
    fn test_undeclared_variable() {
        assert_eq!(parse_err("numero x = w + 1;"), "Variable 'w' not declared");
        assert_eq!(parse_err("w = 1;"), "Variable 'w' not declared for assignment");
    }

    #[test]
    fn test_conjunction_keyword_is_not_a_name() {
        assert_eq!(parse_err("numero y = 1;"), "Expected identifier, found 'y'");
    }

    #[test]
    fn test_builtin_constants_are_numbers() {
        assert!(parse("numero area = PI * 2;").is_ok());
        assert!(parse("numero n = AVOGADRO / 2 + PLANCK;").is_ok());
    }

    #[test]
    fn test_property_access_forms() {
        let source = "sustancia a cantidad = 1 mol @ [25 gradC]; numero t = a.temp; numero u = a=>cant;";
        let program = parse(source).unwrap();
        assert_eq!(
            program.statements[1],
            Stmt::Number { name: "t".into(), value: Expr::Property { name: "a".into(), property: Property::Temp } }
        );
        assert_eq!(
            program.statements[2],
            Stmt::Number { name: "u".into(), value: Expr::Property { name: "a".into(), property: Property::Cant } }
        );
    }

    #[test]
    fn test_missing_metadata_slot() {
        let msg = parse_err("sustancia a cantidad = 1 mol; numero p = a.presion;");
        assert_eq!(msg, "Property 'presion' not defined for substance 'a'");
        let msg = parse_err("sustancia a cantidad = 1 mol; numero p = a.color;");
        assert_eq!(msg, "Unknown property 'color' for substance 'a'");
    }

    #[test]
    fn test_property_assignment() {
        let ok = "sustancia a cantidad = 1 mol @ [25 gradC]; sustancia b cantidad = 2 mol @ [30 gradC]; a.temp = b.temp; a.cant = b.cant;";
        assert!(parse(ok).is_ok());

        let msg = parse_err("sustancia a cantidad = 1 mol @ [25 gradC]; a.temp = 30;");
        assert_eq!(msg, "Unit mismatch: 'temp' requires 'gradC', expression has 'none'");

        let msg = parse_err("sustancia a cantidad = 1 mol @ [2 atm]; sustancia b cantidad = 1 mol @ [25 gradC]; b.presion = a.presion;");
        assert_eq!(msg, "Property 'presion' not defined for substance 'b'");

        let msg = parse_err("sustancia a cantidad = 1 mol; sustancia b cantidad = 1 gramo; a.cant = b.cant;");
        assert_eq!(msg, "Unit mismatch: 'a' has 'mol', expression has 'gramo'");
    }

    #[test]
    fn test_assignment_type_check() {
        assert!(parse("numero x = 1; x = x * 2;").is_ok());
        let msg = parse_err("numero x = 1; cadena s = \"hola\"; x = s;");
        assert_eq!(msg, "Incompatible assignment: 'x' is number, expression is string");
    }

    #[test]
    fn test_reaction_definition_and_call() {
        let source = "sustancia h2 cantidad = 2 mol; sustancia o2 cantidad = 1 mol; sustancia h2o cantidad = 0 mol;\n\
                      reaccionar agua [2 h2, o2 -> 2 h2o] { mostrar(h2); }\n\
                      agua [2 h2, o2];";
        let mut symbols = SymbolTable::new();
        let program = parse_with(source, &mut symbols).unwrap();
        assert_eq!(program.statements.len(), 5);
        match &program.statements[3] {
            Stmt::Reaction(def) => {
                assert_eq!(def.reactants, vec![Reagent::new("2", "h2"), Reagent::new("1", "o2")]);
                assert_eq!(def.products, vec![Reagent::new("2", "h2o")]);
                assert_eq!(def.body.statements.len(), 1);
            }
            other => panic!("unexpected statement {:?}", other),
        }
        let info = symbols.lookup("agua").and_then(Symbol::as_reaction).unwrap();
        assert_eq!(info.body.statements.len(), 1);
        // parameters do not leak out of the reaction scope
        assert_eq!(symbols.lookup("h2").and_then(Symbol::unit), Some(Unit::Mol));
    }

    #[test]
    fn test_reaction_parameters_are_unitless_locals() {
        let source = "sustancia a cantidad = 1 mol; sustancia b cantidad = 1 gramo;\n\
                      reaccionar r [a -> b] { balancear a + b; }";
        assert!(parse(source).is_ok());
    }

    #[test]
    fn test_reaction_call_must_restate_signature() {
        let prelude = "sustancia h2 cantidad = 2 mol; sustancia o2 cantidad = 1 mol; sustancia h2o cantidad = 0 mol;\n\
                       reaccionar agua [2 h2, o2 -> 2 h2o] { }\n";
        let msg = parse_err(&format!("{}agua [h2, o2];", prelude));
        assert_eq!(msg, "Expected reactant 2h2, found 1h2");
        let msg = parse_err(&format!("{}agua [2 h2];", prelude));
        assert_eq!(msg, "Reaction 'agua' expects 2 reactants, got 1");
        let msg = parse_err(&format!("{}h2 [2 h2];", prelude));
        assert_eq!(msg, "Reaction 'h2' not declared");
    }

    #[test]
    fn test_reaction_rejects_duplicate_parameter() {
        let msg = parse_err("sustancia a cantidad = 1 mol; reaccionar r [a -> a] { }");
        assert_eq!(msg, "Duplicate parameter 'a'");
    }

    #[test]
    fn test_reactants_must_be_substances() {
        let msg = parse_err("numero n = 1; sustancia b cantidad = 1 mol; reaccionar r [n -> b] { }");
        assert_eq!(msg, "Reactant 'n' is not a declared substance");
    }

    #[test]
    fn test_mix_auto_declares_target() {
        let mut symbols = SymbolTable::new();
        let source = "sustancia a cantidad = 1 mol; sustancia b cantidad = 2 mol; mezclar (a + b) -> c;";
        let program = parse_with(source, &mut symbols).unwrap();
        assert_eq!(
            program.statements[2],
            Stmt::Mix { value: Expr::binary(BinOp::Add, Expr::var("a"), Expr::var("b")), target: "c".into() }
        );
        let info = symbols.lookup("c").and_then(Symbol::as_substance).unwrap();
        assert_eq!(info.quantity, "0");
        assert_eq!(info.unit, None);
        assert!(info.metadata.is_empty());
    }

    #[test]
    fn test_mix_checks_target_and_expression() {
        let msg = parse_err("sustancia a cantidad = 1 mol; numero n = 1; mezclar (a) -> n;");
        assert_eq!(msg, "Target 'n' is not a declared substance");
        let msg = parse_err("sustancia a cantidad = 1 mol; sustancia g cantidad = 1 gramo; mezclar (a) -> g;");
        assert_eq!(msg, "Unit mismatch: target has 'gramo', expression has 'mol'");
        let msg = parse_err("numero n = 1; mezclar (n) -> t;");
        assert_eq!(msg, "Expression in 'mezclar' must be of type substance, not number");
    }

    #[test]
    fn test_show_arguments() {
        let program = parse("numero x = 1; mostrar(\"x vale\", x, x + 1);").unwrap();
        assert_eq!(
            program.statements[1],
            Stmt::Show(vec![
                Expr::Text("\"x vale\"".into()),
                Expr::var("x"),
                Expr::binary(BinOp::Add, Expr::var("x"), Expr::num("1")),
            ])
        );
    }

    #[test]
    fn test_if_else_and_scopes() {
        let mut symbols = SymbolTable::new();
        let source = "numero x = 1; si (x > 0) { numero w = 2; } sino { numero w = 3; }";
        let program = parse_with(source, &mut symbols).unwrap();
        assert_eq!(program.statements.len(), 2);
        assert!(matches!(program.statements[1], Stmt::If { else_block: Some(_), .. }));
        assert!(symbols.lookup("w").is_none());
        assert_eq!(symbols.depth(), 1);
    }

    #[test]
    fn test_block_local_names_are_invisible_outside() {
        let msg = parse_err("si (1 > 0) { numero w = 2; } numero z = w;");
        assert_eq!(msg, "Variable 'w' not declared");
    }

    #[test]
    fn test_loops() {
        let program = parse("numero i = 0; repetir { i = i + 1; } mientras (i >= 3); hacer { detener; } mientras (i < 10);")
            .unwrap();
        assert!(matches!(program.statements[1], Stmt::RepeatUntil { .. }));
        match &program.statements[2] {
            Stmt::DoWhile { body, .. } => assert_eq!(body.statements, vec![Stmt::Stop]),
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn test_conjunctions_group_right() {
        let program = parse("numero a = 1; si (a > 0 y a < 5 o a == 9) { }").unwrap();
        let Stmt::If { condition, .. } = &program.statements[1] else {
            panic!("expected if");
        };
        match condition {
            Condition::Logic { conj: Conjunction::And, left, right } => {
                assert!(matches!(**left, Condition::Compare { op: CmpOp::Gt, .. }));
                assert!(matches!(**right, Condition::Logic { conj: Conjunction::Or, .. }));
            }
            other => panic!("unexpected condition {:?}", other),
        }
    }

    #[test]
    fn test_comparison_checks() {
        let msg = parse_err("sustancia a cantidad = 1 mol; numero n = 1; si (a > n) { }");
        assert_eq!(msg, "Comparison between incompatible types: substance and number");
        let msg = parse_err("numero n = 1; si (n + 1) { }");
        assert_eq!(msg, "Invalid comparison operator ')'");
    }

    #[test]
    fn test_comments_empty_and_expression_statements() {
        let program = parse("# hola\n;\nnumero x = 1;\nx;").unwrap();
        assert_eq!(
            program.statements,
            vec![
                Stmt::Comment("hola".into()),
                Stmt::Empty,
                Stmt::Number { name: "x".into(), value: Expr::num("1") },
                Stmt::Expr(Expr::var("x")),
            ]
        );
    }

    #[test]
    fn test_unknown_token_is_reported() {
        let err = parse("numero x = 1;\n$").unwrap_err();
        assert_eq!(err.message(), "Unrecognized lexeme '$'");
        match err {
            Error::Syntax { position, line, col, .. } => {
                assert_eq!(position, 5);
                assert_eq!((line, col), (2, 1));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_semicolon() {
        let msg = parse_err("numero x = 1");
        assert_eq!(msg, "Expected ';', found end of input");
    }

    #[test]
    fn test_scopes_unwound_after_error() {
        let mut symbols = SymbolTable::new();
        assert!(parse_with("si (1 > 0) { si (2 > 1) { numero x = z; } }", &mut symbols).is_err());
        assert_eq!(symbols.depth(), 1);
    }
}
