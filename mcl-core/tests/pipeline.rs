//! End-to-end tests for the MCL pipeline
//!
//! Source text in, tokens / AST / intermediate code out.

use mcl_core::ast::{Reagent, SubstanceDecl};
use mcl_core::{
    compile, generate, optimize_global, optimize_peephole, parse, tokenize, BinOp, Block, Error, Expr,
    Stmt, SymbolTable, TokenKind, Unit,
};

// ===== Lexer =====

#[test]
fn test_substance_declaration_tokens() {
    let tokens = tokenize("sustancia h2 cantidad=2 mol;");
    let pairs: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.lexeme.as_str())).collect();
    assert_eq!(
        pairs,
        vec![
            (TokenKind::ReservedWord, "sustancia"),
            (TokenKind::Identifier, "h2"),
            (TokenKind::ReservedWord, "cantidad"),
            (TokenKind::Operator, "="),
            (TokenKind::Number, "2"),
            (TokenKind::Unit, "mol"),
            (TokenKind::Punctuation, ";"),
        ]
    );
    assert_eq!(tokens[0].code, Some(1010));
    assert_eq!(tokens[5].code, Some(1030));
}

#[test]
fn test_spans_cover_every_character() {
    let source = r#"
        sustancia a cantidad = 1 mol @ [25 gradC, 1 atm];
        cadena s = "hola mundo";   # saludo
        si (a.temp >= 20 y a.cant != 0) { mostrar(s, a); } sino { detener; }
        x$ = "sin cerrar
    "#;
    let tokens = tokenize(source);
    let mut covered = vec![false; source.len()];
    let mut last_end = 0;
    for token in &tokens {
        assert!(token.span.start >= last_end, "overlapping token {:?}", token);
        assert_eq!(&source[token.span.start..token.span.end], token.lexeme);
        for slot in &mut covered[token.span.start..token.span.end] {
            *slot = true;
        }
        last_end = token.span.end;
    }
    for (i, ch) in source.char_indices() {
        assert!(covered[i] || ch.is_whitespace(), "character {:?} at {} not covered", ch, i);
    }
}

#[test]
fn test_identifier_codes_are_stable_within_a_run() {
    let tokens = tokenize("numero x = 1; x = x fusionar 1;");
    let codes: Vec<_> = tokens.iter().filter(|t| t.lexeme == "x").map(|t| t.code).collect();
    assert_eq!(codes.len(), 3);
    assert!(codes.iter().all(|c| *c == codes[0]));
    assert!(codes[0].is_some_and(|c| c >= 6001));
}

// ===== Parser =====

#[test]
fn test_substance_declaration_ast() {
    let (program, symbols) = parse(&tokenize("sustancia h2 cantidad=2 mol;")).unwrap();
    assert_eq!(
        program.statements,
        vec![Stmt::Substance(SubstanceDecl {
            name: "h2".into(),
            quantity: "2".into(),
            unit: Some(Unit::Mol),
            metadata: vec![],
        })]
    );
    assert!(symbols.lookup("h2").is_some());
}

#[test]
fn test_statement_count_matches_top_level() {
    let source = r#"
        sustancia a cantidad = 1 mol;
        numero n = 3;
        # comentario
        si (n > 1) { mostrar(a); numero dentro = 2; }
        repetir { n = n - 1; } mientras (n > 0);
        ;
        { detener; }
    "#;
    let (program, _) = parse(&tokenize(source)).unwrap();
    assert_eq!(program.statements.len(), 7);
}

#[test]
fn test_block_scoping() {
    let (_, symbols) = parse(&tokenize("numero n = 1; si (n > 0) { numero local = 2; }")).unwrap();
    assert!(symbols.lookup("n").is_some());
    assert!(symbols.lookup("local").is_none());
    assert_eq!(symbols.depth(), 1);

    let mut symbols = SymbolTable::new();
    symbols.enter_scope();
    symbols.insert(mcl_core::Symbol::number("local", Expr::num("2")));
    assert!(symbols.lookup("local").is_some());
    symbols.exit_scope();
    assert!(symbols.lookup("local").is_none());
}

#[test]
fn test_verbal_operator_parses_to_binary() {
    let (program, _) = parse(&tokenize("numero x = 2 fusionar 3;")).unwrap();
    assert_eq!(
        program.statements[0],
        Stmt::Number { name: "x".into(), value: Expr::binary(BinOp::Add, Expr::num("2"), Expr::num("3")) }
    );
}

// ===== Whole pipeline =====

#[test]
fn test_folded_declaration_reaches_polish() {
    let compilation = compile("numero x = 2 fusionar 3;").unwrap();
    assert_eq!(compilation.optimized.statements[0], Stmt::Number { name: "x".into(), value: Expr::num("5") });
    assert_eq!(compilation.code.polish[0], "DECLARE numero x = 5");
}

#[test]
fn test_unit_mismatch_never_reaches_codegen() {
    let source = "sustancia a cantidad = 1 mol; sustancia b cantidad = 1 gramo; balancear a fusionar b;";
    let errors = compile(source).unwrap_err();
    assert_eq!(errors.len(), 1);
    let error = &errors.errors()[0];
    assert!(matches!(error, Error::Syntax { .. }));
    assert!(error.message().contains("mol"), "{}", error);
    assert!(error.message().contains("gramo"), "{}", error);
}

#[test]
fn test_global_optimizer_is_idempotent() {
    let source = r#"
        sustancia a cantidad = 4 mol @ [25 gradC];
        numero base = 2;
        numero doble = base catalizar 2;
        numero total = doble fusionar base separar 1;
        a.cant = total * 1;
        si (a.temp > doble) { mostrar("caliente", total); }
        hacer { balancear a diluir base; } mientras (a.cant < total);
    "#;
    let (program, _) = parse(&tokenize(source)).unwrap();
    let once = optimize_global(&program);
    let twice = optimize_global(&once);
    assert_eq!(once, twice);
    assert_eq!(once.statements[3], Stmt::Number { name: "total".into(), value: Expr::num("5") });
}

#[test]
fn test_reaction_program() {
    let source = r#"
        sustancia h2 cantidad = 2 mol;
        sustancia o2 cantidad = 1 mol;
        sustancia h2o cantidad = 0 mol;
        reaccionar agua [2 h2, o2 -> 2 h2o] { mostrar("reaccionando"); }
        agua [2 h2, o2];
    "#;
    let compilation = compile(source).unwrap();
    let code = &compilation.code;
    assert!(code.polish.contains(&"FUNCTION agua(2h2,1o2 -> 2h2o)".to_string()));
    assert!(code.pcode.contains(&"CALL agua 2h2,1o2".to_string()));
    assert_eq!(code.pcode.iter().filter(|l| l.starts_with("DECL ")).count(), 3);
    assert!(matches!(&compilation.program.statements[4], Stmt::Call { args, .. } if args[1] == Reagent::new("1", "o2")));
}

#[test]
fn test_mix_averages_metadata() {
    let source = r#"
        sustancia a cantidad = 1 mol @ [20 gradC, 1 atm];
        sustancia b cantidad = 2 mol @ [40 gradC, 2 atm];
        mezclar (a fusionar b) -> c;
    "#;
    let compilation = compile(source).unwrap();
    let info = compilation.symbols.lookup("c").and_then(mcl_core::Symbol::as_substance).unwrap();
    assert_eq!(info.metadata.len(), 2);
    assert!(info.metadata.iter().all(|m| m.value == "0"));

    let pcode = &compilation.code.pcode;
    let mix = pcode.iter().position(|l| l == "MIX T0 c").unwrap();
    assert_eq!(
        &pcode[mix..],
        &["MIX T0 c", "AVG_PROP a b temp T1", "SET_PROP c temp T1", "AVG_PROP a b presion T2", "SET_PROP c presion T2"]
    );
}

#[test]
fn test_control_flow_lowering() {
    let source = r#"
        numero i = 0;
        repetir { i = i fusionar 1; } mientras (i < 3);
    "#;
    let compilation = compile(source).unwrap();
    let code = &compilation.code;
    assert_eq!(code.triples.len(), code.quads.len());
    assert_eq!(code.triples.len(), code.pcode.len());
    assert!(code.pcode.contains(&"L0:".to_string()));
    assert!(code.pcode.iter().any(|l| l.starts_with("JMP_IF_NOT ") && l.ends_with(" L0")));
    assert_eq!(code.pcode.last().map(String::as_str), Some("L1:"));
}

#[test]
fn test_repeated_show_collapses_in_peephole() {
    let compilation = compile("cadena s = \"x\"; mostrar(s); mostrar(s);").unwrap();
    assert_eq!(compilation.code.pcode.iter().filter(|l| *l == "PRINT s").count(), 2);
    assert_eq!(compilation.peephole.code.iter().filter(|l| *l == "PRINT s").count(), 1);
    assert_eq!(compilation.peephole.removed, vec!["PRINT s"]);
}

// ===== Peephole =====

#[test]
fn test_peephole_additive_identity() {
    let result = optimize_peephole(&["LIT 0", "ADD", "PRINT x"]);
    assert_eq!(result.code, vec!["PRINT x"]);
    assert_eq!(result.removed, vec!["LIT 0", "ADD"]);
}

#[test]
fn test_peephole_duplicate() {
    let result = optimize_peephole(&["PRINT a", "PRINT a"]);
    assert_eq!(result.code, vec!["PRINT a"]);
    assert_eq!(result.removed, vec!["PRINT a"]);
}

// ===== Code generation over hand-built trees =====

#[test]
fn test_generate_block_statement() {
    let program = mcl_core::Program {
        statements: vec![Stmt::Block(Block::new(vec![Stmt::Stop, Stmt::Comment("fin".into())]))],
    };
    let code = generate(&program);
    assert_eq!(code.polish, vec!["BREAK", "// fin"]);
    assert_eq!(code.triples[1].to_string(), "1: (COMMENT, fin, -)");
}
