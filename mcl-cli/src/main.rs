//! MCL - Modelo de Cálculo de Laboratorio
//! Command-line interface for inspecting MCL programs at every stage

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use mcl_core::token::{OPERATORS, RESERVED_WORDS, UNITS, VERBAL_OPERATORS};
use mcl_core::{Compilation, Config, IntermediateCode, OutputFormat, PeepholeResult};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mcl")]
#[command(author = "MCL Contributors")]
#[command(version = "2026.1.16")]
#[command(about = "MCL - a chemistry modeling language", long_about = None)]
struct Cli {
    /// Configuration file (default: ./mcl.toml if present)
    #[arg(long, global = true, value_name = "PATH", env = "MCL_CONFIG")]
    config: Option<PathBuf>,

    /// Log every pipeline stage
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token table
    Tokens {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Parse and analyze without generating code (the analyzer follows
    /// `pipeline.semantic_pass`)
    Check {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Print the symbol table on success
        #[arg(short, long)]
        symbols: bool,
    },

    /// Print the syntax tree
    Ast {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Show the tree after global optimization
        #[arg(short, long)]
        optimized: bool,

        #[arg(long)]
        json: bool,
    },

    /// Print intermediate code
    Ir {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value_t = Form::All)]
        form: Form,

        /// Skip constant folding and propagation
        #[arg(long)]
        no_optimize: bool,

        /// Skip the peephole pass
        #[arg(long)]
        no_peephole: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show information about MCL
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Form {
    Polish,
    Pcode,
    Triples,
    Quads,
    All,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Tokens { input, json } => tokens_command(&input, json || wants_json(&config)),
        Commands::Check { input, symbols } => check_command(&input, &config, symbols),
        Commands::Ast { input, optimized, json } => {
            ast_command(&input, &config, optimized, json || wants_json(&config))
        }
        Commands::Ir { input, form, no_optimize, no_peephole, json } => {
            let mut config = config;
            config.pipeline.global_optimizer &= !no_optimize;
            config.pipeline.peephole &= !no_peephole;
            let json = json || wants_json(&config);
            ir_command(&input, &config, form, json)
        }
        Commands::Info => {
            print_info();
            Ok(())
        }
    });

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("MCL_LOG").unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => {
            let (config, found) = Config::discover(&std::env::current_dir()?)?;
            if let Some(found) = found {
                tracing::info!(path = %found.display(), "using configuration");
            }
            Ok(config)
        }
    }
}

fn wants_json(config: &Config) -> bool {
    config.output.format == OutputFormat::Json
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn compile_file(input: &Path, config: &Config) -> Result<Compilation> {
    let source = read_source(input)?;
    Ok(mcl_core::compile_with_config(&source, config)?)
}

// ============================================================================
// Commands
// ============================================================================

fn tokens_command(input: &Path, json: bool) -> Result<()> {
    let tokens = mcl_core::tokenize(&read_source(input)?);
    if json {
        return print_json(&tokens);
    }

    println!("{}", format!("{:<14} {:<20} {}", "KIND", "LEXEME", "CODE").bold());
    for token in &tokens {
        if token.kind == mcl_core::TokenKind::Unknown {
            println!("{}", token.to_string().yellow());
        } else {
            println!("{}", token);
        }
    }
    println!();
    println!("{} {} token(s)", "    Scanned".green().bold(), tokens.len());
    Ok(())
}

fn check_file(input: &Path, config: &Config) -> Result<(mcl_core::Program, mcl_core::SymbolTable)> {
    let source = read_source(input)?;
    Ok(mcl_core::check_with_config(&source, config)?)
}

fn check_command(input: &Path, config: &Config, show_symbols: bool) -> Result<()> {
    println!("{} {}", "Checking".green().bold(), input.display().to_string().cyan());

    let (program, symbols) = check_file(input, config)?;
    println!(
        "{} {} statement(s), no errors",
        "        Ok".green().bold(),
        program.statements.len()
    );
    if show_symbols {
        println!();
        println!("{}", "Symbol table:".bold());
        print!("{}", symbols);
    }
    Ok(())
}

fn ast_command(input: &Path, config: &Config, optimized: bool, json: bool) -> Result<()> {
    let mut config = config.clone();
    config.pipeline.global_optimizer |= optimized;
    let compilation = compile_file(input, &config)?;
    let program = if optimized { &compilation.optimized } else { &compilation.program };

    if json {
        return print_json(program);
    }
    print!("{}", program);
    Ok(())
}

#[derive(Serialize)]
struct IrReport<'a> {
    code: &'a IntermediateCode,
    peephole: &'a PeepholeResult,
}

fn ir_command(input: &Path, config: &Config, form: Form, json: bool) -> Result<()> {
    let compilation = compile_file(input, config)?;
    let code = &compilation.code;

    if json {
        return match form {
            Form::Polish => print_json(&code.polish),
            Form::Pcode => print_json(&code.pcode),
            Form::Triples => print_json(&code.triples),
            Form::Quads => print_json(&code.quads),
            Form::All => print_json(&IrReport { code, peephole: &compilation.peephole }),
        };
    }

    if matches!(form, Form::Polish | Form::All) {
        print_section("Polish notation:", code.polish.iter());
    }
    if matches!(form, Form::Pcode | Form::All) {
        print_section("P-code:", code.pcode.iter());
    }
    if matches!(form, Form::Triples | Form::All) {
        print_section("Triples:", code.triples.iter());
    }
    if matches!(form, Form::Quads | Form::All) {
        print_section("Quadruples:", code.quads.iter());
    }
    if form == Form::All && config.pipeline.peephole {
        let peephole = &compilation.peephole;
        println!(
            "{} {} instruction(s) removed",
            "Peephole:".bold(),
            peephole.removed.len()
        );
        for line in &peephole.removed {
            println!("  {}", line.red());
        }
        println!();
        print_section("Optimized P-code:", peephole.code.iter());
    }
    Ok(())
}

fn print_section<T: std::fmt::Display>(title: &str, lines: impl Iterator<Item = T>) {
    println!("{}", title.bold());
    for line in lines {
        println!("  {}", line);
    }
    println!();
}

fn print_info() {
    println!("{}", "MCL - Modelo de Cálculo de Laboratorio".bold());
    println!();
    println!("A small language for chemistry-like computations with unit-checked substances.");
    println!();
    println!("{}", "Pipeline:".bold());
    println!("  MCL Source (.mcl)");
    println!("       ↓  lexer");
    println!("  Tokens");
    println!("       ↓  parser + semantic analyzer");
    println!("  AST + Symbol table");
    println!("       ↓  global optimizer");
    println!("  Polish / P-code / Triples / Quadruples");
    println!("       ↓  peephole optimizer");
    println!("  Optimized P-code");
    println!();
    println!("{}", "Reserved words:".bold());
    for (word, code) in RESERVED_WORDS {
        println!("  {:<12} {}", word.cyan(), code);
    }
    println!();
    println!("{}", "Units:".bold());
    for (unit, code) in UNITS {
        println!("  {:<12} {}", unit.cyan(), code);
    }
    println!();
    println!("{}", "Operators:".bold());
    for (op, code) in OPERATORS {
        println!("  {:<12} {}", op.cyan(), code);
    }
    for (word, op) in VERBAL_OPERATORS {
        println!("  {:<12} same as {}", word.cyan(), op);
    }
    println!();
    println!("{}", "Commands:".bold());
    println!("  mcl tokens program.mcl           # Token table");
    println!("  mcl check program.mcl -s         # Validate and show symbols");
    println!("  mcl ast program.mcl --optimized  # Tree after folding");
    println!("  mcl ir program.mcl -f pcode      # One intermediate form");
    println!("  mcl info                         # Show this info");
}
