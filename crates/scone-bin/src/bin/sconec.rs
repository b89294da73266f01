use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use petgraph::dot::Dot;
use scone::{
    codegen::bytecode::Program,
    parser::lr_table::{ConflictPolicy, TableOptions},
    runtime::machine::{Machine, MachineOptions, DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STACK_SLOTS},
    Compiler,
};

#[derive(Parser)]
#[command(name = "sconec", version, about = "Compiler and bytecode interpreter for the scone language")]
struct Cli {
    /// Log more; repeat for more detail (RUST_LOG overrides)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Fail when the parse tables have a conflict instead of keeping the last action
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and execute a source file
    Run {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Compile a source file to bytecode
    Compile {
        file: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Execute a bytecode file
    Exec {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Print the instructions of a bytecode file
    Disasm { file: PathBuf },
    /// Print the grammar productions
    Grammar {
        #[arg(long)]
        first: bool,
        #[arg(long)]
        follow: bool,
    },
    /// Print the canonical LR(1) item sets
    States {
        /// Print the goto graph in graphviz format instead
        #[arg(long)]
        dot: bool,
    },
    /// Print the action and goto tables
    Tables {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct Limits {
    #[arg(long, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
    /// Largest value stack the machine may allocate, in slots
    #[arg(long, default_value_t = DEFAULT_MAX_STACK_SLOTS)]
    max_stack_slots: usize,
}

impl From<Limits> for MachineOptions {
    fn from(limits: Limits) -> Self {
        MachineOptions {
            max_call_depth: limits.max_call_depth,
            max_stack_slots: limits.max_stack_slots,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = TableOptions {
        conflict_policy: if cli.strict {
            ConflictPolicy::Reject
        } else {
            ConflictPolicy::Overwrite
        },
    };

    match cli.command {
        Command::Run { file, limits } => {
            let compiler = build(&options)?;
            let program = compile(&compiler, &file)?;
            execute(&program, limits.into())
        }
        Command::Compile { file, output } => {
            let compiler = build(&options)?;
            let program = compile(&compiler, &file)?;
            let output = output.unwrap_or_else(|| file.with_extension("scb"));
            let bytes = program.to_bytes()?;
            fs::write(&output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
            info!("wrote {} instructions to {}", program.code.len(), output.display());
            Ok(())
        }
        Command::Exec { file, limits } => {
            let program = load(&file)?;
            execute(&program, limits.into())
        }
        Command::Disasm { file } => {
            let program = load(&file)?;
            print!("{}", program);
            Ok(())
        }
        Command::Grammar { first, follow } => {
            let compiler = build(&options)?;
            let grammar = compiler.grammar();
            print!("{}", grammar);

            for nonterminal in grammar.nonterminals() {
                let name = grammar.symbol_name(nonterminal);
                if first {
                    if let Some(set) = compiler.first_sets().get(nonterminal) {
                        let names: Vec<String> = set.iter().map(|symbol| grammar.symbol_name(symbol)).collect();
                        println!("FIRST({}) = {{ {} }}", name, names.join(", "));
                    }
                }
                if follow {
                    if let Some(set) = compiler.follow_sets().get(nonterminal) {
                        let names: Vec<String> = set.iter().map(|symbol| grammar.symbol_name(symbol)).collect();
                        println!("FOLLOW({}) = {{ {} }}", name, names.join(", "));
                    }
                }
            }
            Ok(())
        }
        Command::States { dot } => {
            let compiler = build(&options)?;
            let grammar = compiler.grammar();
            let collection = compiler.collection();
            if dot {
                println!("{}", Dot::new(&collection.to_graph(grammar)));
            } else {
                for (state, items) in collection.states() {
                    println!("state {}:", state);
                    for item in items.iter() {
                        println!("    {}", item.display(grammar));
                    }
                }
            }
            Ok(())
        }
        Command::Tables { json } => {
            let compiler = build(&options)?;
            if json {
                let out = serde_json::to_string_pretty(compiler.tables())?;
                println!("{}", out);
            } else {
                print!("{}", compiler.tables().display(compiler.grammar()));
            }
            Ok(())
        }
    }
}

fn build(options: &TableOptions) -> Result<Compiler> {
    let now = Instant::now();
    let compiler = Compiler::with_options(options).context("failed to build the scone parser")?;
    info!(
        "built {} parser states in {:.2?}",
        compiler.tables().n_states(),
        now.elapsed()
    );
    Ok(compiler)
}

fn compile(compiler: &Compiler, file: &Path) -> Result<Program> {
    let source = fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let now = Instant::now();
    let program = compiler
        .compile(&source)
        .with_context(|| format!("failed to compile {}", file.display()))?;
    info!("compiled {} in {:.2?}", file.display(), now.elapsed());
    Ok(program)
}

fn load(file: &Path) -> Result<Program> {
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    Program::from_bytes(&bytes).with_context(|| format!("{} is not a valid bytecode file", file.display()))
}

fn execute(program: &Program, options: MachineOptions) -> Result<()> {
    let stdout = io::stdout().lock();
    let mut machine = Machine::with_options(program, options, stdout);
    let now = Instant::now();
    let result = machine.run();
    info!("executed in {:.2?}", now.elapsed());
    result.with_context(|| format!("runtime error at instruction {}", machine.pc()))?;
    machine.into_output().flush()?;
    Ok(())
}
