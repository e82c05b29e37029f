//! Snake Compiler
//!
//! Compiles Snake programs to Python and runs them.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{self, Command};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::debug;

use snake::backend::{CodeGen, PythonCodeGen};
use snake::{compile_with, CompileOptions, Diagnostic, DiagnosticReport};

/// Snake Compiler
#[derive(Parser, Debug)]
#[command(name = "snakec")]
#[command(version)]
#[command(about = "Snake compiler - a statically typed superset of Python")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file to compile and run
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Arguments passed to the program
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(clap::Args, Debug, Clone)]
struct CommonArgs {
    /// Library directory, searched before the default roots
    #[arg(short = 'L', long = "lib-path", value_name = "DIR", env = "SNAKE_PATH", value_delimiter = ':', global = true)]
    lib_path: Vec<PathBuf>,

    /// Python interpreter used by `run`
    #[arg(long, value_name = "PATH", env = "SNAKE_PYTHON", default_value = "python3", global = true)]
    python: String,

    /// Print diagnostics as a JSON report
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and run a source file
    Run {
        input: PathBuf,

        /// Arguments passed to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Compile a source file to Python
    Build {
        input: PathBuf,

        /// Output file (defaults to FILE with a .py extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a source file for errors
    Check {
        input: PathBuf,
    },
    /// Print version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match dispatch(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Run the selected command, returning the process exit status
fn dispatch(cli: &Cli) -> Result<i32> {
    let common = &cli.common;
    match &cli.command {
        Some(Commands::Run { input, args }) => run_file(input, args, common),
        Some(Commands::Build { input, output }) => build_file(input, output.as_deref(), common),
        Some(Commands::Check { input }) => check_file(input, common),
        Some(Commands::Version) => {
            println!("snakec {}", env!("CARGO_PKG_VERSION"));
            println!("Snake Compiler");
            println!("License: {}", env!("CARGO_PKG_LICENSE"));
            Ok(0)
        }
        None => match &cli.input {
            Some(input) => run_file(input, &cli.args, common),
            None => {
                eprintln!("error: no input file specified");
                eprintln!("Usage: snakec <FILE> [ARGS]... or snakec build <FILE>");
                Ok(1)
            }
        },
    }
}

fn options(common: &CommonArgs, program_name: Option<String>) -> CompileOptions {
    let mut search_roots = common.lib_path.clone();
    search_roots.extend(CompileOptions::default_roots());
    debug!("library roots: {:?}", search_roots);
    CompileOptions { search_roots, program_name }
}

/// Compile, printing diagnostics on failure
fn compile(input: &Path, options: &CompileOptions, common: &CommonArgs) -> Option<String> {
    match compile_with(input, options) {
        Ok(source) => {
            if common.json {
                println!("{}", DiagnosticReport::new(input.display().to_string(), Vec::new()).to_json());
            }
            Some(source)
        }
        Err(diagnostics) => {
            report(input, diagnostics, common.json);
            None
        }
    }
}

fn report(input: &Path, diagnostics: Vec<Diagnostic>, json: bool) {
    if json {
        println!("{}", DiagnosticReport::new(input.display().to_string(), diagnostics).to_json());
        return;
    }
    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }
    eprintln!("error: could not compile {} ({} error(s))", input.display(), diagnostics.len());
}

fn run_file(input: &Path, args: &[String], common: &CommonArgs) -> Result<i32> {
    let options = options(common, Some(input.display().to_string()));
    let Some(source) = compile(input, &options, common) else {
        return Ok(1);
    };

    debug!("running {} under {}", input.display(), common.python);
    let status = Command::new(&common.python)
        .arg("-c")
        .arg(&source)
        .args(args)
        .status()
        .with_context(|| format!("failed to start Python interpreter '{}'", common.python))?;
    Ok(status.code().unwrap_or(1))
}

fn build_file(input: &Path, output: Option<&Path>, common: &CommonArgs) -> Result<i32> {
    let options = options(common, None);
    let Some(source) = compile(input, &options, common) else {
        return Ok(1);
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(PythonCodeGen::default().extension()));
    fs::write(&output, source).with_context(|| format!("failed to write {}", output.display()))?;
    if !common.json {
        println!("Generated: {}", output.display());
    }
    Ok(0)
}

fn check_file(input: &Path, common: &CommonArgs) -> Result<i32> {
    let options = options(common, None);
    if compile(input, &options, common).is_none() {
        return Ok(1);
    }
    if !common.json {
        println!("{}: no errors found", input.display());
    }
    Ok(0)
}
