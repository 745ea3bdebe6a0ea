//! phpi CLI

use clap::{Parser, Subcommand};
use phpi::interp::Interpreter;
use phpi::{Config, Request};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "phpi",
    version,
    about = "Tree-walking interpreter with PHP semantics",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Script to run when no subcommand is given
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Arguments passed to the script as $argv
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script (stdin when no file is given)
    Run {
        /// Script to run
        file: Option<PathBuf>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Production preset: report no diagnostics
        #[arg(long)]
        prod: bool,
        /// Query string decoded into $_GET
        #[arg(long, default_value = "")]
        query: String,
        /// Form-encoded body decoded into $_POST
        #[arg(long, default_value = "")]
        post: String,
        /// Cookie header decoded into $_COOKIE
        #[arg(long, default_value = "")]
        cookie: String,
        /// Arguments passed to the script as $argv
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Start the interactive shell
    Repl,
}

fn main() {
    phpi::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Run {
            file,
            config,
            prod,
            query,
            post,
            cookie,
            args,
        }) => {
            let request = Request {
                query_string: query,
                body: post,
                cookie,
                ..Request::from_cli(args)
            };
            run_script(file.as_deref(), config.as_deref(), prod, request)
        }
        Some(Command::Parse { file }) => parse_file(&file).map(|()| 0),
        Some(Command::Tokens { file }) => tokenize_file(&file).map(|()| 0),
        Some(Command::Repl) => start_repl().map(|()| 0),
        None => run_script(cli.file.as_deref(), None, false, Request::from_cli(cli.args)),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn read_source(path: Option<&Path>) -> std::io::Result<(String, String)> {
    match path {
        Some(path) => Ok((std::fs::read_to_string(path)?, path.display().to_string())),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok((source, "Standard input code".to_string()))
        }
    }
}

fn run_script(
    path: Option<&Path>,
    config: Option<&Path>,
    prod: bool,
    request: Request,
) -> Result<i32, Box<dyn std::error::Error>> {
    let (source, filename) = read_source(path)?;
    let mut config = match config {
        Some(config) => Config::load(config)?,
        None => Config::dev(),
    };
    if prod {
        config.error_reporting = Config::prod().error_reporting;
    }

    let mut interp = Interpreter::new(config.with_filename(filename), request);
    let (output, error) = interp.process(&source);

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if let Some(message) = error.as_ref().and_then(|err| interp.error_to_string(err)) {
        write!(stdout, "\n{message}\n")?;
    }
    stdout.flush()?;
    Ok((interp.exit_code() & 0xff) as i32)
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let report = |e: &phpi::CompileError| phpi::error::report_error(&filename, &source, e);

    let tokens = phpi::lexer::tokenize(&source).inspect_err(report)?;
    let ast = phpi::parser::parse(&filename, &source, tokens, &mut phpi::ast::NodeIdGen::new())
        .inspect_err(report)?;

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let report = |e: &phpi::CompileError| phpi::error::report_error(&filename, &source, e);

    let tokens = phpi::lexer::tokenize(&source).inspect_err(report)?;
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}

fn start_repl() -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = phpi::repl::Repl::new()?;
    repl.run()?;
    Ok(())
}
