//! Interactive shell
//!
//! Each line runs as its own script against one persistent interpreter,
//! so variables, constants and functions carry over between lines.

use crate::config::{Config, Request};
use crate::interp::Interpreter;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "php > ";
const HISTORY_FILE: &str = ".phpi_history";
const FILENAME: &str = "php shell code";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    interpreter: Interpreter,
    history_path: Option<PathBuf>,
}

impl Repl {
    pub fn new() -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let interpreter = shell_interpreter();
        let history_path = dirs_home().map(|h| h.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            interpreter,
            history_path,
        };
        if let Some(ref path) = repl.history_path {
            let _ = repl.editor.load_history(path);
        }
        Ok(repl)
    }

    pub fn run(&mut self) -> RlResult<()> {
        println!("phpi interactive shell (PHP {})", crate::interp::PHP_VERSION);
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }
                    print!("{}", eval_line(&mut self.interpreter, line));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(ref path) = self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    /// Handle `:` commands; true means quit
    fn handle_command(&mut self, cmd: &str) -> bool {
        match cmd {
            ":quit" | ":q" | ":exit" => {
                println!("Goodbye!");
                true
            }
            ":help" | ":h" | ":?" => {
                print_help();
                false
            }
            ":clear" => {
                print!("\x1B[2J\x1B[1;1H");
                false
            }
            ":reset" => {
                self.interpreter = shell_interpreter();
                false
            }
            _ => {
                println!("Unknown command: {cmd}");
                println!("Type :help for help.");
                false
            }
        }
    }
}

fn shell_interpreter() -> Interpreter {
    Interpreter::new(Config::dev().with_filename(FILENAME), Request::from_cli(Vec::new()))
}

fn print_help() {
    println!("Commands:");
    println!("  :help, :h, :?   Show this help");
    println!("  :quit, :q       Exit the shell");
    println!("  :clear          Clear the screen");
    println!("  :reset          Forget all variables, constants and functions");
    println!();
    println!("Any other line runs as PHP code, e.g.");
    println!("  $x = [1, 2, 3]; echo count($x)");
    println!("  function twice($n) {{ return $n * 2; }}");
    println!("  var_dump(twice(21))");
}

/// Run one line and render what it printed, plus the fatal error if any.
/// A missing trailing `;` is supplied.
fn eval_line(interpreter: &mut Interpreter, line: &str) -> String {
    let terminator = if line.ends_with(';') || line.ends_with('}') { "" } else { ";" };
    let (mut output, error) = interpreter.process(&format!("<?php {line}{terminator}"));
    if let Some(message) = error.as_ref().and_then(|err| interpreter.error_to_string(err)) {
        output.push_str(&format!("\n{message}\n"));
    }
    if !output.is_empty() && !output.ends_with('\n') {
        output.push('\n');
    }
    output
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
}
