//! Statement executor and expression evaluator

use super::access::{quiet_path, read_offset, read_path, unset_path, write_path};
use super::env::{call_env, EnvRef, Environment};
use super::error::{ControlFlow, Halt, InterpResult, PhpError, PhpResult};
use super::ops::{self, Warn};
use super::output::OutputBuffers;
use super::predefined;
use super::stdlib::{self, Context};
use super::validator::coerce_to;
use super::value::{Array, ArrayKey, Value};
use crate::ast::{
    BinOp, Callee, CastType, Expr, ForeachLoop, FunctionDef, IncludeKind, LineIndex, MagicConst,
    NodeId, NodeIdGen, Param, Program, Span, Spanned, Stmt, StrPart, VarName,
};
use crate::config::{Config, Request};
use crate::error::CompileError;
use crate::lexer::{self, Token};
use crate::parser;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

/// Stack growth parameters for deeply nested scripts
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// `include_path` reported in failed-include diagnostics
const INCLUDE_PATH: &str = ".";

type Tokenizer = fn(&str) -> crate::Result<Vec<(Token, Span)>>;

/// Script text whose code is running: names positions and `__FILE__`
#[derive(Debug)]
struct SourceFile {
    name: String,
    lines: LineIndex,
}

impl SourceFile {
    fn of(program: &Program) -> Rc<SourceFile> {
        Rc::new(SourceFile {
            name: program.filename.clone(),
            lines: program.lines.clone(),
        })
    }
}

/// Variable plus the subscripts applied to it; a `None` key is `[]`
#[derive(Debug)]
struct Place {
    name: String,
    keys: Vec<Option<Value>>,
    span: Span,
}

impl Place {
    /// Keys of a read; `[]` cannot be read
    fn read_keys(&self) -> PhpResult<Vec<Value>> {
        self.keys
            .iter()
            .map(|key| {
                key.clone()
                    .ok_or_else(|| PhpError::error("Uncaught Error: Cannot use [] for reading"))
            })
            .collect()
    }
}

/// `$name` or `$name[...]...`
fn is_place(expr: &Expr) -> bool {
    match expr {
        Expr::Variable(_) => true,
        Expr::Subscript { base, .. } => is_place(&base.node),
        _ => false,
    }
}

/// The interpreter
pub struct Interpreter {
    config: Config,
    global: EnvRef,
    /// Shared by every parse so node ids stay unique across REPL lines
    ids: NodeIdGen,
    /// Function definitions already registered
    defined: HashSet<NodeId>,
    output: OutputBuffers,
    error_reporting: i64,
    /// Nesting of `@`
    silence: u32,
    /// Current user-function call depth
    depth: usize,
    /// Loops enclosing the current statement within the current function
    loop_depth: u32,
    file: Rc<SourceFile>,
    /// File each user function was declared in
    function_files: HashMap<NodeId, Rc<SourceFile>>,
    /// Files run by `include`/`require`, for the `_once` forms
    included: HashSet<PathBuf>,
    exit_code: i64,
}

impl Interpreter {
    /// Create an interpreter with the native functions, predefined constants
    /// and superglobals registered
    pub fn new(config: Config, request: Request) -> Self {
        let mut global = Environment::new();
        stdlib::register(&mut global);
        predefined::register_constants(&mut global);
        predefined::register_variables(&mut global, &request, &config.filename);
        let file = Rc::new(SourceFile {
            name: config.filename.clone(),
            lines: LineIndex::default(),
        });
        Interpreter {
            error_reporting: config.error_reporting,
            config,
            global: global.into_ref(),
            ids: NodeIdGen::new(),
            defined: HashSet::new(),
            output: OutputBuffers::new(),
            silence: 0,
            depth: 0,
            loop_depth: 0,
            file,
            function_files: HashMap::new(),
            included: HashSet::new(),
            exit_code: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn global_env(&self) -> &EnvRef {
        &self.global
    }

    /// Exit code of the last run: the `exit` code, 255 after a fatal error
    pub fn exit_code(&self) -> i64 {
        self.exit_code
    }

    pub fn error_reporting(&self) -> i64 {
        self.error_reporting
    }

    pub fn set_error_reporting(&mut self, level: i64) {
        self.error_reporting = level;
    }

    pub fn output_mut(&mut self) -> &mut OutputBuffers {
        &mut self.output
    }

    /// Send script output to the active buffer
    pub fn print(&mut self, text: &str) {
        self.output.write(text);
    }

    /// `file:line:column` of a span in the running script
    pub fn position(&self, span: Span) -> String {
        let pos = self.file.lines.position(span.start);
        format!("{}:{}:{}", self.file.name, pos.line, pos.column)
    }

    /// Whether the current reporting mask lets `err` through
    pub fn is_reported(&self, err: &PhpError) -> bool {
        self.error_reporting & err.kind.level() != 0
    }

    /// Text of an error that ended a run, or `None` when it is masked
    pub fn error_to_string(&self, err: &PhpError) -> Option<String> {
        self.is_reported(err).then(|| err.to_string())
    }

    /// Report a non-fatal diagnostic inline with the script output
    pub fn warn(&mut self, err: PhpError, span: Span) {
        if self.silence > 0 || !self.is_reported(&err) {
            trace!(diagnostic = %err, "suppressed");
            return;
        }
        let text = format!("\n{err} in {}\n", self.position(span));
        self.output.write(&text);
    }

    fn emit(&mut self, warnings: Vec<PhpError>, span: Span) {
        for warning in warnings {
            self.warn(warning, span);
        }
    }

    /// Run `f` with a warning sink reporting at `span`
    fn collect<T>(&mut self, span: Span, f: impl FnOnce(&mut Warn<'_>) -> T) -> T {
        let mut warnings = Vec::new();
        let result = f(&mut |warning| warnings.push(warning));
        self.emit(warnings, span);
        result
    }

    /// Lex and parse a script
    pub fn compile(&mut self, source: &str) -> PhpResult<Program> {
        let filename = self.config.filename.clone();
        self.compile_as(source, &filename, lexer::tokenize)
    }

    /// Lex and parse `source`, naming `filename` in positions
    fn compile_as(&mut self, source: &str, filename: &str, tokenize: Tokenizer) -> PhpResult<Program> {
        let as_php_error = |err: CompileError| match err.span() {
            Some(span) => {
                let pos = LineIndex::new(source).position(span.start);
                PhpError::parse(format!(
                    "{} in {filename}:{}:{}",
                    err.message(),
                    pos.line,
                    pos.column
                ))
            }
            None => PhpError::parse(err.message()),
        };
        let tokens = tokenize(source).map_err(&as_php_error)?;
        parser::parse(filename, source, tokens, &mut self.ids).map_err(&as_php_error)
    }

    /// Compile and run `source`; returns everything the script printed and
    /// the error that stopped it, if any
    #[tracing::instrument(level = "debug", skip_all, fields(filename = %self.config.filename))]
    pub fn process(&mut self, source: &str) -> (String, Option<PhpError>) {
        let error = match self.compile(source) {
            Ok(program) => self.run(&program),
            Err(err) => {
                self.exit_code = 255;
                Some(err)
            }
        };
        (self.output.take_result(), error)
    }

    /// Execute a parsed program in the global scope
    pub fn run(&mut self, program: &Program) -> Option<PhpError> {
        debug!(statements = program.statements.len(), "executing program");
        self.file = SourceFile::of(program);
        self.depth = 0;
        self.loop_depth = 0;
        self.silence = 0;
        self.exit_code = 0;

        let global = Rc::clone(&self.global);
        if let Err(err) = self.hoist(&program.statements, &global) {
            self.exit_code = 255;
            return Some(err);
        }
        for stmt in &program.statements {
            match self.exec(stmt, &global) {
                Ok(ControlFlow::Normal) => {}
                Ok(_) => break,
                Err(Halt::Exit(code)) => {
                    debug!(code, "script exited");
                    self.exit_code = code;
                    break;
                }
                Err(Halt::Error(err)) => {
                    debug!(error = %err, "script aborted");
                    self.exit_code = 255;
                    return Some(err);
                }
            }
        }
        None
    }

    /// Register top-level function definitions before execution starts
    fn hoist(&mut self, stmts: &[Spanned<Stmt>], env: &EnvRef) -> PhpResult<()> {
        for stmt in stmts {
            match &stmt.node {
                Stmt::FunctionDef(def) => self.declare_function(def, env)?,
                Stmt::Block(inner) => self.hoist(inner, env)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_function(&mut self, def: &FunctionDef, env: &EnvRef) -> PhpResult<()> {
        if !self.defined.insert(def.id) {
            return Ok(());
        }
        debug!(function = %def.name.node, "registering function");
        self.function_files.insert(def.id, Rc::clone(&self.file));
        env.borrow_mut().define_function(Rc::new(def.clone()))
    }

    /// Run `f` with positions and `__FILE__` naming `file`
    fn in_file<T>(&mut self, file: Rc<SourceFile>, f: impl FnOnce(&mut Self) -> T) -> T {
        let caller = std::mem::replace(&mut self.file, file);
        let result = f(self);
        self.file = caller;
        result
    }

    /// Run an included or evaluated program in `env`, the scope of the
    /// code that pulled it in
    fn exec_program(&mut self, program: &Program, env: &EnvRef) -> InterpResult<ControlFlow> {
        self.in_file(SourceFile::of(program), |interp| {
            interp.hoist(&program.statements, env)?;
            let saved_loops = std::mem::replace(&mut interp.loop_depth, 0);
            let flow = interp.exec_block(&program.statements, env);
            interp.loop_depth = saved_loops;
            flow
        })
    }

    // ------------------------------------------------------------ Statements

    fn exec_block(&mut self, stmts: &[Spanned<Stmt>], env: &EnvRef) -> InterpResult<ControlFlow> {
        for stmt in stmts {
            match self.exec(stmt, env)? {
                ControlFlow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Normal)
    }

    fn exec(&mut self, stmt: &Spanned<Stmt>, env: &EnvRef) -> InterpResult<ControlFlow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.exec_inner(stmt, env))
    }

    fn exec_inner(&mut self, stmt: &Spanned<Stmt>, env: &EnvRef) -> InterpResult<ControlFlow> {
        match &stmt.node {
            Stmt::InlineHtml(text) => {
                self.print(text);
                Ok(ControlFlow::Normal)
            }

            Stmt::Echo(exprs) => {
                for expr in exprs {
                    let value = self.eval(expr, env)?;
                    let text = self.stringify(&value, expr.span);
                    self.print(&text);
                }
                Ok(ControlFlow::Normal)
            }

            Stmt::Expr(expr) => {
                self.eval(expr, env)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Block(stmts) => self.exec_block(stmts, env),

            Stmt::If { branches, else_branch } => {
                for branch in branches {
                    if self.eval(&branch.cond, env)?.to_bool() {
                        return self.exec(&branch.body, env);
                    }
                }
                match else_branch {
                    Some(body) => self.exec(body, env),
                    None => Ok(ControlFlow::Normal),
                }
            }

            Stmt::While(block) => self.in_loop(|interp| loop {
                if !interp.eval(&block.cond, env)?.to_bool() {
                    return Ok(ControlFlow::Normal);
                }
                let flow = interp.exec(&block.body, env)?;
                if let Some(exit) = loop_step(flow) {
                    return Ok(exit);
                }
            }),

            Stmt::DoWhile(block) => self.in_loop(|interp| loop {
                let flow = interp.exec(&block.body, env)?;
                if let Some(exit) = loop_step(flow) {
                    return Ok(exit);
                }
                if !interp.eval(&block.cond, env)?.to_bool() {
                    return Ok(ControlFlow::Normal);
                }
            }),

            Stmt::For { init, cond, step, body } => {
                for expr in init {
                    self.eval(expr, env)?;
                }
                self.in_loop(|interp| loop {
                    let mut proceed = true;
                    for expr in cond {
                        proceed = interp.eval(expr, env)?.to_bool();
                    }
                    if !proceed {
                        return Ok(ControlFlow::Normal);
                    }
                    let flow = interp.exec(body, env)?;
                    if let Some(exit) = loop_step(flow) {
                        return Ok(exit);
                    }
                    for expr in step {
                        interp.eval(expr, env)?;
                    }
                })
            }

            Stmt::Foreach(foreach) => self.foreach(foreach, env),

            Stmt::Break(levels) => {
                self.check_loop_levels("break", *levels)?;
                Ok(ControlFlow::Break(*levels))
            }

            Stmt::Continue(levels) => {
                self.check_loop_levels("continue", *levels)?;
                Ok(ControlFlow::Continue(*levels))
            }

            Stmt::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::Void,
                };
                Ok(ControlFlow::Return(value))
            }

            Stmt::FunctionDef(def) => {
                self.declare_function(def, env)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Const(items) => {
                for item in items {
                    let value = self.eval(&item.value, env)?;
                    let declared = env.borrow_mut().declare_constant(&item.name.node, value);
                    if let Err(warning) = declared {
                        self.warn(warning, item.name.span);
                    }
                }
                Ok(ControlFlow::Normal)
            }

            Stmt::Global(names) => {
                let mut scope = env.borrow_mut();
                for name in names {
                    scope.add_global(name.node.trim_start_matches('$'));
                }
                Ok(ControlFlow::Normal)
            }

            Stmt::Unset(targets) => {
                for target in targets {
                    self.unset(target, env)?;
                }
                Ok(ControlFlow::Normal)
            }

            Stmt::Empty => Ok(ControlFlow::Normal),
        }
    }

    /// Run a loop body with the loop counted for `break`/`continue` checks
    fn in_loop(
        &mut self,
        body: impl FnOnce(&mut Self) -> InterpResult<ControlFlow>,
    ) -> InterpResult<ControlFlow> {
        self.loop_depth += 1;
        let result = body(self);
        self.loop_depth -= 1;
        result
    }

    fn foreach(&mut self, foreach: &ForeachLoop, env: &EnvRef) -> InterpResult<ControlFlow> {
        let array = match self.eval(&foreach.subject, env)? {
            Value::Array(array) => array,
            other => {
                self.warn(
                    PhpError::warning(format!(
                        "foreach() argument must be of type array|object, {} given",
                        other.debug_type()
                    )),
                    foreach.subject.span,
                );
                return Ok(ControlFlow::Normal);
            }
        };
        self.in_loop(|interp| {
            for (key, value) in array.iter() {
                if let Some(target) = &foreach.key {
                    let place = interp.place(target, env)?;
                    interp.store(place, key.to_value(), env)?;
                }
                let place = interp.place(&foreach.value, env)?;
                interp.store(place, value.clone(), env)?;
                let flow = interp.exec(&foreach.body, env)?;
                if let Some(exit) = loop_step(flow) {
                    return Ok(exit);
                }
            }
            Ok(ControlFlow::Normal)
        })
    }

    fn check_loop_levels(&self, keyword: &str, levels: u32) -> PhpResult<()> {
        if self.loop_depth == 0 {
            return Err(PhpError::error(format!(
                "'{keyword}' not in the 'loop' or 'switch' context"
            )));
        }
        if levels > self.loop_depth {
            let plural = if levels == 1 { "" } else { "s" };
            return Err(PhpError::error(format!("Cannot '{keyword}' {levels} level{plural}")));
        }
        Ok(())
    }

    fn unset(&mut self, target: &Spanned<Expr>, env: &EnvRef) -> InterpResult<()> {
        if !is_place(&target.node) {
            return Err(PhpError::error("Cannot unset the result of an expression").into());
        }
        let place = self.place(target, env)?;
        if place.keys.is_empty() {
            env.borrow_mut().unset_variable(&place.name);
            return Ok(());
        }
        let keys = place.keys.iter().cloned().collect::<Option<Vec<_>>>().ok_or_else(|| {
            PhpError::error("Uncaught Error: Cannot use [] for unsetting")
        })?;
        if !env.borrow().is_defined(&place.name) {
            return Ok(());
        }
        env.borrow_mut()
            .with_variable_mut(&place.name, |slot| unset_path(slot, &keys))?;
        Ok(())
    }

    // ------------------------------------------------------------ Expressions

    /// Evaluate an expression with automatic stack growth for deep recursion
    pub fn eval(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr, env))
    }

    fn eval_inner(&mut self, expr: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        let span = expr.span;
        match &expr.node {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(n) => Ok(Value::Int(*n)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::str(s.as_str())),

            Expr::Interpolated(parts) => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StrPart::Lit(lit) => text.push_str(lit),
                        StrPart::Expr(inner) => {
                            let value = self.eval(inner, env)?;
                            text.push_str(&self.stringify(&value, inner.span));
                        }
                    }
                }
                Ok(Value::Str(text))
            }

            Expr::Array(items) => {
                let mut array = Array::new();
                for item in items {
                    match &item.key {
                        Some(key) => {
                            let key = self.eval(key, env)?;
                            let key = ArrayKey::from_value(&key)?;
                            let value = self.eval(&item.value, env)?;
                            array.insert(key, value);
                        }
                        None => {
                            let value = self.eval(&item.value, env)?;
                            if let Err(warning) = array.push(value) {
                                self.warn(warning, item.value.span);
                            }
                        }
                    }
                }
                Ok(Value::Array(array))
            }

            Expr::Variable(_) => {
                let place = self.place(expr, env)?;
                self.load(&place, env)
            }

            Expr::Subscript { base, index } => {
                if is_place(&expr.node) {
                    let place = self.place(expr, env)?;
                    return self.load(&place, env);
                }
                let Some(index) = index else {
                    return Err(PhpError::error("Uncaught Error: Cannot use [] for reading").into());
                };
                let container = self.eval(base, env)?;
                let key = self.eval(index, env)?;
                let mut warnings = Vec::new();
                let value = read_offset(&container, &key, &mut warnings);
                self.emit(warnings, span);
                Ok(value?)
            }

            Expr::Const(name) => {
                let value = env.borrow().lookup_constant(name);
                value.ok_or_else(|| PhpError::undefined_constant(name).into())
            }

            Expr::Magic(magic) => Ok(self.magic_constant(*magic, span, env)),

            Expr::Call { callee, args } => self.call(callee, args, span, env),

            Expr::Assign { target, value } => {
                let place = self.place(target, env)?;
                let value = self.eval(value, env)?;
                self.store(place, value.clone(), env)?;
                Ok(value)
            }

            Expr::CompoundAssign { op, target, value } => {
                let place = self.place(target, env)?;
                let current = self.load(&place, env)?;
                let rhs = self.eval(value, env)?;
                let result = self.binary(*op, &current, &rhs, span)?;
                self.store(place, result.clone(), env)?;
                Ok(result)
            }

            Expr::CoalesceAssign { target, value } => {
                if let Some(current) = self.quiet_value(target, env)? {
                    if !current.is_null() {
                        return Ok(current);
                    }
                }
                let place = self.place(target, env)?;
                let value = self.eval(value, env)?;
                self.store(place, value.clone(), env)?;
                Ok(value)
            }

            Expr::Ternary { cond, then_branch, else_branch } => {
                let cond_value = self.eval(cond, env)?;
                match (cond_value.to_bool(), then_branch) {
                    (true, Some(then_branch)) => self.eval(then_branch, env),
                    (true, None) => Ok(cond_value),
                    (false, _) => self.eval(else_branch, env),
                }
            }

            Expr::Coalesce { left, right } => match self.quiet_value(left, env)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => self.eval(right, env),
            },

            Expr::Binary { left, op: BinOp::And, right } => {
                let result = self.eval(left, env)?.to_bool() && self.eval(right, env)?.to_bool();
                Ok(Value::Bool(result))
            }

            Expr::Binary { left, op: BinOp::Or, right } => {
                let result = self.eval(left, env)?.to_bool() || self.eval(right, env)?.to_bool();
                Ok(Value::Bool(result))
            }

            Expr::Binary { left, op, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                self.binary(*op, &left, &right, span)
            }

            Expr::Unary { op, expr: operand } => {
                let value = self.eval(operand, env)?;
                let result = self.collect(span, |warn| ops::unary_op(*op, &value, warn));
                Ok(result?)
            }

            Expr::Cast { ty, expr: operand } => {
                let value = self.eval(operand, env)?;
                Ok(match ty {
                    CastType::Int => Value::Int(value.to_int()),
                    CastType::Float => Value::Float(value.to_float()),
                    CastType::String => Value::Str(self.stringify(&value, span)),
                    CastType::Bool => Value::Bool(value.to_bool()),
                    CastType::Array => Value::Array(value.to_array()),
                })
            }

            Expr::IncDec { op, prefix, target } => {
                let place = self.place(target, env)?;
                let old = self.load(&place, env)?;
                let new = ops::inc_dec(*op, &old)?;
                self.store(place, new.clone(), env)?;
                Ok(if *prefix { new } else { old })
            }

            Expr::Silence(inner) => {
                self.silence += 1;
                let result = self.eval(inner, env);
                self.silence -= 1;
                result
            }

            Expr::Print(inner) => {
                let value = self.eval(inner, env)?;
                let text = self.stringify(&value, inner.span);
                self.print(&text);
                Ok(Value::Int(1))
            }

            Expr::Isset(targets) => {
                for target in targets {
                    match self.quiet_value(target, env)? {
                        Some(value) if !value.is_null() => {}
                        _ => return Ok(Value::Bool(false)),
                    }
                }
                Ok(Value::Bool(true))
            }

            Expr::Empty(target) => {
                let value = self.quiet_value(target, env)?;
                Ok(Value::Bool(!value.is_some_and(|v| v.to_bool())))
            }

            Expr::Include { kind, path } => self.include(*kind, path, env),

            Expr::Eval(code) => {
                let value = self.eval(code, env)?;
                let code = self.stringify(&value, code.span);
                let line = self.file.lines.position(span.start).line;
                let filename = format!("{}({line}) : eval()'d code", self.file.name);
                let program = self.compile_as(&code, &filename, lexer::tokenize_code)?;
                Ok(match self.exec_program(&program, env)? {
                    ControlFlow::Return(Value::Void) => Value::Null,
                    ControlFlow::Return(value) => value,
                    _ => Value::Null,
                })
            }

            Expr::Exit(arg) => {
                let code = match arg {
                    None => 0,
                    Some(arg) => match self.eval(arg, env)? {
                        Value::Int(code) => code,
                        other => {
                            let text = self.stringify(&other, arg.span);
                            self.print(&text);
                            0
                        }
                    },
                };
                Err(Halt::Exit(code))
            }
        }
    }

    /// `include`, `require` and their `_once` forms
    fn include(&mut self, kind: IncludeKind, path: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Value> {
        let value = self.eval(path, env)?;
        let filename = self.stringify(&value, path.span);
        if filename.is_empty() {
            return Err(PhpError::error("Uncaught ValueError: Path cannot be empty").into());
        }
        let resolved = self.resolve_include(&filename);
        let key = resolved.canonicalize().unwrap_or_else(|_| resolved.clone());
        if kind.is_once() && self.included.contains(&key) {
            return Ok(Value::Bool(true));
        }
        let source = match std::fs::read_to_string(&resolved) {
            Ok(source) => source,
            Err(err) => {
                self.warn(
                    PhpError::warning(format!(
                        "{kind}({filename}): Failed to open stream: {}",
                        stream_error(&err)
                    )),
                    path.span,
                );
                if kind.is_require() {
                    return Err(PhpError::error(format!(
                        "Uncaught Error: Failed opening required '{filename}' (include_path='{INCLUDE_PATH}')"
                    ))
                    .into());
                }
                self.warn(
                    PhpError::warning(format!(
                        "{kind}(): Failed opening '{filename}' for inclusion (include_path='{INCLUDE_PATH}')"
                    )),
                    path.span,
                );
                return Ok(Value::Bool(false));
            }
        };
        debug!(file = %resolved.display(), %kind, "including file");
        self.included.insert(key);
        let program = self.compile_as(&source, &resolved.display().to_string(), lexer::tokenize)?;
        Ok(match self.exec_program(&program, env)? {
            ControlFlow::Return(Value::Void) => Value::Null,
            ControlFlow::Return(value) => value,
            _ => Value::Int(1),
        })
    }

    /// Relative paths are tried from the working directory, then from the
    /// directory of the including script
    fn resolve_include(&self, filename: &str) -> PathBuf {
        let path = Path::new(filename);
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        match Path::new(&self.file.name).parent() {
            Some(dir) if dir.join(path).exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn binary(&mut self, op: BinOp, left: &Value, right: &Value, span: Span) -> InterpResult<Value> {
        let result = self.collect(span, |warn| ops::binary_op(op, left, right, warn));
        Ok(result?)
    }

    /// String conversion for output; arrays warn
    fn stringify(&mut self, value: &Value, span: Span) -> String {
        self.collect(span, |warn| ops::stringify(value, warn))
    }

    fn magic_constant(&self, magic: MagicConst, span: Span, env: &EnvRef) -> Value {
        match magic {
            MagicConst::Line => Value::Int(self.file.lines.position(span.start).line as i64),
            MagicConst::File => Value::str(self.file.name.as_str()),
            MagicConst::Dir => {
                let dir = Path::new(&self.file.name)
                    .parent()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default();
                Value::Str(if dir.is_empty() { ".".to_string() } else { dir })
            }
            MagicConst::Function => {
                Value::str(env.borrow().function_name().unwrap_or_default())
            }
        }
    }

    // ------------------------------------------------------------ Variables

    fn var_name(&mut self, name: &VarName, span: Span, env: &EnvRef) -> InterpResult<String> {
        match name {
            VarName::Simple(name) => Ok(name.clone()),
            VarName::Dynamic(expr) => {
                let value = self.eval(expr, env)?;
                Ok(self.stringify(&value, span))
            }
        }
    }

    /// Resolve the variable and evaluate every subscript of a place expression
    fn place(&mut self, target: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Place> {
        match &target.node {
            Expr::Variable(name) => Ok(Place {
                name: self.var_name(name, target.span, env)?,
                keys: Vec::new(),
                span: target.span,
            }),
            Expr::Subscript { base, index } => {
                let mut place = self.place(base, env)?;
                let key = match index {
                    Some(index) => Some(self.eval(index, env)?),
                    None => None,
                };
                place.keys.push(key);
                Ok(place)
            }
            _ => Err(PhpError::error("Cannot assign to the result of an expression").into()),
        }
    }

    fn load(&mut self, place: &Place, env: &EnvRef) -> InterpResult<Value> {
        let keys = place.read_keys()?;
        let mut warnings = Vec::new();
        let found = env.borrow().with_variable(&place.name, |slot| {
            slot.map(|root| read_path(root, &keys, &mut warnings)).transpose()
        })?;
        let value = match found {
            Some(value) => value,
            None => {
                self.warn(
                    PhpError::warning(format!("Undefined variable ${}", place.name)),
                    place.span,
                );
                read_path(&Value::Null, &keys, &mut warnings)?
            }
        };
        self.emit(warnings, place.span);
        Ok(value)
    }

    fn store(&mut self, place: Place, value: Value, env: &EnvRef) -> InterpResult<()> {
        if place.keys.is_empty() {
            env.borrow_mut().declare_variable(&place.name, value);
            return Ok(());
        }
        let mut warnings = Vec::new();
        let result = env.borrow_mut().with_variable_mut(&place.name, |slot| {
            write_path(slot, &place.keys, value, &mut warnings)
        });
        self.emit(warnings, place.span);
        Ok(result?)
    }

    /// Value of `target` for `isset`, `empty` and `??`: missing variables,
    /// keys and offsets are `None`, and warnings inside the operand are
    /// suppressed
    fn quiet_value(&mut self, target: &Spanned<Expr>, env: &EnvRef) -> InterpResult<Option<Value>> {
        if is_place(&target.node) {
            let place = self.place(target, env)?;
            let keys = place.read_keys()?;
            return Ok(env
                .borrow()
                .with_variable(&place.name, |slot| slot.and_then(|root| quiet_path(root, &keys))));
        }
        match &target.node {
            Expr::Subscript { base, index: Some(index) } => {
                let container = self.quiet_value(base, env)?;
                let key = self.eval(index, env)?;
                Ok(container.and_then(|container| quiet_path(&container, std::slice::from_ref(&key))))
            }
            _ => {
                self.silence += 1;
                let value = self.eval(target, env);
                self.silence -= 1;
                Ok(Some(value?))
            }
        }
    }

    // ------------------------------------------------------------ Calls

    fn call(
        &mut self,
        callee: &Callee,
        args: &[Spanned<Expr>],
        span: Span,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let name = match callee {
            Callee::Name(name) => name.clone(),
            Callee::Dynamic(expr) => match self.eval(expr, env)? {
                Value::Str(name) => name,
                _ => return Err(PhpError::error("Uncaught Error: Value not callable").into()),
            },
        };
        if stdlib::takes_reference(&name) {
            return self.call_with_reference(&name, args, span, env);
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        self.call_function(&name, values, span, env)
    }

    /// Call a native whose first argument is a variable it may replace
    fn call_with_reference(
        &mut self,
        name: &str,
        args: &[Spanned<Expr>],
        span: Span,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let Some((first, rest)) = args.split_first() else {
            return self.call_function(name, Vec::new(), span, env);
        };
        if !is_place(&first.node) {
            return Err(PhpError::error(format!(
                "Uncaught Error: {name}(): Argument #1 ($array) could not be passed by reference"
            ))
            .into());
        }
        let place = self.place(first, env)?;
        let keys = place.read_keys()?;
        let current = env
            .borrow()
            .with_variable(&place.name, |slot| slot.and_then(|root| quiet_path(root, &keys)))
            .unwrap_or(Value::Null);
        let mut values = vec![current];
        for arg in rest {
            values.push(self.eval(arg, env)?);
        }
        let Some(native) = env.borrow().native_function(name) else {
            return Err(PhpError::undefined_function(name).into());
        };
        trace!(function = name, args = values.len(), "native call by reference");
        let mut ctx = Context::new(self, Rc::clone(env), span);
        let result = native(&mut ctx, values)?;
        if let Some(updated) = ctx.take_reference() {
            self.store(place, updated, env)?;
        }
        Ok(result)
    }

    /// Call a native or user function by name
    pub fn call_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
        span: Span,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let native = env.borrow().native_function(name);
        if let Some(native) = native {
            trace!(function = name, args = args.len(), "native call");
            let mut ctx = Context::new(self, Rc::clone(env), span);
            return Ok(native(&mut ctx, args)?);
        }
        let user = env.borrow().user_function(name);
        match user {
            Some(function) => self.call_user(&function, args),
            None => Err(PhpError::undefined_function(name).into()),
        }
    }

    fn call_user(&mut self, function: &FunctionDef, args: Vec<Value>) -> InterpResult<Value> {
        let name = function.name.node.as_str();
        if self.depth >= self.config.max_nesting_level {
            return Err(PhpError::error(format!(
                "Maximum function nesting level of '{}' reached, aborting!",
                self.config.max_nesting_level
            ))
            .into());
        }
        let required = function.required_params();
        if args.len() < required {
            let exact = required == function.params.len() && !function.is_variadic();
            let qualifier = if exact { "exactly" } else { "at least" };
            return Err(PhpError::argument_count(format!(
                "Too few arguments to function {name}(), {} passed and {qualifier} {required} expected",
                args.len()
            ))
            .into());
        }
        trace!(function = name, args = args.len(), depth = self.depth, "user call");

        let file = self
            .function_files
            .get(&function.id)
            .cloned()
            .unwrap_or_else(|| Rc::clone(&self.file));
        let outcome = self.in_file(file, |interp| interp.run_user(function, args));
        let returned = match outcome? {
            ControlFlow::Return(value) => value,
            _ => Value::Void,
        };
        Ok(check_return(function, returned)?)
    }

    /// Bind the arguments of a user call and run its body
    fn run_user(&mut self, function: &FunctionDef, args: Vec<Value>) -> InterpResult<ControlFlow> {
        let name = function.name.node.as_str();
        let local = call_env(&self.global, name);
        let mut args = args.into_iter();
        for (index, param) in function.params.iter().enumerate() {
            let value = if param.variadic {
                let mut rest = Array::new();
                for (offset, arg) in args.by_ref().enumerate() {
                    rest.push(bind_param(name, index + offset, param, arg)?)?;
                }
                Value::Array(rest)
            } else {
                match args.next() {
                    Some(arg) => bind_param(name, index, param, arg)?,
                    None => match &param.default {
                        Some(default) => self.eval(default, &local)?,
                        None => Value::Null,
                    },
                }
            };
            local
                .borrow_mut()
                .declare_variable(param.name.node.trim_start_matches('$'), value);
        }

        self.depth += 1;
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let outcome = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_block(&function.body, &local)
        });
        self.loop_depth = saved_loops;
        self.depth -= 1;
        outcome
    }
}

/// Coerce argument `index` (zero-based) to its declared type
fn bind_param(name: &str, index: usize, param: &Param, arg: Value) -> PhpResult<Value> {
    let Some(ty) = &param.ty else {
        return Ok(arg);
    };
    coerce_to(&arg, &ty.types).ok_or_else(|| {
        PhpError::type_error(format!(
            "{name}(): Argument #{} ({}) must be of type {ty}, {} given",
            index + 1,
            param.name.node,
            arg.debug_type()
        ))
    })
}

/// Text PHP's stream layer gives for a failed open
fn stream_error(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        _ => err.to_string(),
    }
}

/// What a loop does after one pass of its body: `None` keeps looping
fn loop_step(flow: ControlFlow) -> Option<ControlFlow> {
    match flow {
        ControlFlow::Normal | ControlFlow::Continue(1) => None,
        ControlFlow::Break(1) => Some(ControlFlow::Normal),
        ControlFlow::Break(n) => Some(ControlFlow::Break(n - 1)),
        ControlFlow::Continue(n) => Some(ControlFlow::Continue(n - 1)),
        ret @ ControlFlow::Return(_) => Some(ret),
    }
}

/// Check a returned value against the declared return type
fn check_return(function: &FunctionDef, value: Value) -> PhpResult<Value> {
    let name = &function.name.node;
    let Some(ty) = &function.ret_ty else {
        return Ok(if let Value::Void = value { Value::Null } else { value });
    };
    if ty.types.iter().any(|t| t == "void") {
        return Ok(Value::Null);
    }
    if let Value::Void = value {
        return Err(PhpError::type_error(format!(
            "{name}(): Return value must be of type {ty}, none returned"
        )));
    }
    coerce_to(&value, &ty.types).ok_or_else(|| {
        PhpError::type_error(format!(
            "{name}(): Return value must be of type {ty}, {} returned",
            value.debug_type()
        ))
    })
}
