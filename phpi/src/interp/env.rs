//! Scopes: variables, constants and the function registries
//!
//! A function call gets a fresh environment parented to the global one.
//! Superglobals and names imported with `global` live in the root scope;
//! every other variable is local. Constants and functions are always stored
//! in the root.

use super::error::{PhpError, PhpResult};
use super::stdlib::NativeFn;
use super::Value;
use crate::ast::FunctionDef;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Shared reference to an environment
pub type EnvRef = Rc<RefCell<Environment>>;

/// Variables visible from every scope without a `global` declaration
pub const SUPERGLOBALS: &[&str] = &[
    "_GET", "_POST", "_COOKIE", "_REQUEST", "_ENV", "_SERVER", "_FILES",
];

pub fn is_superglobal(name: &str) -> bool {
    SUPERGLOBALS.contains(&name)
}

/// One scope of the chain
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvRef>,
    /// Variables by name (without the `$` sigil)
    variables: HashMap<String, Value>,
    /// Names bound to the root scope by `global`
    globals: HashSet<String>,
    constants: HashMap<String, Value>,
    /// Keyed by lower-cased name
    functions: HashMap<String, Rc<FunctionDef>>,
    /// Keyed by lower-cased name
    native_functions: HashMap<String, NativeFn>,
    /// Name of the user function this scope belongs to
    function_name: Option<String>,
}

impl Environment {
    /// Create the global environment
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create the environment of a call to `function_name`
    pub fn for_call(parent: EnvRef, function_name: &str) -> Self {
        Environment {
            parent: Some(parent),
            function_name: Some(function_name.to_string()),
            ..Environment::default()
        }
    }

    /// Wrap in Rc<RefCell<>>
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    /// Scope that stores `name` when it is not this one
    fn delegate(&self, name: &str) -> Option<&EnvRef> {
        let parent = self.parent.as_ref()?;
        (is_superglobal(name) || self.globals.contains(name)).then_some(parent)
    }

    // ------------------------------------------------------------ Variables

    pub fn lookup_variable(&self, name: &str) -> Option<Value> {
        self.with_variable(name, |slot| slot.cloned())
    }

    /// Run `f` on the storage of `name` without copying it
    pub fn with_variable<R>(&self, name: &str, f: impl FnOnce(Option<&Value>) -> R) -> R {
        match self.delegate(name) {
            Some(parent) => parent.borrow().with_variable(name, f),
            None => f(self.variables.get(name)),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        match self.delegate(name) {
            Some(parent) => parent.borrow().is_defined(name),
            None => self.variables.contains_key(name),
        }
    }

    pub fn declare_variable(&mut self, name: &str, value: Value) {
        match self.delegate(name) {
            Some(parent) => parent.borrow_mut().declare_variable(name, value),
            None => {
                self.variables.insert(name.to_string(), value);
            }
        }
    }

    /// Run `f` on the storage of `name`, creating it as `null` when missing
    pub fn with_variable_mut<R>(&mut self, name: &str, f: impl FnOnce(&mut Value) -> R) -> R {
        match self.delegate(name) {
            Some(parent) => {
                let parent = Rc::clone(parent);
                let mut scope = parent.borrow_mut();
                scope.with_variable_mut(name, f)
            }
            None => f(self.variables.entry(name.to_string()).or_insert(Value::Null)),
        }
    }

    /// Remove a variable; a `global` import only loses its local binding
    pub fn unset_variable(&mut self, name: &str) {
        if self.globals.remove(name) {
            return;
        }
        match self.delegate(name) {
            Some(parent) => parent.borrow_mut().unset_variable(name),
            None => {
                self.variables.remove(name);
            }
        }
    }

    /// `global $name`: no effect in the global scope itself
    pub fn add_global(&mut self, name: &str) {
        if self.parent.is_some() {
            self.globals.insert(name.to_string());
        }
    }

    // ------------------------------------------------------------ Constants

    pub fn declare_constant(&mut self, name: &str, value: Value) -> PhpResult<()> {
        if let Some(parent) = &self.parent {
            return parent.borrow_mut().declare_constant(name, value);
        }
        if self.constants.contains_key(name) {
            return Err(PhpError::warning(format!("Constant {name} already defined")));
        }
        self.constants.insert(name.to_string(), value);
        Ok(())
    }

    pub fn lookup_constant(&self, name: &str) -> Option<Value> {
        match &self.parent {
            Some(parent) => parent.borrow().lookup_constant(name),
            None => self.constants.get(name).cloned(),
        }
    }

    // ------------------------------------------------------------ Functions

    pub fn register_native(&mut self, name: &str, function: NativeFn) {
        self.native_functions.insert(name.to_lowercase(), function);
    }

    pub fn native_function(&self, name: &str) -> Option<NativeFn> {
        match &self.parent {
            Some(parent) => parent.borrow().native_function(name),
            None => self.native_functions.get(&name.to_lowercase()).copied(),
        }
    }

    pub fn define_function(&mut self, function: Rc<FunctionDef>) -> PhpResult<()> {
        if let Some(parent) = &self.parent {
            return parent.borrow_mut().define_function(function);
        }
        let key = function.name.node.to_lowercase();
        if self.native_functions.contains_key(&key) || self.functions.contains_key(&key) {
            return Err(PhpError::error(format!(
                "Cannot redeclare {}()",
                function.name.node
            )));
        }
        self.functions.insert(key, function);
        Ok(())
    }

    pub fn user_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        match &self.parent {
            Some(parent) => parent.borrow().user_function(name),
            None => self.functions.get(&name.to_lowercase()).cloned(),
        }
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.native_function(name).is_some() || self.user_function(name).is_some()
    }
}

/// Create the scope of a user-function call, parented to `global`
pub fn call_env(global: &EnvRef, function_name: &str) -> EnvRef {
    Environment::for_call(Rc::clone(global), function_name).into_ref()
}
