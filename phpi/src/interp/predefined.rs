//! Predefined constants and superglobals of the root scope

use super::env::Environment;
use super::error::ERROR_LEVELS;
use super::form;
use super::value::{Array, ArrayKey, Value};
use crate::config::Request;
use std::f64::consts;

pub const PHP_VERSION: &str = "8.3.0";
pub const PHP_MAJOR_VERSION: i64 = 8;
pub const PHP_MINOR_VERSION: i64 = 3;
pub const PHP_RELEASE_VERSION: i64 = 0;

fn os_family() -> &'static str {
    match std::env::consts::OS {
        "windows" => "Windows",
        "macos" | "ios" => "Darwin",
        "linux" | "android" => "Linux",
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => "BSD",
        "solaris" | "illumos" => "Solaris",
        _ => "Unknown",
    }
}

fn php_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "WINNT",
        "macos" => "Darwin",
        "linux" => "Linux",
        "freebsd" => "FreeBSD",
        other => other,
    }
}

fn define(env: &mut Environment, name: &str, value: Value) {
    if let Err(err) = env.declare_constant(name, value) {
        tracing::warn!(constant = name, "{err}");
    }
}

/// Core, math and error-level constants
pub fn register_constants(env: &mut Environment) {
    define(env, "TRUE", Value::Bool(true));
    define(env, "FALSE", Value::Bool(false));
    define(env, "NULL", Value::Null);

    define(env, "PHP_VERSION", Value::str(PHP_VERSION));
    define(env, "PHP_MAJOR_VERSION", Value::Int(PHP_MAJOR_VERSION));
    define(env, "PHP_MINOR_VERSION", Value::Int(PHP_MINOR_VERSION));
    define(env, "PHP_RELEASE_VERSION", Value::Int(PHP_RELEASE_VERSION));
    define(env, "PHP_EXTRA_VERSION", Value::str(""));
    define(
        env,
        "PHP_VERSION_ID",
        Value::Int(PHP_MAJOR_VERSION * 10000 + PHP_MINOR_VERSION * 100 + PHP_RELEASE_VERSION),
    );
    define(env, "PHP_EOL", Value::str("\n"));
    define(env, "PHP_INT_MAX", Value::Int(i64::MAX));
    define(env, "PHP_INT_MIN", Value::Int(i64::MIN));
    define(env, "PHP_INT_SIZE", Value::Int(8));
    define(env, "PHP_FLOAT_EPSILON", Value::Float(f64::EPSILON));
    define(env, "PHP_FLOAT_MAX", Value::Float(f64::MAX));
    define(env, "PHP_FLOAT_MIN", Value::Float(f64::MIN_POSITIVE));
    define(env, "PHP_FLOAT_DIG", Value::Int(15));
    define(env, "PHP_OS", Value::str(php_os()));
    define(env, "PHP_OS_FAMILY", Value::str(os_family()));
    define(env, "DIRECTORY_SEPARATOR", Value::str(std::path::MAIN_SEPARATOR.to_string()));
    define(env, "NAN", Value::Float(f64::NAN));
    define(env, "INF", Value::Float(f64::INFINITY));

    let math = [
        ("M_PI", consts::PI),
        ("M_E", consts::E),
        ("M_LOG2E", consts::LOG2_E),
        ("M_LOG10E", consts::LOG10_E),
        ("M_LN2", consts::LN_2),
        ("M_LN10", consts::LN_10),
        ("M_PI_2", consts::FRAC_PI_2),
        ("M_PI_4", consts::FRAC_PI_4),
        ("M_1_PI", consts::FRAC_1_PI),
        ("M_2_PI", consts::FRAC_2_PI),
        ("M_2_SQRTPI", consts::FRAC_2_SQRT_PI),
        ("M_SQRT2", consts::SQRT_2),
        ("M_SQRT1_2", consts::FRAC_1_SQRT_2),
        ("M_SQRT3", 1.732_050_807_568_877_2),
        ("M_SQRTPI", 1.772_453_850_905_516),
        ("M_LNPI", 1.144_729_885_849_400_2),
        ("M_EULER", 0.577_215_664_901_532_9),
    ];
    for (name, value) in math {
        define(env, name, Value::Float(value));
    }
    define(env, "PHP_ROUND_HALF_UP", Value::Int(1));
    define(env, "PHP_ROUND_HALF_DOWN", Value::Int(2));
    define(env, "PHP_ROUND_HALF_EVEN", Value::Int(3));
    define(env, "PHP_ROUND_HALF_ODD", Value::Int(4));
    define(env, "COUNT_NORMAL", Value::Int(0));
    define(env, "COUNT_RECURSIVE", Value::Int(1));

    for (name, level) in ERROR_LEVELS {
        define(env, name, Value::Int(*level));
    }
}

fn pairs_to_array(pairs: &[(String, String)]) -> Array {
    pairs
        .iter()
        .map(|(key, value)| (ArrayKey::from_str_key(key), Value::str(value.as_str())))
        .collect()
}

/// `$_SERVER` for a command-line run of `filename`
fn server_array(request: &Request, filename: &str) -> Array {
    let now = chrono::Utc::now();
    let mut server = pairs_to_array(&request.env);

    let argv = Array::from_list(
        std::iter::once(Value::str(filename))
            .chain(request.args.iter().map(|arg| Value::str(arg.as_str()))),
    );
    let argc = argv.len() as i64;

    let entries = [
        ("PHP_SELF", Value::str(filename)),
        ("SCRIPT_NAME", Value::str(filename)),
        ("SCRIPT_FILENAME", Value::str(filename)),
        ("PATH_TRANSLATED", Value::str(filename)),
        ("DOCUMENT_ROOT", Value::str("")),
        ("QUERY_STRING", Value::str(request.query_string.as_str())),
        ("REQUEST_TIME_FLOAT", Value::Float(now.timestamp_micros() as f64 / 1e6)),
        ("REQUEST_TIME", Value::Int(now.timestamp())),
        ("argv", Value::Array(argv)),
        ("argc", Value::Int(argc)),
    ];
    for (key, value) in entries {
        server.insert(ArrayKey::from(key), value);
    }
    for (key, value) in &request.server {
        server.insert(ArrayKey::from_str_key(key), Value::str(value.as_str()));
    }
    server
}

/// Superglobals plus the global `$argv`/`$argc`
pub fn register_variables(env: &mut Environment, request: &Request, filename: &str) {
    let get = form::parse_query(&request.query_string);
    let post = form::parse_query(&request.body);
    let cookies = form::parse_cookies(&request.cookie);

    let mut merged = get.clone();
    for (key, value) in post.iter().chain(cookies.iter()) {
        merged.insert(key.clone(), value.clone());
    }

    let server = server_array(request, filename);
    let argv = server.get(&ArrayKey::from("argv")).cloned().unwrap_or_default();
    let argc = server.get(&ArrayKey::from("argc")).cloned().unwrap_or_default();

    env.declare_variable("_GET", Value::Array(get));
    env.declare_variable("_POST", Value::Array(post));
    env.declare_variable("_COOKIE", Value::Array(cookies));
    env.declare_variable("_REQUEST", Value::Array(merged));
    env.declare_variable("_ENV", Value::Array(pairs_to_array(&request.env)));
    env.declare_variable("_FILES", Value::Array(Array::new()));
    env.declare_variable("_SERVER", Value::Array(server));
    env.declare_variable("argv", argv);
    env.declare_variable("argc", argc);
}
