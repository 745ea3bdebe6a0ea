//! Runtime values for the interpreter

use super::error::PhpError;
use indexmap::IndexMap;
use std::fmt;

/// Runtime value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Result of evaluating something that produces no value (statements,
    /// functions without `return`)
    #[default]
    Void,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Array),
}

/// Canonical array key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    /// Canonicalize a string key: decimal integer literals collapse to ints
    pub fn from_str_key(s: &str) -> ArrayKey {
        if is_decimal_integer(s) {
            if let Ok(n) = s.parse::<i64>() {
                return ArrayKey::Int(n);
            }
        }
        ArrayKey::Str(s.to_string())
    }

    /// Canonicalize any value used as a key
    pub fn from_value(value: &Value) -> Result<ArrayKey, PhpError> {
        match value {
            Value::Int(n) => Ok(ArrayKey::Int(*n)),
            Value::Str(s) => Ok(ArrayKey::from_str_key(s)),
            Value::Bool(b) => Ok(ArrayKey::Int(*b as i64)),
            Value::Float(f) => Ok(ArrayKey::Int(float_to_int(*f))),
            Value::Null | Value::Void => Ok(ArrayKey::Str(String::new())),
            Value::Array(_) => Err(PhpError::error("Uncaught TypeError: Illegal offset type")),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(n) => Value::Int(*n),
            ArrayKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(n) => write!(f, "{n}"),
            ArrayKey::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(n: i64) -> Self {
        ArrayKey::Int(n)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_str_key(s)
    }
}

/// `^(0|-?[1-9][0-9]*)$`
fn is_decimal_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    match digits.as_bytes() {
        [] => false,
        [b'0'] => digits.len() == s.len(),
        [first, rest @ ..] => {
            (b'1'..=b'9').contains(first) && rest.iter().all(u8::is_ascii_digit)
        }
    }
}

/// Ordered map with canonical keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    entries: IndexMap<ArrayKey, Value>,
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list with keys 0..n
    pub fn from_list(values: impl IntoIterator<Item = Value>) -> Self {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (ArrayKey::Int(i as i64), v))
            .collect();
        Array { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Storage for `key`, created as `null` at the end when missing
    pub fn entry_or_null(&mut self, key: ArrayKey) -> &mut Value {
        self.entries.entry(key).or_insert(Value::Null)
    }

    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite; a new key goes to the end, an existing one keeps its place
    pub fn insert(&mut self, key: ArrayKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Key the append form `$a[] = v` would use: one past the largest integer
    /// key, or 0 when there is none
    pub fn next_index(&self) -> Result<i64, PhpError> {
        let max = self
            .entries
            .keys()
            .filter_map(|k| match k {
                ArrayKey::Int(n) => Some(*n),
                ArrayKey::Str(_) => None,
            })
            .max();
        match max {
            None => Ok(0),
            Some(n) if n < 0 => Ok(0),
            Some(n) => n.checked_add(1).ok_or_else(|| {
                PhpError::warning(
                    "Cannot add element to the array as the next element is already occupied",
                )
            }),
        }
    }

    /// Append under [`Array::next_index`] and return the key used
    pub fn push(&mut self, value: Value) -> Result<ArrayKey, PhpError> {
        let key = ArrayKey::Int(self.next_index()?);
        self.entries.insert(key.clone(), value);
        Ok(key)
    }

    pub fn remove(&mut self, key: &ArrayKey) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArrayKey> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayKey, &Value)> {
        self.entries.iter()
    }

    /// Same keys in the same order with recursively identical values
    pub fn identical(&self, other: &Array) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
    }
}

impl FromIterator<(ArrayKey, Value)> for Array {
    fn from_iter<I: IntoIterator<Item = (ArrayKey, Value)>>(iter: I) -> Self {
        Array {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Result of numeric string conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    pub fn to_value(self) -> Value {
        match self {
            Numeric::Int(n) => Value::Int(n),
            Numeric::Float(f) => Value::Float(f),
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Int(n) => n as f64,
            Numeric::Float(f) => f,
        }
    }
}

fn is_php_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Scan leading whitespace plus the longest numeric prefix; returns the value
/// and the number of bytes consumed
fn scan_numeric_prefix(s: &str) -> Option<(Numeric, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && is_php_whitespace(bytes[i]) {
        i += 1;
    }
    let start = i;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;

    let mut is_float = false;
    let mut frac_digits = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        frac_digits = j - i - 1;
        if int_digits > 0 || frac_digits > 0 {
            is_float = true;
            i = j;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            is_float = true;
            i = j;
        }
    }

    let text = &s[start..i];
    let number = if is_float {
        Numeric::Float(text.parse().ok()?)
    } else {
        match text.parse::<i64>() {
            Ok(n) => Numeric::Int(n),
            Err(_) => Numeric::Float(text.parse().ok()?),
        }
    };
    Some((number, i))
}

/// Parse a fully numeric string (surrounding whitespace allowed)
pub fn parse_numeric(s: &str) -> Option<Numeric> {
    let (number, consumed) = scan_numeric_prefix(s)?;
    s.as_bytes()[consumed..]
        .iter()
        .all(|b| is_php_whitespace(*b))
        .then_some(number)
}

/// Parse the numeric prefix of a string (`"12abc"` is 12); non-numeric is 0
pub fn parse_leading_numeric(s: &str) -> Numeric {
    scan_numeric_prefix(s)
        .map(|(number, _)| number)
        .unwrap_or(Numeric::Int(0))
}

/// Float to int conversion: truncation toward zero, modular outside the i64
/// range, NaN and infinities are 0
pub fn float_to_int(f: f64) -> i64 {
    if !f.is_finite() {
        return 0;
    }
    let truncated = f.trunc();
    if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        return truncated as i64;
    }
    let modulus = 18_446_744_073_709_551_616.0;
    (truncated.rem_euclid(modulus) as u64) as i64
}

/// Format a float the way PHP prints it. `precision` is the number of
/// significant digits (`Some(14)` for echo/strval); `None` is the shortest
/// round-trip form used by var_dump and var_export.
pub fn format_float(f: f64, precision: Option<usize>) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = match precision {
        Some(p) => format!("{:.*e}", p.saturating_sub(1), f.abs()),
        None => format!("{:e}", f.abs()),
    };
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let sign = if f < 0.0 { "-" } else { "" };
    let threshold = precision.unwrap_or(15) as i32;
    if exp < -4 || exp >= threshold {
        let (first, rest) = digits.split_at(1);
        let rest = if rest.is_empty() { "0" } else { rest };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{first}.{rest}E{exp_sign}{}", exp.abs());
    }

    if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        return format!("{sign}0.{zeros}{digits}");
    }
    let int_len = exp as usize + 1;
    if digits.len() <= int_len {
        let zeros = "0".repeat(int_len - digits.len());
        format!("{sign}{digits}{zeros}")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{sign}{int_part}.{frac_part}")
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into())
    }

    /// Boolean conversion
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Void | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::Array(a) => !a.is_empty(),
        }
    }

    /// Integer conversion
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Void | Value::Null => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(n) => *n,
            Value::Float(f) => float_to_int(*f),
            Value::Str(s) => match parse_leading_numeric(s) {
                Numeric::Int(n) => n,
                Numeric::Float(f) => float_to_int(f),
            },
            Value::Array(a) => !a.is_empty() as i64,
        }
    }

    /// Float conversion
    pub fn to_float(&self) -> f64 {
        match self {
            Value::Void | Value::Null => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(n) => *n as f64,
            Value::Float(f) => *f,
            Value::Str(s) => parse_leading_numeric(s).as_f64(),
            Value::Array(a) => !a.is_empty() as i64 as f64,
        }
    }

    /// Number conversion used by arithmetic: keeps ints as ints
    pub fn to_number(&self) -> Numeric {
        match self {
            Value::Float(f) => Numeric::Float(*f),
            Value::Str(s) => parse_leading_numeric(s),
            other => Numeric::Int(other.to_int()),
        }
    }

    /// String conversion (echo, concatenation, strval)
    pub fn to_php_string(&self) -> String {
        match self {
            Value::Void | Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format_float(*f, Some(14)),
            Value::Str(s) => s.clone(),
            Value::Array(_) => "Array".to_string(),
        }
    }

    /// Array conversion used by `(array)`
    pub fn to_array(&self) -> Array {
        match self {
            Value::Array(a) => a.clone(),
            Value::Void | Value::Null => Array::new(),
            scalar => Array::from_list([scalar.clone()]),
        }
    }

    /// Name reported by `gettype()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void | Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "double",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// Name used in type declarations and diagnostics (`get_debug_type()`)
    pub fn debug_type(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Void)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_))
    }

    /// `===`: same type tag and same value
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void | Value::Null, Value::Void | Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.identical(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_php_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[i64]) -> Value {
        Value::Array(Array::from_list(values.iter().map(|n| Value::Int(*n))))
    }

    #[test]
    fn test_to_bool_table() {
        assert!(!Value::Int(0).to_bool());
        assert!(!Value::str("0").to_bool());
        assert!(!Value::str("").to_bool());
        assert!(!Value::Array(Array::new()).to_bool());
        assert!(list(&[42]).to_bool());
        assert!(Value::str("0.0").to_bool());
        assert!(!Value::Float(0.0).to_bool());
        assert!(!Value::Null.to_bool());
    }

    #[test]
    fn test_to_int_conversions() {
        assert_eq!(Value::Bool(true).to_int(), 1);
        assert_eq!(Value::Float(-3.9).to_int(), -3);
        assert_eq!(Value::str("12abc").to_int(), 12);
        assert_eq!(Value::str("  7 ").to_int(), 7);
        assert_eq!(Value::str("1e3").to_int(), 1000);
        assert_eq!(Value::str("abc").to_int(), 0);
        assert_eq!(list(&[1, 2]).to_int(), 1);
        assert_eq!(Value::Float(f64::NAN).to_int(), 0);
    }

    #[test]
    fn test_conversions_are_idempotent() {
        let samples = [
            Value::Null,
            Value::Bool(true),
            Value::Int(-5),
            Value::Float(2.75),
            Value::str("3.5 apples"),
            list(&[1]),
        ];
        for v in samples {
            let once = Value::Int(v.to_int());
            assert_eq!(once.to_int(), v.to_int());
            let once = Value::Float(v.to_float());
            assert_eq!(once.to_float(), v.to_float());
            let once = Value::Bool(v.to_bool());
            assert_eq!(once.to_bool(), v.to_bool());
            let once = Value::Str(v.to_php_string());
            assert_eq!(once.to_php_string(), v.to_php_string());
        }
    }

    #[test]
    fn test_to_php_string() {
        assert_eq!(Value::Bool(true).to_php_string(), "1");
        assert_eq!(Value::Bool(false).to_php_string(), "");
        assert_eq!(Value::Null.to_php_string(), "");
        assert_eq!(Value::Float(1.0).to_php_string(), "1");
        assert_eq!(Value::Float(0.1 + 0.2).to_php_string(), "0.3");
        assert_eq!(list(&[]).to_php_string(), "Array");
    }

    #[test]
    fn test_format_float_precision_14() {
        assert_eq!(format_float(1.0 / 3.0, Some(14)), "0.33333333333333");
        assert_eq!(format_float(-2.5, Some(14)), "-2.5");
        assert_eq!(format_float(1e14, Some(14)), "1.0E+14");
        assert_eq!(format_float(1e13, Some(14)), "10000000000000");
        assert_eq!(format_float(0.00001, Some(14)), "1.0E-5");
        assert_eq!(format_float(0.0001, Some(14)), "0.0001");
        assert_eq!(format_float(9.2233720368547758e18, Some(14)), "9.2233720368548E+18");
    }

    #[test]
    fn test_format_float_shortest() {
        assert_eq!(format_float(0.1 + 0.2, None), "0.30000000000000004");
        assert_eq!(format_float(1.5, None), "1.5");
        assert_eq!(format_float(100.0, None), "100");
        assert_eq!(format_float(1e15, None), "1.0E+15");
        assert_eq!(format_float(f64::INFINITY, None), "INF");
        assert_eq!(format_float(-0.0, None), "-0");
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(parse_numeric("42"), Some(Numeric::Int(42)));
        assert_eq!(parse_numeric(" 4.5 "), Some(Numeric::Float(4.5)));
        assert_eq!(parse_numeric("-.5e1"), Some(Numeric::Float(-5.0)));
        assert_eq!(parse_numeric("12abc"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("."), None);
        assert_eq!(parse_numeric("0x1A"), None);
    }

    #[test]
    fn test_array_key_canonicalization() {
        assert_eq!(ArrayKey::from_str_key("8"), ArrayKey::Int(8));
        assert_eq!(ArrayKey::from_str_key("-3"), ArrayKey::Int(-3));
        assert_eq!(ArrayKey::from_str_key("0"), ArrayKey::Int(0));
        assert_eq!(ArrayKey::from_str_key("08"), ArrayKey::Str("08".into()));
        assert_eq!(ArrayKey::from_str_key("-0"), ArrayKey::Str("-0".into()));
        assert_eq!(ArrayKey::from_str_key("1.5"), ArrayKey::Str("1.5".into()));
        assert_eq!(ArrayKey::from_value(&Value::Bool(true)).unwrap(), ArrayKey::Int(1));
        assert_eq!(ArrayKey::from_value(&Value::Float(2.7)).unwrap(), ArrayKey::Int(2));
        assert_eq!(ArrayKey::from_value(&Value::Null).unwrap(), ArrayKey::Str(String::new()));
        assert!(ArrayKey::from_value(&list(&[])).is_err());
    }

    #[test]
    fn test_array_push_uses_max_int_key() {
        let mut array = Array::new();
        assert_eq!(array.push(Value::Int(1)).unwrap(), ArrayKey::Int(0));
        array.insert(ArrayKey::Int(7), Value::Int(2));
        array.insert(ArrayKey::Str("x".into()), Value::Int(3));
        assert_eq!(array.push(Value::Int(4)).unwrap(), ArrayKey::Int(8));
    }

    #[test]
    fn test_array_push_ignores_negative_keys() {
        let mut array = Array::new();
        array.insert(ArrayKey::Int(-5), Value::Int(1));
        assert_eq!(array.push(Value::Int(2)).unwrap(), ArrayKey::Int(0));
    }

    #[test]
    fn test_array_insert_keeps_position() {
        let mut array = Array::from_list([Value::Int(1), Value::Int(2)]);
        array.insert(ArrayKey::Int(0), Value::Int(9));
        let keys: Vec<_> = array.keys().cloned().collect();
        assert_eq!(keys, vec![ArrayKey::Int(0), ArrayKey::Int(1)]);
        assert_eq!(array.get(&ArrayKey::Int(0)), Some(&Value::Int(9)));
    }

    #[test]
    fn test_identity() {
        assert!(!Value::str("234").identical(&Value::Int(234)));
        assert!(list(&[1, 2]).identical(&list(&[1, 2])));
        assert!(!list(&[1, 2]).identical(&list(&[2, 1])));
        assert!(!Value::Float(f64::NAN).identical(&Value::Float(f64::NAN)));
    }

    #[test]
    fn test_identity_is_order_sensitive() {
        let a: Array = [(ArrayKey::Int(0), Value::Int(1)), (ArrayKey::Int(1), Value::Int(2))]
            .into_iter()
            .collect();
        let b: Array = [(ArrayKey::Int(1), Value::Int(2)), (ArrayKey::Int(0), Value::Int(1))]
            .into_iter()
            .collect();
        assert!(!a.identical(&b));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Float(1.0).type_name(), "double");
        assert_eq!(Value::Float(1.0).debug_type(), "float");
        assert_eq!(Value::Null.type_name(), "NULL");
        assert_eq!(Value::Null.debug_type(), "null");
    }
}
