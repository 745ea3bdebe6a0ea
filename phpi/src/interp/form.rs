//! Request input decoding for `$_GET`, `$_POST` and `$_COOKIE`
//!
//! Names follow PHP's variable registration: `a[]=1&a[k]=2` builds nested
//! arrays, and spaces and dots in the base name become underscores.

use super::value::{Array, ArrayKey, Value};

/// Deepest `[...]` nesting a name may use (`max_input_nesting_level`)
pub const MAX_INPUT_NESTING_LEVEL: usize = 64;

/// Decode an `application/x-www-form-urlencoded` string
pub fn parse_query(query: &str) -> Array {
    let mut vars = Array::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if let Some(path) = name_path(&name) {
            insert(&mut vars, &path, Value::Str(value.into_owned()));
        }
    }
    vars
}

/// Decode a `Cookie` header; the first cookie of a name wins
pub fn parse_cookies(header: &str) -> Array {
    let mut cookies = Array::new();
    for pair in header.split(';') {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let Some(path) = name_path(name.trim()) else {
            continue;
        };
        if path.len() == 1 && path[0].as_ref().is_some_and(|key| cookies.contains_key(key)) {
            continue;
        }
        insert(&mut cookies, &path, Value::Str(decode_cookie_value(value.trim())));
    }
    cookies
}

/// Percent-decode a cookie value; unlike form data a `+` stays literal
fn decode_cookie_value(raw: &str) -> String {
    let escaped = format!("={}", raw.replace('+', "%2B").replace('&', "%26"));
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// Keys a registered name writes through; a `None` key appends. `None`
/// overall means the name is dropped
fn name_path(name: &str) -> Option<Vec<Option<ArrayKey>>> {
    let name = name.trim_start_matches(' ');
    let (base, mut rest) = match name.find('[') {
        Some(open) if name[open..].contains(']') => (&name[..open], &name[open..]),
        _ => (name, ""),
    };
    if base.is_empty() {
        return None;
    }
    // Without a closing bracket the `[` is part of the name
    let base: String = base
        .chars()
        .map(|c| if matches!(c, ' ' | '.' | '[') { '_' } else { c })
        .collect();

    let mut path = vec![Some(ArrayKey::from_str_key(&base))];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        if path.len() > MAX_INPUT_NESTING_LEVEL {
            return None;
        }
        let key = &inner[..close];
        path.push((!key.is_empty()).then(|| ArrayKey::from_str_key(key)));
        rest = &inner[close + 1..];
    }
    Some(path)
}

fn insert(array: &mut Array, path: &[Option<ArrayKey>], value: Value) {
    let Some((key, rest)) = path.split_first() else {
        return;
    };
    let key = match key {
        Some(key) => key.clone(),
        None => match array.next_index() {
            Ok(index) => ArrayKey::Int(index),
            Err(_) => return,
        },
    };
    if rest.is_empty() {
        array.insert(key, value);
        return;
    }
    let slot = array.entry_or_null(key);
    if !matches!(slot, Value::Array(_)) {
        *slot = Value::Array(Array::new());
    }
    if let Value::Array(inner) = slot {
        insert(inner, rest, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(array: &'a Array, key: &str) -> Option<&'a Value> {
        array.get(&ArrayKey::from_str_key(key))
    }

    #[test]
    fn test_flat_pairs_are_decoded() {
        let vars = parse_query("a=1&flag&b=two+words&c=%41%26");
        assert_eq!(get(&vars, "a"), Some(&Value::str("1")));
        assert_eq!(get(&vars, "flag"), Some(&Value::str("")));
        assert_eq!(get(&vars, "b"), Some(&Value::str("two words")));
        assert_eq!(get(&vars, "c"), Some(&Value::str("A&")));
    }

    #[test]
    fn test_bracket_names_build_arrays() {
        let vars = parse_query("a[]=1&a[]=2&m[x][y]=3&m[x][]=4&5=five");
        assert_eq!(
            get(&vars, "a"),
            Some(&Value::Array(Array::from_list([Value::str("1"), Value::str("2")])))
        );
        let Some(Value::Array(m)) = get(&vars, "m") else {
            panic!("m is not an array");
        };
        let Some(Value::Array(x)) = get(m, "x") else {
            panic!("m[x] is not an array");
        };
        assert_eq!(get(x, "y"), Some(&Value::str("3")));
        assert_eq!(x.get(&ArrayKey::Int(0)), Some(&Value::str("4")));
        assert_eq!(vars.get(&ArrayKey::Int(5)), Some(&Value::str("five")));
    }

    #[test]
    fn test_name_mangling() {
        let vars = parse_query("first.name=a&last+name=b&open[=c&x[a]junk=d&=e");
        assert_eq!(get(&vars, "first_name"), Some(&Value::str("a")));
        assert_eq!(get(&vars, "last_name"), Some(&Value::str("b")));
        assert_eq!(get(&vars, "open_"), Some(&Value::str("c")));
        let Some(Value::Array(x)) = get(&vars, "x") else {
            panic!("x is not an array");
        };
        assert_eq!(get(x, "a"), Some(&Value::str("d")));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_scalar_is_replaced_by_nested_array() {
        let vars = parse_query("a=1&a[b]=2");
        let Some(Value::Array(a)) = get(&vars, "a") else {
            panic!("a is not an array");
        };
        assert_eq!(get(a, "b"), Some(&Value::str("2")));
    }

    #[test]
    fn test_nesting_limit_drops_the_variable() {
        let deep = format!("d{}=1&ok[a]=2", "[x]".repeat(MAX_INPUT_NESTING_LEVEL + 1));
        let vars = parse_query(&deep);
        assert_eq!(get(&vars, "d"), None);
        assert!(get(&vars, "ok").is_some());
        let limit = format!("d{}=1", "[x]".repeat(MAX_INPUT_NESTING_LEVEL));
        assert!(get(&parse_query(&limit), "d").is_some());
    }

    #[test]
    fn test_cookies() {
        let cookies = parse_cookies("session=abc%3D; theme = dark ; session=other; a.b=1+1; prefs[lang]=en");
        assert_eq!(get(&cookies, "session"), Some(&Value::str("abc=")));
        assert_eq!(get(&cookies, "theme"), Some(&Value::str("dark")));
        assert_eq!(get(&cookies, "a_b"), Some(&Value::str("1+1")));
        let Some(Value::Array(prefs)) = get(&cookies, "prefs") else {
            panic!("prefs is not an array");
        };
        assert_eq!(get(prefs, "lang"), Some(&Value::str("en")));
    }
}
