//! Symbol scan of band-maths expressions.
//!
//! Full evaluation is left to the consumer; the codec only needs to know
//! whether an expression copied into a product still refers to rasters and
//! masks that exist there.

use regex::Regex;

/// Names that are part of the expression language rather than raster refs
const RESERVED: &[&str] = &[
    "X", "Y", "LAT", "LON", "TIME", "MJD", "PI", "E", "NaN", "NAN", "true", "false", "and",
    "or", "not", "if", "then", "else", "AND", "OR", "NOT", "TRUE", "FALSE", "IF", "THEN",
    "ELSE",
];

// numbers and string literals are matched first so their contents are never
// taken for identifiers
const TOKEN_PATTERN: &str = r#"(?P<num>\d+\.?\d*(?:[eE][+-]?\d+)?)|(?P<str>"[^"]*")|'(?P<quoted>[^']+)'|(?P<id>(?:\$\d+\.)?[A-Za-z_][A-Za-z0-9_.]*)"#;

/// Raster or mask names referenced by `expression`, in order of first use.
///
/// Function calls and reserved words are skipped. `$2.band` style
/// references to other products are stripped to the local name, and
/// `band.FLAG` flag references yield `band`.
pub fn referenced_symbols(expression: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let Ok(re) = Regex::new(TOKEN_PATTERN) else {
        return out;
    };
    for caps in re.captures_iter(expression) {
        let name = if let Some(q) = caps.name("quoted") {
            q.as_str().to_string()
        } else if let Some(id) = caps.name("id") {
            let rest = &expression[id.end()..];
            if rest.trim_start().starts_with('(') {
                continue;
            }
            let mut token = id.as_str();
            if token.starts_with('$') {
                match token.find('.') {
                    Some(dot) => token = &token[dot + 1..],
                    None => continue,
                }
            }
            let base = token.split('.').next().unwrap_or(token);
            if base.is_empty() || RESERVED.contains(&base) {
                continue;
            }
            base.to_string()
        } else {
            continue;
        };
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

/// Verify that every referenced symbol is known; the error lists the
/// unknown names
pub fn check_symbols<F>(expression: &str, is_known: F) -> Result<(), String>
where
    F: Fn(&str) -> bool,
{
    let unknown: Vec<String> = referenced_symbols(expression)
        .into_iter()
        .filter(|name| !is_known(name))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "expression '{}' references unknown raster(s): {}",
            expression,
            unknown.join(", ")
        ))
    }
}
