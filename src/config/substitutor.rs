//! `${variable}` interpolation for configuration text.
//!
//! Expressions have the form `${name}` or `${name:-default}`. Resolved
//! values are expanded recursively, defaults may nest further
//! expressions, and `$${name}` escapes the marker so the literal text
//! `${name}` survives. An expression that resolves nothing and carries
//! no default is left in place unchanged, as is an unterminated one.

use std::collections::HashMap;

use thiserror::Error;

/// A variable resolved back into itself, directly or through other
/// variables. The chain lists every name visited up to the repeat.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("recursive substitution of {chain}")]
pub struct CycleError {
    pub chain: String,
}

/// Resolves `${...}` expressions against a fixed variable table.
#[derive(Debug, Clone, Default)]
pub struct Substitutor {
    variables: HashMap<String, String>,
}

impl Substitutor {
    pub fn new(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }

    /// A substitutor over a snapshot of the process environment.
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Expands every expression in `input`.
    pub fn replace(&self, input: &str) -> Result<String, CycleError> {
        self.substitute(input, &mut Vec::new())
    }

    fn substitute(&self, input: &str, chain: &mut Vec<String>) -> Result<String, CycleError> {
        let bytes = input.as_bytes();
        let mut out = String::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let Some(offset) = input[i..].find("${") else {
                out.push_str(&input[i..]);
                break;
            };
            let start = i + offset;
            if start > i && bytes[start - 1] == b'$' {
                // "$${...}" keeps the marker literal, minus one '$'
                out.push_str(&input[i..start - 1]);
                match closing_brace(input, start) {
                    Some(end) => {
                        out.push_str(&input[start..=end]);
                        i = end + 1;
                    }
                    None => {
                        out.push_str(&input[start..]);
                        break;
                    }
                }
                continue;
            }
            out.push_str(&input[i..start]);
            let Some(end) = closing_brace(input, start) else {
                out.push_str(&input[start..]);
                break;
            };
            out.push_str(&self.resolve(&input[start + 2..end], chain)?);
            i = end + 1;
        }
        Ok(out)
    }

    fn resolve(&self, expression: &str, chain: &mut Vec<String>) -> Result<String, CycleError> {
        let (name, default) = split_default(expression);
        if let Some(value) = self.variables.get(name) {
            if chain.iter().any(|visited| visited == name) {
                chain.push(name.to_string());
                return Err(CycleError {
                    chain: chain.join(" -> "),
                });
            }
            chain.push(name.to_string());
            let expanded = self.substitute(value, chain)?;
            chain.pop();
            return Ok(expanded);
        }
        match default {
            Some(default) => self.substitute(default, chain),
            None => Ok(format!("${{{expression}}}")),
        }
    }
}

/// Index of the `}` closing the expression opened at `start`, honouring
/// nested `${...}` openings.
fn closing_brace(input: &str, start: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut depth = 1usize;
    let mut i = start + 2;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
            i += 1;
        } else {
            i += 1;
        }
    }
    None
}

/// Splits `name:-default` at the first separator outside nested
/// expressions.
fn split_default(expression: &str) -> (&str, Option<&str>) {
    let bytes = expression.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'}' && depth > 0 {
            depth -= 1;
            i += 1;
        } else if depth == 0 && bytes[i] == b':' && i + 1 < bytes.len() && bytes[i + 1] == b'-' {
            return (&expression[..i], Some(&expression[i + 2..]));
        } else {
            i += 1;
        }
    }
    (expression, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn substitutor(pairs: &[(&str, &str)]) -> Substitutor {
        Substitutor::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn leaves_unknown_variables_in_place() {
        let s = substitutor(&[]);
        assert_eq!(s.replace("${foo}").unwrap(), "${foo}");
    }

    #[test]
    fn replaces_known_variables() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("${foo}").unwrap(), "bar");
    }

    #[test]
    fn keeps_surrounding_text() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("pref-${foo}-suff").unwrap(), "pref-bar-suff");
    }

    #[test]
    fn replaces_every_occurrence() {
        let s = substitutor(&[("a", "1"), ("b", "2")]);
        assert_eq!(s.replace("${a}/${b}/${a}").unwrap(), "1/2/1");
    }

    #[test]
    fn falls_back_to_default_when_unresolved() {
        let s = substitutor(&[]);
        assert_eq!(s.replace("${foo:-or}").unwrap(), "or");
    }

    #[test]
    fn ignores_default_when_resolved() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("${foo:-or}").unwrap(), "bar");
    }

    #[test]
    fn empty_default_yields_empty_string() {
        let s = substitutor(&[]);
        assert_eq!(s.replace("a${foo:-}b").unwrap(), "ab");
    }

    #[test]
    fn defaults_may_nest_expressions() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("${any:-${foo}}").unwrap(), "bar");
    }

    #[test]
    fn nested_defaults_recurse() {
        let s = substitutor(&[("other", "fallback")]);
        assert_eq!(
            s.replace("${any:-${foo:-${other}}}").unwrap(),
            "fallback"
        );
    }

    #[test]
    fn expands_variables_inside_resolved_values() {
        let s = substitutor(&[("greeting", "hello ${name}"), ("name", "world")]);
        assert_eq!(s.replace("${greeting}").unwrap(), "hello world");
    }

    #[test]
    fn escaped_marker_stays_literal() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("$${foo}").unwrap(), "${foo}");
        assert_eq!(s.replace("x$${foo}y").unwrap(), "x${foo}y");
    }

    #[test]
    fn unterminated_expression_is_left_alone() {
        let s = substitutor(&[("foo", "bar")]);
        assert_eq!(s.replace("${foo").unwrap(), "${foo");
        assert_eq!(s.replace("a-${foo").unwrap(), "a-${foo");
    }

    #[test]
    fn reports_cycles_with_the_visited_chain() {
        let s = substitutor(&[("a", "${b}"), ("b", "${a}")]);
        let err = s.replace("${a}").unwrap_err();
        assert_eq!(err.chain, "a -> b -> a");
    }

    #[test]
    fn detects_self_referential_variables() {
        let s = substitutor(&[("a", "pre ${a} post")]);
        let err = s.replace("${a}").unwrap_err();
        assert_eq!(err.chain, "a -> a");
    }

    #[test]
    fn sibling_uses_of_one_variable_are_not_a_cycle() {
        let s = substitutor(&[("a", "${b} and ${b}"), ("b", "x")]);
        assert_eq!(s.replace("${a}").unwrap(), "x and x");
    }
}
