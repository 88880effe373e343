//! Evaluates an event hook's `condition` string (§4.7), already expanded
//! through alias substitution to a literal `LHS OP RHS` form.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Parses and evaluates an expanded condition. Both sides compare
/// numerically when both parse as `f64`; otherwise a case-insensitive
/// string compare is used, which only supports `==`/`!=`.
///
/// Returns `None` if `condition` isn't a recognised `LHS OP RHS` form —
/// callers treat that as "condition not satisfied" rather than panicking.
pub fn evaluate(condition: &str) -> Option<bool> {
    let (lhs, op, rhs) = split(condition)?;

    if let (Ok(l), Ok(r)) = (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        return Some(match op {
            Op::Eq => l == r,
            Op::Ne => l != r,
            Op::Lt => l < r,
            Op::Gt => l > r,
            Op::Le => l <= r,
            Op::Ge => l >= r,
        });
    }

    match op {
        Op::Eq => Some(lhs.eq_ignore_ascii_case(rhs)),
        Op::Ne => Some(!lhs.eq_ignore_ascii_case(rhs)),
        _ => None,
    }
}

/// Splits on the longest-matching operator first so `==`/`!=`/`<=`/`>=`
/// aren't mis-split by their single-character prefixes.
fn split(condition: &str) -> Option<(&str, Op, &str)> {
    const OPS: &[(&str, Op)] = &[
        ("==", Op::Eq),
        ("!=", Op::Ne),
        ("<=", Op::Le),
        (">=", Op::Ge),
        ("<", Op::Lt),
        (">", Op::Gt),
    ];

    for (token, op) in OPS {
        if let Some(pos) = condition.find(token) {
            let lhs = condition[..pos].trim();
            let rhs = condition[pos + token.len()..].trim();
            if !lhs.is_empty() && !rhs.is_empty() {
                return Some((lhs, *op, rhs));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_comparison_prefers_number_parsing() {
        assert_eq!(evaluate("5 > 3"), Some(true));
        assert_eq!(evaluate("5 <= 3"), Some(false));
        assert_eq!(evaluate("2 == 2"), Some(true));
        assert_eq!(evaluate("2 != 2"), Some(false));
    }

    #[test]
    fn string_equality_is_case_insensitive() {
        assert_eq!(evaluate("Survival == survival"), Some(true));
        assert_eq!(evaluate("Survival != survival"), Some(false));
    }

    #[test]
    fn string_ordering_operators_are_unsupported() {
        assert_eq!(evaluate("abc < def"), None);
    }

    #[test]
    fn malformed_condition_yields_none() {
        assert_eq!(evaluate("no operator here"), None);
        assert_eq!(evaluate("5 >"), None);
    }

    #[test]
    fn does_not_confuse_ge_with_gt() {
        assert_eq!(evaluate("3 >= 3"), Some(true));
        assert_eq!(evaluate("3 <= 2"), Some(false));
    }
}
