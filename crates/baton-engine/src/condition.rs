//! Guard and branch expressions.
//!
//! Grammar, applied after template resolution:
//!
//! ```text
//! expr := side " OR " expr | side " AND " expr | comparison | literal
//! comparison := operand OP operand
//! OP := ">=" | "<=" | "!=" | "==" | ">" | "<" | " contains "
//! ```
//!
//! `OR` is split on its first occurrence before `AND`, so `OR` binds
//! loosest. Operators are tried in the order listed and the first one found
//! anywhere in the text wins. Operands are trimmed and stripped of
//! surrounding quotes. Ordering operators compare numerically and are false
//! when either side is not a number. Text with no operator is true only when
//! it is exactly `true`. An empty expression is true.

use crate::context::Context;

const OPERATORS: [&str; 7] = [">=", "<=", "!=", "==", ">", "<", " contains "];

/// Resolve templates in `expr` against the run context, then evaluate it.
pub fn evaluate(expr: &str, ctx: &Context) -> bool {
    if expr.trim().is_empty() {
        return true;
    }
    evaluate_resolved(&ctx.resolve(expr))
}

/// Evaluate an expression whose templates have already been resolved.
pub fn evaluate_resolved(expr: &str) -> bool {
    let expr = expr.trim();

    if let Some((left, right)) = expr.split_once(" OR ") {
        return evaluate_resolved(left) || evaluate_resolved(right);
    }
    if let Some((left, right)) = expr.split_once(" AND ") {
        return evaluate_resolved(left) && evaluate_resolved(right);
    }

    for op in OPERATORS {
        if let Some((left, right)) = expr.split_once(op) {
            return compare(unquote(left), op, unquote(right));
        }
    }

    expr == "true"
}

fn unquote(operand: &str) -> &str {
    operand.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn compare(left: &str, op: &str, right: &str) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        " contains " => left.contains(right),
        _ => {
            let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) else {
                return false;
            };
            match op {
                ">=" => l >= r,
                "<=" => l <= r,
                ">" => l > r,
                "<" => l < r,
                _ => false,
            }
        }
    }
}
