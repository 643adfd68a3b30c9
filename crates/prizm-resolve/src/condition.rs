use crate::context::RefContext;
use crate::resolver::interpolate;

/// Evaluate a boolean step condition.
///
/// Grammar, kept deliberately small:
///
/// ```text
/// condition := [!] reference [ ("==" | "!=") literal ]
/// ```
///
/// A bare reference is truthy when it resolves to a non-empty string other
/// than `"false"` or `"0"`. Comparisons match the resolved string against
/// the literal (surrounding quotes on the literal are stripped). A leading
/// `!` negates the whole expression.
pub fn eval_condition(expr: &str, ctx: &RefContext) -> bool {
  let trimmed = expr.trim();
  let (negated, body) = match trimmed.strip_prefix('!') {
    Some(rest) => (true, rest.trim_start()),
    None => (false, trimmed),
  };

  let result = if let Some((left, right)) = split_comparison(body, "==") {
    resolve_side(left, ctx) == resolve_side(right, ctx)
  } else if let Some((left, right)) = split_comparison(body, "!=") {
    resolve_side(left, ctx) != resolve_side(right, ctx)
  } else {
    truthy(&interpolate(body, ctx))
  };

  if negated { !result } else { result }
}

fn split_comparison<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
  expr.split_once(op)
}

/// Resolve one side of a comparison: references interpolate, literals are
/// used as-is with surrounding quotes stripped.
fn resolve_side(side: &str, ctx: &RefContext) -> String {
  let trimmed = side.trim();
  if trimmed.contains('$') {
    interpolate(trimmed, ctx)
  } else {
    trimmed
      .trim_matches(|c| c == '"' || c == '\'')
      .to_string()
  }
}

fn truthy(value: &str) -> bool {
  !value.is_empty() && value != "false" && value != "0"
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::collections::HashMap;

  fn ctx() -> RefContext {
    let mut steps = HashMap::new();
    steps.insert(
      "gate".to_string(),
      json!({ "approved": true, "status": "completed" }),
    );
    steps.insert(
      "deny".to_string(),
      json!({ "approved": false, "status": "completed" }),
    );
    steps.insert(
      "analyze".to_string(),
      json!({ "data": { "sentiment": "positive" }, "status": "completed" }),
    );

    let mut args = HashMap::new();
    args.insert("mode".to_string(), "full".to_string());
    args.insert("count".to_string(), "0".to_string());

    RefContext::new(args, steps, None)
  }

  #[test]
  fn test_equality() {
    assert!(eval_condition("$gate.approved == true", &ctx()));
    assert!(eval_condition("$analyze.data.sentiment == positive", &ctx()));
    assert!(eval_condition("$analyze.data.sentiment == \"positive\"", &ctx()));
    assert!(!eval_condition("$analyze.data.sentiment == negative", &ctx()));
  }

  #[test]
  fn test_inequality() {
    assert!(eval_condition("$args.mode != quick", &ctx()));
    assert!(!eval_condition("$args.mode != full", &ctx()));
  }

  #[test]
  fn test_bare_truthiness() {
    assert!(eval_condition("$gate.approved", &ctx()));
    assert!(!eval_condition("$deny.approved", &ctx()));
    assert!(!eval_condition("$args.count", &ctx()));
    assert!(eval_condition("$args.mode", &ctx()));
  }

  #[test]
  fn test_unresolvable_is_falsy() {
    assert!(!eval_condition("$missing.output", &ctx()));
  }

  #[test]
  fn test_negation() {
    assert!(eval_condition("!$deny.approved", &ctx()));
    assert!(!eval_condition("!$gate.approved", &ctx()));
    assert!(eval_condition("! $missing.output", &ctx()));
  }

  #[test]
  fn test_rejected_approval_gates_downstream_step() {
    // The advisory-approval pattern: a later step conditions on the
    // approve step's recorded value.
    assert!(!eval_condition("$deny.approved == true", &ctx()));
  }
}
