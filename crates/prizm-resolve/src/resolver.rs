use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::context::RefContext;

/// Matches `$ident` followed by zero or more `.prop` segments.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\$([A-Za-z_][A-Za-z0-9_-]*)((?:\.[A-Za-z_][A-Za-z0-9_-]*)*)").unwrap()
});

/// Replace every `$...` reference in `text` with its resolved value.
///
/// Unresolvable references become the empty string.
pub fn interpolate(text: &str, ctx: &RefContext) -> String {
  REFERENCE
    .replace_all(text, |caps: &Captures| {
      let root = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
      let props: Vec<&str> = caps
        .get(2)
        .map(|m| m.as_str().split('.').filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
      resolve_reference(root, &props, ctx).unwrap_or_default()
    })
    .into_owned()
}

/// Resolve a single parsed reference. Returns `None` when the reference
/// does not name anything in the context.
pub fn resolve_reference(root: &str, props: &[&str], ctx: &RefContext) -> Option<String> {
  match root {
    "args" => {
      // `$args.key` - exactly one property names the argument.
      let key = props.first()?;
      if props.len() > 1 {
        return None;
      }
      ctx.args.get(*key).cloned()
    }
    "prev" => {
      let prev_id = ctx.prev.as_deref()?;
      resolve_step(prev_id, props, ctx)
    }
    step_id => resolve_step(step_id, props, ctx),
  }
}

fn resolve_step(step_id: &str, props: &[&str], ctx: &RefContext) -> Option<String> {
  let view = ctx.steps.get(step_id)?;
  // Bare `$step` is shorthand for `$step.output`.
  let path: &[&str] = if props.is_empty() { &["output"] } else { props };

  let mut current = view;
  for prop in path {
    current = current.get(prop)?;
  }
  Some(value_to_string(current))
}

/// Stringify a resolved JSON value. Scalars render bare (no quotes);
/// objects and arrays serialize compact; null renders empty.
fn value_to_string(value: &serde_json::Value) -> String {
  match value {
    serde_json::Value::String(s) => s.clone(),
    serde_json::Value::Null => String::new(),
    serde_json::Value::Number(n) => n.to_string(),
    serde_json::Value::Bool(b) => b.to_string(),
    other => other.to_string(),
  }
}

/// Find the last completed step before `upto` in definition order.
///
/// This is the lookup behind the implicit pipeline default: when a step has
/// no explicit `input`, the previous *completed* step's output is piped in,
/// skipping over steps that were skipped or failed - including several in a
/// row.
pub fn last_completed_step<'a>(
  ordered_ids: &'a [String],
  steps: &HashMap<String, serde_json::Value>,
  upto: usize,
) -> Option<&'a str> {
  ordered_ids
    .iter()
    .take(upto)
    .rev()
    .map(String::as_str)
    .find(|id| {
      steps
        .get(*id)
        .and_then(|v| v.get("status"))
        .and_then(|s| s.as_str())
        == Some("completed")
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn ctx() -> RefContext {
    let mut steps = HashMap::new();
    steps.insert(
      "collect".to_string(),
      json!({ "output": "three notes found", "status": "completed" }),
    );
    steps.insert(
      "analyze".to_string(),
      json!({
        "output": "mostly positive",
        "data": { "sentiment": "positive", "score": 0.87 },
        "status": "completed"
      }),
    );
    steps.insert(
      "gate".to_string(),
      json!({ "approved": true, "status": "completed" }),
    );

    let mut args = HashMap::new();
    args.insert("topic".to_string(), "standup".to_string());

    RefContext::new(args, steps, Some("analyze".to_string()))
  }

  #[test]
  fn test_step_output_reference() {
    let resolved = interpolate("Summarize: $collect.output", &ctx());
    assert_eq!(resolved, "Summarize: three notes found");
  }

  #[test]
  fn test_args_reference() {
    assert_eq!(interpolate("Topic is $args.topic", &ctx()), "Topic is standup");
  }

  #[test]
  fn test_prev_reference() {
    assert_eq!(interpolate("$prev.output", &ctx()), "mostly positive");
  }

  #[test]
  fn test_nested_data_reference() {
    assert_eq!(interpolate("$analyze.data.sentiment", &ctx()), "positive");
    assert_eq!(interpolate("$analyze.data.score", &ctx()), "0.87");
  }

  #[test]
  fn test_bare_step_is_output_shorthand() {
    assert_eq!(interpolate("$collect", &ctx()), "three notes found");
  }

  #[test]
  fn test_boolean_renders_bare() {
    assert_eq!(interpolate("$gate.approved", &ctx()), "true");
  }

  #[test]
  fn test_object_renders_compact_json() {
    let resolved = interpolate("$analyze.data", &ctx());
    let parsed: serde_json::Value = serde_json::from_str(&resolved).unwrap();
    assert_eq!(parsed["sentiment"], "positive");
  }

  #[test]
  fn test_unresolvable_is_empty_string() {
    assert_eq!(interpolate("$nope.output", &ctx()), "");
    assert_eq!(interpolate("$collect.missing", &ctx()), "");
    assert_eq!(interpolate("$args.missing", &ctx()), "");
    // Deep path into args is not part of the grammar.
    assert_eq!(interpolate("$args.topic.deeper", &ctx()), "");
  }

  #[test]
  fn test_prev_without_completed_step() {
    let empty = RefContext::default();
    assert_eq!(interpolate("$prev.output", &empty), "");
  }

  #[test]
  fn test_multiple_references_in_one_string() {
    let resolved = interpolate("[$args.topic] $collect.output / $analyze.output", &ctx());
    assert_eq!(resolved, "[standup] three notes found / mostly positive");
  }

  #[test]
  fn test_plain_text_untouched() {
    assert_eq!(interpolate("no references here", &ctx()), "no references here");
  }

  #[test]
  fn test_last_completed_step_skips_non_completed() {
    let order = vec![
      "a".to_string(),
      "b".to_string(),
      "c".to_string(),
      "d".to_string(),
    ];
    let mut steps = HashMap::new();
    steps.insert("a".to_string(), json!({ "status": "completed" }));
    steps.insert("b".to_string(), json!({ "status": "skipped" }));
    steps.insert("c".to_string(), json!({ "status": "skipped" }));

    // Two skipped steps in a row: `d` still pipes from `a`.
    assert_eq!(last_completed_step(&order, &steps, 3), Some("a"));
  }

  #[test]
  fn test_last_completed_step_respects_upto() {
    let order = vec!["a".to_string(), "b".to_string()];
    let mut steps = HashMap::new();
    steps.insert("a".to_string(), json!({ "status": "completed" }));
    steps.insert("b".to_string(), json!({ "status": "completed" }));

    assert_eq!(last_completed_step(&order, &steps, 1), Some("a"));
    assert_eq!(last_completed_step(&order, &steps, 0), None);
  }

  #[test]
  fn test_last_completed_step_none_when_all_failed() {
    let order = vec!["a".to_string()];
    let mut steps = HashMap::new();
    steps.insert("a".to_string(), json!({ "status": "failed" }));
    assert_eq!(last_completed_step(&order, &steps, 1), None);
  }
}
