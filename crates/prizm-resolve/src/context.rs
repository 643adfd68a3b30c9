use std::collections::HashMap;

/// Resolution context: everything a reference can name.
///
/// The runner builds one of these per step from the run's accumulated
/// step results and arguments. `steps` maps step id to a JSON view of the
/// step's result (see the crate docs for the view shape).
#[derive(Debug, Default)]
pub struct RefContext {
  /// Run arguments, referenced as `$args.key`.
  pub args: HashMap<String, String>,
  /// Step result views keyed by step id.
  pub steps: HashMap<String, serde_json::Value>,
  /// Id of the last completed step, if any; `$prev` resolves through it.
  pub prev: Option<String>,
}

impl RefContext {
  pub fn new(
    args: HashMap<String, String>,
    steps: HashMap<String, serde_json::Value>,
    prev: Option<String>,
  ) -> Self {
    Self { args, steps, prev }
  }
}
