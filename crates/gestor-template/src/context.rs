//! Render inputs: variable bindings and session access.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::TemplateError;
use crate::expr::is_reserved;

/// Variable bindings for one render call.
///
/// Keys become `$variables` inside the template.
///
/// # Example
///
/// ```
/// use gestor_template::RenderContext;
///
/// let ctx = RenderContext::new()
///     .with("title", "Empresas")
///     .with("count", 3);
/// assert_eq!(ctx.get("count"), Some(&serde_json::json!(3)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    vars: Map<String, Value>,
}

impl RenderContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any value serializing to a JSON object.
    ///
    /// Returns [`TemplateError::Eval`] if the value is not an object.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, TemplateError> {
        match serde_json::to_value(data) {
            Ok(Value::Object(vars)) => Ok(Self { vars }),
            Ok(other) => Err(TemplateError::eval(
                "",
                format!("render data must be an object, got {other}"),
            )),
            Err(e) => Err(TemplateError::eval("", e.to_string())),
        }
    }

    /// Add a binding, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a binding.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Returns `true` if the key is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub(crate) fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    /// Reject bindings that would shadow engine variables.
    pub(crate) fn check_reserved(&self) -> Result<(), TemplateError> {
        match self.vars.keys().find(|k| is_reserved(k)) {
            Some(key) => Err(TemplateError::ReservedBinding(key.clone())),
            None => Ok(()),
        }
    }
}

impl From<Map<String, Value>> for RenderContext {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

/// Session state consulted at render time (the `@csrf` token).
pub trait Session: Send + Sync {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Value stored under `key`, or `default` when absent.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }
}

/// Session with no values, for renders outside a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSession;

impl Session for NoSession {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}

impl Session for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}
