//! Form validation.
//!
//! Rules are written per field as a `|`-separated string:
//!
//! | Rule | Fails when |
//! |------|------------|
//! | `required` | the value is missing, `""` or `"0"` |
//! | `email` | a non-blank value is not an e-mail address |
//! | `min:N` | a non-blank value has fewer than `N` characters |
//! | `max:N` | a non-blank value has more than `N` characters |
//!
//! Unknown rules are ignored. Messages are collected per field, in rule order.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Required,
    Email,
    Min(usize),
    Max(usize),
}

impl Rule {
    fn parse(rule: &str) -> Option<Self> {
        let (name, param) = rule.split_once(':').unwrap_or((rule, ""));
        let count = || param.trim().parse().unwrap_or(0);
        match name.trim() {
            "required" => Some(Self::Required),
            "email" => Some(Self::Email),
            "min" => Some(Self::Min(count())),
            "max" => Some(Self::Max(count())),
            _ => None,
        }
    }

    fn check(self, field: &str, value: Option<&str>) -> Option<String> {
        let value = value.filter(|v| !is_blank(v));
        match (self, value) {
            (Self::Required, None) => Some(format!("O campo {field} é obrigatório.")),
            (Self::Email, Some(v)) if !EMAIL.is_match(v) => Some(format!(
                "O campo {field} deve ser um endereço de e-mail válido."
            )),
            (Self::Min(n), Some(v)) if v.chars().count() < n => Some(format!(
                "O campo {field} deve ter no mínimo {n} caracteres."
            )),
            (Self::Max(n), Some(v)) if v.chars().count() > n => Some(format!(
                "O campo {field} não pode ter mais de {n} caracteres."
            )),
            _ => None,
        }
    }
}

/// Blank values skip every rule but `required`.
fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "0"
}

/// Outcome of validating one form.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, Vec<String>>,
}

impl Validator {
    /// Validate `data` against `(field, rules)` pairs.
    pub fn validate(data: &HashMap<String, String>, rules: &[(&str, &str)]) -> Self {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, field_rules) in rules {
            let value = data.get(*field).map(String::as_str);
            for rule in field_rules.split('|').filter_map(Rule::parse) {
                if let Some(message) = rule.check(field, value) {
                    errors.entry((*field).to_owned()).or_default().push(message);
                }
            }
        }

        Self { errors }
    }

    /// Whether any rule failed.
    pub fn fails(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Messages by field.
    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }
}
