//! Minimal SOQL rendering: `SELECT … FROM … [WHERE a = 'x' AND …]`.

use serde_json::Value;

use crate::contact::Record;

/// An exact-match conjunction over record fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
  clauses: Vec<(String, String)>,
}

impl Filter {
  pub fn new() -> Self { Self::default() }

  /// Add a `field = value` clause.
  pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
    self.clauses.push((field.into(), value.into()));
    self
  }

  pub fn clauses(&self) -> &[(String, String)] { &self.clauses }

  pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

  /// Whether `record` satisfies every clause. Non-string values are compared
  /// by their JSON rendering; missing and null fields never match.
  pub fn matches(&self, record: &Record) -> bool {
    self.clauses.iter().all(|(field, want)| match record.get(field) {
      Some(Value::String(s)) => s == want,
      None | Some(Value::Null) => false,
      Some(other) => other.to_string() == *want,
    })
  }
}

/// Quote `value` as a SOQL string literal.
pub fn quote(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('\'');
  for c in value.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '\'' => out.push_str("\\'"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      c => out.push(c),
    }
  }
  out.push('\'');
  out
}

/// Render a `SELECT` over `object`, optionally restricted by `filter`.
pub fn select(object: &str, fields: &[&str], filter: Option<&Filter>) -> String {
  let mut soql = format!("SELECT {} FROM {}", fields.join(", "), object);
  if let Some(filter) = filter.filter(|f| !f.is_empty()) {
    let conditions: Vec<String> = filter
      .clauses()
      .iter()
      .map(|(field, value)| format!("{field} = {}", quote(value)))
      .collect();
    soql.push_str(" WHERE ");
    soql.push_str(&conditions.join(" AND "));
  }
  soql
}

/// The object named in a query's `FROM` clause, if any.
pub fn from_object(soql: &str) -> Option<&str> {
  let mut words = soql.split_whitespace();
  words.find(|w| w.eq_ignore_ascii_case("from"))?;
  words.next()
}
