//! An in-process CRM that honours the [`CrmClient`] contract.
//!
//! Compiled for this crate's tests and behind the `test-util` feature.
//! Records are kept per object name; queries understand just enough SOQL to
//! pick the `FROM` object (the projection and any `WHERE` clause are
//! ignored). Every client call is counted so tests can assert that a code
//! path made no CRM call at all.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicUsize, Ordering},
  },
};

use serde_json::Value;

use crate::{
  contact::Record,
  crm::{CrmAuth, CrmClient, CrmConnector, CrmError, DeleteOutcome, QueryResult},
  soql::{self, Filter},
};

#[derive(Default)]
struct Inner {
  objects:      HashMap<String, Vec<Record>>,
  next_id:      u64,
  revoked:      HashSet<String>,
  failing:      Option<CrmError>,
  undeletable:  HashSet<String>,
}

/// Shared in-memory CRM state. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryCrm {
  inner: Arc<Mutex<Inner>>,
  calls: Arc<AtomicUsize>,
}

impl MemoryCrm {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert a record under `object`. The record must carry an `Id`.
  pub fn insert(&self, object: &str, record: Record) {
    self.lock().objects.entry(object.to_owned()).or_default().push(record);
  }

  /// All records currently stored under `object`.
  pub fn records(&self, object: &str) -> Vec<Record> {
    self.lock().objects.get(object).cloned().unwrap_or_default()
  }

  /// Number of client calls made so far, across all clients.
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  /// Make every subsequent client call fail with `error` (or stop failing
  /// with `None`).
  pub fn fail_with(&self, error: Option<CrmError>) { self.lock().failing = error; }

  /// Make deletes of `id` fail while leaving the record in place.
  pub fn refuse_delete(&self, id: &str) { self.lock().undeletable.insert(id.to_owned()); }

  pub fn is_revoked(&self, token: &str) -> bool { self.lock().revoked.contains(token) }

  /// A client bound to `token`.
  pub fn client(&self, token: &str) -> MemoryClient {
    MemoryClient {
      crm:   self.clone(),
      token: token.to_owned(),
    }
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// A [`MemoryCrm`] view bound to one access token.
#[derive(Clone)]
pub struct MemoryClient {
  crm:   MemoryCrm,
  token: String,
}

impl MemoryClient {
  /// Count the call and apply token revocation and failure injection.
  fn begin(&self) -> Result<MutexGuard<'_, Inner>, CrmError> {
    self.crm.calls.fetch_add(1, Ordering::SeqCst);
    let inner = self.crm.lock();
    if inner.revoked.contains(&self.token) {
      return Err(CrmError::Unauthorized);
    }
    if let Some(e) = &inner.failing {
      return Err(e.clone());
    }
    Ok(inner)
  }
}

fn project(record: &Record, fields: &[&str]) -> Record {
  fields
    .iter()
    .filter_map(|f| record.get(*f).map(|v| ((*f).to_owned(), v.clone())))
    .collect()
}

impl CrmClient for MemoryClient {
  async fn query(&self, query: &str) -> Result<QueryResult, CrmError> {
    let inner = self.begin()?;
    let object = soql::from_object(query).ok_or_else(|| CrmError::Api {
      status:  400,
      message: "MALFORMED_QUERY: missing FROM clause".to_string(),
    })?;
    let records = inner.objects.get(object).cloned().unwrap_or_default();
    Ok(QueryResult {
      total_size: records.len() as u64,
      done: true,
      records,
    })
  }

  async fn find(
    &self,
    object: &str,
    filter: &Filter,
    fields: &[&str],
  ) -> Result<Vec<Record>, CrmError> {
    let inner = self.begin()?;
    Ok(
      inner
        .objects
        .get(object)
        .map(|records| {
          records
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| project(r, fields))
            .collect()
        })
        .unwrap_or_default(),
    )
  }

  async fn create(&self, object: &str, mut fields: Record) -> Result<String, CrmError> {
    let mut inner = self.begin()?;
    inner.next_id += 1;
    let id = format!("a0M{:012}", inner.next_id);
    fields.insert("Id".to_owned(), Value::from(id.clone()));
    inner.objects.entry(object.to_owned()).or_default().push(fields);
    Ok(id)
  }

  async fn delete(&self, object: &str, ids: &[String]) -> Result<Vec<DeleteOutcome>, CrmError> {
    let mut inner = self.begin()?;
    let undeletable = inner.undeletable.clone();
    let records = inner.objects.entry(object.to_owned()).or_default();

    Ok(
      ids
        .iter()
        .map(|id| {
          let position = records
            .iter()
            .position(|r| r.get("Id").and_then(Value::as_str) == Some(id.as_str()));
          match position {
            Some(i) if !undeletable.contains(id) => {
              records.remove(i);
              DeleteOutcome { id: id.clone(), success: true, errors: vec![] }
            }
            Some(_) => DeleteOutcome {
              id:      id.clone(),
              success: false,
              errors:  vec!["DELETE_FAILED: record is locked".to_string()],
            },
            None => DeleteOutcome {
              id:      id.clone(),
              success: false,
              errors:  vec!["ENTITY_IS_DELETED: entity is deleted".to_string()],
            },
          }
        })
        .collect(),
    )
  }

  async fn identity(&self) -> Result<Record, CrmError> {
    self.begin()?;
    let mut record = Record::new();
    record.insert("user_id".to_owned(), Value::from("005MEMORY"));
    record.insert("name".to_owned(), Value::from("Memory User"));
    record.insert("email".to_owned(), Value::from("memory@example.com"));
    Ok(record)
  }
}

// ─── Connector ───────────────────────────────────────────────────────────────

/// OAuth side of [`MemoryCrm`]: any non-empty code is accepted and becomes
/// the token `token-<code>`.
#[derive(Clone, Default)]
pub struct MemoryConnector {
  pub crm: MemoryCrm,
}

impl MemoryConnector {
  pub const INSTANCE_URL: &'static str = "memory://crm";

  pub fn new(crm: MemoryCrm) -> Self { Self { crm } }
}

impl CrmConnector for MemoryConnector {
  type Client = MemoryClient;

  fn authorization_url(&self, state: &str) -> Result<String, CrmError> {
    Ok(format!("{}/authorize?state={state}", Self::INSTANCE_URL))
  }

  async fn exchange_code(&self, code: &str) -> Result<CrmAuth, CrmError> {
    if code.is_empty() {
      return Err(CrmError::Api {
        status:  400,
        message: "invalid_grant: authorization code is empty".to_string(),
      });
    }
    Ok(CrmAuth {
      instance_url: Self::INSTANCE_URL.to_string(),
      access_token: format!("token-{code}"),
    })
  }

  async fn revoke(&self, auth: &CrmAuth) -> Result<(), CrmError> {
    let mut inner = self.crm.lock();
    if let Some(e) = &inner.failing {
      return Err(e.clone());
    }
    inner.revoked.insert(auth.access_token.clone());
    Ok(())
  }

  fn connect(&self, auth: &CrmAuth) -> MemoryClient { self.crm.client(&auth.access_token) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn record(v: Value) -> Record { v.as_object().cloned().unwrap() }

  #[tokio::test]
  async fn find_projects_and_filters() {
    let crm = MemoryCrm::new();
    crm.insert("Contact", record(json!({ "Id": "003A", "Name": "Ada", "Email": "a@x" })));
    crm.insert("Contact", record(json!({ "Id": "003B", "Name": "Bob" })));

    let client = crm.client("t");
    let found = client
      .find("Contact", &Filter::new().eq("Name", "Ada"), &["Id", "Name"])
      .await
      .unwrap();
    assert_eq!(found, vec![record(json!({ "Id": "003A", "Name": "Ada" }))]);
    assert_eq!(crm.calls(), 1);
  }

  #[tokio::test]
  async fn create_then_query() {
    let crm = MemoryCrm::new();
    let client = crm.client("t");
    let id = client.create("Thing__c", record(json!({ "Label": "x" }))).await.unwrap();

    let result = client.query("SELECT Id FROM Thing__c").await.unwrap();
    assert_eq!(result.total_size, 1);
    assert_eq!(result.records[0]["Id"], json!(id));
  }

  #[tokio::test]
  async fn delete_reports_each_id() {
    let crm = MemoryCrm::new();
    crm.insert("Thing__c", record(json!({ "Id": "a1" })));
    crm.insert("Thing__c", record(json!({ "Id": "a2" })));
    crm.refuse_delete("a2");

    let outcomes = crm
      .client("t")
      .delete("Thing__c", &["a1".into(), "a2".into(), "a3".into()])
      .await
      .unwrap();
    let flags: Vec<_> = outcomes.iter().map(|o| (o.id.as_str(), o.success)).collect();
    assert_eq!(flags, vec![("a1", true), ("a2", false), ("a3", false)]);
    assert_eq!(crm.records("Thing__c").len(), 1);
  }

  #[tokio::test]
  async fn revoked_token_is_unauthorized() {
    let connector = MemoryConnector::default();
    let auth = connector.exchange_code("abc").await.unwrap();
    let client = connector.connect(&auth);
    assert!(client.identity().await.is_ok());

    connector.revoke(&auth).await.unwrap();
    assert_eq!(client.identity().await.unwrap_err(), CrmError::Unauthorized);
  }

  #[tokio::test]
  async fn injected_failure_applies_to_every_call() {
    let crm = MemoryCrm::new();
    crm.fail_with(Some(CrmError::Timeout));
    let err = crm.client("t").query("SELECT Id FROM Contact").await.unwrap_err();
    assert_eq!(err, CrmError::Timeout);
  }
}
