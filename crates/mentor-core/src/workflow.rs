//! The match/unmatch workflow.
//!
//! Each operation is a fixed sequence of CRM calls. A step starts only after
//! the previous one has returned, and the first failure ends the operation:
//! nothing is written to the CRM until every check has passed, so there is
//! never anything to roll back.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::{
  contact::{Contact, RecordType, RecordTypeIds, RelationshipSchema},
  crm::{CrmClient, CrmError, DeleteOutcome},
  soql::Filter,
};

// ─── Settings and results ────────────────────────────────────────────────────

/// Org-specific identifiers the workflow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSettings {
  pub record_types: RecordTypeIds,
  pub relationship: RelationshipSchema,
}

#[derive(Debug, Error)]
pub enum MatchError {
  #[error("{0} is not a NewBee contact")]
  InvalidNewbee(String),

  #[error("{0} is not a Mentor contact")]
  InvalidMentor(String),

  #[error("{0} already has a mentor")]
  AlreadyMatched(String),

  #[error("no match between newbee {newbee} and mentor {mentor}")]
  NoMatchFound { newbee: String, mentor: String },

  #[error(transparent)]
  Crm(#[from] CrmError),
}

/// What an unmatch removed. Ids that failed to delete are still reported as
/// part of a successful unmatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchOutcome {
  pub deleted: Vec<String>,
  pub failed:  Vec<DeleteOutcome>,
}

// ─── Steps ───────────────────────────────────────────────────────────────────

/// Fail unless `id` is a contact of record type `kind`.
async fn require_contact<C: CrmClient>(
  crm: &C,
  settings: &MatchSettings,
  id: &str,
  kind: RecordType,
) -> Result<(), MatchError> {
  let filter = Filter::new()
    .eq("Id", id)
    .eq("RecordTypeId", settings.record_types.id_for(kind));
  let found = crm.find(Contact::OBJECT, &filter, &["Id"]).await?;

  if found.is_empty() {
    debug!(%id, ?kind, "contact lookup came back empty");
    return Err(match kind {
      RecordType::NewBee => MatchError::InvalidNewbee(id.to_owned()),
      RecordType::Mentor => MatchError::InvalidMentor(id.to_owned()),
    });
  }
  Ok(())
}

/// Ids of the relationships matching `filter`.
async fn relationship_ids<C: CrmClient>(
  crm: &C,
  settings: &MatchSettings,
  filter: &Filter,
) -> Result<Vec<String>, MatchError> {
  let records = crm.find(&settings.relationship.object, filter, &["Id"]).await?;
  Ok(
    records
      .iter()
      .filter_map(|r| r.get("Id").and_then(|v| v.as_str()).map(str::to_owned))
      .collect(),
  )
}

// ─── Operations ──────────────────────────────────────────────────────────────

/// Record `mentor` as the mentor of `newbee` and return the new
/// relationship's id.
pub async fn match_contacts<C: CrmClient>(
  crm: &C,
  settings: &MatchSettings,
  newbee: &str,
  mentor: &str,
) -> Result<String, MatchError> {
  require_contact(crm, settings, newbee, RecordType::NewBee).await?;
  require_contact(crm, settings, mentor, RecordType::Mentor).await?;

  // Any outgoing relationship counts, whatever its type.
  let outgoing = Filter::new().eq(&settings.relationship.source_field, newbee);
  if !relationship_ids(crm, settings, &outgoing).await?.is_empty() {
    return Err(MatchError::AlreadyMatched(newbee.to_owned()));
  }

  let schema = &settings.relationship;
  let id = crm
    .create(
      &schema.object,
      schema.new_record(newbee, mentor, &schema.mentor_type),
    )
    .await?;

  info!(%newbee, %mentor, relationship = %id, "matched");
  Ok(id)
}

/// Remove every mentor relationship between `newbee` and `mentor`.
pub async fn unmatch_contacts<C: CrmClient>(
  crm: &C,
  settings: &MatchSettings,
  newbee: &str,
  mentor: &str,
) -> Result<UnmatchOutcome, MatchError> {
  require_contact(crm, settings, newbee, RecordType::NewBee).await?;
  require_contact(crm, settings, mentor, RecordType::Mentor).await?;

  let schema = &settings.relationship;
  let pair = Filter::new()
    .eq(&schema.source_field, newbee)
    .eq(&schema.related_field, mentor)
    .eq(&schema.type_field, &schema.mentor_type);
  let ids = relationship_ids(crm, settings, &pair).await?;
  if ids.is_empty() {
    return Err(MatchError::NoMatchFound {
      newbee: newbee.to_owned(),
      mentor: mentor.to_owned(),
    });
  }

  let outcomes = crm.delete(&settings.relationship.object, &ids).await?;

  let mut result = UnmatchOutcome { deleted: vec![], failed: vec![] };
  for outcome in outcomes {
    if outcome.success {
      result.deleted.push(outcome.id);
    } else {
      warn!(id = %outcome.id, errors = ?outcome.errors, "relationship delete failed");
      result.failed.push(outcome);
    }
  }

  info!(%newbee, %mentor, deleted = result.deleted.len(), "unmatched");
  Ok(result)
}

// ─── Per-key locking ─────────────────────────────────────────────────────────

/// In-process async mutexes keyed by string.
///
/// The CRM offers no compare-and-swap, so match and unmatch for the same
/// newbee are serialised here. An entry lives while anyone holds or waits on
/// it, including waiters whose future is dropped before acquiring.
#[derive(Clone, Default)]
pub struct KeyedLocks {
  slots: Arc<Mutex<HashMap<String, Slot>>>,
}

struct Slot {
  mutex: Arc<tokio::sync::Mutex<()>>,
  /// Holders plus waiters.
  users: usize,
}

/// Holds one key's lock until dropped.
///
/// Also registered while still waiting, so cancelling a pending
/// [`KeyedLocks::lock`] releases the entry.
pub struct KeyedGuard {
  key:   String,
  owner: KeyedLocks,
  guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
  pub fn new() -> Self { Self::default() }

  pub async fn lock(&self, key: &str) -> KeyedGuard {
    let mutex = {
      let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
      let slot = slots.entry(key.to_owned()).or_insert_with(|| Slot {
        mutex: Arc::default(),
        users: 0,
      });
      slot.users += 1;
      Arc::clone(&slot.mutex)
    };

    let mut guard = KeyedGuard { key: key.to_owned(), owner: self.clone(), guard: None };
    guard.guard = Some(mutex.lock_owned().await);
    guard
  }

  /// Number of keys currently locked or awaited.
  pub fn len(&self) -> usize {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Drop for KeyedGuard {
  fn drop(&mut self) {
    self.guard.take();
    let mut slots = self.owner.slots.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(slot) = slots.get_mut(&self.key) {
      slot.users -= 1;
      if slot.users == 0 {
        slots.remove(&self.key);
      }
    }
  }
}
