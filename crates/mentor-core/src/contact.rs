//! Contact and Relationship: the two CRM record shapes this service
//! understands.
//!
//! Both are owned entirely by the CRM. They are decoded from raw [`Record`]s
//! on every request and never cached.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// A raw CRM record, as returned by the CRM's JSON API.
pub type Record = serde_json::Map<String, Value>;

// ─── Record types ────────────────────────────────────────────────────────────

/// The role a contact plays in the mentoring programme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
  NewBee,
  Mentor,
}

/// Environment-specific CRM record-type ids for each [`RecordType`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTypeIds {
  pub newbee: String,
  pub mentor: String,
}

impl RecordTypeIds {
  /// The CRM id configured for `kind`.
  pub fn id_for(&self, kind: RecordType) -> &str {
    match kind {
      RecordType::NewBee => &self.newbee,
      RecordType::Mentor => &self.mentor,
    }
  }

  /// Map a CRM record-type id back to a [`RecordType`]. Unknown ids are
  /// `None`.
  pub fn classify(&self, id: &str) -> Option<RecordType> {
    if id == self.newbee {
      Some(RecordType::NewBee)
    } else if id == self.mentor {
      Some(RecordType::Mentor)
    } else {
      None
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// Mailing address fields of a contact. Every part is optional in the CRM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MailingAddress {
  #[serde(rename = "MailingCity")]
  pub city:        Option<String>,
  #[serde(rename = "MailingState")]
  pub state:       Option<String>,
  #[serde(rename = "MailingPostalCode")]
  pub postal_code: Option<String>,
  #[serde(rename = "MailingLatitude")]
  pub latitude:    Option<f64>,
  #[serde(rename = "MailingLongitude")]
  pub longitude:   Option<f64>,
}

/// A CRM contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  #[serde(rename = "Id")]
  pub id:             String,
  #[serde(rename = "Email", default)]
  pub email:          Option<String>,
  #[serde(rename = "Name", default)]
  pub name:           Option<String>,
  /// ISO 8601 timestamp as reported by the CRM.
  #[serde(rename = "CreatedDate", default)]
  pub created_date:   Option<String>,
  #[serde(flatten)]
  pub mailing:        MailingAddress,
  #[serde(rename = "RecordTypeId", default)]
  pub record_type_id: Option<String>,
}

impl Contact {
  /// CRM object API name.
  pub const OBJECT: &'static str = "Contact";

  /// Fields selected whenever contacts are read.
  pub const FIELDS: &'static [&'static str] = &[
    "Id",
    "Email",
    "Name",
    "CreatedDate",
    "MailingCity",
    "MailingState",
    "MailingPostalCode",
    "MailingLatitude",
    "MailingLongitude",
    "RecordTypeId",
  ];

  pub fn from_record(record: &Record) -> Result<Self> {
    Ok(serde_json::from_value(Value::Object(record.clone()))?)
  }

  pub fn record_type(&self, ids: &RecordTypeIds) -> Option<RecordType> {
    self.record_type_id.as_deref().and_then(|id| ids.classify(id))
  }
}

// ─── Relationship ────────────────────────────────────────────────────────────

/// API names of the relationship object and its fields.
///
/// These differ between CRM orgs, so they are configuration rather than
/// constants. The defaults are the NPSP relationship object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipSchema {
  pub object:        String,
  pub source_field:  String,
  pub related_field: String,
  pub type_field:    String,
  /// Type tag written on newbee → mentor edges.
  pub mentor_type:   String,
}

impl Default for RelationshipSchema {
  fn default() -> Self {
    Self {
      object:        "npe4__Relationship__c".to_string(),
      source_field:  "npe4__Contact__c".to_string(),
      related_field: "npe4__RelatedContact__c".to_string(),
      type_field:    "npe4__Type__c".to_string(),
      mentor_type:   "Mentor".to_string(),
    }
  }
}

impl RelationshipSchema {
  /// Fields selected whenever relationships are read.
  pub fn fields(&self) -> Vec<&str> {
    vec![
      "Id",
      self.source_field.as_str(),
      self.related_field.as_str(),
      self.type_field.as_str(),
    ]
  }

  /// Build the field map for a new relationship record.
  pub fn new_record(&self, source: &str, related: &str, kind: &str) -> Record {
    let mut record = Record::new();
    record.insert(self.source_field.clone(), Value::from(source));
    record.insert(self.related_field.clone(), Value::from(related));
    record.insert(self.type_field.clone(), Value::from(kind));
    record
  }
}

/// A directed edge between two contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
  pub id:      String,
  pub source:  String,
  pub related: String,
  pub kind:    Option<String>,
}

impl Relationship {
  pub fn from_record(record: &Record, schema: &RelationshipSchema) -> Result<Self> {
    Ok(Self {
      id:      required_str(record, "Id")?,
      source:  required_str(record, &schema.source_field)?,
      related: required_str(record, &schema.related_field)?,
      kind:    optional_str(record, &schema.type_field)?,
    })
  }
}

fn required_str(record: &Record, field: &str) -> Result<String> {
  optional_str(record, field)?.ok_or_else(|| Error::MissingField(field.to_owned()))
}

fn optional_str(record: &Record, field: &str) -> Result<Option<String>> {
  match record.get(field) {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s.clone())),
    Some(_) => Err(Error::NotAString { field: field.to_owned() }),
  }
}
