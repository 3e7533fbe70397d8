//! Left/right tables for the matching UI: newbees on one side, mentors on the
//! other, each a header row followed by one row per contact.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
  contact::{Contact, RecordType, Relationship},
  workflow::MatchSettings,
};

/// Rendered for any missing cell.
pub const MISSING: &str = "N/A";

/// Columns shared by both tables, in order.
pub const CONTACT_COLUMNS: &[&str] = &[
  "Id",
  "Name",
  "Email",
  "CreatedDate",
  "MailingCity",
  "MailingState",
  "MailingPostalCode",
  "MailingLatitude",
  "MailingLongitude",
];

/// Extra columns appended to the newbee table.
pub const MENTOR_COLUMNS: &[&str] = &["MentorId", "MentorName"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeftRightData {
  pub newbees: Vec<Vec<String>>,
  pub mentors: Vec<Vec<String>>,
}

fn cell(value: Option<&str>) -> String { value.unwrap_or(MISSING).to_owned() }

fn number(value: Option<f64>) -> String {
  value.map(|v| v.to_string()).unwrap_or_else(|| MISSING.to_owned())
}

fn contact_row(c: &Contact) -> Vec<String> {
  vec![
    c.id.clone(),
    cell(c.name.as_deref()),
    cell(c.email.as_deref()),
    cell(c.created_date.as_deref()),
    cell(c.mailing.city.as_deref()),
    cell(c.mailing.state.as_deref()),
    cell(c.mailing.postal_code.as_deref()),
    number(c.mailing.latitude),
    number(c.mailing.longitude),
  ]
}

fn header(extra: &[&str]) -> Vec<String> {
  CONTACT_COLUMNS
    .iter()
    .chain(extra)
    .map(|s| (*s).to_owned())
    .collect()
}

/// Join mentor relationships onto newbees and split contacts by record type.
///
/// Contacts keep their input order. A newbee with several mentor edges shows
/// the first one; contacts of unknown record type are left out.
pub fn left_right(
  contacts: &[Contact],
  relationships: &[Relationship],
  settings: &MatchSettings,
) -> LeftRightData {
  let by_id: HashMap<&str, &Contact> = contacts.iter().map(|c| (c.id.as_str(), c)).collect();

  let mut mentor_of: HashMap<&str, &str> = HashMap::new();
  for rel in relationships {
    if rel.kind.as_deref() == Some(settings.relationship.mentor_type.as_str()) {
      mentor_of.entry(rel.source.as_str()).or_insert(rel.related.as_str());
    }
  }

  let mut newbees = vec![header(MENTOR_COLUMNS)];
  let mut mentors = vec![header(&[])];

  for contact in contacts {
    match contact.record_type(&settings.record_types) {
      Some(RecordType::NewBee) => {
        let mentor_id = mentor_of.get(contact.id.as_str()).copied();
        let mentor_name = mentor_id
          .and_then(|id| by_id.get(id))
          .and_then(|m| m.name.as_deref());

        let mut row = contact_row(contact);
        row.push(cell(mentor_id));
        row.push(cell(mentor_name));
        newbees.push(row);
      }
      Some(RecordType::Mentor) => mentors.push(contact_row(contact)),
      None => {}
    }
  }

  LeftRightData { newbees, mentors }
}
