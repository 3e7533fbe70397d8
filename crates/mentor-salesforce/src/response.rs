//! Mapping of Salesforce HTTP responses onto [`CrmError`].

use mentor_core::crm::CrmError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Longest raw body quoted in an error message.
const MAX_RAW_ERROR: usize = 200;

pub(crate) fn transport(e: reqwest::Error) -> CrmError {
  if e.is_timeout() {
    CrmError::Timeout
  } else {
    CrmError::Transport(e.to_string())
  }
}

/// Turn a non-success response into a [`CrmError`]; pass success through.
async fn check(resp: Response) -> Result<Response, CrmError> {
  let status = resp.status();
  if status == StatusCode::UNAUTHORIZED {
    return Err(CrmError::Unauthorized);
  }
  if status.is_success() {
    return Ok(resp);
  }
  let body = resp.text().await.map_err(transport)?;
  Err(CrmError::Api {
    status:  status.as_u16(),
    message: error_message(&body),
  })
}

/// Check the status and decode the body as JSON.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, CrmError> {
  let body = check(resp).await?.text().await.map_err(transport)?;
  serde_json::from_str(&body).map_err(|e| CrmError::Decode(e.to_string()))
}

/// Check the status and discard the body.
pub(crate) async fn read_empty(resp: Response) -> Result<(), CrmError> {
  check(resp).await.map(drop)
}

/// Render a Salesforce error body.
///
/// The REST API answers with `[{"errorCode": .., "message": ..}]`; the OAuth
/// endpoints with `{"error": .., "error_description": ..}`. Anything else is
/// quoted verbatim, truncated.
pub(crate) fn error_message(body: &str) -> String {
  match serde_json::from_str::<Value>(body) {
    Ok(Value::Array(items)) if !items.is_empty() => items
      .iter()
      .map(|item| {
        let code = item.get("errorCode").and_then(Value::as_str).unwrap_or("ERROR");
        let message = item.get("message").and_then(Value::as_str).unwrap_or("");
        format!("{code}: {message}")
      })
      .collect::<Vec<_>>()
      .join("; "),
    Ok(Value::Object(obj)) if obj.contains_key("error") => {
      let code = obj.get("error").and_then(Value::as_str).unwrap_or("error");
      match obj.get("error_description").and_then(Value::as_str) {
        Some(desc) => format!("{code}: {desc}"),
        None => code.to_owned(),
      }
    }
    _ => body.chars().take(MAX_RAW_ERROR).collect(),
  }
}
