//! Tests for the Salesforce backend against a local fake of the REST API.

use std::{collections::HashMap, time::Duration};

use axum::{
  Form, Json, Router,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
  routing::{delete, get, post},
};
use mentor_core::{
  crm::{CrmAuth, CrmClient, CrmConnector, CrmError},
  soql::Filter,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::{SalesforceConfig, SalesforceConnector};

const TOKEN: &str = "00Dfake!token";

// ─── Fake Salesforce ──────────────────────────────────────────────────────────

fn authorized(headers: &HeaderMap) -> bool {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    == Some(format!("Bearer {TOKEN}").as_str())
}

fn invalid_session() -> Response {
  (
    StatusCode::UNAUTHORIZED,
    Json(json!([{ "message": "Session expired or invalid", "errorCode": "INVALID_SESSION_ID" }])),
  )
    .into_response()
}

async fn token(State(base): State<String>, Form(form): Form<HashMap<String, String>>) -> Response {
  if form.get("grant_type").map(String::as_str) != Some("authorization_code")
    || form.get("client_secret").map(String::as_str) != Some("shh")
  {
    return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_client" }))).into_response();
  }
  match form.get("code").map(String::as_str) {
    Some("good-code") => Json(json!({
      "access_token": TOKEN,
      "instance_url": base,
      "id": format!("{base}/id/00D/005"),
      "token_type": "Bearer",
    }))
    .into_response(),
    _ => (
      StatusCode::BAD_REQUEST,
      Json(json!({ "error": "invalid_grant", "error_description": "expired authorization code" })),
    )
      .into_response(),
  }
}

async fn revoke(Form(form): Form<HashMap<String, String>>) -> StatusCode {
  if form.get("token").map(String::as_str) == Some(TOKEN) {
    StatusCode::OK
  } else {
    StatusCode::BAD_REQUEST
  }
}

async fn query(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
  if !authorized(&headers) {
    return invalid_session();
  }
  let q = params.get("q").cloned().unwrap_or_default();
  if q == "SLOW" {
    tokio::time::sleep(Duration::from_millis(500)).await;
  }
  if !q.starts_with("SELECT") {
    return (
      StatusCode::BAD_REQUEST,
      Json(json!([{ "message": "unexpected token", "errorCode": "MALFORMED_QUERY" }])),
    )
      .into_response();
  }
  Json(json!({
    "totalSize": 1,
    "done": true,
    "records": [{ "attributes": { "type": "Contact" }, "Id": "003A", "echo": q }],
  }))
  .into_response()
}

async fn create(
  headers: HeaderMap,
  Path(object): Path<String>,
  Json(body): Json<Value>,
) -> Response {
  if !authorized(&headers) {
    return invalid_session();
  }
  if object != "npe4__Relationship__c" {
    return (
      StatusCode::NOT_FOUND,
      Json(json!([{ "message": "The requested resource does not exist", "errorCode": "NOT_FOUND" }])),
    )
      .into_response();
  }
  if body.get("npe4__Contact__c").is_none() {
    return (
      StatusCode::BAD_REQUEST,
      Json(json!([{ "message": "Required fields are missing", "errorCode": "REQUIRED_FIELD_MISSING" }])),
    )
      .into_response();
  }
  (StatusCode::CREATED, Json(json!({ "id": "a0M000000000001", "success": true, "errors": [] })))
    .into_response()
}

async fn composite_delete(
  headers: HeaderMap,
  Query(params): Query<HashMap<String, String>>,
) -> Response {
  if !authorized(&headers) {
    return invalid_session();
  }
  assert_eq!(params.get("allOrNone").map(String::as_str), Some("false"));
  let results: Vec<Value> = params["ids"]
    .split(',')
    .map(|id| {
      if id.starts_with("gone") {
        json!({
          "id": null,
          "success": false,
          "errors": [{ "statusCode": "ENTITY_IS_DELETED", "message": "entity is deleted", "fields": [] }],
        })
      } else {
        json!({ "id": id, "success": true, "errors": [] })
      }
    })
    .collect();
  Json(Value::Array(results)).into_response()
}

async fn userinfo(headers: HeaderMap) -> Response {
  if !authorized(&headers) {
    return invalid_session();
  }
  Json(json!({ "user_id": "005X", "name": "Ada Lovelace" })).into_response()
}

async fn spawn_fake() -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let base = format!("http://{}", listener.local_addr().unwrap());

  let app = Router::new()
    .route("/services/oauth2/token", post(token))
    .route("/services/oauth2/revoke", post(revoke))
    .route("/services/oauth2/userinfo", get(userinfo))
    .route("/services/data/v48.0/query", get(query))
    .route("/services/data/v48.0/sobjects/{object}/", post(create))
    .route("/services/data/v48.0/composite/sobjects", delete(composite_delete))
    .with_state(base.clone());

  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  base
}

fn connector(base: &str) -> SalesforceConnector {
  SalesforceConnector::new(SalesforceConfig {
    login_url:       base.to_string(),
    consumer_key:    "key".to_string(),
    consumer_secret: "shh".to_string(),
    callback_url:    "http://localhost:8080/auth/callback".to_string(),
    api_version:     "48.0".to_string(),
    timeout:         Duration::from_millis(200),
  })
  .unwrap()
}

fn auth(base: &str, token: &str) -> CrmAuth {
  CrmAuth {
    instance_url: base.to_string(),
    access_token: token.to_string(),
  }
}

// ─── OAuth ────────────────────────────────────────────────────────────────────

#[test]
fn authorization_url_carries_app_and_state() {
  let url = connector("https://login.salesforce.com/")
    .authorization_url("st4te")
    .unwrap();
  assert!(url.starts_with("https://login.salesforce.com/services/oauth2/authorize?"), "{url}");
  assert!(url.contains("response_type=code"));
  assert!(url.contains("client_id=key"));
  assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback"));
  assert!(url.contains("scope=api"));
  assert!(url.contains("state=st4te"));
}

#[test]
fn bad_login_url_is_rejected() {
  let mut config = SalesforceConfig {
    login_url:       "not a url".to_string(),
    consumer_key:    String::new(),
    consumer_secret: String::new(),
    callback_url:    String::new(),
    api_version:     "48.0".to_string(),
    timeout:         Duration::from_secs(1),
  };
  assert!(SalesforceConnector::new(config.clone()).is_err());
  config.login_url = "https://test.salesforce.com".to_string();
  assert!(SalesforceConnector::new(config).is_ok());
}

#[tokio::test]
async fn exchange_code_returns_instance_and_token() {
  let base = spawn_fake().await;
  let got = connector(&base).exchange_code("good-code").await.unwrap();
  assert_eq!(got, auth(&base, TOKEN));
}

#[tokio::test]
async fn exchange_bad_code_is_api_error() {
  let base = spawn_fake().await;
  let err = connector(&base).exchange_code("stale").await.unwrap_err();
  assert_eq!(
    err,
    CrmError::Api {
      status:  400,
      message: "invalid_grant: expired authorization code".to_string(),
    }
  );
}

#[tokio::test]
async fn revoke_posts_token() {
  let base = spawn_fake().await;
  let sf = connector(&base);
  assert!(sf.revoke(&auth(&base, TOKEN)).await.is_ok());
  assert!(matches!(
    sf.revoke(&auth(&base, "other")).await,
    Err(CrmError::Api { status: 400, .. })
  ));
}

// ─── Data API ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_passes_soql_through() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let result = client.query("SELECT Id FROM Contact").await.unwrap();
  assert_eq!(result.total_size, 1);
  assert!(result.done);
  assert_eq!(result.records[0]["echo"], json!("SELECT Id FROM Contact"));
}

#[tokio::test]
async fn find_renders_escaped_where_clause() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let filter = Filter::new().eq("Id", "003'A").eq("RecordTypeId", "012NB");
  let records = client.find("Contact", &filter, &["Id"]).await.unwrap();
  assert_eq!(
    records[0]["echo"],
    json!(r"SELECT Id FROM Contact WHERE Id = '003\'A' AND RecordTypeId = '012NB'")
  );
}

#[tokio::test]
async fn malformed_query_is_api_error() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let err = client.query("DROP TABLE Contact").await.unwrap_err();
  assert_eq!(
    err,
    CrmError::Api {
      status:  400,
      message: "MALFORMED_QUERY: unexpected token".to_string(),
    }
  );
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, "expired"));
  assert_eq!(client.identity().await.unwrap_err(), CrmError::Unauthorized);
  assert_eq!(
    client.query("SELECT Id FROM Contact").await.unwrap_err(),
    CrmError::Unauthorized
  );
}

#[tokio::test]
async fn slow_call_times_out() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  assert_eq!(client.query("SLOW").await.unwrap_err(), CrmError::Timeout);
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let base = format!("http://{}", listener.local_addr().unwrap());
  drop(listener);

  let client = connector(&base).connect(&auth(&base, TOKEN));
  assert!(matches!(client.identity().await, Err(CrmError::Transport(_))));
}

#[tokio::test]
async fn create_returns_new_id() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let mut fields = mentor_core::contact::Record::new();
  fields.insert("npe4__Contact__c".into(), json!("003A"));
  let id = client.create("npe4__Relationship__c", fields).await.unwrap();
  assert_eq!(id, "a0M000000000001");
}

#[tokio::test]
async fn rejected_create_is_api_error() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let err = client
    .create("npe4__Relationship__c", mentor_core::contact::Record::new())
    .await
    .unwrap_err();
  assert!(matches!(err, CrmError::Api { status: 400, ref message } if message.starts_with("REQUIRED_FIELD_MISSING")));
}

#[tokio::test]
async fn delete_reports_per_id_outcomes_in_order() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let ids = vec!["a01".to_string(), "gone02".to_string(), "a03".to_string()];
  let outcomes = client.delete("npe4__Relationship__c", &ids).await.unwrap();

  let summary: Vec<_> = outcomes.iter().map(|o| (o.id.as_str(), o.success)).collect();
  assert_eq!(summary, vec![("a01", true), ("gone02", false), ("a03", true)]);
  assert_eq!(outcomes[1].errors, vec!["ENTITY_IS_DELETED: entity is deleted".to_string()]);
}

#[tokio::test]
async fn delete_of_nothing_makes_no_call() {
  let client = connector("http://127.0.0.1:9").connect(&auth("http://127.0.0.1:9", TOKEN));
  assert!(client.delete("npe4__Relationship__c", &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn identity_returns_userinfo() {
  let base = spawn_fake().await;
  let client = connector(&base).connect(&auth(&base, TOKEN));
  let me = client.identity().await.unwrap();
  assert_eq!(me["name"], json!("Ada Lovelace"));
}
