//! Cookie header parsing and `Set-Cookie` rendering.

use axum::http::{HeaderMap, header};

use crate::SessionConfig;

/// How long the OAuth `state` cookie lives; enough to complete a login.
const STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Value of the first cookie called `name` across all `Cookie` headers.
pub fn read(headers: &HeaderMap, name: &str) -> Option<String> {
  headers
    .get_all(header::COOKIE)
    .iter()
    .filter_map(|v| v.to_str().ok())
    .flat_map(|v| v.split(';'))
    .filter_map(|pair| pair.trim().split_once('='))
    .find(|(k, _)| *k == name)
    .map(|(_, v)| v.trim_matches('"').to_owned())
    .filter(|v| !v.is_empty())
}

/// `SameSite` policy of a rendered cookie.
#[derive(Clone, Copy)]
enum SameSite {
  /// Sent on same-site requests only. Keeps cross-site links and forms from
  /// riding the session, including `GET /unmatch`.
  Strict,
  /// Also sent on top-level cross-site navigations, such as the redirect
  /// back from the CRM's login page.
  Lax,
}

impl SameSite {
  fn as_str(self) -> &'static str {
    match self {
      SameSite::Strict => "Strict",
      SameSite::Lax => "Lax",
    }
  }
}

fn render(
  config: &SessionConfig,
  name: &str,
  value: &str,
  path: &str,
  max_age: i64,
  same_site: SameSite,
) -> String {
  let same_site = same_site.as_str();
  let mut cookie =
    format!("{name}={value}; Path={path}; Max-Age={max_age}; HttpOnly; SameSite={same_site}");
  if config.secure_cookie {
    cookie.push_str("; Secure");
  }
  cookie
}

/// The session cookie carrying `value`, living as long as the session TTL.
pub fn session(config: &SessionConfig, value: &str) -> String {
  render(config, &config.cookie_name, value, "/", config.max_age_secs(), SameSite::Strict)
}

/// Expire the session cookie in the browser.
pub fn clear_session(config: &SessionConfig) -> String {
  render(config, &config.cookie_name, "", "/", 0, SameSite::Strict)
}

/// The cookie pinning a login's OAuth `state` to this browser.
pub fn state(config: &SessionConfig, value: &str) -> String {
  render(
    config,
    &config.state_cookie_name(),
    value,
    "/auth",
    STATE_MAX_AGE_SECS,
    SameSite::Lax,
  )
}

pub fn clear_state(config: &SessionConfig) -> String {
  render(config, &config.state_cookie_name(), "", "/auth", 0, SameSite::Lax)
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(values: &[&str]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for v in values {
      map.append(header::COOKIE, HeaderValue::from_str(v).unwrap());
    }
    map
  }

  #[test]
  fn finds_named_cookie_among_others() {
    let h = headers(&["theme=dark; match_sid=abc123; lang=en"]);
    assert_eq!(read(&h, "match_sid").as_deref(), Some("abc123"));
  }

  #[test]
  fn searches_every_cookie_header() {
    let h = headers(&["theme=dark", "match_sid=xyz"]);
    assert_eq!(read(&h, "match_sid").as_deref(), Some("xyz"));
  }

  #[test]
  fn prefix_names_do_not_match() {
    let h = headers(&["match_sid_state=s1"]);
    assert_eq!(read(&h, "match_sid"), None);
    assert_eq!(read(&h, "match_sid_state").as_deref(), Some("s1"));
  }

  #[test]
  fn empty_value_is_absent() {
    assert_eq!(read(&headers(&["match_sid="]), "match_sid"), None);
    assert_eq!(read(&HeaderMap::new(), "match_sid"), None);
  }

  #[test]
  fn session_cookie_attributes() {
    let config = SessionConfig::default();
    assert_eq!(
      session(&config, "abc"),
      "match_sid=abc; Path=/; Max-Age=28800; HttpOnly; SameSite=Strict"
    );
    assert!(clear_session(&config).contains("SameSite=Strict"));

    let secure = SessionConfig { secure_cookie: true, ..SessionConfig::default() };
    assert!(session(&secure, "abc").ends_with("; Secure"));
    assert!(clear_session(&secure).contains("Max-Age=0"));
  }

  #[test]
  fn state_cookie_survives_cross_site_redirect() {
    let config = SessionConfig::default();
    assert_eq!(
      state(&config, "s1"),
      "match_sid_state=s1; Path=/auth; Max-Age=600; HttpOnly; SameSite=Lax"
    );
    assert!(clear_state(&config).contains("SameSite=Lax"));
  }
}
