//! Router-level tests against an in-memory SQLite store.

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use cohort_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{
  AppState,
  auth::{AuthConfig, SessionIssuer, TelegramVerifier, oidc},
  router,
};

const BYPASS: &str = "e2e-secret";
const BOT_TOKEN: &str = "4242:test-bot";

async fn app() -> Router {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  let auth = AuthConfig {
    oidc:          oidc::tests::verifier(),
    telegram:      TelegramVerifier::new(BOT_TOKEN, Duration::hours(24)).unwrap(),
    sessions:      SessionIssuer::new(b"session-secret", Duration::hours(1)),
    bypass_secret: Some(BYPASS.into()),
  };
  router(AppState::new(store, auth))
}

fn admin_bearer() -> String {
  format!("Bearer {}", oidc::tests::token(&oidc::tests::claims(), oidc::tests::KID))
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  auth: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(auth) = auth {
    builder = builder.header(header::AUTHORIZATION, auth);
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

async fn bypass_token(app: &Router, telegram_id: i64) -> String {
  let (status, body) = send(
    app,
    "POST",
    "/http/auth/bypass-session",
    None,
    Some(json!({ "secret": BYPASS, "telegramId": telegram_id, "source": "tests" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  format!("Bearer {}", body["token"].as_str().unwrap())
}

/// Register a participant through the bypass path and return its id.
async fn register(app: &Router, telegram_id: i64) -> (String, String) {
  let bearer = bypass_token(app, telegram_id).await;
  let (status, me) = send(app, "GET", "/app/me", Some(&bearer), None).await;
  assert_eq!(status, StatusCode::OK);
  (bearer, me["participant_id"].as_str().unwrap().to_owned())
}

// ── Bypass ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bypass_rejects_wrong_secret() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/http/auth/bypass-session",
    None,
    Some(json!({ "secret": "nope", "telegramId": 1, "source": "tests" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn bypass_session_authenticates_app_routes() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/http/auth/bypass-session",
    None,
    Some(json!({ "secret": BYPASS, "telegramId": 31337, "source": "tests" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["telegramId"], 31337);

  let bearer = format!("Bearer {}", body["token"].as_str().unwrap());
  let (status, me) = send(&app, "GET", "/app/me", Some(&bearer), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["telegram_id"], 31337);

  // A second call reuses the same participant.
  let (_, again) = send(&app, "GET", "/app/me", Some(&bearer), None).await;
  assert_eq!(again["participant_id"], me["participant_id"]);
}

#[tokio::test]
async fn app_routes_require_credentials() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/app/me", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, _) = send(&app, "GET", "/app/me", Some("Bearer garbage"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn init_data_registers_the_telegram_profile() {
  let app = app().await;
  let verifier = TelegramVerifier::new(BOT_TOKEN, Duration::hours(24)).unwrap();
  let now = Utc::now().timestamp().to_string();
  let raw = verifier
    .sign(&[
      ("auth_date", now.as_str()),
      ("user", r#"{"id":777,"first_name":"Mila","username":"mila"}"#),
    ])
    .unwrap();

  let (status, me) = send(&app, "GET", "/app/me", Some(&format!("tma {raw}")), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["telegram_id"], 777);
  assert_eq!(me["first_name"], "Mila");
  assert_eq!(me["username"], "mila");

  let tampered = raw.replace("Mila", "Eve");
  let (status, _) =
    send(&app, "GET", "/app/me", Some(&format!("tma {tampered}")), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Admin ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_require_id_token() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/admin/seasons", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  // A session token is not an admin credential.
  let bearer = bypass_token(&app, 5).await;
  let (status, _) = send(&app, "GET", "/admin/seasons", Some(&bearer), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let (status, body) = send(&app, "GET", "/admin/seasons", Some(&admin_bearer()), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

#[tokio::test]
async fn comment_on_missing_season_is_404() {
  let app = app().await;
  let uri = format!("/admin/seasons/{}/comments", uuid::Uuid::new_v4());
  let (status, _) =
    send(&app, "POST", &uri, Some(&admin_bearer()), Some(json!({ "text": "hi" }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_lifecycle() {
  let app = app().await;
  let admin = admin_bearer();

  let (status, season) = send(
    &app,
    "POST",
    "/admin/seasons",
    Some(&admin),
    Some(json!({ "name": "Autumn" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let comments_uri = format!("/admin/seasons/{}/comments", season["season_id"].as_str().unwrap());

  let (status, first) =
    send(&app, "POST", &comments_uri, Some(&admin), Some(json!({ "text": "first" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(first["author_name"], "Ada Admin");
  send(&app, "POST", &comments_uri, Some(&admin), Some(json!({ "text": "second" }))).await;

  let (_, listed) = send(&app, "GET", &comments_uri, Some(&admin), None).await;
  let texts: Vec<_> = listed.as_array().unwrap().iter().map(|c| c["text"].clone()).collect();
  assert_eq!(texts, vec![json!("first"), json!("second")]);

  let delete_uri = format!("/admin/comments/{}", first["comment_id"].as_str().unwrap());
  let (status, _) = send(&app, "DELETE", &delete_uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = send(&app, "DELETE", &delete_uri, Some(&admin), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (_, listed) = send(&app, "GET", &comments_uri, Some(&admin), None).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_comment_is_rejected() {
  let app = app().await;
  let admin = admin_bearer();
  let (_, season) =
    send(&app, "POST", "/admin/seasons", Some(&admin), Some(json!({ "name": "S" }))).await;
  let uri = format!("/admin/seasons/{}/comments", season["season_id"].as_str().unwrap());
  let (status, _) = send(&app, "POST", &uri, Some(&admin), Some(json!({ "text": "  " }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_group_is_rejected() {
  let app = app().await;
  let mut ids = Vec::new();
  for tg in 1..=5 {
    ids.push(register(&app, tg).await.1);
  }
  let (status, _) = send(
    &app,
    "POST",
    "/admin/groups",
    Some(&admin_bearer()),
    Some(json!({ "participants": ids, "region": "north" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Test seeding ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_group_needs_four_participants() {
  let app = app().await;
  let (_, me) = register(&app, 100).await;
  for tg in 101..=102 {
    register(&app, tg).await;
  }

  let body = json!({ "secret": BYPASS, "participantId": &me });
  let (status, _) = send(&app, "POST", "/http/testing/groups", None, Some(body.clone())).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

  register(&app, 103).await;
  let (status, group) = send(&app, "POST", "/http/testing/groups", None, Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(group["status"], "completed");
  assert_eq!(group["region"], "unknown");
  assert_eq!(group["participants"][0], json!(me));

  let (bearer, _) = register(&app, 100).await;
  let (_, mine) = send(&app, "GET", "/app/groups", Some(&bearer), None).await;
  assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn testing_endpoints_check_the_secret() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/http/testing/feedback/delete",
    None,
    Some(json!({ "secret": "wrong", "telegramId": 1 })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn delete_feedback_reports_count() {
  let app = app().await;
  let (bearer, _) = register(&app, 900).await;
  for text in ["great", "fine"] {
    let (status, _) =
      send(&app, "POST", "/app/feedback", Some(&bearer), Some(json!({ "content": text }))).await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let body = json!({ "secret": BYPASS, "telegramId": 900 });
  let (status, res) =
    send(&app, "POST", "/http/testing/feedback/delete", None, Some(body.clone())).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(res["deleted"], 2);

  let (_, left) = send(&app, "GET", "/app/feedback", Some(&bearer), None).await;
  assert_eq!(left, json!([]));

  let (status, res) = send(&app, "POST", "/http/testing/feedback/delete", None, Some(body)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(res["deleted"], 0);

  let (status, _) = send(
    &app,
    "POST",
    "/http/testing/feedback/delete",
    None,
    Some(json!({ "secret": BYPASS, "telegramId": 404 })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
