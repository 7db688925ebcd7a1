use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zoodb::auth::Session;
use zoodb::{Config, Error, ZooDb};

fn session_body(access_token: &str, email: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-1",
        "user": {
            "id": "user-1",
            "email": email,
            "role": "authenticated"
        }
    })
}

fn db_for(server: &MockServer) -> ZooDb {
    let config = Config::new(&server.uri(), "test-anon-key")
        .unwrap()
        .with_admin_emails(["keeper@example.com"]);
    ZooDb::new(config)
}

#[tokio::test]
async fn sign_up_stores_the_returned_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body("access-1", "visitor@example.com")),
        )
        .mount(&server)
        .await;

    let db = db_for(&server);
    let result = db
        .auth()
        .sign_up("visitor@example.com", "password123")
        .await;

    let session = result.unwrap().expect("session should be present");
    assert_eq!(session.access_token, "access-1");
    assert_eq!(db.auth().user_id().as_deref(), Some("user-1"));
    assert_eq!(db.auth().access_token().as_deref(), Some("access-1"));
}

#[tokio::test]
async fn sign_up_pending_confirmation_yields_no_session() {
    let server = MockServer::start().await;
    // confirmation-required projects answer with just the user record
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "email": "visitor@example.com",
            "confirmation_sent_at": "2026-08-25T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let result = db
        .auth()
        .sign_up("visitor@example.com", "password123")
        .await;

    assert!(result.unwrap().is_none());
    assert!(db.auth().session().is_none());
}

#[tokio::test]
async fn password_sign_in_uses_the_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(body_json(json!({
            "email": "keeper@example.com",
            "password": "password123"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_body("access-1", "keeper@example.com")),
        )
        .mount(&server)
        .await;

    let db = db_for(&server);
    let session = db
        .auth()
        .sign_in_with_password(" keeper@example.com ", "password123")
        .await
        .unwrap();

    assert_eq!(session.access_token, "access-1");
    assert!(db.auth().privilege().is_admin());
}

#[tokio::test]
async fn non_admin_sign_in_stays_anonymous_privilege() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body("access-2", "visitor@example.com")),
        )
        .mount(&server)
        .await;

    let db = db_for(&server);
    db.auth()
        .sign_in_with_password("visitor@example.com", "password123")
        .await
        .unwrap();

    assert!(!db.auth().privilege().is_admin());
}

#[tokio::test]
async fn magic_link_posts_a_normalized_email_and_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/otp"))
        .and(query_param("redirect_to", "https://zoo.example/app"))
        .and(body_json(json!({
            "email": "keeper@example.com",
            "create_user": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let result = db
        .auth()
        .sign_in_with_magic_link("  Keeper@Example.COM ", Some("https://zoo.example/app"))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn magic_link_rejects_a_blank_email_before_any_request() {
    let server = MockServer::start().await;

    let db = db_for(&server);
    let err = db
        .auth()
        .sign_in_with_magic_link("   ", None)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(err.to_string(), "validation error: email is required");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn password_recovery_posts_to_recover() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .and(query_param("redirect_to", "https://zoo.example/reset"))
        .and(body_json(json!({"email": "keeper@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    let result = db
        .auth()
        .reset_password_for_email("keeper@example.com", Some("https://zoo.example/reset"))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn refresh_exchanges_the_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({"refresh_token": "refresh-0"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_body("access-2", "keeper@example.com")),
        )
        .mount(&server)
        .await;

    let db = db_for(&server);
    db.auth()
        .set_session(Session::new("access-0".into(), Some("refresh-0".into()), 3600));

    let session = db.auth().refresh_session().await.unwrap();

    assert_eq!(session.access_token, "access-2");
    assert_eq!(db.auth().access_token().as_deref(), Some("access-2"));
}

#[tokio::test]
async fn refresh_without_a_session_is_an_auth_error() {
    let server = MockServer::start().await;

    let db = db_for(&server);
    let err = db.auth().refresh_session().await.unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
}

#[tokio::test]
async fn sign_out_clears_locally_even_when_the_revoke_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("Authorization", "Bearer access-0"))
        .respond_with(ResponseTemplate::new(500).set_body_string("revoke exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let db = db_for(&server);
    db.auth()
        .set_session(Session::new("access-0".into(), None, 3600));
    let mut changes = db.auth().on_session_change();

    let result = db.auth().sign_out().await;

    assert!(result.is_ok());
    assert!(db.auth().session().is_none());
    assert!(changes.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn applying_a_session_routes_its_token_into_data_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pet_types"))
        .and(header("Authorization", "Bearer test-anon-key"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Cat"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/pet_types"))
        .and(header("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "Cat"},
            {"id": 2, "name": "Dog"}
        ])))
        .mount(&server)
        .await;

    let db = db_for(&server);
    let anonymous = db.catalog().pet_types().await.unwrap();
    assert_eq!(anonymous.len(), 1);

    db.auth()
        .set_session(Session::new("access-1".into(), Some("refresh-1".into()), 3600));
    db.apply_session().await;

    let signed_in = db.catalog().pet_types().await.unwrap();
    assert_eq!(signed_in.len(), 2);
    assert_eq!(signed_in[1].name, "Dog");
}
