//! Integration tests for the authenticated admin API

use opsdeck_client::admin::UserPayload;
use opsdeck_client::{AdminApi, SessionCoordinator};
use opsdeck_core::MemoryTokenStore;
use opsdeck_core::store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore, USER_KEY};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn admin_api(server: &MockServer, store: Arc<MemoryTokenStore>) -> AdminApi {
    store.set(ACCESS_TOKEN_KEY, "A1").await.unwrap();
    store.set(REFRESH_TOKEN_KEY, "R1").await.unwrap();
    let session = SessionCoordinator::builder()
        .base_url(server.uri())
        .store(store as Arc<dyn TokenStore>)
        .build()
        .unwrap();
    AdminApi::new(session)
}

#[tokio::test]
async fn profile_is_fetched_and_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "user": { "id": "u1", "name": "Admin", "email": "admin@example.com" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let api = admin_api(&server, Arc::clone(&store)).await;

    let profile = api.profile().await.unwrap();
    assert_eq!(profile.id, "u1");
    assert_eq!(profile.email.as_deref(), Some("admin@example.com"));

    let cached = store.get(USER_KEY).await.unwrap().unwrap();
    assert!(cached.contains("\"id\":\"u1\""));
}

#[tokio::test]
async fn list_users_decodes_the_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [
                { "id": "u1", "name": "Admin", "role": "admin" },
                { "id": "u2", "name": "Staff", "role": ["staff", "support"] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = admin_api(&server, Arc::new(MemoryTokenStore::new())).await;

    let users = api.list_users(1000).await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].id, "u2");
}

#[tokio::test]
async fn delete_users_posts_the_id_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/delete-user"))
        .and(body_json(json!({ "ids": ["u1", "u2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "deleted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = admin_api(&server, Arc::new(MemoryTokenStore::new())).await;
    api.delete_users(&["u1".to_string(), "u2".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn create_user_returns_the_created_profile() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/user/update-user/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "id": "u9", "name": "Fresh", "email": "fresh@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = admin_api(&server, Arc::new(MemoryTokenStore::new())).await;

    let payload = UserPayload {
        name: "Fresh".to_string(),
        email: "fresh@example.com".to_string(),
        role: "customer".to_string(),
        verified: true,
        is_active: true,
        ..UserPayload::default()
    };
    let created = api.create_user(&payload).await.unwrap();
    assert_eq!(created.id, "u9");
}

#[tokio::test]
async fn categories_listing_refreshes_an_expired_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/categories"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [ { "id": "c1", "name": "Books" } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({ "refreshToken": "R1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "token": "A2", "refreshToken": "R2" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let api = admin_api(&server, Arc::clone(&store)).await;

    let categories = api.list_categories().await.unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "Books");

    assert_eq!(
        store.get(REFRESH_TOKEN_KEY).await.unwrap(),
        Some("R2".to_string())
    );
}

#[tokio::test]
async fn delete_categories_failure_surfaces_the_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/categories/delete-category"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "category is in use"
        })))
        .mount(&server)
        .await;

    let api = admin_api(&server, Arc::new(MemoryTokenStore::new())).await;

    let result = api.delete_categories(&["c1".to_string()]).await;
    match result {
        Err(opsdeck_client::ClientError::Api(message)) => {
            assert_eq!(message, "category is in use");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}
