//! HTTP contract of the portal router: credentials, role gates, status codes and the
//! JSON error body, exercised with `tower::ServiceExt::oneshot`.

mod common {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};
    use axum::Router;
    use chrono::Duration;
    use listing_portal::auth::{CredentialVerifier, PasswordHasher, Provisioning};
    use listing_portal::domain::Role;
    use listing_portal::http::portal_router;
    use listing_portal::portal::Portal;
    use listing_portal::store::InMemoryStore;
    use serde_json::Value;
    use tower::ServiceExt;

    pub(super) const PASSWORD: &str = "portal-pass";

    pub(super) struct Api {
        pub(super) router: Router,
        pub(super) portal: Arc<Portal<InMemoryStore>>,
    }

    pub(super) async fn api() -> Api {
        let store = Arc::new(InMemoryStore::new());
        let portal = Arc::new(Portal::new(
            store,
            CredentialVerifier::new("http-api", Duration::hours(1)),
            PasswordHasher::new(4),
        ));
        for (name, email, role) in [
            ("Admin", "admin@agency.test", Role::Admin),
            ("Ines", "ines@agency.test", Role::Agent),
        ] {
            portal
                .auth()
                .provision(Provisioning {
                    name: name.to_string(),
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    role,
                })
                .await
                .expect("provision succeeds");
        }
        Api {
            router: portal_router(portal.clone()),
            portal,
        }
    }

    impl Api {
        pub(super) async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response<Body> {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(json) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(serde_json::to_vec(&json).expect("json encodes"))
                }
                None => Body::empty(),
            };
            self.router
                .clone()
                .oneshot(builder.body(body).expect("request builds"))
                .await
                .expect("route executes")
        }

        pub(super) async fn login(&self, email: &str) -> String {
            let response = self
                .send(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(serde_json::json!({ "email": email, "password": PASSWORD })),
                )
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            let payload = read_json_body(response).await;
            payload["token"]
                .as_str()
                .expect("token present")
                .to_string()
        }
    }

    pub(super) async fn read_json_body(response: Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }
}

use axum::http::StatusCode;
use common::*;
use serde_json::json;

fn listing(title: &str) -> serde_json::Value {
    json!({
        "title": title,
        "kind": "sale",
        "price": 250000,
        "surface": 95.5,
        "city": "Bizerte",
        "images": ["https://cdn/1.jpg", "https://cdn/2.jpg"],
    })
}

#[tokio::test]
async fn login_returns_token_and_user() {
    let api = api().await;
    let response = api
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": " Ines@Agency.test", "password": PASSWORD })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user"]["role"], "agent");
    assert_eq!(payload["user"]["email"], "ines@agency.test");
    assert!(payload["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn bad_login_is_unauthorized_and_missing_fields_are_validation_errors() {
    let api = api().await;
    let response = api
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ines@agency.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json_body(response).await["code"], "UNAUTHORIZED");

    let response = api
        .send("POST", "/api/auth/login", None, Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["code"], "VALIDATION_ERROR");
    assert_eq!(payload["fields"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn protected_routes_require_a_valid_credential() {
    let api = api().await;
    for (method, uri) in [
        ("GET", "/api/admin/properties"),
        ("GET", "/api/admin/requests"),
        ("GET", "/api/agent/requests"),
        ("GET", "/api/agent/my-properties"),
    ] {
        let response = api.send(method, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");

        let response = api.send(method, uri, Some("garbage.token.value"), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn role_gates_separate_admin_and_agent_routes() {
    let api = api().await;
    let admin = api.login("admin@agency.test").await;
    let agent = api.login("ines@agency.test").await;

    let response = api.send("GET", "/api/admin/agents", Some(&agent), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json_body(response).await["code"], "FORBIDDEN");

    let response = api
        .send("GET", "/api/agent/my-properties", Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = api.send("GET", "/api/admin/agents", Some(&admin), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let agents = read_json_body(response).await;
    assert_eq!(agents.as_array().map(Vec::len), Some(1));
    assert_eq!(agents[0]["name"], "Ines");
}

#[tokio::test]
async fn agent_request_approval_unlocks_agent_routes() {
    let api = api().await;
    let admin = api.login("admin@agency.test").await;
    let agent = api.login("ines@agency.test").await;

    let response = api
        .send("POST", "/api/agent/properties", Some(&agent), Some(listing("Bay flat")))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = api
        .send(
            "POST",
            "/api/agent/requests",
            Some(&agent),
            Some(json!({ "action": "add", "justification": "New mandate in Bizerte" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let request = read_json_body(response).await;
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_i64().expect("id present");

    let response = api
        .send(
            "POST",
            "/api/agent/requests",
            Some(&agent),
            Some(json!({ "action": "add", "justification": "Again" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(response).await["code"], "DUPLICATE_PENDING");

    let response = api
        .send(
            "PUT",
            &format!("/api/admin/requests/{request_id}"),
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["status"], "approved");

    let response = api
        .send(
            "PUT",
            &format!("/api/admin/requests/{request_id}"),
            Some(&admin),
            Some(json!({ "status": "rejected" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(read_json_body(response).await["code"], "ALREADY_RESOLVED");

    let response = api
        .send("POST", "/api/agent/properties", Some(&agent), Some(listing("Bay flat")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = api
        .send("GET", "/api/agent/my-properties", Some(&agent), None)
        .await;
    let mine = read_json_body(response).await;
    assert_eq!(mine[0]["title"], "Bay flat");
    assert_eq!(mine[0]["primary_image"], "https://cdn/1.jpg");
    assert_eq!(mine[0]["agent_name"], "Ines");

    let response = api
        .send("GET", "/api/agent/requests", Some(&agent), None)
        .await;
    let requests = read_json_body(response).await;
    assert_eq!(requests.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn resolve_requires_terminal_status() {
    let api = api().await;
    let admin = api.login("admin@agency.test").await;

    for body in [json!({}), json!({ "status": "pending" }), json!({ "status": "maybe" })] {
        let response = api
            .send("PUT", "/api/admin/requests/1", Some(&admin), Some(body))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let response = api
        .send(
            "PUT",
            "/api/admin/requests/42",
            Some(&admin),
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_crud_and_public_reads() {
    let api = api().await;
    let admin = api.login("admin@agency.test").await;

    let response = api
        .send("POST", "/api/admin/properties", Some(&admin), Some(listing("Seafront")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = read_json_body(response).await["id"]
        .as_i64()
        .expect("id present");

    let response = api
        .send("GET", "/api/properties?kind=all&city=bizer&price_max=300000", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let results = read_json_body(response).await;
    assert_eq!(results.as_array().map(Vec::len), Some(1));

    let response = api
        .send(
            "PUT",
            &format!("/api/admin/properties/{id}/images"),
            Some(&admin),
            Some(json!({ "images": ["https://cdn/new.jpg"] })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = api
        .send("GET", &format!("/api/properties/{id}"), None, None)
        .await;
    let detail = read_json_body(response).await;
    assert_eq!(detail["images"][0]["url"], "https://cdn/new.jpg");
    assert_eq!(detail["images"][0]["is_primary"], true);

    let response = api
        .send(
            "PUT",
            &format!("/api/admin/properties/{id}"),
            Some(&admin),
            Some(json!({ "title": "", "kind": "sale" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    let fields: Vec<&str> = payload["fields"]
        .as_array()
        .expect("fields present")
        .iter()
        .filter_map(|field| field["field"].as_str())
        .collect();
    assert_eq!(fields, ["title", "price"]);

    let response = api
        .send("DELETE", &format!("/api/admin/properties/{id}"), Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = api
        .send("GET", &format!("/api/properties/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = api
        .send("GET", "/api/admin/audit?limit=10", Some(&admin), None)
        .await;
    let entries = read_json_body(response).await;
    let verbs: Vec<&str> = entries
        .as_array()
        .expect("entries present")
        .iter()
        .filter_map(|entry| entry["verb"].as_str())
        .collect();
    assert_eq!(&verbs[..3], ["delete", "replace_images", "create"]);
}

#[tokio::test]
async fn public_search_rejects_unknown_kind() {
    let api = api().await;
    let response = api.send("GET", "/api/properties?kind=barter", None, None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(api.portal.health_check().await.is_ok());
}
