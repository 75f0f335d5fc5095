#[cfg(test)]
mod update_endpoint {
    use std::sync::Arc;

    use annonsplats::{
        auth::unsigned_token,
        config,
        models::table::ListingTable,
        supabase::{memory::MemoryStore, Row},
        web::{router, AppState},
    };
    use axum::{
        body::Body,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE, COOKIE},
            Request, StatusCode,
        },
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::default());
        store.seed(
            ListingTable::Listings,
            [row(json!({
                "id": "l1",
                "user_id": "u1",
                "title": "Gammal rubrik",
                "price": 1_000_000,
                "status": "published"
            }))],
        );
        let state = AppState::with_memory_store(config::create_test_config(), store.clone());
        (store, state)
    }

    async fn post_update(
        state: AppState,
        bearer_sub: Option<&str>,
        body: impl Into<Body>,
    ) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/listings/update")
            .header(CONTENT_TYPE, "application/json");
        if let Some(sub) = bearer_sub {
            let token = unsigned_token(&json!({ "sub": sub }));
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = router(state)
            .oneshot(request.body(body.into()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn stored(store: &MemoryStore) -> Row {
        store.rows(ListingTable::Listings).remove(0)
    }

    #[tokio::test]
    async fn only_allow_listed_columns_are_written() {
        let (store, state) = setup();
        let body = json!({
            "id": "l1",
            "payload": {
                "title": "Ny rubrik",
                "price": 950_000,
                "user_id": "u2",
                "id": "other",
                "is_admin": true
            }
        });

        let (status, text) = post_update(state, Some("u1"), body.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({ "ok": true }));

        let row = stored(&store);
        assert_eq!(row["title"], "Ny rubrik");
        assert_eq!(row["price"], 950_000);
        assert_eq!(row["user_id"], "u1");
        assert_eq!(row["id"], "l1");
        assert!(!row.contains_key("is_admin"));
    }

    #[tokio::test]
    async fn other_users_are_forbidden() {
        let (store, state) = setup();
        let body = json!({ "id": "l1", "payload": { "title": "Kapad" } });

        let (status, text) = post_update(state, Some("u2"), body.to_string()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(text, "Du äger inte denna annons.");
        assert_eq!(stored(&store)["title"], "Gammal rubrik");
    }

    #[tokio::test]
    async fn bearer_token_is_required() {
        let (_, state) = setup();
        let body = json!({ "id": "l1", "payload": { "title": "x" } }).to_string();

        let (status, _) = post_update(state.clone(), None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // a session cookie alone is not enough here
        let token = unsigned_token(&json!({ "sub": "u1" }));
        let request = Request::builder()
            .method("POST")
            .uri("/api/listings/update")
            .header(COOKIE, format!("sb-access-token={token}"))
            .body(Body::from(body))
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn email_only_token_is_not_enough() {
        let (_, state) = setup();
        let token = unsigned_token(&json!({ "email": "u1@example.se" }));
        let request = Request::builder()
            .method("POST")
            .uri("/api/listings/update")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(
                json!({ "id": "l1", "payload": { "title": "x" } }).to_string(),
            ))
            .unwrap();

        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_requests() {
        for body in [
            json!({ "id": "l1" }),
            json!({ "id": "l1", "payload": "title=x" }),
            json!({ "id": "l1", "payload": [1, 2] }),
            json!({ "payload": { "title": "x" } }),
            json!({ "id": "", "payload": { "title": "x" } }),
        ] {
            let (_, state) = setup();
            let (status, _) = post_update(state, Some("u1"), body.to_string()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn unknown_listing() {
        let (_, state) = setup();
        let body = json!({ "id": "missing", "payload": { "title": "x" } });
        let (status, _) = post_update(state, Some("u1"), body.to_string()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let (store, state) = setup();
        store.set_failing_writes(Some("value too long"));

        let body = json!({ "id": "l1", "payload": { "title": "x" } });
        let (status, text) = post_update(state, Some("u1"), body.to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, "Kunde inte uppdatera: value too long");
    }
}
