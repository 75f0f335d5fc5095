#[cfg(test)]
mod delete_endpoint {
    use std::sync::Arc;

    use annonsplats::{
        auth::unsigned_token,
        config::{self, Config},
        models::table::ListingTable,
        supabase::{memory::MemoryStore, Row},
        web::{router, AppState},
    };
    use axum::{
        body::Body,
        http::{
            header::{CONTENT_TYPE, COOKIE},
            Request, StatusCode,
        },
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PUBLIC: &str = "http://localhost:54321/storage/v1/object/public";

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn cookie_for(claims: Value) -> String {
        format!("sb-access-token={}", unsigned_token(&claims))
    }

    async fn post_delete(
        state: AppState,
        cookie: Option<String>,
        body: impl Into<Body>,
    ) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/api/ads/delete")
            .header(CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
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

    fn setup() -> (Arc<MemoryStore>, AppState) {
        let store = Arc::new(MemoryStore::default());
        let state = AppState::with_memory_store(config::create_test_config(), store.clone());
        (store, state)
    }

    #[tokio::test]
    async fn missing_backend_configuration() {
        let state = AppState {
            config: Arc::new(Config::default()),
            backend: None,
        };
        let (status, _) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": 1, "table": "annonser" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn malformed_requests() {
        let cookie = Some(cookie_for(json!({ "sub": "u1" })));
        for body in [
            "not json".to_string(),
            json!({ "table": "listings" }).to_string(),
            json!({ "id": "  ", "table": "listings" }).to_string(),
            json!({ "id": 1, "table": "users" }).to_string(),
            json!({ "id": "u1", "table": "profiles" }).to_string(),
            json!({ "id": 1 }).to_string(),
        ] {
            let (_, state) = setup();
            let (status, text) = post_delete(state, cookie.clone(), body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(text, "Felaktig request (id/table).");
        }
    }

    #[tokio::test]
    async fn identity_is_required() {
        let (_, state) = setup();
        let body = json!({ "id": 1, "table": "annonser" }).to_string();

        let (status, _) = post_delete(state.clone(), None, body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_delete(state.clone(), Some(cookie_for(json!({ "role": "anon" }))), body.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            post_delete(state, Some("sb-access-token=garbage".to_string()), body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_row() {
        let (_, state) = setup();
        let (status, text) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": "nope", "table": "listings" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(text, "Annons hittades inte.");
    }

    #[tokio::test]
    async fn strangers_are_forbidden_for_every_table() {
        for table in [
            ListingTable::Annonser,
            ListingTable::Uthyrning,
            ListingTable::Listings,
        ] {
            let (store, state) = setup();
            store.seed(
                table,
                [row(json!({
                    "id": 1,
                    "user_id": "owner",
                    "created_by": "owner",
                    "owner_id": "owner",
                    "contact_email": "owner@example.se",
                    "email": "owner@example.se",
                    "image_urls": [format!("{PUBLIC}/listing-images/owner/1.jpg")],
                }))],
            );

            let (status, _) = post_delete(
                state,
                Some(cookie_for(json!({ "sub": "intruder", "email": "intruder@example.se" }))),
                json!({ "id": 1, "table": table.as_str() }).to_string(),
            )
            .await;

            assert_eq!(status, StatusCode::FORBIDDEN, "{table}");
            assert_eq!(store.rows(table).len(), 1);
            assert!(store.removals().is_empty());
        }
    }

    #[tokio::test]
    async fn legacy_owner_matches_by_email() {
        let (store, state) = setup();
        store.seed(
            ListingTable::Uthyrning,
            [row(json!({ "id": 7, "email": "anna@example.se" }))],
        );

        let (status, text) = post_delete(
            state,
            Some(cookie_for(json!({
                "sub": "someone",
                "user_metadata": { "email": "anna@example.se" }
            }))),
            json!({ "id": "7", "table": "uthyrning" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({ "ok": true }));
        assert!(store.rows(ListingTable::Uthyrning).is_empty());
    }

    #[tokio::test]
    async fn images_are_removed_in_chunks_before_the_row() {
        let (store, state) = setup();
        let mut urls: Vec<String> = (0..250)
            .map(|i| format!("{PUBLIC}/listing-images/u1/{i}.jpg"))
            .collect();
        urls.push(urls[0].clone());
        urls.push("https://elsewhere.example/photo.jpg".to_string());
        for i in 0..250 {
            store.put_object("listing-images", &format!("u1/{i}.jpg"), vec![0]);
        }
        store.seed(
            ListingTable::Listings,
            [row(json!({ "id": "l1", "user_id": "u1", "image_urls": urls }))],
        );

        let (status, _) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": "l1", "table": "listings" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let sizes: Vec<usize> = store
            .removals()
            .iter()
            .map(|(bucket, paths)| {
                assert_eq!(bucket, "listing-images");
                paths.len()
            })
            .collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(store.object_count(), 0);
        assert!(store.rows(ListingTable::Listings).is_empty());
    }

    #[tokio::test]
    async fn images_are_grouped_by_bucket_with_decoded_paths() {
        let (store, state) = setup();
        store.seed(
            ListingTable::Annonser,
            [row(json!({
                "id": 3,
                "created_by": "u1",
                "images": null,
                "photos": {
                    "cover": format!("{PUBLIC}/old-bucket/u1/G%C3%A5rd%201.jpg"),
                    "rest": [format!("{PUBLIC}/listing-images/u1/a.jpg")]
                }
            }))],
        );

        let (status, _) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": 3, "table": "annonser" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let mut removals = store.removals();
        removals.sort();
        assert_eq!(
            removals,
            vec![
                ("listing-images".to_string(), vec!["u1/a.jpg".to_string()]),
                ("old-bucket".to_string(), vec!["u1/Gård 1.jpg".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn storage_failure_keeps_the_row() {
        let (store, state) = setup();
        store.seed(
            ListingTable::Listings,
            [row(json!({
                "id": "l1",
                "user_id": "u1",
                "image_urls": [format!("{PUBLIC}/listing-images/u1/1.jpg")]
            }))],
        );
        store.set_failing_storage(Some("bucket not found"));

        let (status, text) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": "l1", "table": "listings" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(text.contains("bucket not found"), "{text}");
        assert_eq!(store.rows(ListingTable::Listings).len(), 1);
    }

    #[tokio::test]
    async fn row_delete_failure_reports_backend_message() {
        let (store, state) = setup();
        store.seed(
            ListingTable::Listings,
            [row(json!({ "id": "l1", "user_id": "u1" }))],
        );
        store.set_failing_writes(Some("permission denied"));

        let (status, text) = post_delete(
            state,
            Some(cookie_for(json!({ "sub": "u1" }))),
            json!({ "id": "l1", "table": "listings" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, "Kunde inte ta bort annons: permission denied");
    }
}
