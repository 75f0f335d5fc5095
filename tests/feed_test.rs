#[cfg(test)]
mod feed_controller {
    use annonsplats::{
        feed::{fetch_page, FeedController},
        filters::{FilterState, Overrides, PAGE_SIZE},
        models::{
            listing::{Kind, Listing},
            table::ListingTable,
        },
        supabase::{memory::MemoryStore, Row, StoreError},
    };
    use serde_json::{json, Value};

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn sale_row(n: usize) -> Row {
        row(json!({
            "id": format!("sale-{n}"),
            "kind": "SALE",
            "objekt": "Villa",
            "title": format!("Villa {n}"),
            "city": "Västerås",
            "price": 4_000_000 + n,
            "status": "published",
            "created_at": format!("2024-01-01T00:{:02}:00+00:00", n),
        }))
    }

    fn rent_apartment() -> Row {
        row(json!({
            "id": "rent-1",
            "kind": "RENT",
            "objekt": "Lägenhet",
            "title": "Lägenhet • 2 rum • 58 m²",
            "city": "Uppsala",
            "room_count": 2,
            "living_area_m2": 58,
            "rent_per_month": 9000,
            "status": "published",
            "created_at": "2024-02-01T12:00:00+00:00",
        }))
    }

    fn listing(id: &str) -> Listing {
        serde_json::from_value(json!({ "id": id })).unwrap()
    }

    fn store_with_sales(count: usize) -> MemoryStore {
        let store = MemoryStore::default();
        store.seed(ListingTable::Listings, (0..count).map(sale_row));
        store
    }

    #[tokio::test]
    async fn pages_accumulate_until_a_short_page() {
        let store = store_with_sales(30);
        let mut feed = FeedController::new();

        assert!(feed.navigate(&store, [("kind", "SALE")]).await);
        assert_eq!(feed.items().len(), PAGE_SIZE);
        assert!(feed.has_more());
        assert!(!feed.is_initial());
        // newest first
        assert_eq!(feed.items()[0].id, "sale-29");

        assert!(feed.load_more(&store).await);
        assert_eq!(feed.items().len(), 24);
        assert_eq!(feed.page(), 1);

        assert!(feed.load_more(&store).await);
        assert_eq!(feed.items().len(), 30);
        assert_eq!(feed.page(), 2);
        assert!(!feed.has_more());

        let selects = store.select_count();
        assert!(!feed.load_more(&store).await);
        assert_eq!(store.select_count(), selects);
    }

    #[tokio::test]
    async fn exactly_full_last_page_needs_one_empty_fetch() {
        let store = store_with_sales(PAGE_SIZE);
        let mut feed = FeedController::new();

        feed.navigate(&store, [("kind", "SALE")]).await;
        assert!(feed.has_more());

        feed.load_more(&store).await;
        assert_eq!(feed.items().len(), PAGE_SIZE);
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn navigation_resets_the_list() {
        let store = store_with_sales(30);
        store.seed(ListingTable::Listings, [rent_apartment()]);
        let mut feed = FeedController::new();

        feed.navigate(&store, [("kind", "SALE")]).await;
        feed.load_more(&store).await;
        assert_eq!(feed.items().len(), 24);

        feed.navigate(&store, [("tab", "uthyres")]).await;
        assert_eq!(feed.filters().kind, Kind::Rent);
        assert_eq!(feed.page(), 0);
        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.items()[0].id, "rent-1");
    }

    #[tokio::test]
    async fn rent_apartment_matches_room_threshold() {
        let store = MemoryStore::default();
        store.seed(ListingTable::Listings, [rent_apartment()]);
        let mut feed = FeedController::new();

        feed.navigate(
            &store,
            [("kind", "RENT"), ("objekt", "Lägenhet"), ("minRum", "2")],
        )
        .await;
        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.items()[0].rent_per_month, Some(9000));
        assert!(!feed.has_more());

        feed.navigate(
            &store,
            [("kind", "RENT"), ("objekt", "Lägenhet"), ("minRum", "3")],
        )
        .await;
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn unpublished_rows_are_hidden() {
        let store = MemoryStore::default();
        let mut draft = rent_apartment();
        draft.insert("status".into(), json!("draft"));
        store.seed(ListingTable::Listings, [draft]);

        let page = fetch_page(&store, &FilterState::from_pairs([("kind", "RENT")]), 0)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn fetch_error_ends_the_feed_quietly() {
        let store = store_with_sales(5);
        store.set_failing_selects(Some("connection reset"));
        let mut feed = FeedController::new();

        assert!(feed.navigate(&store, [("kind", "SALE")]).await);
        assert!(feed.items().is_empty());
        assert!(!feed.has_more());
        assert!(!feed.is_loading());
        assert!(!feed.is_initial());

        store.set_failing_selects(None);
        assert!(!feed.load_more(&store).await);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut feed = FeedController::new();

        let first = feed.begin_navigation([("kind", "SALE")]);
        let second = feed.begin_navigation([("kind", "RENT")]);
        assert!(second.token() > first.token());

        assert!(feed.finish(second, Ok(vec![listing("rent-1")])));
        assert!(!feed.finish(first, Ok(vec![listing("sale-1"), listing("sale-2")])));

        assert_eq!(feed.items().len(), 1);
        assert_eq!(feed.items()[0].id, "rent-1");
        assert_eq!(feed.filters().kind, Kind::Rent);
    }

    #[test]
    fn stale_error_does_not_end_the_feed() {
        let mut feed = FeedController::new();

        let first = feed.begin_navigation([("kind", "SALE")]);
        let second = feed.begin_navigation([("kind", "SALE"), ("q", "Lund")]);

        assert!(!feed.finish(first, Err(StoreError::backend(500, "timeout"))));
        assert!(feed.has_more());
        assert!(feed.is_loading());

        let full: Vec<Listing> = (0..PAGE_SIZE).map(|n| listing(&n.to_string())).collect();
        assert!(feed.finish(second, Ok(full)));
        assert!(feed.has_more());
        assert!(!feed.is_loading());
    }

    #[test]
    fn scroll_is_suppressed_while_loading_but_navigation_is_not() {
        let mut feed = FeedController::new();

        let first = feed.begin_navigation([("kind", "SALE")]);
        assert!(feed.is_loading());
        assert!(feed.begin_more().is_none());

        let second = feed.begin_navigation([("kind", "RENT")]);
        assert_ne!(first.token(), second.token());
        assert_eq!(second.page(), 0);
        assert!(second.replace());
    }

    #[test]
    fn ticket_query_uses_navigation_filters() {
        let mut feed = FeedController::new();
        let ticket = feed.begin_navigation([("kind", "RENT"), ("maxPris", "8000")]);

        let pairs = ticket.query().to_pairs();
        assert!(pairs.contains(&("rent_per_month".to_string(), "lte.8000".to_string())));
    }

    #[tokio::test]
    async fn partial_override_keeps_the_committed_filters() {
        let store = MemoryStore::default();
        let mut three_rooms = rent_apartment();
        three_rooms.insert("id".into(), json!("rent-3"));
        three_rooms.insert("room_count".into(), json!(3));
        store.seed(
            ListingTable::Listings,
            [rent_apartment(), three_rooms, sale_row(1)],
        );

        let mut feed = FeedController::new();
        feed.navigate(&store, [("kind", "RENT"), ("objekt", "Lägenhet")])
            .await;
        assert_eq!(feed.items().len(), 2);

        let overrides = Overrides {
            min_rum: Some("3".into()),
            ..Default::default()
        };
        let pairs = feed.begin(0, true, &overrides).unwrap().query().to_pairs();
        for expected in [
            ("kind", "eq.RENT"),
            ("objekt", "eq.Lägenhet"),
            ("room_count", "gte.3"),
        ] {
            assert!(
                pairs.contains(&(expected.0.to_string(), expected.1.to_string())),
                "{expected:?} missing from {pairs:?}"
            );
        }

        assert!(feed.load_page(&store, 0, true, &overrides).await);
        let ids: Vec<&str> = feed.items().iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["rent-3"]);
        assert_eq!(feed.filters().kind, Kind::Rent);
        assert_eq!(feed.filters().min_rum, "");
    }
}
