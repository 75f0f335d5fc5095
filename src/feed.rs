//! The listings feed: builds the filtered page query and keeps the
//! state of an infinitely scrolling result list.
//!
//! Every fetch is issued as a [`FetchTicket`] carrying a request token.
//! Only the response to the most recently issued ticket is applied, so a
//! slow answer for old filters can never overwrite newer results.

use log::{debug, error};
use serde::Serialize;

use crate::filters::{parse_float, parse_int, FilterState, Overrides, PAGE_SIZE};
use crate::models::listing::{Listing, Objekt, STATUS_PUBLISHED};
use crate::supabase::{fetch_listings, ListingQuery, ListingStore, StoreError};

/// Columns the feed cards need.
pub const FEED_COLUMNS: &str = "id,kind,objekt,upplatelseform,title,street,zip,city,room_count,\
living_area_m2,plot_area_m2,price,rent_per_month,description,image_urls,created_at,status";

/// Highest page number the feed endpoint accepts.
pub const MAX_PAGE: usize = 10_000;

/// Query for `page` of the feed. An offset past `usize::MAX` saturates and
/// reads an empty window.
pub fn build_query(filters: &FilterState, page: usize) -> ListingQuery {
    let mut query = ListingQuery::new(FEED_COLUMNS)
        .eq("kind", filters.kind.as_str())
        .eq("status", STATUS_PUBLISHED);

    let q = filters.q.trim();
    if !q.is_empty() {
        query = query.any_ilike(&["city", "title"], q);
    }

    if filters.objekt != Objekt::Alla {
        query = query.eq("objekt", filters.objekt.as_str());
    }

    let price_column = filters.kind.price_column();
    if let Some(min) = parse_int(&filters.min_pris) {
        query = query.gte(price_column, min as f64);
    }
    if let Some(max) = parse_int(&filters.max_pris) {
        query = query.lte(price_column, max as f64);
    }

    if let Some(rooms) = parse_float(&filters.min_rum) {
        query = query.gte("room_count", rooms);
    }
    if let Some(area) = parse_float(&filters.min_boarea) {
        query = query.gte("living_area_m2", area);
    }

    query
        .order_desc("created_at")
        .range(page.saturating_mul(PAGE_SIZE), PAGE_SIZE)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub items: Vec<Listing>,
    pub page: usize,
    pub has_more: bool,
}

/// One stateless page read.
pub async fn fetch_page(
    store: &dyn ListingStore,
    filters: &FilterState,
    page: usize,
) -> Result<FeedPage, StoreError> {
    let items = fetch_listings(store, &build_query(filters, page)).await?;
    let has_more = items.len() == PAGE_SIZE;
    Ok(FeedPage {
        items,
        page,
        has_more,
    })
}

/// A fetch that has been started and whose result must be handed back to
/// [`FeedController::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    token: u64,
    page: usize,
    replace: bool,
    filters: FilterState,
}

impl FetchTicket {
    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn replace(&self) -> bool {
        self.replace
    }

    pub fn query(&self) -> ListingQuery {
        build_query(&self.filters, self.page)
    }
}

#[derive(Debug)]
pub struct FeedController {
    filters: FilterState,
    items: Vec<Listing>,
    page: usize,
    has_more: bool,
    loading: bool,
    initial: bool,
    latest_token: u64,
}

impl Default for FeedController {
    fn default() -> Self {
        FeedController {
            filters: FilterState::default(),
            items: Vec::new(),
            page: 0,
            has_more: true,
            loading: false,
            initial: true,
            latest_token: 0,
        }
    }
}

impl FeedController {
    pub fn new() -> FeedController {
        FeedController::default()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn items(&self) -> &[Listing] {
        &self.items
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True until the first fetch has completed.
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Applies new query parameters: filters are re-derived, the list is
    /// cleared and page zero is fetched. Always issues a fetch, superseding
    /// any that is in flight.
    pub fn begin_navigation<K, V>(&mut self, params: impl IntoIterator<Item = (K, V)>) -> FetchTicket
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.filters = FilterState::from_pairs(params);
        self.page = 0;
        self.items.clear();
        self.has_more = true;

        let overrides = Overrides::from(&self.filters);
        self.issue(0, true, &overrides)
    }

    /// Starts fetching `page`. Appending fetches are refused while another
    /// fetch is in flight or when the last page was short.
    pub fn begin(&mut self, page: usize, replace: bool, overrides: &Overrides) -> Option<FetchTicket> {
        if !replace && (self.loading || !self.has_more) {
            debug!(
                "feed fetch of page {} skipped (loading: {}, has_more: {})",
                page, self.loading, self.has_more
            );
            return None;
        }
        Some(self.issue(page, replace, overrides))
    }

    /// Scroll sentinel: next page, appended.
    pub fn begin_more(&mut self) -> Option<FetchTicket> {
        self.begin(self.page.saturating_add(1), false, &Overrides::default())
    }

    fn issue(&mut self, page: usize, replace: bool, overrides: &Overrides) -> FetchTicket {
        self.latest_token += 1;
        self.loading = true;
        FetchTicket {
            token: self.latest_token,
            page,
            replace,
            filters: self.filters.with_overrides(overrides),
        }
    }

    /// Applies the result of a fetch. Returns `false` when the ticket has
    /// been superseded and the result was dropped.
    ///
    /// Errors are logged and end the feed (`has_more` becomes false); they
    /// are not passed on.
    pub fn finish(&mut self, ticket: FetchTicket, result: Result<Vec<Listing>, StoreError>) -> bool {
        if ticket.token != self.latest_token {
            debug!(
                "dropping stale feed response (token {}, latest {})",
                ticket.token, self.latest_token
            );
            return false;
        }

        match result {
            Ok(next) => {
                self.has_more = next.len() == PAGE_SIZE;
                if ticket.replace {
                    self.items = next;
                } else {
                    self.items.extend(next);
                }
                self.page = ticket.page;
            }
            Err(err) => {
                error!("failed to load listings page {}: {}", ticket.page, err);
                self.has_more = false;
            }
        }

        self.initial = false;
        self.loading = false;
        true
    }

    pub async fn navigate<K, V>(
        &mut self,
        store: &dyn ListingStore,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> bool
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let ticket = self.begin_navigation(params);
        self.run(store, ticket).await
    }

    pub async fn load_page(
        &mut self,
        store: &dyn ListingStore,
        page: usize,
        replace: bool,
        overrides: &Overrides,
    ) -> bool {
        match self.begin(page, replace, overrides) {
            Some(ticket) => self.run(store, ticket).await,
            None => false,
        }
    }

    pub async fn load_more(&mut self, store: &dyn ListingStore) -> bool {
        match self.begin_more() {
            Some(ticket) => self.run(store, ticket).await,
            None => false,
        }
    }

    async fn run(&mut self, store: &dyn ListingStore, ticket: FetchTicket) -> bool {
        let result = fetch_listings(store, &ticket.query()).await;
        self.finish(ticket, result)
    }
}
