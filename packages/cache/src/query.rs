//! The keyed query cache.
//!
//! A query is `(key, policy, fetcher)`. The first call for a key awaits
//! the fetcher; later calls within the policy's stale window are served
//! from memory. Once stale, the cached value is returned right away and a
//! single background fetch replaces it. Callers that arrive while a fetch
//! is in flight join it instead of starting another.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::{PollingTask, QueryError, QueryPolicy};

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyData, QueryError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Entries = Mutex<HashMap<QueryKey, Entry>>;

/// Ordered tuple of strings identifying a query, e.g.
/// `["events", "paginated", "2", "20"]`.
///
/// Invalidation and removal match on key prefixes, so related queries
/// share leading parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    #[must_use]
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Appends one more part.
    #[must_use]
    pub fn with(mut self, part: impl ToString) -> Self {
        self.0.push(part.to_string());
        self
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Whether `prefix` names this key or one of its ancestors.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl<const N: usize> From<[&str; N]> for QueryKey {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

/// What a query call observed.
#[derive(Debug)]
pub struct QueryResult<T> {
    /// The most recent successfully fetched value, if any.
    pub data: Option<Arc<T>>,
    /// The error from the most recent fetch, if it failed.
    pub error: Option<QueryError>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    /// Data is present and a background refresh is running.
    pub is_refreshing: bool,
}

impl<T> QueryResult<T> {
    /// Data present and the last fetch succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }
}

struct Entry {
    data: Option<AnyData>,
    error: Option<QueryError>,
    fetched_at: Option<Instant>,
    last_accessed: Instant,
    policy: QueryPolicy,
    invalidated: bool,
    generation: u64,
    in_flight: Option<SharedFetch>,
}

impl Entry {
    const fn new(policy: QueryPolicy, now: Instant) -> Self {
        Self {
            data: None,
            error: None,
            fetched_at: None,
            last_accessed: now,
            policy,
            invalidated: false,
            generation: 0,
            in_flight: None,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        !self.invalidated
            && self
                .fetched_at
                .is_some_and(|at| self.policy.is_fresh(now.duration_since(at)))
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.in_flight.is_none()
            && now.duration_since(self.last_accessed) >= self.policy.evict_after
    }
}

enum Plan {
    /// Data to serve now. `refresh` asks the caller to start a background
    /// fetch.
    Cached {
        data: AnyData,
        error: Option<QueryError>,
        refreshing: bool,
        refresh: bool,
    },
    /// No data and a fetch is already running.
    Join {
        fetch: SharedFetch,
        error: Option<QueryError>,
    },
    /// No data and nothing running.
    Start { error: Option<QueryError> },
}

/// Shared, cloneable query cache. Clones see the same entries.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<Entries>,
}

impl QueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        lock(&self.entries)
    }

    /// Runs a query.
    ///
    /// - Fresh data is returned without calling `fetcher`.
    /// - Stale data is returned immediately with `is_refreshing` set, and
    ///   `fetcher` runs in a background task unless a fetch is already in
    ///   flight.
    /// - With no data, the call awaits the in-flight fetch, starting one
    ///   with `fetcher` if needed.
    ///
    /// `fetcher` runs without the cache locked, so it may use this cache.
    /// Two racing callers may both call it; only one returned future is
    /// ever polled.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn query<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        policy: QueryPolicy,
        fetcher: F,
    ) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match self.plan(key, policy) {
            Plan::Cached {
                data,
                error,
                refreshing,
                refresh,
            } => {
                if refresh {
                    log::debug!("Serving stale query {key} while refreshing");
                    self.start(key, policy, fetcher);
                }
                cached_result(key, data, error, refreshing)
            }
            Plan::Join { fetch, .. } => self.await_fetch(key, fetch).await,
            Plan::Start { .. } => {
                let fetch = self.start(key, policy, fetcher);
                self.await_fetch(key, fetch).await
            }
        }
    }

    /// Like [`query`](Self::query) but never waits: with no data yet it
    /// starts the fetch in the background and reports `is_loading`.
    pub fn snapshot<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        policy: QueryPolicy,
        fetcher: F,
    ) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let error = match self.plan(key, policy) {
            Plan::Cached {
                data,
                error,
                refreshing,
                refresh,
            } => {
                if refresh {
                    self.start(key, policy, fetcher);
                }
                return cached_result(key, data, error, refreshing);
            }
            Plan::Join { error, .. } => error,
            Plan::Start { error } => {
                self.start(key, policy, fetcher);
                error
            }
        };
        QueryResult {
            data: None,
            error,
            is_loading: true,
            is_refreshing: false,
        }
    }

    /// Fetches regardless of freshness and waits for the result. Joins a
    /// fetch that is already in flight. On failure the previously cached
    /// data, if any, is returned alongside the error.
    pub async fn refetch<T, F, Fut, E>(
        &self,
        key: &QueryKey,
        policy: QueryPolicy,
        fetcher: F,
    ) -> QueryResult<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let running = {
            let mut entries = self.lock();
            touch(&mut entries, key, policy).in_flight.clone()
        };
        let fetch = match running {
            Some(fetch) => fetch,
            None => self.start(key, policy, fetcher),
        };
        self.await_fetch(key, fetch).await
    }

    /// Returns cached data without fetching or touching the entry.
    #[must_use]
    pub fn peek<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let data = self.lock().get(key)?.data.clone()?;
        data.downcast::<T>().ok()
    }

    /// Marks every entry under `prefix` stale. Cached data is still served
    /// but the next access refreshes it. Fetches already in flight for
    /// those keys are disowned and their results discarded.
    ///
    /// Returns the number of entries marked.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut marked = 0;
        for entry in entries
            .iter_mut()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry)
        {
            entry.invalidated = true;
            entry.generation += 1;
            entry.in_flight = None;
            marked += 1;
        }
        log::debug!("Invalidated {marked} queries under {prefix}");
        marked
    }

    /// Drops every entry under `prefix`. Returns the number removed.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    /// Drops entries not accessed within their policy's eviction window.
    /// Entries with a fetch in flight are kept. Returns the number removed.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            log::debug!("Evicted {evicted} expired queries");
        }
        evicted
    }

    /// Starts a task that runs [`evict_expired`](Self::evict_expired)
    /// every `period` until the returned task is stopped or dropped.
    #[must_use]
    pub fn spawn_janitor(&self, period: Duration) -> PollingTask {
        let cache = self.clone();
        PollingTask::spawn("query-cache-janitor", period, move || {
            let cache = cache.clone();
            async move {
                cache.evict_expired();
            }
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Decides what a query should do. Never calls a fetcher.
    fn plan(&self, key: &QueryKey, policy: QueryPolicy) -> Plan {
        let mut entries = self.lock();
        let entry = touch(&mut entries, key, policy);
        let now = entry.last_accessed;
        let running = entry.in_flight.is_some();
        let error = entry.error.clone();

        match entry.data.clone() {
            Some(data) if entry.is_fresh(now) => Plan::Cached {
                data,
                error,
                refreshing: running,
                refresh: false,
            },
            Some(data) => Plan::Cached {
                data,
                error,
                refreshing: true,
                refresh: !running,
            },
            None => match entry.in_flight.clone() {
                Some(fetch) => Plan::Join { fetch, error },
                None => Plan::Start { error },
            },
        }
    }

    /// Calls `fetcher` with the cache unlocked, then installs the result
    /// as the entry's in-flight fetch and drives it on a spawned task. If
    /// another caller installed a fetch in the meantime, that one is
    /// returned and the new future is dropped unpolled.
    fn start<T, F, Fut, E>(&self, key: &QueryKey, policy: QueryPolicy, fetcher: F) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let pending = fetcher();

        let mut entries = self.lock();
        let entry = touch(&mut entries, key, policy);
        if let Some(running) = entry.in_flight.clone() {
            return running;
        }

        let generation = entry.generation;
        let weak = Arc::downgrade(&self.entries);
        let owned_key = key.clone();
        log::debug!("Fetching query {key}");
        let fetch = async move {
            let result = pending
                .await
                .map(|value| Arc::new(value) as AnyData)
                .map_err(|e| QueryError::Fetch(e.to_string()));
            settle(&weak, &owned_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(fetch.clone());
        drop(entries);

        tokio::spawn(fetch.clone());
        fetch
    }

    async fn await_fetch<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
        fetch: SharedFetch,
    ) -> QueryResult<T> {
        match fetch.await {
            Ok(data) => cached_result(key, data, None, false),
            Err(error) => QueryResult {
                data: self.peek(key),
                error: Some(error),
                is_loading: false,
                is_refreshing: false,
            },
        }
    }
}

/// Fetches or creates the entry for `key` and records the access.
fn touch<'a>(
    entries: &'a mut HashMap<QueryKey, Entry>,
    key: &QueryKey,
    policy: QueryPolicy,
) -> &'a mut Entry {
    let now = Instant::now();
    let entry = entries
        .entry(key.clone())
        .or_insert_with(|| Entry::new(policy, now));
    entry.last_accessed = now;
    entry.policy = policy;
    entry
}

fn lock(entries: &Entries) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn settle(entries: &Weak<Entries>, key: &QueryKey, generation: u64, result: &FetchResult) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = lock(&entries);
    let Some(entry) = entries.get_mut(key) else {
        log::debug!("Discarding result for removed query {key}");
        return;
    };
    if entry.generation != generation {
        log::debug!("Discarding result for invalidated query {key}");
        return;
    }

    entry.in_flight = None;
    match result {
        Ok(data) => {
            entry.data = Some(Arc::clone(data));
            entry.error = None;
            entry.fetched_at = Some(Instant::now());
            entry.invalidated = false;
        }
        Err(e) => {
            log::warn!("Query {key} failed: {e}");
            entry.error = Some(e.clone());
        }
    }
}

fn cached_result<T: Send + Sync + 'static>(
    key: &QueryKey,
    data: AnyData,
    error: Option<QueryError>,
    refreshing: bool,
) -> QueryResult<T> {
    match data.downcast::<T>() {
        Ok(data) => QueryResult {
            data: Some(data),
            error,
            is_loading: false,
            is_refreshing: refreshing,
        },
        Err(_) => {
            log::error!("Query {key} holds a value of another type");
            QueryResult {
                data: None,
                error: Some(QueryError::TypeMismatch {
                    key: key.to_string(),
                }),
                is_loading: false,
                is_refreshing: false,
            }
        }
    }
}
