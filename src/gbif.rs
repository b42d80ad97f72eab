use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::iter::FusedIterator;
use std::mem;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{HttpTransport, Transport};

/// Records requested per page unless the query says otherwise.
pub const DEFAULT_LIMIT: u64 = 100;
/// Offset past which [`GbifClient::search`] stops paging.
pub const DEFAULT_THRESHOLD: u64 = 500;

/// One raw page of occurrence search results.
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrencePage(Value);

impl OccurrencePage {
    pub fn new(json: Value) -> Self {
        Self(json)
    }

    /// `None` when the body has no boolean `endOfRecords`.
    pub fn end_of_records(&self) -> Option<bool> {
        self.0.get("endOfRecords").and_then(Value::as_bool)
    }

    pub fn count(&self) -> Option<u64> {
        self.0.get("count").and_then(Value::as_u64)
    }

    pub fn offset(&self) -> Option<u64> {
        self.0.get("offset").and_then(Value::as_u64)
    }

    pub fn limit(&self) -> Option<u64> {
        self.0.get("limit").and_then(Value::as_u64)
    }

    /// Occurrence records on this page; empty if `results` is absent.
    pub fn results(&self) -> &[Value] {
        self.0
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }
}

/// Search filters plus the `limit`/`offset` cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceQuery {
    filters: Vec<(String, String)>,
    limit: u64,
    offset: u64,
}

impl Default for OccurrenceQuery {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl OccurrenceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a query from raw key/value pairs. `limit` and `offset` keys
    /// replace the defaults; every other pair is passed through as a filter,
    /// repeated keys included.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            match k.as_str() {
                "limit" => query = query.with_limit(parse_count("limit", &v)?)?,
                "offset" => query = query.with_offset(parse_count("offset", &v)?),
                _ => query.filters.push((k, v)),
            }
        }
        Ok(query)
    }

    /// Adds a search filter such as `scientificName` or `country`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Page size; zero would never advance the cursor and is rejected.
    pub fn with_limit(mut self, limit: u64) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidParameter(
                "limit must be greater than zero".to_string(),
            ));
        }
        self.limit = limit;
        Ok(self)
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = self.filters.clone();
        params.push(("limit".to_string(), self.limit.to_string()));
        params.push(("offset".to_string(), self.offset.to_string()));
        params
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|_| {
        Error::InvalidParameter(format!(
            "{} must be a non-negative integer, got {:?}",
            key, value
        ))
    })
}

/// Client for the GBIF occurrence search API.
#[derive(Debug, Clone)]
pub struct GbifClient<T = HttpTransport> {
    url: String,
    transport: T,
}

impl GbifClient<HttpTransport> {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(&config, transport))
    }
}

impl<T: Transport> GbifClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            url: config.occurrence_url.clone(),
            transport,
        }
    }

    /// Fetches one page with exactly the given parameters.
    pub fn fetch(&self, params: &[(String, String)]) -> Result<OccurrencePage> {
        self.transport.get_json(&self.url, params).map(OccurrencePage)
    }

    /// Lazily pages through a search.
    ///
    /// Every page is fetched and yielded before the stop checks run, so the
    /// first page always comes back. After each page the offset moves on by
    /// `limit`; iteration ends once a page reports `endOfRecords` or the new
    /// offset is past `threshold`.
    pub fn pages(&self, query: OccurrenceQuery, threshold: u64) -> Pages<'_, T> {
        Pages {
            client: self,
            query,
            threshold,
            state: PagerState::Fetch,
            progress: None,
            records: 0,
        }
    }

    /// [`GbifClient::pages`] with [`DEFAULT_THRESHOLD`].
    pub fn search(&self, query: OccurrenceQuery) -> Pages<'_, T> {
        self.pages(query, DEFAULT_THRESHOLD)
    }
}

enum PagerState {
    Fetch,
    Failed(Error),
    Done,
}

/// Iterator returned by [`GbifClient::pages`].
///
/// Each call to `next` blocks on at most one request. Dropping the iterator
/// stops paging.
pub struct Pages<'a, T> {
    client: &'a GbifClient<T>,
    query: OccurrenceQuery,
    threshold: u64,
    state: PagerState,
    progress: Option<ProgressBar>,
    records: u64,
}

impl<T> Pages<'_, T> {
    /// Shows a spinner with the number of pages and records fetched.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress.then(|| {
            let pb = ProgressBar::new_spinner();
            let template = "{spinner:.green} {pos} page(s) {msg}";
            if let Ok(style) = ProgressStyle::with_template(template) {
                pb.set_style(style);
            }
            pb
        });
        self
    }

    /// Cursor for the next request.
    pub fn query(&self) -> &OccurrenceQuery {
        &self.query
    }

    fn finish(&mut self) {
        if let Some(pb) = self.progress.take() {
            pb.finish_and_clear();
        }
    }
}

impl<T: Transport> Iterator for Pages<'_, T> {
    type Item = Result<OccurrencePage>;

    fn next(&mut self) -> Option<Self::Item> {
        match mem::replace(&mut self.state, PagerState::Done) {
            PagerState::Done => {
                self.finish();
                return None;
            }
            PagerState::Failed(err) => {
                self.finish();
                return Some(Err(err));
            }
            PagerState::Fetch => {}
        }

        let page = match self.client.fetch(&self.query.to_params()) {
            Ok(page) => page,
            Err(err) => {
                self.finish();
                return Some(Err(err));
            }
        };

        let fetched_at = self.query.offset;
        let advanced = fetched_at.checked_add(self.query.limit);
        if let Some(next) = advanced {
            self.query.offset = next;
        }
        self.records += page.results().len() as u64;
        if let Some(pb) = &self.progress {
            pb.inc(1);
            pb.set_message(format!("{} record(s)", self.records));
        }

        self.state = match page.end_of_records() {
            Some(true) => {
                debug!(offset = fetched_at, "end of records");
                PagerState::Done
            }
            _ if advanced.is_none() => {
                debug!(offset = fetched_at, limit = self.query.limit, "offset overflow");
                PagerState::Done
            }
            _ if self.query.offset > self.threshold => {
                debug!(
                    next_offset = self.query.offset,
                    threshold = self.threshold,
                    "offset past threshold"
                );
                PagerState::Done
            }
            Some(false) => {
                debug!(next_offset = self.query.offset, "next page");
                PagerState::Fetch
            }
            None => PagerState::Failed(Error::missing("endOfRecords", "occurrence page")),
        };

        Some(Ok(page))
    }
}

impl<T: Transport> FusedIterator for Pages<'_, T> {}
