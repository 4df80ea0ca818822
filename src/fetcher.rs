use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

use crate::{
    cache::{cache_key, ResponseCache},
    config::Settings,
    shaper::COINS,
};

/// Why an endpoint produced no data. Never propagated as an error; it only
/// feeds the warning line and the logs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmptyReason {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Ok(JsonValue),
    Empty(EmptyReason),
}

impl FetchResult {
    pub fn json(&self) -> Option<&JsonValue> {
        match self {
            FetchResult::Ok(v) => Some(v),
            FetchResult::Empty(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub protocols: String,
    pub chains: String,
    pub stablecoins: String,
    pub yields: String,
    pub prices: String,
}

impl Endpoints {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            protocols: settings.protocols_url.clone(),
            chains: settings.chains_url.clone(),
            stablecoins: settings.stablecoins_url.clone(),
            yields: settings.yields_url.clone(),
            prices: settings.prices_url.clone(),
        }
    }
}

/// One refresh worth of raw endpoint results, plus the warnings they raised.
#[derive(Debug, Clone)]
pub struct RawSnapshot {
    pub protocols: FetchResult,
    pub chains: FetchResult,
    pub stablecoins: FetchResult,
    pub yields: FetchResult,
    pub prices: FetchResult,
    pub warnings: Vec<String>,
}

pub struct Fetcher {
    client: reqwest::Client,
    cache: ResponseCache,
    endpoints: Endpoints,
    price_ids: String,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("build http client")?;
        let cache = ResponseCache::new(Duration::from_secs(settings.cache_ttl_secs));
        Ok(Self::with_client(client, cache, Endpoints::from_settings(settings)))
    }

    pub fn with_client(client: reqwest::Client, cache: ResponseCache, endpoints: Endpoints) -> Self {
        let price_ids = COINS.iter().map(|c| c.id).collect::<Vec<_>>().join(",");
        Self {
            client,
            cache,
            endpoints,
            price_ids,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// GET `url` and decode its JSON body, serving from the cache while fresh.
    /// Every failure resolves to `FetchResult::Empty`; nothing escapes.
    pub async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> FetchResult {
        let key = cache_key(url, params);
        if let Some(hit) = self.cache.get(&key) {
            log::debug!("fetch.cache_hit url={}", url);
            return hit;
        }

        let result = self.fetch_uncached(url, params).await;
        match &result {
            FetchResult::Ok(_) => log::debug!("fetch.ok url={}", url),
            FetchResult::Empty(reason) => log::warn!("fetch.failed url={} reason={}", url, reason),
        }
        self.cache.insert(&key, result.clone());
        result
    }

    async fn fetch_uncached(&self, url: &str, params: &[(&str, &str)]) -> FetchResult {
        let mut req = self.client.get(url);
        if !params.is_empty() {
            req = req.query(params);
        }

        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => return FetchResult::Empty(EmptyReason::Transport(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchResult::Empty(EmptyReason::Status(status.as_u16()));
        }

        match response.json::<JsonValue>().await {
            Ok(body) => FetchResult::Ok(body),
            Err(e) if e.is_timeout() => FetchResult::Empty(EmptyReason::Transport(e.to_string())),
            Err(e) => FetchResult::Empty(EmptyReason::Decode(e.to_string())),
        }
    }

    /// Fetch all five sources concurrently. Each one succeeds or fails on its own.
    pub async fn fetch_all(&self) -> RawSnapshot {
        let price_params = [
            ("ids", self.price_ids.as_str()),
            ("vs_currencies", "usd"),
            ("include_24hr_change", "true"),
        ];

        let (protocols, chains, stablecoins, yields, prices) = tokio::join!(
            self.fetch(&self.endpoints.protocols, &[]),
            self.fetch(&self.endpoints.chains, &[]),
            self.fetch(&self.endpoints.stablecoins, &[]),
            self.fetch(&self.endpoints.yields, &[]),
            self.fetch(&self.endpoints.prices, &price_params),
        );

        let warnings = [
            (&self.endpoints.protocols, &protocols),
            (&self.endpoints.chains, &chains),
            (&self.endpoints.stablecoins, &stablecoins),
            (&self.endpoints.yields, &yields),
            (&self.endpoints.prices, &prices),
        ]
        .into_iter()
        .filter_map(|(url, result)| warning(url, result))
        .collect();

        RawSnapshot {
            protocols,
            chains,
            stablecoins,
            yields,
            prices,
            warnings,
        }
    }
}

/// User-facing warning for a failed fetch, `None` when data came back.
pub fn warning(url: &str, result: &FetchResult) -> Option<String> {
    match result {
        FetchResult::Ok(_) => None,
        FetchResult::Empty(reason) => Some(format!("API request failed: {url} ({reason})")),
    }
}
