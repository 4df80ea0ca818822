//! Reshapes raw endpoint JSON into sorted, truncated tables.
//!
//! Everything here is pure. Missing keys, wrong shapes and unparsable numbers
//! never fail: tables come back empty and numbers come back as `0.0`.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::fetcher::FetchResult;

pub const PROTOCOL_ROWS: usize = 10;
pub const CHAIN_ROWS: usize = 10;
pub const STABLECOIN_ROWS: usize = 6;
pub const YIELD_ROWS: usize = 12;

/// APY at or above this is treated as an outlier.
pub const MAX_PLAUSIBLE_APY: f64 = 1000.0;

#[derive(Debug, Clone, Copy)]
pub struct Coin {
    pub id: &'static str,
    pub name: &'static str,
    pub symbol: &'static str,
}

/// Coins with a price tile, in display order.
pub const COINS: [Coin; 8] = [
    Coin { id: "bitcoin", name: "Bitcoin", symbol: "₿" },
    Coin { id: "ethereum", name: "Ethereum", symbol: "Ξ" },
    Coin { id: "solana", name: "Solana", symbol: "SOL" },
    Coin { id: "cardano", name: "Cardano", symbol: "ADA" },
    Coin { id: "polkadot", name: "Polkadot", symbol: "DOT" },
    Coin { id: "avalanche-2", name: "Avalanche", symbol: "AVAX" },
    Coin { id: "chainlink", name: "Chainlink", symbol: "LINK" },
    Coin { id: "polygon", name: "Polygon", symbol: "MATIC" },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRecord {
    pub name: String,
    pub category: String,
    pub tvl: f64,
    pub change_1d: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRecord {
    pub name: String,
    pub tvl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StablecoinRecord {
    pub name: String,
    pub symbol: String,
    pub circulating_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldPoolRecord {
    pub symbol: String,
    pub project: String,
    pub chain: String,
    pub apy: f64,
    #[serde(rename = "tvlUsd")]
    pub tvl_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceQuote {
    pub coin_id: String,
    pub usd: f64,
    pub usd_24h_change: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapedSnapshot {
    pub protocols: Vec<ProtocolRecord>,
    pub chains: Vec<ChainRecord>,
    pub stablecoins: Vec<StablecoinRecord>,
    pub yields: Vec<YieldPoolRecord>,
    pub prices: Vec<PriceQuote>,
}

/// Coerce `obj[key]` to a finite number, `0.0` on anything else.
///
/// Numbers pass through; numeric strings are parsed; null, bools, arrays,
/// objects, absent keys and non-finite values all give `0.0`.
pub fn num_field(obj: &JsonValue, key: &str) -> f64 {
    coerce_num(obj.get(key))
}

pub fn coerce_num(v: Option<&JsonValue>) -> f64 {
    let n = match v {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // -0.0 folds into 0.0 so it ties with other zero rows under total_cmp
    n.filter(|x| x.is_finite())
        .map(|x| if x == 0.0 { 0.0 } else { x })
        .unwrap_or(0.0)
}

/// `obj[key]` as text; scalars are stringified, everything else is "".
pub fn str_field(obj: &JsonValue, key: &str) -> String {
    match obj.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn rows<'a>(raw: &'a FetchResult, key: Option<&str>) -> &'a [JsonValue] {
    let Some(body) = raw.json() else {
        return &[];
    };
    let arr = match key {
        None => body.as_array(),
        Some(k) => body.get(k).and_then(|v| v.as_array()),
    };
    arr.map(|a| a.as_slice()).unwrap_or(&[])
}

/// Stable descending sort on `key`, then truncate to `limit`.
fn top_by<T>(mut items: Vec<T>, limit: usize, key: impl Fn(&T) -> f64) -> Vec<T> {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
    items.truncate(limit);
    items
}

pub fn shape_protocols(raw: &FetchResult) -> Vec<ProtocolRecord> {
    let items: Vec<ProtocolRecord> = rows(raw, None)
        .iter()
        .map(|p| ProtocolRecord {
            name: str_field(p, "name"),
            category: str_field(p, "category"),
            tvl: num_field(p, "tvl"),
            change_1d: num_field(p, "change_1d"),
        })
        .collect();
    top_by(items, PROTOCOL_ROWS, |p| p.tvl)
}

pub fn shape_chains(raw: &FetchResult) -> Vec<ChainRecord> {
    let items: Vec<ChainRecord> = rows(raw, None)
        .iter()
        .map(|c| ChainRecord {
            name: str_field(c, "name"),
            tvl: num_field(c, "tvl"),
        })
        .collect();
    top_by(items, CHAIN_ROWS, |c| c.tvl)
}

/// USD figure under `circulating.peggedUSD`, if `circulating` is a mapping.
fn circulating_usd(asset: &JsonValue) -> f64 {
    match asset.get("circulating") {
        Some(c @ JsonValue::Object(_)) => num_field(c, "peggedUSD"),
        _ => 0.0,
    }
}

pub fn shape_stablecoins(raw: &FetchResult) -> Vec<StablecoinRecord> {
    let items: Vec<StablecoinRecord> = rows(raw, Some("peggedAssets"))
        .iter()
        .map(|a| StablecoinRecord {
            name: str_field(a, "name"),
            symbol: str_field(a, "symbol"),
            circulating_usd: circulating_usd(a),
        })
        .collect();
    top_by(items, STABLECOIN_ROWS, |s| s.circulating_usd)
}

/// Pools with `min_apy < apy < 1000`, best APY first, at most 12.
pub fn shape_yields(raw: &FetchResult, min_apy: f64) -> Vec<YieldPoolRecord> {
    let items: Vec<YieldPoolRecord> = rows(raw, Some("data"))
        .iter()
        .map(|p| YieldPoolRecord {
            symbol: str_field(p, "symbol"),
            project: str_field(p, "project"),
            chain: str_field(p, "chain"),
            apy: num_field(p, "apy"),
            tvl_usd: num_field(p, "tvlUsd"),
        })
        .filter(|p| p.apy > min_apy && p.apy < MAX_PLAUSIBLE_APY)
        .collect();
    top_by(items, YIELD_ROWS, |p| p.apy)
}

/// One quote per tracked coin, in `COINS` order. Absent coins quote zero.
pub fn shape_prices(raw: &FetchResult) -> Vec<PriceQuote> {
    let body = raw.json();
    COINS
        .iter()
        .map(|coin| {
            let entry = body.and_then(|b| b.get(coin.id));
            PriceQuote {
                coin_id: coin.id.to_string(),
                usd: coerce_num(entry.and_then(|e| e.get("usd"))),
                usd_24h_change: coerce_num(entry.and_then(|e| e.get("usd_24h_change"))),
            }
        })
        .collect()
}
