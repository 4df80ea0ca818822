use chrono::{DateTime, Local};
use serde::Serialize;

use crate::shaper::{
    ChainRecord, PriceQuote, ProtocolRecord, ShapedSnapshot, StablecoinRecord, YieldPoolRecord,
    COINS,
};

/// Bars shown in the yield chart; the raw table keeps every shaped pool.
pub const YIELD_CHART_ROWS: usize = 10;

/// Integer part grouped with commas, `decimals` digits after the point.
pub fn group_thousands(x: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, x.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(f) = frac_part {
        grouped.push('.');
        grouped.push_str(f);
    }
    if x.is_sign_negative() && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        grouped.insert(0, '-');
    }
    grouped
}

/// `$2.5B`, `$12.3M`, else whole dollars with separators.
pub fn format_currency(x: f64) -> String {
    if x >= 1e9 {
        format!("${:.1}B", x / 1e9)
    } else if x >= 1e6 {
        format!("${:.1}M", x / 1e6)
    } else {
        format_usd_whole(x)
    }
}

/// Axis/export variant of [`format_currency`]: no symbol, two decimals on the M/B tiers.
pub fn format_large(x: f64) -> String {
    if x >= 1e9 {
        format!("{:.2}B", x / 1e9)
    } else if x >= 1e6 {
        format!("{:.2}M", x / 1e6)
    } else {
        group_thousands(x, 0)
    }
}

pub fn format_usd_whole(x: f64) -> String {
    format!("${}", group_thousands(x, 0))
}

pub fn format_percent(x: f64) -> String {
    format!("{x:.2}%")
}

pub fn format_signed_percent(x: f64) -> String {
    format!("{x:+.2}%")
}

/// Cents below $1,000, whole dollars from there up.
pub fn format_price(price: f64) -> String {
    if price < 1000.0 {
        format!("${}", group_thousands(price, 2))
    } else {
        format!("${}", group_thousands(price, 0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMetric {
    pub coin_id: String,
    pub label: String,
    pub value: String,
    pub delta: String,
    pub direction: &'static str,
}

pub fn price_metric(quote: &PriceQuote) -> PriceMetric {
    let coin = COINS.iter().find(|c| c.id == quote.coin_id);
    let label = match coin {
        Some(c) => format!("{} {}", c.symbol, c.name),
        None => quote.coin_id.clone(),
    };

    if quote.usd > 0.0 {
        let direction = if quote.usd_24h_change > 0.0 {
            "up"
        } else if quote.usd_24h_change < 0.0 {
            "down"
        } else {
            "flat"
        };
        PriceMetric {
            coin_id: quote.coin_id.clone(),
            label,
            value: format_price(quote.usd),
            delta: format_signed_percent(quote.usd_24h_change),
            direction,
        }
    } else {
        PriceMetric {
            coin_id: quote.coin_id.clone(),
            label,
            value: "N/A".to_string(),
            delta: "0.00%".to_string(),
            direction: "flat",
        }
    }
}

/// One chart mark. `group` drives colour, `text` is the on-bar label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub text: String,
    pub group: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section<R> {
    pub title: String,
    pub available: bool,
    pub placeholder: Option<String>,
    pub chart: Vec<Bar>,
    pub rows: Vec<R>,
}

impl<R> Section<R> {
    fn build(title: String, placeholder: String, chart: Vec<Bar>, rows: Vec<R>) -> Self {
        let available = !rows.is_empty();
        Self {
            title,
            available,
            placeholder: if available { None } else { Some(placeholder) },
            chart,
            rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolRow {
    pub name: String,
    pub category: String,
    pub tvl: String,
    pub change_1d: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainRow {
    pub name: String,
    pub tvl: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StablecoinRow {
    pub name: String,
    pub symbol: String,
    pub circulating_usd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YieldRow {
    pub symbol: String,
    pub project: String,
    pub chain: String,
    pub apy: String,
    #[serde(rename = "tvlUsd")]
    pub tvl_usd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetric {
    pub label: &'static str,
    pub value: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub last_updated: String,
    pub min_apy: f64,
    pub warnings: Vec<String>,
    pub prices: Vec<PriceMetric>,
    pub protocols: Section<ProtocolRow>,
    pub chains: Section<ChainRow>,
    pub stablecoins: Section<StablecoinRow>,
    pub yields: Section<YieldRow>,
    pub summary: Vec<SummaryMetric>,
}

fn protocols_section(protocols: &[ProtocolRecord]) -> Section<ProtocolRow> {
    let chart = protocols
        .iter()
        .map(|p| Bar {
            label: p.name.clone(),
            value: p.tvl,
            text: format_currency(p.tvl),
            group: p.category.clone(),
            detail: format!(
                "TVL {} • 1d {}",
                format_usd_whole(p.tvl),
                format_percent(p.change_1d)
            ),
        })
        .collect();
    let rows = protocols
        .iter()
        .map(|p| ProtocolRow {
            name: p.name.clone(),
            category: p.category.clone(),
            tvl: format_usd_whole(p.tvl),
            change_1d: format_percent(p.change_1d),
        })
        .collect();
    Section::build(
        "Top 10 DeFi Protocols by TVL".to_string(),
        "Protocol data unavailable".to_string(),
        chart,
        rows,
    )
}

fn chains_section(chains: &[ChainRecord]) -> Section<ChainRow> {
    let chart = chains
        .iter()
        .map(|c| Bar {
            label: c.name.clone(),
            value: c.tvl,
            text: format_currency(c.tvl),
            group: c.name.clone(),
            detail: format!("TVL {}", format_large(c.tvl)),
        })
        .collect();
    let rows = chains
        .iter()
        .map(|c| ChainRow {
            name: c.name.clone(),
            tvl: format_usd_whole(c.tvl),
        })
        .collect();
    Section::build(
        "Top 10 Blockchains by TVL".to_string(),
        "Chain data unavailable".to_string(),
        chart,
        rows,
    )
}

fn stablecoins_section(stables: &[StablecoinRecord]) -> Section<StablecoinRow> {
    let total = total_stablecoin_cap(stables);
    let chart = stables
        .iter()
        .map(|s| {
            let share = if total > 0.0 {
                s.circulating_usd / total * 100.0
            } else {
                0.0
            };
            Bar {
                label: s.symbol.clone(),
                value: s.circulating_usd,
                text: format!("{share:.1}%"),
                group: s.symbol.clone(),
                detail: format!("Market Cap: {}", format_usd_whole(s.circulating_usd)),
            }
        })
        .collect();
    let rows = stables
        .iter()
        .map(|s| StablecoinRow {
            name: s.name.clone(),
            symbol: s.symbol.clone(),
            circulating_usd: format_usd_whole(s.circulating_usd),
        })
        .collect();
    Section::build(
        "Top Stablecoins by Market Cap".to_string(),
        "Stablecoin data unavailable".to_string(),
        chart,
        rows,
    )
}

fn yields_section(pools: &[YieldPoolRecord], min_apy: f64) -> Section<YieldRow> {
    let chart = pools
        .iter()
        .take(YIELD_CHART_ROWS)
        .map(|p| Bar {
            label: p.symbol.clone(),
            value: p.apy,
            text: format!("{:.1}%", p.apy),
            group: p.chain.clone(),
            detail: format!(
                "{} • TVL {} • APY {}",
                p.project,
                format_usd_whole(p.tvl_usd),
                format_percent(p.apy)
            ),
        })
        .collect();
    let rows = pools
        .iter()
        .map(|p| YieldRow {
            symbol: p.symbol.clone(),
            project: p.project.clone(),
            chain: p.chain.clone(),
            apy: format_percent(p.apy),
            tvl_usd: format_usd_whole(p.tvl_usd),
        })
        .collect();
    Section::build(
        format!("High-Yield Pools (>{min_apy}% APY)"),
        format!("No pools found with APY > {min_apy}%"),
        chart,
        rows,
    )
}

pub fn total_protocol_tvl(protocols: &[ProtocolRecord]) -> f64 {
    protocols.iter().map(|p| p.tvl).sum()
}

pub fn total_chain_tvl(chains: &[ChainRecord]) -> f64 {
    chains.iter().map(|c| c.tvl).sum()
}

pub fn total_stablecoin_cap(stables: &[StablecoinRecord]) -> f64 {
    stables.iter().map(|s| s.circulating_usd).sum()
}

pub fn average_apy(pools: &[YieldPoolRecord]) -> f64 {
    if pools.is_empty() {
        return 0.0;
    }
    pools.iter().map(|p| p.apy).sum::<f64>() / pools.len() as f64
}

pub fn summarize(shaped: &ShapedSnapshot) -> Vec<SummaryMetric> {
    let defi = total_protocol_tvl(&shaped.protocols);
    let chain = total_chain_tvl(&shaped.chains);
    let stable = total_stablecoin_cap(&shaped.stablecoins);
    let apy = average_apy(&shaped.yields);
    vec![
        SummaryMetric {
            label: "Total DeFi TVL (Top 10)",
            value: defi,
            text: format_currency(defi),
        },
        SummaryMetric {
            label: "Total Chain TVL (Top 10)",
            value: chain,
            text: format_currency(chain),
        },
        SummaryMetric {
            label: "Stablecoin Market Cap",
            value: stable,
            text: format_currency(stable),
        },
        SummaryMetric {
            label: "Avg High-Yield APY",
            value: apy,
            text: format!("{apy:.1}%"),
        },
    ]
}

pub fn present(
    shaped: &ShapedSnapshot,
    warnings: Vec<String>,
    min_apy: f64,
    now: DateTime<Local>,
) -> DashboardView {
    DashboardView {
        last_updated: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        min_apy,
        warnings,
        prices: shaped.prices.iter().map(price_metric).collect(),
        protocols: protocols_section(&shaped.protocols),
        chains: chains_section(&shaped.chains),
        stablecoins: stablecoins_section(&shaped.stablecoins),
        yields: yields_section(&shaped.yields, min_apy),
        summary: summarize(shaped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{EmptyReason, FetchResult};
    use crate::shaper::{shape_prices, shape_protocols};
    use serde_json::json;

    fn quote(id: &str, usd: f64, change: f64) -> PriceQuote {
        PriceQuote {
            coin_id: id.to_string(),
            usd,
            usd_24h_change: change,
        }
    }

    fn pool(symbol: &str, apy: f64) -> YieldPoolRecord {
        YieldPoolRecord {
            symbol: symbol.to_string(),
            project: "proj".to_string(),
            chain: "Arbitrum".to_string(),
            apy,
            tvl_usd: 1_000.0,
        }
    }

    #[test]
    fn currency_tiers() {
        assert_eq!(format_currency(2_500_000_000.0), "$2.5B");
        assert_eq!(format_currency(1_000_000_000.0), "$1.0B");
        assert_eq!(format_currency(12_340_000.0), "$12.3M");
        assert_eq!(format_currency(1_000_000.0), "$1.0M");
        assert_eq!(format_currency(750_000.0), "$750,000");
        assert_eq!(format_currency(999.0), "$999");
        assert_eq!(format_currency(0.0), "$0");
    }

    #[test]
    fn large_tiers_drop_symbol() {
        assert_eq!(format_large(2_500_000_000.0), "2.50B");
        assert_eq!(format_large(3_210_000.0), "3.21M");
        assert_eq!(format_large(45_678.0), "45,678");
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands(0.0, 0), "0");
        assert_eq!(group_thousands(100.0, 0), "100");
        assert_eq!(group_thousands(1_000.0, 0), "1,000");
        assert_eq!(group_thousands(1_234_567.0, 0), "1,234,567");
        assert_eq!(group_thousands(45_231.77, 2), "45,231.77");
        assert_eq!(group_thousands(-9_876.0, 0), "-9,876");
        assert_eq!(format_usd_whole(123_456_789.4), "$123,456,789");
    }

    #[test]
    fn percentages() {
        assert_eq!(format_percent(12.345_6), "12.35%");
        assert_eq!(format_percent(-0.5), "-0.50%");
        assert_eq!(format_signed_percent(1.234), "+1.23%");
        assert_eq!(format_signed_percent(-2.1), "-2.10%");
    }

    #[test]
    fn price_tiles() {
        let btc = price_metric(&quote("bitcoin", 45_231.77, 1.5));
        assert_eq!(btc.label, "₿ Bitcoin");
        assert_eq!(btc.value, "$45,232");
        assert_eq!(btc.delta, "+1.50%");
        assert_eq!(btc.direction, "up");

        let ada = price_metric(&quote("cardano", 0.45, -3.0));
        assert_eq!(ada.value, "$0.45");
        assert_eq!(ada.direction, "down");

        let sol = price_metric(&quote("solana", 142.5, 0.0));
        assert_eq!(sol.value, "$142.50");

        let none = price_metric(&quote("ethereum", 0.0, 5.0));
        assert_eq!(none.label, "Ξ Ethereum");
        assert_eq!(none.value, "N/A");
        assert_eq!(none.delta, "0.00%");
    }

    #[test]
    fn missing_ethereum_renders_placeholder() {
        let raw = FetchResult::Ok(json!({"bitcoin": {"usd": 60000.0, "usd_24h_change": 0.4}}));
        let metrics: Vec<_> = shape_prices(&raw).iter().map(price_metric).collect();
        let eth = metrics.iter().find(|m| m.coin_id == "ethereum").unwrap();
        assert_eq!(eth.value, "N/A");
        assert_eq!(eth.delta, "0.00%");
        assert_eq!(metrics[0].value, "$60,000");
    }

    #[test]
    fn empty_protocols_give_zero_total() {
        let shaped = ShapedSnapshot {
            protocols: shape_protocols(&FetchResult::Ok(json!([]))),
            ..ShapedSnapshot::default()
        };
        let summary = summarize(&shaped);
        assert_eq!(summary[0].label, "Total DeFi TVL (Top 10)");
        assert_eq!(summary[0].text, "$0");
        assert!(summary.iter().all(|m| m.value == 0.0));
        assert_eq!(summary[3].text, "0.0%");
    }

    #[test]
    fn summary_aggregates_shaped_tables() {
        let shaped = ShapedSnapshot {
            protocols: vec![
                ProtocolRecord {
                    name: "Lido".into(),
                    category: "Liquid Staking".into(),
                    tvl: 2_000_000_000.0,
                    change_1d: 0.1,
                },
                ProtocolRecord {
                    name: "Aave".into(),
                    category: "Lending".into(),
                    tvl: 500_000_000.0,
                    change_1d: -0.2,
                },
            ],
            stablecoins: vec![StablecoinRecord {
                name: "Tether".into(),
                symbol: "USDT".into(),
                circulating_usd: 3_000_000.0,
            }],
            yields: vec![pool("A", 20.0), pool("B", 30.0), pool("C", 40.0)],
            ..ShapedSnapshot::default()
        };
        let summary = summarize(&shaped);
        assert_eq!(summary[0].value, 2_500_000_000.0);
        assert_eq!(summary[0].text, "$2.5B");
        assert_eq!(summary[1].text, "$0");
        assert_eq!(summary[2].text, "$3.0M");
        assert_eq!(summary[3].value, 30.0);
        assert_eq!(summary[3].text, "30.0%");
    }

    #[test]
    fn yield_chart_is_capped_but_rows_are_not() {
        let pools: Vec<_> = (0..12).map(|i| pool(&format!("p{i}"), 100.0 - i as f64)).collect();
        let section = yields_section(&pools, 10.0);
        assert_eq!(section.chart.len(), YIELD_CHART_ROWS);
        assert_eq!(section.rows.len(), 12);
        assert_eq!(section.chart[0].text, "100.0%");
        assert_eq!(section.rows[0].apy, "100.00%");
        assert_eq!(section.rows[0].tvl_usd, "$1,000");
        assert_eq!(section.title, "High-Yield Pools (>10% APY)");
        // display strings never touch the numbers
        assert_eq!(pools[0].apy, 100.0);
    }

    #[test]
    fn empty_sections_carry_placeholders() {
        let view = present(
            &ShapedSnapshot::default(),
            vec!["API request failed: x".into()],
            12.5,
            Local::now(),
        );
        assert!(!view.protocols.available);
        assert_eq!(view.protocols.placeholder.as_deref(), Some("Protocol data unavailable"));
        assert_eq!(view.chains.placeholder.as_deref(), Some("Chain data unavailable"));
        assert_eq!(view.stablecoins.placeholder.as_deref(), Some("Stablecoin data unavailable"));
        assert_eq!(
            view.yields.placeholder.as_deref(),
            Some("No pools found with APY > 12.5%")
        );
        assert_eq!(view.warnings.len(), 1);
        assert_eq!(view.summary[0].text, "$0");
    }

    #[test]
    fn stablecoin_chart_shows_share_of_top_six() {
        let stables = vec![
            StablecoinRecord {
                name: "Tether".into(),
                symbol: "USDT".into(),
                circulating_usd: 75.0,
            },
            StablecoinRecord {
                name: "USD Coin".into(),
                symbol: "USDC".into(),
                circulating_usd: 25.0,
            },
        ];
        let section = stablecoins_section(&stables);
        assert_eq!(section.chart[0].text, "75.0%");
        assert_eq!(section.chart[1].text, "25.0%");
        assert_eq!(section.rows[0].circulating_usd, "$75");
        assert!(section.placeholder.is_none());
    }

    #[test]
    fn view_serializes_for_the_page() {
        let raw = FetchResult::Empty(EmptyReason::Status(500));
        let shaped = ShapedSnapshot {
            prices: shape_prices(&raw),
            ..ShapedSnapshot::default()
        };
        let view = present(&shaped, vec![], 10.0, Local::now());
        let v = serde_json::to_value(&view).unwrap();
        assert_eq!(v["prices"].as_array().unwrap().len(), 8);
        assert_eq!(v["yields"]["available"], json!(false));
        assert_eq!(v["summary"][0]["text"], json!("$0"));
        assert_eq!(v["min_apy"], json!(10.0));
    }
}
