use chrono::Local;
use parking_lot::Mutex;
use serde::Serialize;

use crate::{
    fetcher::{Fetcher, RawSnapshot},
    presenter::{present, DashboardView},
    shaper::{
        shape_chains, shape_prices, shape_protocols, shape_stablecoins, shape_yields,
        ShapedSnapshot,
    },
};

pub const MIN_APY_FLOOR: f64 = 0.0;
pub const MIN_APY_CEIL: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Runs fetch -> shape -> present, and owns the manual-refresh state machine.
pub struct RefreshController {
    fetcher: Fetcher,
    in_flight: Mutex<usize>,
}

/// Counts one in-flight refresh; released however the cycle ends, including
/// when the caller drops the future half way. The controller is Idle only
/// once the last overlapping refresh has released.
struct InFlight<'a>(&'a Mutex<usize>);

impl<'a> InFlight<'a> {
    fn enter(count: &'a Mutex<usize>) -> Self {
        *count.lock() += 1;
        Self(count)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut n = self.0.lock();
        *n = n.saturating_sub(1);
    }
}

impl RefreshController {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            in_flight: Mutex::new(0),
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn state(&self) -> RefreshState {
        if *self.in_flight.lock() > 0 {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// Build a view, reusing cached endpoint results while they are fresh.
    pub async fn render(&self, min_apy: f64) -> DashboardView {
        let min_apy = clamp_min_apy(min_apy);
        let raw = self.fetcher.fetch_all().await;
        let shaped = shape(&raw, min_apy);
        present(&shaped, raw.warnings, min_apy, Local::now())
    }

    /// Drop every cached response and rebuild from the network.
    pub async fn refresh(&self, min_apy: f64) -> DashboardView {
        let _in_flight = InFlight::enter(&self.in_flight);

        log::info!("refresh.start cached_entries={}", self.fetcher.cache().len());
        self.fetcher.cache().clear();
        let view = self.render(min_apy).await;
        log::info!("refresh.done warnings={}", view.warnings.len());
        view
    }
}

pub fn shape(raw: &RawSnapshot, min_apy: f64) -> ShapedSnapshot {
    ShapedSnapshot {
        protocols: shape_protocols(&raw.protocols),
        chains: shape_chains(&raw.chains),
        stablecoins: shape_stablecoins(&raw.stablecoins),
        yields: shape_yields(&raw.yields, min_apy),
        prices: shape_prices(&raw.prices),
    }
}

/// Keep the filter inside the input widget's range; NaN becomes the floor.
pub fn clamp_min_apy(x: f64) -> f64 {
    x.max(MIN_APY_FLOOR).min(MIN_APY_CEIL)
}
