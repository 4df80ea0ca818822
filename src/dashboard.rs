use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::{config::Settings, refresh::RefreshController};

#[derive(Clone)]
pub struct DashboardState {
    pub settings: Settings,
    pub controller: Arc<RefreshController>,
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/dashboard", get(api_dashboard))
        .route("/api/refresh", post(api_refresh))
        .route("/api/health", get(api_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve_dashboard(settings: Settings, controller: Arc<RefreshController>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.dashboard_host, settings.dashboard_port)
        .parse()
        .with_context(|| {
            format!(
                "dashboard addr parse {}:{}",
                settings.dashboard_host, settings.dashboard_port
            )
        })?;

    let app = router(DashboardState {
        settings: settings.clone(),
        controller,
    });

    log::info!("dashboard.start url=http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("dashboard.stop");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("dashboard.signal.error {}", e);
    }
}

async fn index(State(st): State<DashboardState>) -> impl IntoResponse {
    Html(render_index_html(
        st.settings.default_min_apy,
        st.settings.cache_ttl_secs,
    ))
}

#[derive(Deserialize)]
struct MinApyQ {
    min_apy: Option<f64>,
}

async fn api_dashboard(
    State(st): State<DashboardState>,
    Query(q): Query<MinApyQ>,
) -> impl IntoResponse {
    let min_apy = q.min_apy.unwrap_or(st.settings.default_min_apy);
    Json(st.controller.render(min_apy).await)
}

async fn api_refresh(
    State(st): State<DashboardState>,
    Query(q): Query<MinApyQ>,
) -> impl IntoResponse {
    let min_apy = q.min_apy.unwrap_or(st.settings.default_min_apy);
    Json(st.controller.refresh(min_apy).await)
}

async fn api_health(State(st): State<DashboardState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ts": now_ts(),
        "state": st.controller.state(),
        "cache_entries": st.controller.fetcher().cache().len(),
        "ttl_secs": st.controller.fetcher().cache().ttl().as_secs(),
    }))
}

fn now_ts() -> f64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs_f64()
}

fn render_index_html(default_min_apy: f64, ttl_secs: u64) -> String {
    // Single-file UI, no build step. All numbers arrive pre-formatted from /api/dashboard.
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Live Crypto &amp; DeFi Dashboard</title>
    <style>
      :root {{
        --bg: #0b1220;
        --panel: rgba(255,255,255,0.06);
        --stroke: rgba(255,255,255,0.12);
        --text: rgba(255,255,255,0.92);
        --muted: rgba(255,255,255,0.65);
        --good: #33d17a;
        --bad: #ff4d4d;
        --warn: #ffcc00;
        --brand: #7c5cff;
        --brand2: #3dd6d0;
      }}
      * {{ box-sizing: border-box; }}
      body {{
        margin: 0;
        font-family: ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto, Helvetica, Arial;
        color: var(--text);
        background: radial-gradient(1200px 900px at 15% 10%, rgba(124,92,255,0.20), transparent 60%),
                    radial-gradient(1100px 800px at 90% 20%, rgba(61,214,208,0.16), transparent 55%),
                    var(--bg);
      }}
      .wrap {{ max-width: 1280px; margin: 0 auto; padding: 22px 18px 42px; }}
      .topbar {{
        display: flex; align-items: center; justify-content: space-between; gap: 12px; flex-wrap: wrap;
        padding: 16px; border: 1px solid var(--stroke); border-radius: 16px;
        background: linear-gradient(180deg, rgba(255,255,255,0.06), rgba(255,255,255,0.03));
      }}
      .title {{ font-weight: 800; font-size: 20px; letter-spacing: 0.2px; }}
      .subtitle {{ color: var(--muted); font-size: 12px; margin-top: 2px; }}
      .controls {{ display: flex; align-items: center; gap: 10px; flex-wrap: wrap; }}
      .chip {{
        padding: 7px 10px; border-radius: 999px; border: 1px solid var(--stroke);
        background: rgba(255,255,255,0.04); font-size: 12px; color: var(--muted); white-space: nowrap;
      }}
      .chip b {{ color: var(--text); }}
      .chip input {{
        width: 64px; margin-left: 6px; background: transparent; color: var(--text);
        border: 1px solid var(--stroke); border-radius: 6px; padding: 2px 4px;
      }}
      .btn {{
        cursor: pointer; padding: 8px 12px; border-radius: 10px;
        border: 1px solid rgba(124,92,255,0.6); background: rgba(124,92,255,0.25);
        color: var(--text); font-weight: 700; font-size: 12px;
      }}
      .btn:disabled {{ opacity: 0.5; cursor: wait; }}
      h2 {{ font-size: 15px; margin: 22px 0 10px; }}
      .grid {{ display: grid; gap: 14px; grid-template-columns: repeat(12, 1fr); }}
      .card {{ border: 1px solid var(--stroke); border-radius: 16px; background: var(--panel); overflow: hidden; }}
      .card .hd {{
        padding: 12px 14px; border-bottom: 1px solid rgba(255,255,255,0.08);
        background: rgba(255,255,255,0.03); font-weight: 800;
      }}
      .card .bd {{ padding: 12px 14px; }}
      .kpis {{ display: grid; gap: 10px; grid-template-columns: repeat(4, 1fr); }}
      .kpi {{
        border: 1px solid rgba(255,255,255,0.10); border-radius: 14px; padding: 12px;
        background: linear-gradient(180deg, rgba(255,255,255,0.05), rgba(255,255,255,0.03));
      }}
      .kpi .lbl {{ color: var(--muted); font-size: 12px; }}
      .kpi .val {{ font-size: 22px; font-weight: 850; margin-top: 6px; letter-spacing: -0.3px; }}
      .kpi .sub {{ font-size: 12px; margin-top: 5px; color: var(--muted); }}
      .up {{ color: var(--good) !important; }}
      .down {{ color: var(--bad) !important; }}
      .bars .row {{ display: grid; grid-template-columns: 130px 1fr 90px; gap: 8px; align-items: center; margin: 6px 0; font-size: 12px; }}
      .bars .name {{ overflow: hidden; text-overflow: ellipsis; white-space: nowrap; color: var(--muted); }}
      .bars .track {{ height: 14px; border-radius: 999px; background: rgba(255,255,255,0.06); overflow: hidden; }}
      .bars .fill {{ height: 100%; border-radius: 999px; }}
      .bars .txt {{ text-align: right; font-weight: 700; }}
      .empty {{ color: var(--muted); font-size: 13px; padding: 10px 0; }}
      details {{ margin-top: 10px; font-size: 12px; }}
      summary {{ cursor: pointer; color: var(--muted); }}
      table {{ width: 100%; border-collapse: collapse; margin-top: 8px; }}
      th, td {{ padding: 7px 8px; border-bottom: 1px solid rgba(255,255,255,0.07); text-align: left; }}
      th {{ color: var(--muted); font-weight: 700; }}
      .banner {{
        margin-top: 12px; padding: 10px 12px; border-radius: 14px; display: none;
        border: 1px solid rgba(255,204,0,0.35); background: rgba(255,204,0,0.08); font-size: 13px;
      }}
      .banner div + div {{ margin-top: 4px; }}
      .footer {{ margin-top: 18px; color: var(--muted); font-size: 12px; line-height: 1.6; }}
      .col-6 {{ grid-column: span 6; }}
      @media (max-width: 1100px) {{
        .kpis {{ grid-template-columns: repeat(2, 1fr); }}
        .col-6 {{ grid-column: span 12; }}
      }}
    </style>
  </head>
  <body>
    <div class="wrap">
      <div class="topbar">
        <div>
          <div class="title">Live Crypto &amp; DeFi Dashboard</div>
          <div class="subtitle">Last Updated: <b id="updated">--</b></div>
        </div>
        <div class="controls">
          <label class="chip">Min APY Filter (%)<input id="minApy" type="number" min="0" max="100" step="5" value="{min_apy}" /></label>
          <div class="chip">Status: <b id="statusText">loading…</b></div>
          <button class="btn" id="refreshBtn">Refresh Data</button>
        </div>
      </div>
      <div class="banner" id="warnBanner"></div>

      <h2>Top Cryptocurrencies</h2>
      <div class="kpis" id="prices"></div>

      <div class="grid" style="margin-top: 14px;">
        <div class="card col-6"><div class="hd" id="protocolsTitle">--</div><div class="bd" id="protocols"></div></div>
        <div class="card col-6"><div class="hd" id="chainsTitle">--</div><div class="bd" id="chains"></div></div>
        <div class="card col-6"><div class="hd" id="stablecoinsTitle">--</div><div class="bd" id="stablecoins"></div></div>
        <div class="card col-6"><div class="hd" id="yieldsTitle">--</div><div class="bd" id="yields"></div></div>
      </div>

      <h2>Market Summary</h2>
      <div class="kpis" id="summary"></div>

      <div class="footer">
        Data Sources: DeFiLlama, CoinGecko • Data cached for {ttl_secs} seconds<br />
        DISCLAIMER: This dashboard is for informational purposes only. Not financial advice. DYOR.
      </div>
    </div>

    <script>
      function escapeHtml(s) {{
        return String(s ?? "").replace(/[&<>"']/g, (c) => ({{
          "&": "&amp;", "<": "&lt;", ">": "&gt;", '"': "&quot;", "'": "&#39;"
        }}[c]));
      }}

      function hue(s) {{
        let h = 0;
        for (const ch of String(s)) h = (h * 31 + ch.charCodeAt(0)) % 360;
        return h;
      }}

      function minApy() {{
        const v = Number(document.getElementById("minApy").value);
        return Number.isFinite(v) ? v : {min_apy};
      }}

      function setStatus(text) {{
        document.getElementById("statusText").textContent = text;
      }}

      function renderWarnings(list) {{
        const el = document.getElementById("warnBanner");
        if (!list.length) {{ el.style.display = "none"; el.innerHTML = ""; return; }}
        el.innerHTML = list.map((w) => `<div>⚠️ ${{escapeHtml(w)}}</div>`).join("");
        el.style.display = "block";
      }}

      function renderKpis(id, items) {{
        document.getElementById(id).innerHTML = items.map((m) => `
          <div class="kpi">
            <div class="lbl">${{escapeHtml(m.label)}}</div>
            <div class="val">${{escapeHtml(m.text ?? m.value)}}</div>
            ${{m.delta !== undefined ? `<div class="sub ${{m.direction}}">${{escapeHtml(m.delta)}}</div>` : ""}}
          </div>`).join("");
      }}

      function renderTable(rows) {{
        if (!rows.length) return "";
        const cols = Object.keys(rows[0]);
        const head = cols.map((c) => `<th>${{escapeHtml(c)}}</th>`).join("");
        const body = rows.map((r) => `<tr>${{cols.map((c) => `<td>${{escapeHtml(r[c])}}</td>`).join("")}}</tr>`).join("");
        return `<details><summary>View Raw Data</summary><table><thead><tr>${{head}}</tr></thead><tbody>${{body}}</tbody></table></details>`;
      }}

      function renderSection(id, section) {{
        document.getElementById(id + "Title").textContent = section.title;
        const el = document.getElementById(id);
        if (!section.available) {{
          el.innerHTML = `<div class="empty">${{escapeHtml(section.placeholder)}}</div>`;
          return;
        }}
        const max = Math.max(...section.chart.map((b) => b.value), 0) || 1;
        const bars = section.chart.map((b) => `
          <div class="row" title="${{escapeHtml(b.detail)}}">
            <div class="name">${{escapeHtml(b.label)}}</div>
            <div class="track"><div class="fill" style="width:${{(100 * b.value / max).toFixed(1)}}%; background:hsl(${{hue(b.group)}},70%,60%)"></div></div>
            <div class="txt">${{escapeHtml(b.text)}}</div>
          </div>`).join("");
        el.innerHTML = `<div class="bars">${{bars}}</div>` + renderTable(section.rows);
      }}

      function render(view) {{
        document.getElementById("updated").textContent = view.last_updated;
        renderWarnings(view.warnings);
        renderKpis("prices", view.prices);
        renderSection("protocols", view.protocols);
        renderSection("chains", view.chains);
        renderSection("stablecoins", view.stablecoins);
        renderSection("yields", view.yields);
        renderKpis("summary", view.summary);
      }}

      async function load(path, opts) {{
        setStatus("fetching…");
        try {{
          const r = await fetch(`${{path}}?min_apy=${{encodeURIComponent(minApy())}}`, opts);
          if (!r.ok) throw new Error(`${{r.status}} ${{await r.text()}}`);
          render(await r.json());
          setStatus("live");
        }} catch (e) {{
          setStatus("disconnected");
          renderWarnings([(e && e.message) ? e.message : String(e)]);
        }}
      }}

      const btn = document.getElementById("refreshBtn");
      btn.addEventListener("click", async () => {{
        btn.disabled = true;
        await load("/api/refresh", {{ method: "POST" }});
        btn.disabled = false;
      }});
      document.getElementById("minApy").addEventListener("change", () => load("/api/dashboard"));
      load("/api/dashboard");
    </script>
  </body>
</html>"#,
        min_apy = default_min_apy,
        ttl_secs = ttl_secs,
    )
}
