//! Report writers: graph.json and summary.md.
//!
//! The JSON file is the machine-readable artifact with the stable
//! schema; the markdown summary is the investigator-facing digest.
//! Summary content comes from a pure builder so tests can assert on
//! it without touching the filesystem.

use alloy_primitives::Address;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::TraceConfig;
use crate::core::graph::{Edge, Graph};
use crate::models::errors::AppResult;

const GRAPH_FILE: &str = "graph.json";
const SUMMARY_FILE: &str = "summary.md";
const TOP_COUNTERPARTIES: usize = 10;
const TOP_TRANSFERS: usize = 15;

/// Write the full graph as pretty-printed JSON. Returns the file path.
pub fn write_graph_json(graph: &Graph, out_dir: &Path) -> AppResult<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(GRAPH_FILE);
    let json = serde_json::to_string_pretty(graph)?;
    fs::write(&path, json)?;
    info!("💾 Wrote {}", path.display());
    Ok(path)
}

/// Write the markdown digest. Returns the file path.
pub fn write_summary_md(
    graph: &Graph,
    seed: Address,
    config: &TraceConfig,
    out_dir: &Path,
) -> AppResult<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(SUMMARY_FILE);
    fs::write(&path, build_summary(graph, seed, config))?;
    info!("💾 Wrote {}", path.display());
    Ok(path)
}

/// Direct counterparty USD totals, seen from the seed
struct SeedFlows {
    inflow: Vec<(Address, f64)>,
    outflow: Vec<(Address, f64)>,
    inflow_total: f64,
    outflow_total: f64,
}

fn seed_flows(graph: &Graph, seed: Address) -> SeedFlows {
    let mut inflow: HashMap<Address, f64> = HashMap::new();
    let mut outflow: HashMap<Address, f64> = HashMap::new();
    for edge in graph.edges() {
        let Some(usd) = edge.usd_value else { continue };
        if edge.to == seed {
            *inflow.entry(edge.from).or_default() += usd;
        }
        if edge.from == seed {
            *outflow.entry(edge.to).or_default() += usd;
        }
    }

    let inflow_total = inflow.values().sum();
    let outflow_total = outflow.values().sum();
    let mut inflow: Vec<_> = inflow.into_iter().collect();
    let mut outflow: Vec<_> = outflow.into_iter().collect();
    // USD descending, address as tiebreak for a stable report
    let rank = |a: &(Address, f64), b: &(Address, f64)| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    };
    inflow.sort_by(rank);
    outflow.sort_by(rank);

    SeedFlows {
        inflow,
        outflow,
        inflow_total,
        outflow_total,
    }
}

/// Build the whole summary document as a string
pub fn build_summary(graph: &Graph, seed: Address, config: &TraceConfig) -> String {
    let flows = seed_flows(graph, seed);
    let mut md = String::new();

    let _ = writeln!(md, "# Trace Summary");
    let _ = writeln!(md);
    let _ = writeln!(md, "**Seed:** `{:?}`", seed);
    let _ = writeln!(
        md,
        "**Window:** last {} days | **Hop limit:** {}",
        config.window_days, config.hop_limit
    );
    if config.min_usd > 0.0 {
        let _ = writeln!(md, "**Min USD per transfer:** {}", fmt_usd(config.min_usd));
    }
    let _ = writeln!(
        md,
        "**Nodes:** {} | **Edges:** {} | **Tokens assessed:** {}",
        graph.node_count(),
        graph.edge_count(),
        graph.token_count()
    );
    let _ = writeln!(
        md,
        "**Traced volume:** {} (priced edges only)",
        fmt_usd(graph.total_usd())
    );
    let _ = writeln!(
        md,
        "\n_Generated: {}_",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
    );

    let _ = writeln!(md, "\n## Top {} Inflow Sources (by USD)", TOP_COUNTERPARTIES);
    counterparty_table(&mut md, &flows.inflow);

    let _ = writeln!(
        md,
        "\n## Top {} Outflow Destinations (by USD)",
        TOP_COUNTERPARTIES
    );
    counterparty_table(&mut md, &flows.outflow);

    let _ = writeln!(md, "\n## Interpretation");
    let _ = writeln!(md, "\n{}", interpretation(&flows));

    if graph.token_count() > 0 {
        let _ = writeln!(md, "\n## Token Risk");
        let _ = writeln!(md, "\n| Token | Label | Score | Flags |");
        let _ = writeln!(md, "|---|---|---|---|");
        for (address, risk) in graph.tokens() {
            let flags = risk
                .risk_flags
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                md,
                "| `{}` | {} {} | {} | {} |",
                short_addr(address),
                risk.label.emoji(),
                risk.label.as_str(),
                risk.score,
                if flags.is_empty() { "-" } else { &flags }
            );
        }
    }

    let _ = writeln!(md, "\n## Top Transfers (by USD value)");
    transfer_table(&mut md, graph.edges());

    let _ = writeln!(md, "\n## Limitations / Next steps");
    let _ = writeln!(
        md,
        "\n- Flows outside the {}-day window or beyond {} hops are invisible here.",
        config.window_days, config.hop_limit
    );
    let _ = writeln!(
        md,
        "- Unpriced transfers carry no USD value and are excluded from totals."
    );
    let _ = writeln!(
        md,
        "- Counterparty labels (exchange, bridge, mixer) are not resolved; check addresses manually."
    );
    let _ = writeln!(
        md,
        "- Token risk labels are heuristics over public signals, not verdicts."
    );

    md
}

fn counterparty_table(md: &mut String, rows: &[(Address, f64)]) {
    if rows.is_empty() {
        let _ = writeln!(md, "\n_None in window._");
        return;
    }
    let _ = writeln!(md, "\n| Address | USD |");
    let _ = writeln!(md, "|---|---|");
    for (address, usd) in rows.iter().take(TOP_COUNTERPARTIES) {
        let _ = writeln!(md, "| `{}` | {} |", short_addr(address), fmt_usd(*usd));
    }
}

fn transfer_table(md: &mut String, edges: &[Edge]) {
    if edges.is_empty() {
        let _ = writeln!(md, "\n_No transfers matched the filters._");
        return;
    }
    let mut ranked: Vec<&Edge> = edges.iter().collect();
    // Priced first (descending), unpriced at the bottom
    ranked.sort_by(|a, b| match (a.usd_value, b.usd_value) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.timestamp.cmp(&b.timestamp),
    });
    ranked.truncate(TOP_TRANSFERS);

    let _ = writeln!(md, "\n| USD | Asset | Amount | From | To | Date |");
    let _ = writeln!(md, "|---|---|---|---|---|---|");
    for edge in ranked {
        let usd = edge
            .usd_value
            .map(fmt_usd)
            .unwrap_or_else(|| "unknown".to_string());
        let _ = writeln!(
            md,
            "| {} | {} | {:.4} | `{}` | `{}` | {} |",
            usd,
            edge.asset.symbol(),
            edge.amount,
            short_addr(&edge.from),
            short_addr(&edge.to),
            fmt_date(edge.timestamp)
        );
    }
}

fn interpretation(flows: &SeedFlows) -> String {
    let uniq_in = flows.inflow.len();
    let uniq_out = flows.outflow.len();
    if uniq_out >= 2 * uniq_in.max(1) && flows.outflow_total > flows.inflow_total {
        format!(
            "The seed fans value out to {} addresses while drawing from only {}; \
             this pattern is typical of a distribution hub (payouts, airdrops, or layering).",
            uniq_out, uniq_in
        )
    } else if uniq_in >= 2 * uniq_out.max(1) && flows.inflow_total > flows.outflow_total {
        format!(
            "The seed draws value in from {} addresses while sending to only {}; \
             this pattern is typical of a collection point (deposits, sweeps, or consolidation).",
            uniq_in, uniq_out
        )
    } else {
        format!(
            "Mixed flow pattern: {} inflow counterparties ({}) vs {} outflow counterparties ({}).",
            uniq_in,
            fmt_usd(flows.inflow_total),
            uniq_out,
            fmt_usd(flows.outflow_total)
        )
    }
}

/// First 10 characters of the hex form, matching explorer shorthand
fn short_addr(address: &Address) -> String {
    let full = format!("{:?}", address);
    format!("{}...", &full[..10])
}

fn fmt_usd(v: f64) -> String {
    format!("${:.2}", v)
}

fn fmt_date(ts: u64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::Asset;
    use crate::models::types::{RiskFlag, RiskLabel, TokenRisk};
    use std::str::FromStr;

    fn addr(n: u8) -> Address {
        Address::from_str(&format!("0x{:040x}", n)).unwrap()
    }

    fn edge(from: Address, to: Address, tx: &str, usd: Option<f64>) -> Edge {
        Edge {
            from,
            to,
            tx_hash: tx.to_string(),
            timestamp: 1_700_000_000,
            asset: Asset::Native,
            amount: 1.0,
            usd_value: usd,
            log_index: None,
        }
    }

    fn fan_out_graph(seed: Address) -> Graph {
        let mut g = Graph::new();
        for n in 10..15 {
            g.insert_edge(edge(seed, addr(n), &format!("0x{:02x}", n), Some(100.0 * n as f64)));
        }
        g.insert_edge(edge(addr(2), seed, "0xaa", Some(50.0)));
        g
    }

    #[test]
    fn test_summary_sections_present() {
        let seed = addr(1);
        let g = fan_out_graph(seed);
        let cfg = TraceConfig::new(format!("{:?}", seed));
        let md = build_summary(&g, seed, &cfg);

        for section in [
            "# Trace Summary",
            "## Top 10 Inflow Sources (by USD)",
            "## Top 10 Outflow Destinations (by USD)",
            "## Interpretation",
            "## Top Transfers (by USD value)",
            "## Limitations / Next steps",
        ] {
            assert!(md.contains(section), "missing section: {}", section);
        }
        assert!(md.contains("**Nodes:** 7 | **Edges:** 6"));
    }

    #[test]
    fn test_distribution_hub_interpretation() {
        let seed = addr(1);
        let g = fan_out_graph(seed);
        let cfg = TraceConfig::new(format!("{:?}", seed));
        let md = build_summary(&g, seed, &cfg);
        assert!(md.contains("distribution hub"));
    }

    #[test]
    fn test_collection_point_interpretation() {
        let seed = addr(1);
        let mut g = Graph::new();
        for n in 10..15 {
            g.insert_edge(edge(addr(n), seed, &format!("0x{:02x}", n), Some(500.0)));
        }
        g.insert_edge(edge(seed, addr(2), "0xaa", Some(50.0)));
        let cfg = TraceConfig::new(format!("{:?}", seed));
        let md = build_summary(&g, seed, &cfg);
        assert!(md.contains("collection point"));
    }

    #[test]
    fn test_unpriced_transfers_rank_last() {
        let seed = addr(1);
        let mut g = Graph::new();
        g.insert_edge(edge(seed, addr(2), "0xaa", None));
        g.insert_edge(edge(seed, addr(3), "0xbb", Some(10.0)));
        let cfg = TraceConfig::new(format!("{:?}", seed));
        let md = build_summary(&g, seed, &cfg);

        let priced = md.find("$10.00").expect("priced row present");
        let unpriced = md.find("| unknown |").expect("unpriced row present");
        assert!(priced < unpriced, "priced transfers listed before unpriced");
    }

    #[test]
    fn test_token_risk_table() {
        let seed = addr(1);
        let mut g = fan_out_graph(seed);
        let mut risk = TokenRisk::unknown(addr(9));
        risk.label = RiskLabel::HighRisk;
        risk.score = 65;
        risk.risk_flags.insert(RiskFlag::LiquidityThin);
        g.attach_token_risk(risk);

        let cfg = TraceConfig::new(format!("{:?}", seed));
        let md = build_summary(&g, seed, &cfg);
        assert!(md.contains("## Token Risk"));
        assert!(md.contains("HIGH_RISK"));
        assert!(md.contains("LIQUIDITY_THIN"));
    }

    #[test]
    fn test_files_written() {
        let seed = addr(1);
        let g = fan_out_graph(seed);
        let cfg = TraceConfig::new(format!("{:?}", seed));
        let dir = std::env::temp_dir().join(format!("flowtrace-report-{}", std::process::id()));

        let graph_path = write_graph_json(&g, &dir).unwrap();
        let summary_path = write_summary_md(&g, seed, &cfg, &dir).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&graph_path).unwrap()).unwrap();
        assert!(parsed["nodes"].is_array());
        assert!(fs::read_to_string(&summary_path)
            .unwrap()
            .starts_with("# Trace Summary"));

        let _ = fs::remove_dir_all(&dir);
    }
}
