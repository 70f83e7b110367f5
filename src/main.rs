//! FlowTrace - Hop-limited value-flow tracer with token risk scoring
//!
//! Expands a value-flow graph around a seed address (native + ERC-20
//! transfers), prices every edge in USD, scores the tokens the flow
//! touches, and writes graph.json + summary.md.

use flowtrace::config::{ScoringConfig, TraceConfig};
use flowtrace::core::aggregator::RiskAggregator;
use flowtrace::core::tracer::FlowTracer;
use flowtrace::ports::{PriceResolver, SignalProvider, TransferSource};
use flowtrace::providers::static_backend;
use flowtrace::providers::{
    ContractSourceProvider, CuratedListProvider, DexScreenerClient, EtherscanClient,
    MarketPriceResolver, MarketSignalProvider, SimulationProvider,
};
use flowtrace::utils::report;

use eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug)]
struct CliArgs {
    address: String,
    days: u64,
    hops: u32,
    min_usd: f64,
    max_edges_per_address: usize,
    max_total_edges: usize,
    ignore_unknown_price: bool,
    expand_capped_neighbors: bool,
    resolve_contracts: bool,
    no_risk: bool,
    offline: bool,
    out: PathBuf,
    help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            address: String::new(),
            days: 30,
            hops: 2,
            min_usd: 0.0,
            max_edges_per_address: 0,
            max_total_edges: 0,
            ignore_unknown_price: false,
            expand_capped_neighbors: true,
            resolve_contracts: false,
            no_risk: false,
            offline: false,
            out: PathBuf::from("out"),
            help: false,
        }
    }
}

fn need<I: Iterator<Item = String>>(
    flag: &str,
    inline: Option<String>,
    args: &mut I,
) -> Result<String, String> {
    inline
        .or_else(|| args.next())
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_as<T: std::str::FromStr>(flag: &str, raw: String) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid value for {}: {}", flag, raw))
}

impl CliArgs {
    /// Parse command-line flags. Both `--flag value` and `--flag=value`
    /// forms are accepted.
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Result<Self, String> {
        let mut out = Self::default();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) => (f.to_string(), Some(v.to_string())),
                None => (arg.clone(), None),
            };
            match flag.as_str() {
                "--help" | "-h" => out.help = true,
                "--ignore-unknown-price" => out.ignore_unknown_price = true,
                "--resolve-contracts" => out.resolve_contracts = true,
                "--no-risk" => out.no_risk = true,
                "--offline" => out.offline = true,
                "--address" => out.address = need(&flag, inline, &mut args)?,
                "--days" => out.days = parse_as(&flag, need(&flag, inline, &mut args)?)?,
                "--hops" => out.hops = parse_as(&flag, need(&flag, inline, &mut args)?)?,
                "--min-usd" => out.min_usd = parse_as(&flag, need(&flag, inline, &mut args)?)?,
                "--max-edges-per-address" => {
                    out.max_edges_per_address =
                        parse_as(&flag, need(&flag, inline, &mut args)?)?
                }
                "--max-total-edges" => {
                    out.max_total_edges = parse_as(&flag, need(&flag, inline, &mut args)?)?
                }
                "--expand-capped-neighbors" => {
                    out.expand_capped_neighbors =
                        parse_as(&flag, need(&flag, inline, &mut args)?)?
                }
                "--out" => out.out = PathBuf::from(need(&flag, inline, &mut args)?),
                other => return Err(format!("unknown flag: {}", other)),
            }
        }
        Ok(out)
    }
}

fn print_usage() {
    println!("Usage: flowtrace --address <0x...> [options]");
    println!();
    println!("Options:");
    println!("  --address <0x...>               Seed address to trace (required unless --offline)");
    println!("  --days <N>                      Lookback window in days (default: 30)");
    println!("  --hops <N>                      Maximum hop depth (default: 2)");
    println!("  --min-usd <X>                   Drop resolved transfers below this USD value (default: 0)");
    println!("  --max-edges-per-address <N>     Per-source edge cap, 0 = unlimited (default: 0)");
    println!("  --max-total-edges <N>           Global edge budget, 0 = unlimited (default: 0)");
    println!("  --ignore-unknown-price          Keep transfers whose USD value cannot be resolved");
    println!("  --expand-capped-neighbors <bool> Capped transfers still enqueue counterparties (default: true)");
    println!("  --resolve-contracts             Resolve the is-contract flag for every graph node");
    println!("  --no-risk                       Skip token risk assessment");
    println!("  --offline                       Use the built-in demo dataset, no network or API key");
    println!("  --out <dir>                     Output directory (default: out)");
    println!("  --help                          Show this help");
    println!();
    println!("Environment:");
    println!("  ETHERSCAN_API_KEY        Explorer API key, required unless --offline");
    println!("  ETHERSCAN_BASE_URL       Override the explorer API endpoint (mirror/proxy)");
    println!("  NATIVE_USD_FALLBACK      Override the native asset USD rate");
    println!("  RISK_DENYLIST_FILE       Curated denylist, one address per line");
    println!("  RISK_ALLOWLIST_FILE      Curated allowlist, one address per line");
    println!("  RISK_THRESHOLD_HIGH / RISK_THRESHOLD_MEDIUM / RISK_THRESHOLD_LOW");
    println!("                           Score thresholds for the risk labels");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    println!(
        r#"
    ╔═════════════════════════════════════════════╗
    ║                                             ║
    ║    ███████╗██╗      ██████╗ ██╗    ██╗      ║
    ║    ██╔════╝██║     ██╔═══██╗██║    ██║      ║
    ║    █████╗  ██║     ██║   ██║██║ █╗ ██║      ║
    ║    ██╔══╝  ██║     ██║   ██║██║███╗██║      ║
    ║    ██║     ███████╗╚██████╔╝╚███╔███╔╝      ║
    ║    ╚═╝     ╚══════╝ ╚═════╝  ╚══╝╚══╝       ║
    ║                T R A C E                    ║
    ║                                             ║
    ║         Value-Flow Tracer v0.1.0            ║
    ║    Hop-limited graph + token risk scoring   ║
    ║                                             ║
    ╚═════════════════════════════════════════════╝
    "#
    );

    let mut args = match CliArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("❌ {}", msg);
            println!();
            print_usage();
            std::process::exit(2);
        }
    };
    if args.help {
        print_usage();
        return Ok(());
    }
    if args.address.is_empty() {
        if args.offline {
            args.address = static_backend::DEMO_SEED.to_string();
        } else {
            eprintln!("❌ --address is required (or use --offline for the demo dataset)");
            println!();
            print_usage();
            std::process::exit(2);
        }
    }

    if !args.offline && std::env::var("ETHERSCAN_API_KEY").is_err() {
        eprintln!("⚠️  ETHERSCAN_API_KEY not set!");
        eprintln!("   Get a free key at https://etherscan.io/apis and export it:");
        eprintln!("   export ETHERSCAN_API_KEY=\"YOUR_KEY\"");
        eprintln!("   Or run with --offline for the built-in demo dataset.");
        eprintln!();
    }

    let mut config = TraceConfig::new(&args.address);
    config.window_days = args.days;
    config.hop_limit = args.hops;
    config.min_usd = args.min_usd;
    config.max_edges_per_address = args.max_edges_per_address;
    config.max_total_edges = args.max_total_edges;
    config.ignore_unknown_price = args.ignore_unknown_price;
    config.expand_capped_neighbors = args.expand_capped_neighbors;
    config.resolve_contract_flags = args.resolve_contracts;
    config.assess_tokens = !args.no_risk;
    if args.offline {
        // Pin the clock so the demo window always covers the demo data
        config.now_ts = Some(static_backend::demo_now());
    }

    let seed = config.validate()?;
    let scoring = ScoringConfig::from_env();
    scoring.validate()?;

    let source: Arc<dyn TransferSource>;
    let prices: Arc<dyn PriceResolver>;
    let mut providers: Vec<Arc<dyn SignalProvider>> = Vec::new();

    if args.offline {
        info!("🧪 Offline mode: built-in demo dataset, no network calls");
        let (demo_source, demo_prices) = static_backend::demo_dataset();
        source = Arc::new(demo_source);
        prices = Arc::new(demo_prices);
        providers.push(Arc::new(static_backend::demo_signal_provider()));
    } else {
        let etherscan = Arc::new(EtherscanClient::from_env()?);
        let dexscreener = Arc::new(DexScreenerClient::new());
        source = etherscan.clone();
        prices = Arc::new(MarketPriceResolver::new(dexscreener.clone()));
        providers.push(Arc::new(ContractSourceProvider::new(etherscan)));
        providers.push(Arc::new(MarketSignalProvider::new(dexscreener)));
        providers.push(Arc::new(SimulationProvider::new()));
        providers.push(Arc::new(CuratedListProvider::from_env()));
    }

    let mut tracer = FlowTracer::new(source, prices, config);
    if !args.no_risk {
        let aggregator = Arc::new(RiskAggregator::new(providers, scoring));
        tracer = tracer.with_risk_source(aggregator);
    }

    let started = std::time::Instant::now();
    let (graph, stats) = tracer.build_graph_with_stats().await?;

    report::write_graph_json(&graph, &args.out)?;
    report::write_summary_md(&graph, seed, tracer.config(), &args.out)?;

    println!("\n📊 Final Statistics:");
    println!("   Addresses expanded:    {}", stats.addresses_expanded);
    println!("   Terminal nodes:        {}", stats.terminal_nodes);
    println!("   Transfers seen:        {}", stats.transfers_seen);
    println!("   Edges added:           {}", stats.edges_added);
    println!("   Malformed dropped:     {}", stats.malformed_dropped);
    println!("   Unpriced dropped:      {}", stats.unpriced_dropped);
    println!("   Below floor dropped:   {}", stats.below_floor_dropped);
    println!("   Duplicates suppressed: {}", stats.duplicates_suppressed);
    println!("   Capped dropped:        {}", stats.capped_dropped);
    println!("   Source gaps:           {}", stats.source_gaps);
    println!("   Tokens assessed:       {}", stats.tokens_assessed);
    if stats.halted_on_edge_budget {
        println!("   ⚠️  Halted on the global edge budget; the graph is truncated.");
    }
    println!(
        "\n   Nodes: {} | Edges: {} | Traced volume: ${:.2}",
        graph.node_count(),
        graph.edge_count(),
        graph.total_usd()
    );
    println!("   Elapsed: {:.1}s", started.elapsed().as_secs_f64());
    println!("   Output: {}", args.out.display());

    Ok(())
}
