use anyhow::Context;
use clap::Parser;
use device_probe::config::{RegistryConfig, DEFAULT_LOOKUP_TIMEOUT_MS};
use device_probe::inventory;
use device_probe::ip::{IpLocationLookup, PublicIp, PublicIpResolver};
use device_probe::location::{LocationResolver, ProviderRegistry};
use device_probe::report::{self, DeviceReport, ReportSink, DEFAULT_REPORT_FILE};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Device Probe: host diagnostic snapshot with multi-source geolocation
///
/// Collects system, CPU, memory, disk and network facts, the public IP, and
/// a best-effort location from several providers, then prints and saves a
/// report.
///
/// Examples:
///   device-probe
///   device-probe --json --no-save
///   device-probe --offline -v
///   device-probe --config ./providers.json --timeout-ms 1500
#[derive(Parser)]
#[command(name = "device-probe", version, about, long_about = None)]
struct Cli {
    /// Where to write the JSON report.
    #[arg(long, short = 'o', default_value = DEFAULT_REPORT_FILE)]
    output: PathBuf,

    /// Do not write the report to disk.
    #[arg(long)]
    no_save: bool,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Provider registry file (JSON). Defaults to <config dir>/device-probe/providers.json.
    #[arg(long, env = "DEVICE_PROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Override every location provider's timeout (milliseconds).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Timeout for the public IP and IP location lookups (milliseconds).
    #[arg(long, default_value_t = DEFAULT_LOOKUP_TIMEOUT_MS)]
    public_ip_timeout_ms: u64,

    /// Skip every network lookup; only local providers run.
    #[arg(long)]
    offline: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    eprintln!("  Collecting device information...");

    // ── Provider registry ───────────────────────────────────────

    let mut config = RegistryConfig::load(cli.config.as_deref()).context("loading provider configuration")?;
    if let Some(ms) = cli.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    let registry = ProviderRegistry::from_config(&config, !cli.offline);
    tracing::info!(providers = registry.len(), offline = cli.offline, "provider registry ready");
    let resolver = LocationResolver::new(registry);

    // ── Independent lookups run alongside resolution ────────────

    let inventory_task = tokio::task::spawn_blocking(inventory::collect);

    let lookup_timeout = Duration::from_millis(cli.public_ip_timeout_ms);
    let offline = cli.offline;
    let ip_task = tokio::task::spawn_blocking(move || {
        let public_ip = if offline {
            PublicIp::Unavailable("offline mode".into())
        } else {
            PublicIpResolver::new().timeout(lookup_timeout).resolve()
        };
        let ip_location = IpLocationLookup::new().timeout(lookup_timeout).lookup(&public_ip);
        (public_ip, ip_location)
    });

    let gps_location = resolver.resolve_report().await;
    let system_info = inventory_task.await.context("inventory collection panicked")?;
    let (public_ip, ip_location) = ip_task.await.context("public IP lookup panicked")?;

    let report = DeviceReport::new(system_info, public_ip, ip_location, gps_location);

    // ── Output ──────────────────────────────────────────────────

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report::render(&report));
    }

    if !cli.no_save {
        let sink = ReportSink::new(&cli.output);
        match sink.persist(&report) {
            Ok(()) => eprintln!("  Report saved to '{}'", sink.path().display()),
            // Gathering succeeded; a failed write is only a warning.
            Err(e) => {
                tracing::warn!(error = %e, "report not saved");
                eprintln!("  Error saving report: {}", e);
            }
        }
    }

    Ok(())
}
