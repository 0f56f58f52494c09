//! UTXO dump tool.
//!
//! Scans a Bitcoin Core chainstate LevelDB and writes one tab-separated
//! line per unspent output: txid, vout, address, amount (satoshis), script
//! hex.
//!
//! ```bash
//! # 1. Stop the node (LevelDB is single-process)
//! bitcoin-cli stop
//!
//! # 2. Work on a copy so the node can come back up
//! cp -r ~/.bitcoin/chainstate /tmp/chainstate-copy
//!
//! # 3. Dump
//! utxo-dump --chainstate-path /tmp/chainstate-copy --output utxo-dump.csv
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use utxo_dump::config::{get_global_config, get_string_or, get_u64_or, init_global_config};
use utxo_dump::error::DumpError;
use utxo_dump::scan::{
    open_chainstate, ChainstateScan, ScanOptions, DEFAULT_ESTIMATED_TOTAL, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_PROGRESS_INTERVAL,
};
use utxo_dump::telemetry::{init_tracing, TelemetryConfig};

#[derive(Parser, Debug)]
#[clap(name = "utxo-dump")]
#[clap(about = "Dump the UTXO set from a Bitcoin Core chainstate LevelDB", long_about = None)]
struct Args {
    /// Path to the chainstate directory copy (uses config paths.chainstate_dir by default)
    #[clap(long)]
    chainstate_path: Option<String>,

    /// Output file for the tab-separated dump
    #[clap(long)]
    output: Option<String>,

    /// Skip address derivation; emits "?" in the address column
    #[clap(long, default_value_t = false)]
    no_addresses: bool,

    /// Estimated total record count, used only for the ETA report
    #[clap(long)]
    estimated_total: Option<u64>,
}

fn main() -> Result<(), DumpError> {
    let args = Args::parse();
    init_tracing(TelemetryConfig::default());
    init_global_config()?;
    let config = get_global_config();

    let chainstate_str = args
        .chainstate_path
        .map(|p| shellexpand::tilde(&p).to_string())
        .unwrap_or_else(|| get_string_or(config, "paths.chainstate_dir", "/tmp/chainstate-copy"));
    let chainstate_path = PathBuf::from(&chainstate_str);

    if !chainstate_path.exists() {
        eprintln!("❌ Chainstate path does not exist: {}", chainstate_path.display());
        eprintln!("   Specify with: --chainstate-path <path> (or paths.chainstate_dir in config.toml)");
        eprintln!("   Run against a copy; the node must not have the directory open.");
        std::process::exit(1);
    }

    let output_path = args
        .output
        .map(|p| shellexpand::tilde(&p).to_string())
        .unwrap_or_else(|| get_string_or(config, "paths.output_file", "utxo-dump.csv"));

    let opts = ScanOptions {
        decode_addresses: !args.no_addresses,
        flush_interval: get_u64_or(config, "scan.flush_interval", DEFAULT_FLUSH_INTERVAL),
        progress_interval: get_u64_or(config, "scan.progress_interval", DEFAULT_PROGRESS_INTERVAL),
        estimated_total: args
            .estimated_total
            .unwrap_or_else(|| get_u64_or(config, "scan.estimated_total", DEFAULT_ESTIMATED_TOTAL)),
    };

    info!(
        chainstate = %chainstate_path.display(),
        output = %output_path,
        addresses = opts.decode_addresses,
        "starting chainstate scan"
    );

    let mut db = open_chainstate(&chainstate_path)?;
    let file = File::create(&output_path)?;
    let mut sink = BufWriter::new(file);

    let mut scan = ChainstateScan::new(&mut sink, opts);
    let report = scan.run(&mut db)?;

    info!(
        utxos = report.decoded,
        records = report.scanned,
        skipped = report.skipped,
        elapsed_sec = report.elapsed.as_secs(),
        output = %output_path,
        "dump written"
    );
    Ok(())
}
