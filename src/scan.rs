//! Sequential chainstate scan driver.
//!
//! Iterates the chainstate LevelDB in ascending key order, keeps the
//! session obfuscation key current, and streams decoded outputs to a sink
//! as tab-separated lines. Key-space order is what makes deobfuscation
//! correct: the obfuscation-key record (prefix 0x0e) sorts before every
//! UTXO record (prefix 0x43), so a forward scan always sees it first.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use rusty_leveldb::{LdbIterator, Options, DB};
use tracing::{debug, info, warn};

use crate::coin::decode_value;
use crate::error::{DumpError, Result};
use crate::keys::{decode_obfuscate_key, decode_outpoint, record_kind, RecordKind};

/// Decoded records accumulated between sink flushes.
pub const DEFAULT_FLUSH_INTERVAL: u64 = 100_000;
/// Scanned records between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;
/// Rough size of a current mainnet UTXO set, used for the linear ETA.
pub const DEFAULT_ESTIMATED_TOTAL: u64 = 101_956_999;

/// Placeholder keystream used until the store's own obfuscation-key record
/// is observed. Key-space order guarantees that happens before the first
/// UTXO record in any intact chainstate.
pub const PLACEHOLDER_OBFUSCATE_KEY: [u8; 8] = [0x33, 0x8e, 0xb2, 0x76, 0x67, 0x26, 0x73, 0x66];

/// Open a chainstate LevelDB read-side.
pub fn open_chainstate(path: &Path) -> Result<DB> {
    let mut opts = Options::default();
    opts.create_if_missing = false;
    Ok(DB::open(path, opts)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Init,
    Scanning,
    Draining,
    Closed,
    Failed,
}

/// Per-scan mutable context: the obfuscation key and whether the store has
/// supplied one yet. Exactly one session per scan; never reset mid-scan.
#[derive(Debug, Clone)]
pub struct ScanSession {
    obfuscate_key: Vec<u8>,
    key_seen: bool,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            obfuscate_key: PLACEHOLDER_OBFUSCATE_KEY.to_vec(),
            key_seen: false,
        }
    }

    pub fn obfuscate_key(&self) -> &[u8] {
        &self.obfuscate_key
    }

    /// Replace the session key in place; stays in effect for the rest of
    /// the scan.
    pub fn set_obfuscate_key(&mut self, key: Vec<u8>) {
        self.obfuscate_key = key;
        self.key_seen = true;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Derive addresses while decoding; disabling roughly halves per-record
    /// cost and emits the "?" sentinel instead.
    pub decode_addresses: bool,
    pub flush_interval: u64,
    pub progress_interval: u64,
    /// Estimated total record count, only used for the ETA report.
    pub estimated_total: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            decode_addresses: true,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            estimated_total: DEFAULT_ESTIMATED_TOTAL,
        }
    }
}

/// Totals reported after a completed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub scanned: u64,
    pub decoded: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

/// The scan state machine: INIT -> SCANNING -> DRAINING -> CLOSED, or
/// FAILED on a store error (after a final flush attempt).
pub struct ChainstateScan<'a, W: Write> {
    state: ScanState,
    session: ScanSession,
    opts: ScanOptions,
    sink: &'a mut W,
    buffer: String,
    scanned: u64,
    decoded: u64,
    skipped: u64,
    started: Instant,
}

impl<'a, W: Write> ChainstateScan<'a, W> {
    pub fn new(sink: &'a mut W, opts: ScanOptions) -> Self {
        Self {
            state: ScanState::Init,
            session: ScanSession::new(),
            opts,
            sink,
            buffer: String::new(),
            scanned: 0,
            decoded: 0,
            skipped: 0,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Run the scan to completion, returning totals.
    pub fn run(&mut self, db: &mut DB) -> Result<ScanReport> {
        self.state = ScanState::Scanning;
        self.started = Instant::now();
        match self.scan_store(db) {
            Ok(()) => {
                self.state = ScanState::Draining;
                self.flush()?;
                self.sink.flush()?;
                self.state = ScanState::Closed;
                let report = self.report();
                info!(
                    scanned = report.scanned,
                    decoded = report.decoded,
                    skipped = report.skipped,
                    elapsed_sec = report.elapsed.as_secs(),
                    "scan complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.state = ScanState::Failed;
                // salvage whatever decoded cleanly before the failure
                let _ = self.flush();
                let _ = self.sink.flush();
                Err(e)
            }
        }
    }

    fn scan_store(&mut self, db: &mut DB) -> Result<()> {
        let mut iter = db.new_iter()?;
        while let Some((key, value)) = LdbIterator::next(&mut iter) {
            self.scanned += 1;
            if self.opts.progress_interval > 0 && self.scanned % self.opts.progress_interval == 0 {
                self.report_progress();
            }
            self.handle_record(&key, &value)?;
        }
        Ok(())
    }

    /// Dispatch one raw record. Unrecognized kinds and per-record decode
    /// failures are counted and skipped; only store-level and
    /// obfuscation-key problems propagate.
    fn handle_record(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            debug!("skipping empty store key");
            self.skipped += 1;
            return Ok(());
        }
        match record_kind(key) {
            Ok(RecordKind::ObfuscateKey) => {
                let obf = decode_obfuscate_key(key, value)?;
                info!(key = %hex::encode(&obf), "new obfuscate key");
                self.session.set_obfuscate_key(obf);
            }
            Ok(RecordKind::Utxo) => {
                if !self.session.key_seen && self.decoded == 0 && self.skipped == 0 {
                    warn!("UTXO record before any obfuscation-key record; using placeholder key");
                }
                self.handle_utxo(key, value);
            }
            Err(DumpError::UnrecognizedRecordKind(byte)) => {
                debug!(byte, "skipping unrecognized record kind");
                self.skipped += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn handle_utxo(&mut self, key: &[u8], value: &[u8]) {
        let decoded = decode_outpoint(key).and_then(|outpoint| {
            decode_value(value, self.session.obfuscate_key(), self.opts.decode_addresses)
                .map(|output| (outpoint, output))
        });
        let (outpoint, output) = match decoded {
            Ok(pair) => pair,
            Err(e) => {
                warn!(
                    key = %crate::telemetry::truncate_hex(&hex::encode(key), 16),
                    error = %e,
                    "skipping undecodable record"
                );
                self.skipped += 1;
                return;
            }
        };

        self.buffer.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            hex::encode(outpoint.txid),
            outpoint.vout,
            output.address,
            output.amount,
            hex::encode(&output.script)
        ));
        self.decoded += 1;

        if self.opts.flush_interval > 0 && self.decoded % self.opts.flush_interval == 0 {
            if let Err(e) = self.flush() {
                warn!(error = %e, "sink flush failed; retrying at next interval");
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.sink.write_all(self.buffer.as_bytes())?;
            self.buffer.clear();
        }
        Ok(())
    }

    fn report_progress(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let remaining = self.opts.estimated_total.saturating_sub(self.scanned);
        let eta = elapsed * remaining as f64 / self.scanned as f64;
        info!(
            scanned = self.scanned,
            elapsed_sec = elapsed as u64,
            eta_min = (eta / 60.0).ceil() as u64,
            "scan progress"
        );
    }

    fn report(&self) -> ScanReport {
        ScanReport {
            scanned: self.scanned,
            decoded: self.decoded,
            skipped: self.skipped,
            elapsed: self.started.elapsed(),
        }
    }
}
