//! Chainstate UTXO set extraction.
//!
//! Reads a Bitcoin Core chainstate LevelDB (a copy of it; never run this
//! against a live node's data directory) and decodes every unspent output:
//! obfuscation-key tracking, storage-varint parsing, compressed-amount
//! expansion, and script-template classification, streamed out as one
//! tab-separated line per output.

pub mod coin;
pub mod config;
pub mod error;
pub mod keys;
pub mod scan;
pub mod script;
pub mod telemetry;
pub mod varint;

pub use coin::{decode_value, deobfuscate, DecodedOutput};
pub use error::DumpError;
pub use keys::{decode_obfuscate_key, decode_outpoint, record_kind, OutPoint, RecordKind};
pub use scan::{open_chainstate, ChainstateScan, ScanOptions, ScanReport, ScanState};
pub use script::{classify, derive_address, ScriptClass};
pub use varint::{decode_varint, decompress_amount, encode_varint, read_varint};
