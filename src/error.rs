use thiserror::Error;

use crate::keys::RecordKind;

/// Everything that can go wrong while scanning a chainstate.
///
/// Record-level problems (`UnrecognizedRecordKind`, `TruncatedRecord`) are
/// recoverable: the driver skips the offending record and keeps scanning.
/// `WrongRecordKind` means a caller dispatched a record to the wrong decoder
/// and is treated as a bug. Store-level failures abort the scan.
#[derive(Debug, Error)]
pub enum DumpError {
    /// Leading key byte matches neither the UTXO nor the obfuscation-key
    /// prefix. Non-fatal; the record is skipped.
    #[error("unrecognized record kind 0x{0:02x}")]
    UnrecognizedRecordKind(u8),

    /// A record was handed to a decoder for a different kind.
    #[error("wrong record kind: expected {expected:?}, got leading byte 0x{got:02x}")]
    WrongRecordKind { expected: RecordKind, got: u8 },

    /// A value ended before the bytes its compact-integer prefixes claim.
    /// Fatal for the record, not for the scan.
    #[error("truncated record: {0}")]
    TruncatedRecord(&'static str),

    /// The address encoder rejected a script or key. Recovered locally as
    /// the "unknown" descriptor.
    #[error("address encoding failed: {0}")]
    AddressEncoding(String),

    #[error("store read error: {0}")]
    StoreRead(#[from] rusty_leveldb::Status),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DumpError>;
