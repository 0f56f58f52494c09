//! Chainstate key parsing.
//!
//! Bitcoin-family chainstate LevelDBs prefix every key with a record-type
//! byte. The two kinds this tool cares about are the per-output coin records
//! (`'C'`) and the single obfuscation-key record (`0x0e`, whose key spells
//! `\x0e\x00obfuscate_key` backwards on disk). Anything else is skipped.

use crate::error::{DumpError, Result};
use crate::varint::{decode_varint, read_varint};

/// Leading byte of a UTXO record key ('C').
pub const UTXO_PREFIX: u8 = 0x43;
/// Leading byte of the obfuscation-key record key.
pub const OBFUSCATE_KEY_PREFIX: u8 = 0x0e;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Utxo,
    ObfuscateKey,
}

/// Classify a raw store key by its leading byte.
///
/// Unknown prefixes come back as `UnrecognizedRecordKind`; callers iterating
/// the whole key space skip those without aborting.
pub fn record_kind(key: &[u8]) -> Result<RecordKind> {
    match key.first() {
        Some(&UTXO_PREFIX) => Ok(RecordKind::Utxo),
        Some(&OBFUSCATE_KEY_PREFIX) => Ok(RecordKind::ObfuscateKey),
        Some(&other) => Err(DumpError::UnrecognizedRecordKind(other)),
        None => Err(DumpError::TruncatedRecord("empty store key")),
    }
}

/// A transaction output reference, txid in natural (big-endian display)
/// byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: [u8; 32],
    pub vout: u64,
}

/// Parse a UTXO key into its outpoint.
///
/// Layout: prefix byte, 32-byte txid stored reversed, then the output index
/// as a storage varint. The varint read matters: parsing the trailing bytes
/// as a plain reversed integer only agrees with Core for indices that fit a
/// single varint byte.
pub fn decode_outpoint(key: &[u8]) -> Result<OutPoint> {
    match record_kind(key) {
        Ok(RecordKind::Utxo) => {}
        Ok(_) | Err(DumpError::UnrecognizedRecordKind(_)) => {
            return Err(DumpError::WrongRecordKind {
                expected: RecordKind::Utxo,
                got: key[0],
            })
        }
        Err(e) => return Err(e),
    }
    if key.len() < 34 {
        return Err(DumpError::TruncatedRecord("utxo key shorter than 34 bytes"));
    }

    let mut txid = [0u8; 32];
    txid.copy_from_slice(&key[1..33]);
    txid.reverse();

    let (span, _) = read_varint(&key[33..], 0)?;
    let vout = u64::try_from(decode_varint(span))
        .map_err(|_| DumpError::TruncatedRecord("output index does not fit 64 bits"))?;

    Ok(OutPoint { txid, vout })
}

/// Extract the obfuscation key from its dedicated record.
///
/// The value carries its own length byte first; the keystream is everything
/// after it.
pub fn decode_obfuscate_key(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    match record_kind(key) {
        Ok(RecordKind::ObfuscateKey) => {}
        Ok(_) | Err(DumpError::UnrecognizedRecordKind(_)) => {
            return Err(DumpError::WrongRecordKind {
                expected: RecordKind::ObfuscateKey,
                got: key[0],
            })
        }
        Err(e) => return Err(e),
    }
    if value.len() < 2 {
        return Err(DumpError::TruncatedRecord("obfuscation-key value too short"));
    }
    Ok(value[1..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_from_leading_byte() {
        let obf_key = hex::decode("0e79656b5f65746163737566626f00").unwrap();
        let utxo_key =
            hex::decode("430000155b9869d56c66d9e86e3c01de38e3892a42b99949fe109ac034fff6583910")
                .unwrap();
        assert_eq!(record_kind(&obf_key).unwrap(), RecordKind::ObfuscateKey);
        assert_eq!(record_kind(&utxo_key).unwrap(), RecordKind::Utxo);
        assert!(matches!(
            record_kind(&[0x44]),
            Err(DumpError::UnrecognizedRecordKind(0x44))
        ));
    }

    #[test]
    fn test_decode_outpoint() {
        let key =
            hex::decode("430000155b9869d56c66d9e86e3c01de38e3892a42b99949fe109ac034fff6583910")
                .unwrap();
        let outpoint = decode_outpoint(&key).unwrap();
        assert_eq!(
            hex::encode(outpoint.txid),
            "3958f6ff34c09a10fe4999b9422a89e338de013c6ee8d9666cd569985b150000"
        );
        assert_eq!(outpoint.vout, 16);
    }

    #[test]
    fn test_decode_outpoint_multibyte_vout() {
        // vout 300 encodes as the two-byte storage varint 0x81 0x2c
        let mut key = vec![UTXO_PREFIX];
        key.extend_from_slice(&[0xab; 32]);
        key.extend_from_slice(&[0x81, 0x2c]);
        assert_eq!(decode_outpoint(&key).unwrap().vout, 300);
    }

    #[test]
    fn test_decode_outpoint_rejects_wrong_kind() {
        let key =
            hex::decode("440000155b9869d56c66d9e86e3c01de38e3892a42b99949fe109ac034fff6583910")
                .unwrap();
        assert!(matches!(
            decode_outpoint(&key),
            Err(DumpError::WrongRecordKind { expected: RecordKind::Utxo, got: 0x44 })
        ));
    }

    #[test]
    fn test_decode_obfuscate_key() {
        let key = hex::decode("0e79656b5f65746163737566626f00").unwrap();
        let value = hex::decode("08338eb27667267366").unwrap();
        let obf = decode_obfuscate_key(&key, &value).unwrap();
        assert_eq!(hex::encode(obf), "338eb27667267366");
    }

    #[test]
    fn test_decode_obfuscate_key_rejects_utxo_key() {
        let key =
            hex::decode("430000155b9869d56c66d9e86e3c01de38e3892a42b99949fe109ac034fff6583910")
                .unwrap();
        assert!(matches!(
            decode_obfuscate_key(&key, &[0x08, 0x01]),
            Err(DumpError::WrongRecordKind { expected: RecordKind::ObfuscateKey, got: 0x43 })
        ));
    }
}
