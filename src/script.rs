//! Script-template classification and address derivation.
//!
//! Chainstate scripts are stored compressed: type codes 0/1 keep only the
//! 20-byte hash, 2..=5 keep only public-key material, and codes >= 6 mean
//! the script is stored verbatim with byte length `code - 6`. Classification
//! is an ordered first-match guard list rather than a code-keyed lookup,
//! because several templates share a type code or hinge on the script bytes
//! alone. String encoding is delegated to the `bitcoin` crate.

use bitcoin::{Address, Network, Script, ScriptBuf};

use crate::error::{DumpError, Result};

const OP_CHECKMULTISIG: u8 = 0xae;

/// Recognized output templates, in match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    P2pkh,
    P2sh,
    P2pk,
    Multisig,
    P2wpkh,
    P2wsh,
    P2tr,
    NonStandard,
}

/// Classify `(script-type code, script bytes)`. First match wins; the
/// multisig guard deliberately sits before the witness guards, matching on
/// the trailing OP_CHECKMULTISIG byte regardless of code.
pub fn classify(script_type: u64, script: &[u8]) -> ScriptClass {
    if script_type == 0 {
        return ScriptClass::P2pkh;
    }
    if script_type == 1 {
        return ScriptClass::P2sh;
    }
    if script_type > 1 && script_type < 6 {
        return ScriptClass::P2pk;
    }
    if script.last() == Some(&OP_CHECKMULTISIG) {
        return ScriptClass::Multisig;
    }
    if script_type == 28 && script.len() > 1 && script[0] == 0x00 && script[1] == 20 {
        return ScriptClass::P2wpkh;
    }
    if script_type == 40 && script.len() > 1 && script[0] == 0x00 && script[1] == 32 {
        return ScriptClass::P2wsh;
    }
    if script_type == 40 && script.len() > 1 && script[0] == 0x51 && script[1] == 32 {
        return ScriptClass::P2tr;
    }
    ScriptClass::NonStandard
}

/// Derive the display address for a classified script.
///
/// Encoding failures degrade to `"unknown"`; a malformed script in the
/// store should not abort a hundred-million-record scan.
pub fn derive_address(script_type: u64, script: &[u8]) -> String {
    let derived = match classify(script_type, script) {
        ScriptClass::P2pkh => rebuild_p2pkh(script).and_then(|s| encode_address(&s)),
        ScriptClass::P2sh => rebuild_p2sh(script).and_then(|s| encode_address(&s)),
        ScriptClass::P2pk => return "p2pk".to_string(),
        ScriptClass::Multisig | ScriptClass::NonStandard => return "unknown".to_string(),
        // witness v0 programs are stored verbatim
        ScriptClass::P2wpkh | ScriptClass::P2wsh => {
            encode_address(&ScriptBuf::from_bytes(script.to_vec()))
        }
        ScriptClass::P2tr => match script.get(2..34) {
            Some(xonly) => taproot_address(xonly),
            None => Err(DumpError::AddressEncoding("witness program too short".into())),
        },
    };
    derived.unwrap_or_else(|_| "unknown".to_string())
}

/// OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG around the stored
/// hash. Reconstructed length is always hash length + 5.
fn rebuild_p2pkh(hash: &[u8]) -> Result<ScriptBuf> {
    let push = u8::try_from(hash.len())
        .map_err(|_| DumpError::AddressEncoding("pubkey hash too long to push".into()))?;
    let mut raw = Vec::with_capacity(hash.len() + 5);
    raw.extend_from_slice(&[0x76, 0xa9, push]);
    raw.extend_from_slice(hash);
    raw.extend_from_slice(&[0x88, 0xac]);
    Ok(ScriptBuf::from_bytes(raw))
}

/// OP_HASH160 <hash> OP_EQUAL. Reconstructed length is hash length + 4.
fn rebuild_p2sh(hash: &[u8]) -> Result<ScriptBuf> {
    let push = u8::try_from(hash.len())
        .map_err(|_| DumpError::AddressEncoding("script hash too long to push".into()))?;
    let mut raw = Vec::with_capacity(hash.len() + 4);
    raw.extend_from_slice(&[0xa9, push]);
    raw.extend_from_slice(hash);
    raw.push(0x87);
    Ok(ScriptBuf::from_bytes(raw))
}

fn encode_address(script: &Script) -> Result<String> {
    Address::from_script(script, Network::Bitcoin)
        .map(|addr| addr.to_string())
        .map_err(|e| DumpError::AddressEncoding(e.to_string()))
}

/// Taproot output keys are stored already tweaked; encode the x-only key
/// straight into a v1 witness address. No on-curve check: an unspendable
/// program still has a canonical bech32m form, and real chainstates
/// contain a few.
fn taproot_address(xonly: &[u8]) -> Result<String> {
    let mut raw = Vec::with_capacity(34);
    raw.extend_from_slice(&[0x51, 0x20]);
    raw.extend_from_slice(xonly);
    encode_address(&ScriptBuf::from_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_guard_order() {
        assert_eq!(classify(0, &[0x00; 20]), ScriptClass::P2pkh);
        assert_eq!(classify(1, &[0x00; 20]), ScriptClass::P2sh);
        for code in 2..6 {
            assert_eq!(classify(code, &[0x11; 33]), ScriptClass::P2pk);
        }
        // trailing OP_CHECKMULTISIG outranks the witness guards
        let mut wpkh_like = vec![0x00, 20];
        wpkh_like.extend_from_slice(&[0x22; 19]);
        wpkh_like.push(OP_CHECKMULTISIG);
        assert_eq!(classify(28, &wpkh_like), ScriptClass::Multisig);

        let mut wpkh = vec![0x00, 20];
        wpkh.extend_from_slice(&[0x22; 20]);
        assert_eq!(classify(28, &wpkh), ScriptClass::P2wpkh);

        let mut wsh = vec![0x00, 32];
        wsh.extend_from_slice(&[0x33; 32]);
        assert_eq!(classify(40, &wsh), ScriptClass::P2wsh);

        let mut tr = vec![0x51, 32];
        tr.extend_from_slice(&[0x44; 32]);
        assert_eq!(classify(40, &tr), ScriptClass::P2tr);

        assert_eq!(classify(111, &[0x6a, 0x01, 0x02]), ScriptClass::NonStandard);
        assert_eq!(classify(40, &[]), ScriptClass::NonStandard);
    }

    #[test]
    fn test_rebuilt_legacy_script_lengths() {
        let hash = [0x55u8; 20];
        assert_eq!(rebuild_p2pkh(&hash).unwrap().len(), hash.len() + 5);
        assert_eq!(rebuild_p2sh(&hash).unwrap().len(), hash.len() + 4);
    }

    #[test]
    fn test_derive_legacy_addresses() {
        let hash = hex::decode("ddc48df198f8cb170b450c8c5e6fb8ed8ef5e2bb").unwrap();
        assert_eq!(derive_address(1, &hash), "3MucinKHkuMcp9CLZHy6BA7BY7yEHiDuMU");
    }

    #[test]
    fn test_derive_taproot_address() {
        let mut script = vec![0x51, 32];
        script.extend_from_slice(
            &hex::decode("803bb63c78c6384401891a960655c77ac47f65ccc712424c3149f9e3451ce475")
                .unwrap(),
        );
        assert_eq!(
            derive_address(40, &script),
            "bc1psqamv0rcccuygqvfr2tqv4w80tz87ewvcufyynp3f8u7x3guu36sp5yyyt"
        );
    }

    #[test]
    fn test_derive_taproot_address_off_curve_key() {
        // 2^256 - 1 is no x coordinate, but the program still encodes
        let mut script = vec![0x51, 32];
        script.extend_from_slice(&[0xff; 32]);
        let addr = derive_address(40, &script);
        assert!(addr.starts_with("bc1p"), "expected a bech32m address, got {addr}");
    }

    #[test]
    fn test_malformed_scripts_degrade_to_unknown() {
        // type 0 with a hash too short for an address
        assert_eq!(derive_address(0, &[0x01, 0x02]), "unknown");
        // witness guard passes on the prefix but the program is short
        assert_eq!(derive_address(40, &[0x51, 32, 0x01]), "unknown");
    }
}
