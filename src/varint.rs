//! Core's storage varint codec and compressed-amount arithmetic.
//!
//! This is the serializer chainstate values use internally (`VARINT` in the
//! node's source), not the wire-protocol CompactSize. Each byte carries 7
//! payload bits MSB-first; the high bit marks continuation, and every
//! continuation byte adds one to the accumulator after its shift. That
//! add-one rule makes the encoding bijective (no redundant leading zeros)
//! and is the part implementations classically get wrong.

use crate::error::{DumpError, Result};

/// Longest varint span the decoder accepts. Anything a 64-bit writer can
/// produce fits in 10 bytes; 18 keeps the u128 fold below overflow even for
/// garbage input.
const MAX_VARINT_LEN: usize = 18;

/// Scan a varint span starting at `offset`: everything up to and including
/// the first byte whose high bit is clear. Returns the span and its length.
pub fn read_varint(bytes: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let mut end = offset;
    loop {
        if end >= bytes.len() {
            return Err(DumpError::TruncatedRecord("varint runs past end of value"));
        }
        if end - offset >= MAX_VARINT_LEN {
            return Err(DumpError::TruncatedRecord("varint span implausibly long"));
        }
        if bytes[end] & 0x80 == 0 {
            break;
        }
        end += 1;
    }
    let span = &bytes[offset..=end];
    Ok((span, span.len()))
}

/// Fold a varint span into its value.
///
/// Accumulates in u128 so even a maximum-length span cannot silently wrap;
/// callers narrow to the width their field needs.
pub fn decode_varint(span: &[u8]) -> u128 {
    let mut n: u128 = 0;
    for &byte in span {
        n = (n << 7) | u128::from(byte & 0x7f);
        if byte & 0x80 != 0 {
            n += 1;
        }
    }
    n
}

/// Write-side inverse of [`decode_varint`], matching the node's `WriteVarInt`.
pub fn encode_varint(value: u128) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    let mut n = value;
    loop {
        let low = (n & 0x7f) as u8;
        out.push(if out.is_empty() { low } else { low | 0x80 });
        if n <= 0x7f {
            break;
        }
        n = (n >> 7) - 1;
    }
    out.reverse();
    out
}

/// Decompress a base-10 compressed satoshi amount.
///
/// The compressed form elides trailing decimal zeros: for non-zero `n` with
/// `n = d * 10^e` (`1 <= d % 10 <= 9`, `e <= 9`) the node stores
/// `1 + 10*(9*floor(d/10) + d%10 - 1) + e`, or `1 + 10*(n - 1) + 9` once all
/// nine zero counts are exhausted. Exact unsigned arithmetic throughout; the
/// u128 result cannot overflow for any 64-bit input.
pub fn decompress_amount(x: u64) -> u128 {
    if x == 0 {
        return 0;
    }
    let x = u128::from(x - 1);
    let e = (x % 10) as u32;
    let x = x / 10;
    let n = if e < 9 {
        let d = x % 9;
        (x / 9) * 10 + d + 1
    } else {
        x + 1
    };
    n * 10u128.pow(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test-side inverse of decompress_amount (the node's CompressAmount).
    fn compress_amount(mut n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let mut e = 0u64;
        while n % 10 == 0 && e < 9 {
            n /= 10;
            e += 1;
        }
        if e < 9 {
            let d = n % 10;
            n /= 10;
            1 + (n * 9 + d - 1) * 10 + e
        } else {
            1 + (n - 1) * 10 + 9
        }
    }

    #[test]
    fn test_read_varint_spans() {
        let bytes = hex::decode("b98276a2ec7700cbc2986ff9aed6825920aece14aa6f5382ca5580").unwrap();
        let (span, consumed) = read_varint(&bytes, 0).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(hex::encode(span), "b98276");

        // next varint starts right after the previous span
        let (span, consumed) = read_varint(&bytes, 3).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(hex::encode(span), "a2ec77");
    }

    #[test]
    fn test_read_varint_unterminated() {
        // every byte has the continuation bit set
        assert!(matches!(
            read_varint(&[0x80, 0x81, 0xff], 0),
            Err(DumpError::TruncatedRecord(_))
        ));
        assert!(matches!(read_varint(&[], 0), Err(DumpError::TruncatedRecord(_))));
    }

    #[test]
    fn test_decode_varint_add_one_on_continuation() {
        // single-byte values decode as themselves
        assert_eq!(decode_varint(&[0x00]), 0);
        assert_eq!(decode_varint(&[0x7f]), 127);
        // 0x80 0x00 is 128, not 0: the continuation byte adds one
        assert_eq!(decode_varint(&[0x80, 0x00]), 128);
        assert_eq!(decode_varint(&[0x80, 0x7f]), 255);
        assert_eq!(decode_varint(&[0x82, 0x7f]), 511);
        assert_eq!(decode_varint(&[0xff, 0x7f]), 16511);
    }

    #[test]
    fn test_varint_round_trip() {
        let samples: &[u128] = &[
            0,
            1,
            127,
            128,
            255,
            256,
            16511,
            16512,
            65535,
            595243,
            u128::from(u32::MAX),
            u128::from(u64::MAX),
        ];
        for &v in samples {
            let encoded = encode_varint(v);
            let (span, consumed) = read_varint(&encoded, 0).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decode_varint(span), v, "round trip failed for {v}");
        }
    }

    #[test]
    fn test_decompress_amount() {
        assert_eq!(decompress_amount(0), 0);
        assert_eq!(decompress_amount(1), 1);
        // 540 sats, the compressed amount of the sample P2SH record
        assert_eq!(decompress_amount(482), 540);
        // taproot dust
        assert_eq!(decompress_amount(4911), 546);
    }

    #[test]
    fn test_decompress_inverts_compression() {
        let amounts: &[u64] = &[
            0,
            1,
            9,
            10,
            540,
            546,
            100_000_000,
            2_099_999_997_690_000, // max money
        ];
        for &sat in amounts {
            assert_eq!(
                decompress_amount(compress_amount(sat)),
                u128::from(sat),
                "compress/decompress mismatch for {sat}"
            );
        }
    }
}
