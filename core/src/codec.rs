//! Page codec: scramble → ECC → CRC between a `PAGE_USABLE_BYTES` logical
//! payload and a `PAGE_ALL_BYTES` physical codeword. Each stage is
//! independently toggleable via [`CodecConfig`] so properties like
//! scrambler involution and codec round-trip under any flag combination
//! can be checked in isolation.

use crate::config::CodecConfig;
use crate::ecc;
use crate::error::CodecError;
use crate::geometry::{PAGE_ALL_BYTES, PAGE_USABLE_BYTES, SECTOR_BYTES, SECTORS_PER_PAGE};

/// 8-bit LFSR scrambler: `s := (s >> 1) XOR (-(s & 1) AND SEED)`, masked to
/// 8 bits, initial state `1`. Reset before every encode/decode call so the
/// sequence is deterministic and the transform is self-inverse.
pub struct Lfsr8 {
    seed: u8,
    state: u8,
}

impl Lfsr8 {
    pub fn new(seed: u8) -> Self {
        Self { seed, state: 1 }
    }

    pub fn reset(&mut self) {
        self.state = 1;
    }

    pub fn next(&mut self) -> u8 {
        let carry_mask = 0u8.wrapping_sub(self.state & 1);
        self.state = (self.state >> 1) ^ (carry_mask & self.seed);
        self.state
    }
}

fn scramble(data: &mut [u8], seed: u8) {
    let mut lfsr = Lfsr8::new(seed);
    for byte in data.iter_mut() {
        *byte ^= lfsr.next();
    }
}

/// Spare-area byte offsets.
mod spare_layout {
    pub const CRC_OFFSET: usize = 0;
    pub const CRC_LEN: usize = 4;
    pub const ECC_OFFSET: usize = 4;
    pub const ECC_BYTES_PER_SECTOR: usize = 2;
}

/// Encodes a `PAGE_USABLE_BYTES` payload into a `PAGE_ALL_BYTES` codeword.
pub fn encode(payload: &[u8], cfg: &CodecConfig) -> Vec<u8> {
    assert_eq!(payload.len(), PAGE_USABLE_BYTES);

    let mut usable = payload.to_vec();
    if cfg.use_scramble {
        scramble(&mut usable, cfg.scramble_seed);
    }

    let mut spare = vec![0u8; crate::geometry::PAGE_SPARE_BYTES];
    if cfg.use_ecc {
        for sector_idx in 0..SECTORS_PER_PAGE as usize {
            let start = sector_idx * SECTOR_BYTES;
            let mut sector = [0u8; SECTOR_BYTES];
            sector.copy_from_slice(&usable[start..start + SECTOR_BYTES]);
            let parity = ecc::compute_parity(&sector);
            let off = spare_layout::ECC_OFFSET + sector_idx * spare_layout::ECC_BYTES_PER_SECTOR;
            spare[off..off + 2].copy_from_slice(&parity.to_le_bytes());
        }
    }

    if cfg.use_crc {
        let crc = crate::crc::crc32(&usable);
        spare[spare_layout::CRC_OFFSET..spare_layout::CRC_OFFSET + spare_layout::CRC_LEN]
            .copy_from_slice(&crc.to_le_bytes());
    }

    let mut out = Vec::with_capacity(PAGE_ALL_BYTES);
    out.extend_from_slice(&usable);
    out.extend_from_slice(&spare);
    out
}

/// Decodes a `PAGE_ALL_BYTES` codeword back into a `PAGE_USABLE_BYTES`
/// payload, correcting single-bit errors per sector and verifying the CRC.
/// Returns [`CodecError`] if the integrity cannot be restored.
pub fn decode(codeword: &[u8], cfg: &CodecConfig) -> Result<Vec<u8>, CodecError> {
    assert_eq!(codeword.len(), PAGE_ALL_BYTES);

    let mut usable = codeword[..PAGE_USABLE_BYTES].to_vec();
    let spare = &codeword[PAGE_USABLE_BYTES..];

    if cfg.use_ecc {
        for sector_idx in 0..SECTORS_PER_PAGE as usize {
            let start = sector_idx * SECTOR_BYTES;
            let mut sector = [0u8; SECTOR_BYTES];
            sector.copy_from_slice(&usable[start..start + SECTOR_BYTES]);
            let off = spare_layout::ECC_OFFSET + sector_idx * spare_layout::ECC_BYTES_PER_SECTOR;
            let stored_parity = u16::from_le_bytes([spare[off], spare[off + 1]]);
            ecc::correct(&mut sector, stored_parity, sector_idx as u8)?;
            usable[start..start + SECTOR_BYTES].copy_from_slice(&sector);
        }
    }

    if cfg.use_crc {
        let stored_crc = u32::from_le_bytes([
            spare[spare_layout::CRC_OFFSET],
            spare[spare_layout::CRC_OFFSET + 1],
            spare[spare_layout::CRC_OFFSET + 2],
            spare[spare_layout::CRC_OFFSET + 3],
        ]);
        let actual_crc = crate::crc::crc32(&usable);
        if stored_crc != actual_crc {
            return Err(CodecError::CrcMismatch);
        }
    }

    if cfg.use_scramble {
        scramble(&mut usable, cfg.scramble_seed);
    }

    Ok(usable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Vec<u8> {
        (0..PAGE_USABLE_BYTES).map(|i| ((i * 2) & 0xFF) as u8).collect()
    }

    #[test]
    fn round_trip_all_flags_on() {
        let cfg = CodecConfig::default();
        let p = payload();
        let encoded = encode(&p, &cfg);
        assert_eq!(encoded.len(), PAGE_ALL_BYTES);
        let decoded = decode(&encoded, &cfg).unwrap();
        assert_eq!(decoded, p);
    }

    #[test]
    fn round_trip_every_flag_combination() {
        let p = payload();
        for use_scramble in [false, true] {
            for use_ecc in [false, true] {
                for use_crc in [false, true] {
                    let cfg = CodecConfig { scramble_seed: 0xA5, use_scramble, use_ecc, use_crc };
                    let encoded = encode(&p, &cfg);
                    let decoded = decode(&encoded, &cfg).unwrap();
                    assert_eq!(decoded, p, "flags scramble={use_scramble} ecc={use_ecc} crc={use_crc}");
                }
            }
        }
    }

    #[test]
    fn scrambler_is_involution() {
        let mut cfg = CodecConfig::default();
        cfg.use_ecc = false;
        cfg.use_crc = false;
        let p = payload();
        let encoded = encode(&p, &cfg);
        // With only scrambling enabled, encode and decode apply the exact
        // same XOR sequence, so running "encode" again on the encoded
        // usable area reproduces "decode"'s result.
        let mut re_encoded = p.clone();
        scramble(&mut re_encoded, cfg.scramble_seed);
        assert_eq!(&encoded[..PAGE_USABLE_BYTES], &re_encoded[..]);
    }

    #[test]
    fn detects_crc_mismatch_on_tamper() {
        let cfg = CodecConfig::default();
        let p = payload();
        let mut encoded = encode(&p, &cfg);
        // Corrupt two bits within one sector so ECC reports uncorrectable,
        // proving CRC is not even reached when ECC already fails; tamper
        // with enough spread instead to defeat ECC but not trip its
        // double-bit detector: flip a byte in the spare CRC field instead.
        encoded[PAGE_USABLE_BYTES] ^= 0xFF;
        let err = decode(&encoded, &cfg).unwrap_err();
        assert_eq!(err, CodecError::CrcMismatch);
    }

    #[test]
    fn single_bit_flip_is_corrected() {
        let cfg = CodecConfig::default();
        let p = payload();
        let mut encoded = encode(&p, &cfg);
        encoded[100] ^= 0x01;
        let decoded = decode(&encoded, &cfg).unwrap();
        assert_eq!(decoded, p);
    }
}
