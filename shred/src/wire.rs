//! The 1228-byte fixed shred envelope (§6.2).

use {
    thiserror::Error,
    validator_primitives::{Hash, Pubkey, Signature, Slot},
};

pub const SHRED_PAYLOAD_SIZE: usize = 1228;

const SIGNATURE_RANGE: std::ops::Range<usize> = 0..64;
const TYPE_BYTE: usize = 64;
const SLOT_RANGE: std::ops::Range<usize> = 65..73;
const INDEX_RANGE: std::ops::Range<usize> = 73..77;
const VERSION_RANGE: std::ops::Range<usize> = 77..79;
const FEC_SET_INDEX_RANGE: std::ops::Range<usize> = 79..83;

const DATA_PARENT_OFFSET_RANGE: std::ops::Range<usize> = 83..85;
const DATA_FLAGS_BYTE: usize = 85;
const DATA_SIZE_RANGE: std::ops::Range<usize> = 86..88;
pub const DATA_PAYLOAD_OFFSET: usize = 88;
pub const MAX_DATA_PAYLOAD_SIZE: usize = 1051;

const CODE_NUM_DATA_RANGE: std::ops::Range<usize> = 83..85;
const CODE_NUM_CODE_RANGE: std::ops::Range<usize> = 85..87;
const CODE_POSITION_RANGE: std::ops::Range<usize> = 87..89;
pub const CODE_PAYLOAD_OFFSET: usize = 89;

/// Last-in-FEC-set and last-in-slot flag bits, plus a 6-bit tick reference
/// packed into the low bits of the flags byte.
pub const FLAG_LAST_IN_FEC_SET: u8 = 0b1000_0000;
pub const FLAG_LAST_IN_SLOT: u8 = 0b1100_0000;
pub const FLAG_TICK_REFERENCE_MASK: u8 = 0b0011_1111;

pub const LEGACY_DATA_TYPE: u8 = 0xA5;
pub const LEGACY_CODE_TYPE: u8 = 0x5A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShredKind {
    Data,
    Code,
}

/// Classifies a shred type byte per the lookup table in §6.2. Legacy
/// `0xA5`/`0x5A` and the merkle ranges are all recognized; anything else
/// is an invalid shred.
pub fn classify_type_byte(byte: u8) -> Option<ShredKind> {
    match byte {
        LEGACY_DATA_TYPE => Some(ShredKind::Data),
        LEGACY_CODE_TYPE => Some(ShredKind::Code),
        0x60..=0x7F => Some(ShredKind::Code),
        0x80..=0xBF if byte != LEGACY_DATA_TYPE => Some(ShredKind::Data),
        _ => None,
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShredParseError {
    #[error("shred buffer must be exactly {SHRED_PAYLOAD_SIZE} bytes, got {0}")]
    WrongLength(usize),
    #[error("shred type byte {0:#04x} is not in the legacy or merkle lookup table")]
    InvalidTypeByte(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShredHeader {
    pub parent_offset: u16,
    pub flags: u8,
    pub size: u16,
}

impl DataShredHeader {
    pub fn last_in_fec_set(&self) -> bool {
        self.flags & FLAG_LAST_IN_FEC_SET != 0
    }

    pub fn last_in_slot(&self) -> bool {
        self.flags & FLAG_LAST_IN_SLOT == FLAG_LAST_IN_SLOT
    }

    pub fn reference_tick(&self) -> u8 {
        self.flags & FLAG_TICK_REFERENCE_MASK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeShredHeader {
    pub num_data: u16,
    pub num_code: u16,
    pub position: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShredVariant {
    Data(DataShredHeader),
    Code(CodeShredHeader),
}

/// A parsed shred. `raw` retains the full envelope so the signature can be
/// re-verified and the bytes re-transmitted without re-serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shred {
    pub signature: Signature,
    pub type_byte: u8,
    pub slot: Slot,
    pub index: u32,
    pub shred_version: u16,
    pub fec_set_index: u32,
    pub variant: ShredVariant,
    pub raw: Box<[u8; SHRED_PAYLOAD_SIZE]>,
}

impl Shred {
    pub fn parse(bytes: &[u8]) -> Result<Self, ShredParseError> {
        if bytes.len() != SHRED_PAYLOAD_SIZE {
            return Err(ShredParseError::WrongLength(bytes.len()));
        }
        let type_byte = bytes[TYPE_BYTE];
        let kind = classify_type_byte(type_byte).ok_or(ShredParseError::InvalidTypeByte(type_byte))?;

        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(&bytes[SIGNATURE_RANGE]);
        let signature = Signature::new_from_array(sig_bytes);

        let slot = u64::from_le_bytes(bytes[SLOT_RANGE].try_into().unwrap());
        let index = u32::from_le_bytes(bytes[INDEX_RANGE].try_into().unwrap());
        let shred_version = u16::from_le_bytes(bytes[VERSION_RANGE].try_into().unwrap());
        let fec_set_index = u32::from_le_bytes(bytes[FEC_SET_INDEX_RANGE].try_into().unwrap());

        let variant = match kind {
            ShredKind::Data => ShredVariant::Data(DataShredHeader {
                parent_offset: u16::from_le_bytes(bytes[DATA_PARENT_OFFSET_RANGE].try_into().unwrap()),
                flags: bytes[DATA_FLAGS_BYTE],
                size: u16::from_le_bytes(bytes[DATA_SIZE_RANGE].try_into().unwrap()),
            }),
            ShredKind::Code => ShredVariant::Code(CodeShredHeader {
                num_data: u16::from_le_bytes(bytes[CODE_NUM_DATA_RANGE].try_into().unwrap()),
                num_code: u16::from_le_bytes(bytes[CODE_NUM_CODE_RANGE].try_into().unwrap()),
                position: u16::from_le_bytes(bytes[CODE_POSITION_RANGE].try_into().unwrap()),
            }),
        };

        let mut raw = Box::new([0u8; SHRED_PAYLOAD_SIZE]);
        raw.copy_from_slice(bytes);

        Ok(Self {
            signature,
            type_byte,
            slot,
            index,
            shred_version,
            fec_set_index,
            variant,
            raw,
        })
    }

    pub fn kind(&self) -> ShredKind {
        match self.variant {
            ShredVariant::Data(_) => ShredKind::Data,
            ShredVariant::Code(_) => ShredKind::Code,
        }
    }

    pub fn is_data(&self) -> bool {
        self.kind() == ShredKind::Data
    }

    /// The signed payload: everything past the signature (§4.3 — legacy
    /// shreds are verified over the raw bytes excluding the signature).
    pub fn signed_payload(&self) -> &[u8] {
        &self.raw[64..]
    }

    /// The data shred's application payload, per its declared `size`.
    pub fn data_payload(&self) -> Option<&[u8]> {
        match &self.variant {
            ShredVariant::Data(header) => {
                let size = (header.size as usize).min(MAX_DATA_PAYLOAD_SIZE);
                let end = DATA_PAYLOAD_OFFSET + size;
                self.raw.get(DATA_PAYLOAD_OFFSET..end)
            }
            ShredVariant::Code(_) => None,
        }
    }

    pub fn verify_signature_legacy(&self, signer: &Pubkey) -> bool {
        self.signature.verify(signer, self.signed_payload())
    }

    pub fn verify_signature_over_root(&self, signer: &Pubkey, root: &Hash) -> bool {
        self.signature.verify(signer, root.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_data_envelope(slot: Slot, index: u32, version: u16, fec_set_index: u32) -> Vec<u8> {
        let mut buf = vec![0u8; SHRED_PAYLOAD_SIZE];
        buf[TYPE_BYTE] = 0x80; // merkle data
        buf[SLOT_RANGE].copy_from_slice(&slot.to_le_bytes());
        buf[INDEX_RANGE].copy_from_slice(&index.to_le_bytes());
        buf[VERSION_RANGE].copy_from_slice(&version.to_le_bytes());
        buf[FEC_SET_INDEX_RANGE].copy_from_slice(&fec_set_index.to_le_bytes());
        buf[DATA_FLAGS_BYTE] = FLAG_LAST_IN_FEC_SET | 5;
        buf[DATA_SIZE_RANGE].copy_from_slice(&100u16.to_le_bytes());
        buf
    }

    #[test]
    fn parse_round_trips_every_field() {
        let buf = build_data_envelope(100, 3, 1234, 0);
        let shred = Shred::parse(&buf).unwrap();
        assert_eq!(shred.slot, 100);
        assert_eq!(shred.index, 3);
        assert_eq!(shred.shred_version, 1234);
        assert_eq!(shred.fec_set_index, 0);
        match shred.variant {
            ShredVariant::Data(header) => {
                assert!(header.last_in_fec_set());
                assert!(!header.last_in_slot());
                assert_eq!(header.reference_tick(), 5);
                assert_eq!(header.size, 100);
            }
            _ => panic!("expected data variant"),
        }
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Shred::parse(&[0u8; 10]).unwrap_err();
        assert_eq!(err, ShredParseError::WrongLength(10));
    }

    #[test]
    fn invalid_type_byte_is_rejected() {
        let mut buf = build_data_envelope(1, 0, 0, 0);
        buf[TYPE_BYTE] = 0x00;
        let err = Shred::parse(&buf).unwrap_err();
        assert_eq!(err, ShredParseError::InvalidTypeByte(0x00));
    }

    #[test]
    fn type_byte_lookup_table_matches_spec() {
        assert_eq!(classify_type_byte(0xA5), Some(ShredKind::Data));
        assert_eq!(classify_type_byte(0x5A), Some(ShredKind::Code));
        assert_eq!(classify_type_byte(0x60), Some(ShredKind::Code));
        assert_eq!(classify_type_byte(0x7F), Some(ShredKind::Code));
        assert_eq!(classify_type_byte(0x80), Some(ShredKind::Data));
        assert_eq!(classify_type_byte(0xBF), Some(ShredKind::Data));
        assert_eq!(classify_type_byte(0x59), None);
        assert_eq!(classify_type_byte(0xC0), None);
    }

    #[test]
    fn last_in_slot_implies_last_in_fec_set() {
        let mut buf = build_data_envelope(1, 0, 0, 0);
        buf[DATA_FLAGS_BYTE] = FLAG_LAST_IN_SLOT;
        let shred = Shred::parse(&buf).unwrap();
        match shred.variant {
            ShredVariant::Data(header) => {
                assert!(header.last_in_slot());
                assert!(header.last_in_fec_set());
            }
            _ => unreachable!(),
        }
    }
}
