//! Reed-Solomon recovery of erasure-coded shred FEC sets (C2).

pub mod gf256;
pub mod matrix;
mod resolver;

pub use resolver::{
    region_into_data_envelope, FecError, FecKey, FecResolver, RecoverOutcome, RecoveredShred,
    CODE_REGION_OFFSET, DATA_REGION_OFFSET, REGION_LEN, SHRED_PAYLOAD_SIZE,
};
