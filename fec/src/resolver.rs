use {
    crate::{gf256, matrix},
    std::collections::{HashMap, VecDeque},
    thiserror::Error,
};

/// The full fixed-size shred envelope (§6.2 of the shred wire layout).
pub const SHRED_PAYLOAD_SIZE: usize = 1228;
/// Start of a data shred's payload region (end of its 5-byte
/// parent_offset/flags/size header).
pub const DATA_REGION_OFFSET: usize = 88;
/// Start of a code shred's coding-payload region (end of its 6-byte
/// num_data/num_code/position header) — one byte later than the data
/// shred's, since the code header is one field longer.
pub const CODE_REGION_OFFSET: usize = 89;
/// Length of the erasure-coded region shared by data and code shreds.
/// Logical position `i` within this region is envelope byte
/// `DATA_REGION_OFFSET + i` for a data shred and `CODE_REGION_OFFSET + i`
/// for a code shred — the two headers differ in length, not in where
/// their payload logically begins.
pub const REGION_LEN: usize = SHRED_PAYLOAD_SIZE - CODE_REGION_OFFSET;

pub type Slot = u64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FecKey {
    pub slot: Slot,
    pub fec_set_index: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FecError {
    #[error("code shred header disagrees with latched FEC set counts")]
    HeaderMismatch,
    #[error("shred buffer must be exactly {SHRED_PAYLOAD_SIZE} bytes, got {0}")]
    WrongLength(usize),
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecoverOutcome {
    NotEnough,
    AlreadyComplete,
    Recovered(Vec<RecoveredShred>),
}

/// A recovered data shred's coded region, in logical (not envelope)
/// byte order: `region[i]` corresponds to envelope byte
/// `DATA_REGION_OFFSET + i` once placed back into a full shred buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredShred {
    pub position: usize,
    pub region: [u8; REGION_LEN],
}

struct FecSet {
    expected_data_count: usize,
    expected_code_count: usize,
    received_data: HashMap<usize, [u8; REGION_LEN]>,
    received_code: HashMap<usize, [u8; REGION_LEN]>,
    complete: bool,
}

impl FecSet {
    fn new(expected_data_count: usize, expected_code_count: usize) -> Self {
        Self {
            expected_data_count,
            expected_code_count,
            received_data: HashMap::new(),
            received_code: HashMap::new(),
            complete: false,
        }
    }

    fn total_received(&self) -> usize {
        self.received_data.len() + self.received_code.len()
    }
}

/// Recovers missing data shreds within a FEC set once enough data and code
/// shreds have arrived. Keeps at most `max_sets` sets resident, evicting
/// the oldest-inserted set when full (§4.2 Eviction).
pub struct FecResolver {
    sets: HashMap<FecKey, FecSet>,
    insertion_order: VecDeque<FecKey>,
    max_sets: usize,
}

impl FecResolver {
    pub fn new(max_sets: usize) -> Self {
        Self {
            sets: HashMap::new(),
            insertion_order: VecDeque::new(),
            max_sets,
        }
    }

    fn touch(&mut self, key: FecKey) {
        if !self.sets.contains_key(&key) {
            self.insertion_order.push_back(key);
            if self.sets.len() >= self.max_sets {
                if let Some(oldest) = self.insertion_order.pop_front() {
                    self.sets.remove(&oldest);
                }
            }
        }
    }

    /// `bytes` is the full 1228-byte data-shred envelope.
    pub fn add_data_shred(
        &mut self,
        key: FecKey,
        position: usize,
        bytes: &[u8],
    ) -> Result<(), FecError> {
        let region = extract_region(bytes, DATA_REGION_OFFSET)?;
        self.touch(key);
        let set = self.sets.entry(key).or_insert_with(|| FecSet::new(0, 0));
        set.received_data.insert(position, region);
        Ok(())
    }

    /// `bytes` is the full 1228-byte code-shred envelope.
    pub fn add_code_shred(
        &mut self,
        key: FecKey,
        position: usize,
        bytes: &[u8],
        num_data: usize,
        num_code: usize,
    ) -> Result<(), FecError> {
        let region = extract_region(bytes, CODE_REGION_OFFSET)?;
        self.touch(key);
        let set = self.sets.entry(key).or_insert_with(|| {
            let mut s = FecSet::new(num_data, num_code);
            s.expected_data_count = num_data;
            s.expected_code_count = num_code;
            s
        });
        if set.received_code.is_empty() && set.received_data.is_empty() {
            set.expected_data_count = num_data;
            set.expected_code_count = num_code;
        } else if set.expected_data_count != num_data || set.expected_code_count != num_code {
            return Err(FecError::HeaderMismatch);
        }
        set.received_code.insert(position, region);
        Ok(())
    }

    pub fn try_recover(&mut self, key: FecKey) -> RecoverOutcome {
        let Some(set) = self.sets.get_mut(&key) else {
            return RecoverOutcome::NotEnough;
        };
        if set.complete {
            return RecoverOutcome::AlreadyComplete;
        }
        if set.expected_data_count == 0 || set.total_received() < set.expected_data_count {
            return RecoverOutcome::NotEnough;
        }

        let k = set.expected_data_count;
        let missing: Vec<usize> = (0..k)
            .filter(|p| !set.received_data.contains_key(p))
            .collect();
        if missing.is_empty() {
            set.complete = true;
            return RecoverOutcome::AlreadyComplete;
        }

        let recovered = if missing.len() == 1 {
            recover_single_erasure(set, missing[0])
        } else {
            recover_multi_erasure(set, k, &missing)
        };

        match recovered {
            Some(shreds) => {
                for r in &shreds {
                    set.received_data.insert(r.position, r.region);
                }
                if set.received_data.len() == k {
                    set.complete = true;
                }
                RecoverOutcome::Recovered(shreds)
            }
            None => RecoverOutcome::NotEnough,
        }
    }

    pub fn evict(&mut self, key: FecKey) {
        self.sets.remove(&key);
        self.insertion_order.retain(|k| *k != key);
    }

    pub fn evict_rooted_below(&mut self, root: Slot) {
        let dead: Vec<FecKey> = self
            .sets
            .keys()
            .filter(|k| k.slot < root)
            .copied()
            .collect();
        for key in dead {
            self.evict(key);
        }
    }
}

fn extract_region(bytes: &[u8], offset: usize) -> Result<[u8; REGION_LEN], FecError> {
    if bytes.len() != SHRED_PAYLOAD_SIZE {
        return Err(FecError::WrongLength(bytes.len()));
    }
    let mut region = [0u8; REGION_LEN];
    let available = SHRED_PAYLOAD_SIZE - offset;
    let n = available.min(REGION_LEN);
    region[..n].copy_from_slice(&bytes[offset..offset + n]);
    Ok(region)
}

/// Single-erasure fast path (§4.2): XOR every received data shred with the
/// first available code shred, logical byte by logical byte.
fn recover_single_erasure(set: &FecSet, missing: usize) -> Option<Vec<RecoveredShred>> {
    let (_, code_region) = set.received_code.iter().next()?;
    let mut acc = *code_region;
    for (pos, region) in &set.received_data {
        if *pos == missing {
            continue;
        }
        for (a, b) in acc.iter_mut().zip(region.iter()) {
            *a = gf256::add(*a, *b);
        }
    }
    Some(vec![RecoveredShred {
        position: missing,
        region: acc,
    }])
}

/// Multi-erasure recovery (k >= 2 missing data shreds) via Gaussian
/// elimination over the Cauchy-generator submatrix of received rows.
fn recover_multi_erasure(
    set: &FecSet,
    k: usize,
    missing: &[usize],
) -> Option<Vec<RecoveredShred>> {
    let mut received_rows: Vec<usize> = set.received_data.keys().copied().collect();
    received_rows.extend(set.received_code.keys().map(|p| k + p));
    if received_rows.len() < k {
        return None;
    }
    received_rows.truncate(k);
    received_rows.sort_unstable();

    let generator: Vec<Vec<u8>> = received_rows
        .iter()
        .map(|&row| matrix::generator_row(row, k))
        .collect();
    let inverse = matrix::invert(generator)?;

    let row_bytes: Vec<&[u8; REGION_LEN]> = received_rows
        .iter()
        .map(|&row| -> &[u8; REGION_LEN] {
            if row < k {
                &set.received_data[&row]
            } else {
                &set.received_code[&(row - k)]
            }
        })
        .collect();

    let mut recovered = Vec::with_capacity(missing.len());
    for &pos in missing {
        let inv_row = &inverse[pos];
        let mut region = [0u8; REGION_LEN];
        for byte_idx in 0..REGION_LEN {
            let mut acc = 0u8;
            for (coeff, bytes) in inv_row.iter().zip(row_bytes.iter()) {
                acc = gf256::add(acc, gf256::mul(*coeff, bytes[byte_idx]));
            }
            region[byte_idx] = acc;
        }
        recovered.push(RecoveredShred { position: pos, region });
    }
    Some(recovered)
}

/// Places a recovered region back into a fresh data-shred envelope at
/// `DATA_REGION_OFFSET`, leaving the header bytes `[0, DATA_REGION_OFFSET)`
/// zeroed for the caller to fill in from the FEC set's latched metadata.
pub fn region_into_data_envelope(region: &[u8; REGION_LEN]) -> [u8; SHRED_PAYLOAD_SIZE] {
    let mut buf = [0u8; SHRED_PAYLOAD_SIZE];
    buf[DATA_REGION_OFFSET..].copy_from_slice(region);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_envelope(fill: u8) -> [u8; SHRED_PAYLOAD_SIZE] {
        [fill; SHRED_PAYLOAD_SIZE]
    }

    fn xor_code_envelope(datas: &[[u8; SHRED_PAYLOAD_SIZE]]) -> [u8; SHRED_PAYLOAD_SIZE] {
        let mut code = [0u8; SHRED_PAYLOAD_SIZE];
        for d in datas {
            for i in 0..REGION_LEN {
                code[CODE_REGION_OFFSET + i] ^= d[DATA_REGION_OFFSET + i];
            }
        }
        code
    }

    #[test]
    fn header_mismatch_on_second_code_shred_is_rejected() {
        let mut resolver = FecResolver::new(128);
        let key = FecKey {
            slot: 100,
            fec_set_index: 0,
        };
        resolver
            .add_code_shred(key, 0, &data_envelope(1), 4, 1)
            .unwrap();
        let err = resolver
            .add_code_shred(key, 1, &data_envelope(2), 5, 1)
            .unwrap_err();
        assert_eq!(err, FecError::HeaderMismatch);
    }

    #[test]
    fn single_erasure_end_to_end() {
        let mut resolver = FecResolver::new(128);
        let key = FecKey {
            slot: 100,
            fec_set_index: 0,
        };
        let datas = [
            data_envelope(0xAA),
            data_envelope(0xBB),
            data_envelope(0xCC),
            data_envelope(0xDD),
        ];
        let code = xor_code_envelope(&datas);

        resolver.add_data_shred(key, 0, &datas[0]).unwrap();
        resolver.add_data_shred(key, 1, &datas[1]).unwrap();
        resolver.add_data_shred(key, 3, &datas[3]).unwrap();
        resolver.add_code_shred(key, 0, &code, 4, 1).unwrap();

        let outcome = resolver.try_recover(key);
        match outcome {
            RecoverOutcome::Recovered(shreds) => {
                assert_eq!(shreds.len(), 1);
                assert_eq!(shreds[0].position, 2);
                let rebuilt = region_into_data_envelope(&shreds[0].region);
                assert_eq!(
                    &rebuilt[DATA_REGION_OFFSET..],
                    &datas[2][DATA_REGION_OFFSET..]
                );
            }
            other => panic!("expected recovery, got {other:?}"),
        }
    }

    #[test]
    fn not_enough_shreds_reports_not_enough() {
        let mut resolver = FecResolver::new(128);
        let key = FecKey {
            slot: 1,
            fec_set_index: 0,
        };
        resolver.add_data_shred(key, 0, &data_envelope(1)).unwrap();
        assert_eq!(resolver.try_recover(key), RecoverOutcome::NotEnough);
    }

    #[test]
    fn multi_erasure_recovers_two_missing_data_shreds() {
        let mut resolver = FecResolver::new(128);
        let key = FecKey {
            slot: 5,
            fec_set_index: 2,
        };
        let k = 6;
        let m = 3;
        let datas: Vec<[u8; SHRED_PAYLOAD_SIZE]> =
            (0..k).map(|i| data_envelope((i * 17 + 3) as u8)).collect();

        let codes: Vec<[u8; SHRED_PAYLOAD_SIZE]> = (0..m)
            .map(|i| {
                let row = matrix::generator_row(k + i, k);
                let mut buf = [0u8; SHRED_PAYLOAD_SIZE];
                for byte_idx in 0..REGION_LEN {
                    let mut acc = 0u8;
                    for (j, coeff) in row.iter().enumerate() {
                        acc = gf256::add(acc, gf256::mul(*coeff, datas[j][DATA_REGION_OFFSET + byte_idx]));
                    }
                    buf[CODE_REGION_OFFSET + byte_idx] = acc;
                }
                buf
            })
            .collect();

        for i in 0..k {
            if i == 2 || i == 4 {
                continue;
            }
            resolver.add_data_shred(key, i, &datas[i]).unwrap();
        }
        for i in 0..m {
            resolver.add_code_shred(key, i, &codes[i], k, m).unwrap();
        }

        match resolver.try_recover(key) {
            RecoverOutcome::Recovered(shreds) => {
                assert_eq!(shreds.len(), 2);
                for r in &shreds {
                    let rebuilt = region_into_data_envelope(&r.region);
                    assert_eq!(
                        &rebuilt[DATA_REGION_OFFSET..],
                        &datas[r.position][DATA_REGION_OFFSET..]
                    );
                }
            }
            other => panic!("expected recovery, got {other:?}"),
        }
    }

    #[test]
    fn eviction_drops_oldest_set_when_full() {
        let mut resolver = FecResolver::new(2);
        let k0 = FecKey { slot: 0, fec_set_index: 0 };
        let k1 = FecKey { slot: 1, fec_set_index: 0 };
        let k2 = FecKey { slot: 2, fec_set_index: 0 };
        resolver.add_data_shred(k0, 0, &data_envelope(1)).unwrap();
        resolver.add_data_shred(k1, 0, &data_envelope(1)).unwrap();
        resolver.add_data_shred(k2, 0, &data_envelope(1)).unwrap();
        assert!(!resolver.sets.contains_key(&k0));
        assert!(resolver.sets.contains_key(&k1));
        assert!(resolver.sets.contains_key(&k2));
    }
}
