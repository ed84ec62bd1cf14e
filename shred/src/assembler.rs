//! Shred Assembler (C1): dedup, validate, and group incoming shreds by
//! `(slot, FEC-set)`, driving FEC recovery (C2) as code shreds arrive.

use {
    crate::wire::{Shred, ShredKind, ShredParseError, ShredVariant},
    std::collections::{BTreeMap, HashSet},
    validator_fec::{region_into_data_envelope, FecKey, FecResolver, RecoverOutcome},
    validator_primitives::Slot,
};

/// How far past the highest-seen index we ask repair to probe when the
/// slot's true upper bound (`last_in_slot`) hasn't arrived yet.
pub const REPAIR_WINDOW: u32 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub duplicate: bool,
    pub accepted: bool,
    pub slot_complete: bool,
}

#[derive(Debug, Default)]
pub struct AssemblerStats {
    pub version_mismatches: u64,
    pub invalid_type_bytes: u64,
    pub duplicates: u64,
    pub fec_header_mismatches: u64,
    pub recovered_shreds: u64,
}

#[derive(Default)]
struct SlotState {
    data: BTreeMap<u32, Shred>,
    highest_data_index: Option<u32>,
    upper_bound: Option<u32>,
    fec_sets_seen: HashSet<u32>,
}

impl SlotState {
    fn is_assembled(&self) -> bool {
        match self.upper_bound {
            Some(bound) => (0..=bound).all(|i| self.data.contains_key(&i)),
            None => false,
        }
    }
}

pub struct ShredAssembler {
    expected_version: u16,
    slots: std::collections::HashMap<Slot, SlotState>,
    fec: FecResolver,
    stats: AssemblerStats,
}

impl ShredAssembler {
    pub fn new(expected_version: u16, max_fec_sets: usize) -> Self {
        Self {
            expected_version,
            slots: std::collections::HashMap::new(),
            fec: FecResolver::new(max_fec_sets),
            stats: AssemblerStats::default(),
        }
    }

    pub fn stats(&self) -> &AssemblerStats {
        &self.stats
    }

    pub fn insert_bytes(&mut self, bytes: &[u8]) -> Result<InsertOutcome, ShredParseError> {
        match Shred::parse(bytes) {
            Ok(shred) => Ok(self.insert(shred)),
            Err(e) => {
                self.stats.invalid_type_bytes += 1;
                Err(e)
            }
        }
    }

    pub fn insert(&mut self, shred: Shred) -> InsertOutcome {
        if shred.shred_version != self.expected_version {
            self.stats.version_mismatches += 1;
            return InsertOutcome::default();
        }

        match shred.kind() {
            ShredKind::Data => self.insert_data(shred),
            ShredKind::Code => self.insert_code(shred),
        }
    }

    fn insert_data(&mut self, shred: Shred) -> InsertOutcome {
        let last_in_slot = match &shred.variant {
            ShredVariant::Data(header) => header.last_in_slot(),
            ShredVariant::Code(_) => unreachable!("insert_data only called for data shreds"),
        };
        let slot = shred.slot;
        let index = shred.index;
        let fec_set_index = shred.fec_set_index;

        if self
            .slots
            .get(&slot)
            .is_some_and(|s| s.data.contains_key(&index))
        {
            self.stats.duplicates += 1;
            return InsertOutcome {
                duplicate: true,
                ..Default::default()
            };
        }

        let position = index.saturating_sub(fec_set_index) as usize;
        let key = FecKey {
            slot,
            fec_set_index,
        };
        let _ = self.fec.add_data_shred(key, position, shred.raw.as_ref());

        let slot_state = self.slots.entry(slot).or_default();
        slot_state.fec_sets_seen.insert(fec_set_index);
        slot_state.highest_data_index =
            Some(slot_state.highest_data_index.map_or(index, |h| h.max(index)));
        if last_in_slot {
            slot_state.upper_bound = Some(index);
        }
        slot_state.data.insert(index, shred);

        InsertOutcome {
            duplicate: false,
            accepted: true,
            slot_complete: slot_state.is_assembled(),
        }
    }

    fn insert_code(&mut self, shred: Shred) -> InsertOutcome {
        let header = match &shred.variant {
            ShredVariant::Code(header) => *header,
            ShredVariant::Data(_) => unreachable!("insert_code only called for code shreds"),
        };
        let slot = shred.slot;
        let fec_set_index = shred.fec_set_index;
        let key = FecKey {
            slot,
            fec_set_index,
        };
        let add_result = self.fec.add_code_shred(
            key,
            header.position as usize,
            shred.raw.as_ref(),
            header.num_data as usize,
            header.num_code as usize,
        );
        if add_result.is_err() {
            self.stats.fec_header_mismatches += 1;
            return InsertOutcome::default();
        }

        self.slots
            .entry(slot)
            .or_default()
            .fec_sets_seen
            .insert(fec_set_index);

        if let RecoverOutcome::Recovered(recovered) = self.fec.try_recover(key) {
            self.stats.recovered_shreds += recovered.len() as u64;
            let slot_state = self.slots.get_mut(&slot).unwrap();
            for r in recovered {
                let index = fec_set_index + r.position as u32;
                if slot_state.data.contains_key(&index) {
                    continue;
                }
                let raw = region_into_data_envelope(&r.region);
                slot_state
                    .data
                    .insert(index, reconstruct_data_shred(&shred, index, raw));
                slot_state.highest_data_index =
                    Some(slot_state.highest_data_index.map_or(index, |h| h.max(index)));
            }
        }

        let slot_state = self.slots.get(&slot).unwrap();
        InsertOutcome {
            duplicate: false,
            accepted: true,
            slot_complete: slot_state.is_assembled(),
        }
    }

    /// Every missing index in `[0, highest_seen)`, plus a bounded sentinel
    /// range past it when the slot's true upper bound is still unknown.
    pub fn missing_indices(&self, slot: Slot) -> Vec<u32> {
        let Some(state) = self.slots.get(&slot) else {
            return Vec::new();
        };
        let max_seen = state.highest_data_index.map_or(0, |h| h + 1);
        let mut missing: Vec<u32> = (0..max_seen)
            .filter(|i| !state.data.contains_key(i))
            .collect();
        if state.upper_bound.is_none() {
            missing.extend(max_seen..max_seen + REPAIR_WINDOW);
        }
        missing
    }

    pub fn assemble(&self, slot: Slot) -> Option<Vec<u8>> {
        let state = self.slots.get(&slot)?;
        if !state.is_assembled() {
            return None;
        }
        let mut out = Vec::new();
        for (_, shred) in state.data.iter() {
            if let Some(payload) = shred.data_payload() {
                out.extend_from_slice(payload);
            }
        }
        Some(out)
    }

    pub fn evict(&mut self, slot: Slot) {
        if let Some(state) = self.slots.remove(&slot) {
            for fec_set_index in state.fec_sets_seen {
                self.fec.evict(FecKey {
                    slot,
                    fec_set_index,
                });
            }
        }
    }
}

/// Builds a full `Shred` for a data index recovered via FEC, reusing the
/// signature/slot/version/fec_set_index latched on the set (every shred in
/// a FEC set shares the same signature, per the Shred invariant in §3).
fn reconstruct_data_shred(
    template: &Shred,
    index: u32,
    mut raw: [u8; validator_fec::SHRED_PAYLOAD_SIZE],
) -> Shred {
    raw[0..64].copy_from_slice(template.signature.as_bytes());
    raw[64] = 0x80; // merkle data type byte
    raw[65..73].copy_from_slice(&template.slot.to_le_bytes());
    raw[73..77].copy_from_slice(&index.to_le_bytes());
    raw[77..79].copy_from_slice(&template.shred_version.to_le_bytes());
    raw[79..83].copy_from_slice(&template.fec_set_index.to_le_bytes());
    Shred::parse(&raw).expect("reconstructed envelope is always well-formed")
}
