use crate::config::TableConfig;
use crate::error::{TableError, TableResult};
use crate::gate::GateId;
use crate::hash::{alt_index, primary_hash, primary_index};
use crate::mac::MacAddress;
use crate::probe::probe_row;
use crate::slot::Slot;
use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::ptr::NonNull;

/// Cache-line alignment for the slot array, matching the allocator
/// contract (c) in §1 of the spec this crate implements: an allocator
/// that returns cache-line-aligned memory.
const SLOT_ARRAY_ALIGN: usize = 64;

/// The fixed-size cuckoo-hashed slot table: `N` bucket rows of `B` slots
/// each, flat in memory so one row is contiguous.
///
/// Mutators (`add`, `delete`, `flush`, `populate`) take `&mut self`: the
/// table itself does not serialize concurrent mutation, matching §5's
/// contract that the surrounding caller is responsible for that (the
/// `ForwardingModule` does so with a `RwLock<Table>`). `find` takes `&self`
/// and is safe to call from any number of threads concurrently with a
/// single mutator, per §5's "Safe-concurrent operations".
pub(crate) struct Table {
    slots: NonNull<u64>,
    size: usize,
    bucket: usize,
    bucket_mask: usize,
    size_power: u32,
    count: usize,
}

unsafe impl Send for Table {}
unsafe impl Sync for Table {}

impl Table {
    pub(crate) fn new(config: TableConfig) -> Result<Self, crate::error::L2Error> {
        config.validate()?;
        let total = config.size * config.bucket;
        let layout = Layout::from_size_align(total * std::mem::size_of::<u64>(), SLOT_ARRAY_ALIGN)
            .expect("slot array layout overflow");
        // SAFETY: `layout` has a non-zero size whenever `total > 0`, which
        // `config.validate()` above guarantees (`size`/`bucket` are both at
        // least 1).
        let ptr = unsafe { alloc_zeroed(layout) };
        let slots = NonNull::new(ptr as *mut u64).unwrap_or_else(|| handle_alloc_error(layout));
        log::debug!(
            "allocated l2 forwarding table: size={} bucket={} ({} slots)",
            config.size,
            config.bucket,
            total
        );
        Ok(Table {
            slots,
            size: config.size,
            bucket: config.bucket,
            bucket_mask: config.size - 1,
            size_power: config.size_power(),
            count: 0,
        })
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn bucket(&self) -> usize {
        self.bucket
    }

    #[inline]
    fn row(&self, row_index: usize) -> &[u64] {
        debug_assert!(row_index < self.size);
        // SAFETY: `row_index < self.size` (checked above) and `self.bucket`
        // slots per row, so `row_index * self.bucket + self.bucket` never
        // exceeds the `self.size * self.bucket` slots the allocation in
        // `new` sized the `Layout` for; the range stays in bounds of one
        // live allocation and is never mutated for the lifetime of this
        // shared slice.
        unsafe {
            std::slice::from_raw_parts(self.slots.as_ptr().add(row_index * self.bucket), self.bucket)
        }
    }

    #[inline]
    fn slot_at(&self, row_index: usize, slot_index: usize) -> Slot {
        Slot::from_raw(self.row(row_index)[slot_index])
    }

    #[inline]
    fn set_slot(&mut self, row_index: usize, slot_index: usize, slot: Slot) {
        debug_assert!(row_index < self.size && slot_index < self.bucket);
        // SAFETY: `row_index < self.size` and `slot_index < self.bucket`
        // (checked above), so the computed offset addresses one of the
        // `self.size * self.bucket` slots the allocation was sized for in
        // `new`; `&mut self` guarantees no concurrent reader/writer holds a
        // reference into the array.
        unsafe {
            *self.slots.as_ptr().add(row_index * self.bucket + slot_index) = slot.raw();
        }
    }

    #[inline]
    fn indices(&self, addr: MacAddress) -> (usize, usize) {
        let hash = primary_hash(addr);
        let primary = primary_index(hash, self.bucket_mask);
        let alt = alt_index(hash, primary, self.size_power);
        (primary, alt)
    }

    /// Probes one bucket row for `addr`, returning its gate on a hit.
    #[inline]
    fn probe_bucket(&self, row_index: usize, addr: MacAddress) -> Option<GateId> {
        let key = Slot::probe_key(addr);
        let row = self.row(row_index);
        probe_row(key, row).map(|i| Slot::from_raw(row[i]).gate())
    }

    /// Two-bucket lookup: probes the primary row, then the alternate row
    /// on a miss. Never mutates the table.
    pub(crate) fn find(&self, addr: MacAddress) -> Option<GateId> {
        let (primary, alt) = self.indices(addr);
        self.probe_bucket(primary, addr).or_else(|| self.probe_bucket(alt, addr))
    }

    /// Scalar scan of a row for an occupied slot holding `addr`, used by
    /// `delete` (§4.5 calls for a scalar scan, not the SIMD probe).
    fn scan_for(&self, row_index: usize, addr: MacAddress) -> Option<usize> {
        (0..self.bucket).find(|&i| {
            let slot = self.slot_at(row_index, i);
            slot.is_occupied() && slot.addr() == addr
        })
    }

    pub(crate) fn add(&mut self, addr: MacAddress, gate: GateId) -> TableResult<()> {
        if self.find(addr).is_some() {
            return Err(TableError::Exists);
        }
        let (primary, _alt) = self.indices(addr);

        if let Some(empty) = (0..self.bucket).find(|&i| !self.slot_at(primary, i).is_occupied()) {
            self.set_slot(primary, empty, Slot::pack(addr, gate));
            self.count += 1;
            return Ok(());
        }

        // Primary row is full: attempt a single-level cuckoo displacement.
        for i in 0..self.bucket {
            let displaced = self.slot_at(primary, i);
            let d_hash = primary_hash(displaced.addr());
            let d_primary = primary_index(d_hash, self.bucket_mask);
            let d_alt = alt_index(d_hash, d_primary, self.size_power);

            if d_alt == d_primary || d_alt == primary {
                // Self-referencing alternate: abandon the entire
                // displacement attempt, matching the source's early break.
                break;
            }

            if let Some(free) = (0..self.bucket).find(|&j| !self.slot_at(d_alt, j).is_occupied()) {
                self.set_slot(d_alt, free, displaced);
                // The slot vacated by the move (index `i`) is where the
                // new entry lands: writing anywhere else would either
                // clobber an unrelated live entry or leave `addr`
                // unreachable from either of its own candidate rows,
                // breaking invariants 1 and 2.
                self.set_slot(primary, i, Slot::pack(addr, gate));
                self.count += 1;
                return Ok(());
            }
        }

        Err(TableError::NoMemory)
    }

    pub(crate) fn delete(&mut self, addr: MacAddress) -> TableResult<()> {
        let (primary, alt) = self.indices(addr);
        if let Some(i) = self.scan_for(primary, addr) {
            self.set_slot(primary, i, Slot::EMPTY);
            self.count -= 1;
            return Ok(());
        }
        if let Some(i) = self.scan_for(alt, addr) {
            self.set_slot(alt, i, Slot::EMPTY);
            self.count -= 1;
            return Ok(());
        }
        Err(TableError::NotFound)
    }

    pub(crate) fn flush(&mut self) {
        let total = self.size * self.bucket;
        // SAFETY: `total` is exactly the `self.size * self.bucket` slot
        // count the allocation in `new` was sized for, so zeroing `total`
        // `u64`s from `self.slots` stays within that one allocation;
        // `&mut self` guarantees exclusive access for the duration.
        unsafe {
            std::ptr::write_bytes(self.slots.as_ptr(), 0, total);
        }
        self.count = 0;
    }

    /// Synthesises `count` entries starting at `base`, assigning gate
    /// `i mod gate_count` to entry `i`. Insertion failures are ignored by
    /// design (§4.6, §9): returns the number of entries actually
    /// installed so a caller that cares can notice a short count.
    pub(crate) fn populate(&mut self, base: MacAddress, count: usize, gate_count: u16) -> usize {
        let mut mac = base;
        let mut installed = 0;
        for i in 0..count {
            let gate = GateId::new((i % gate_count.max(1) as usize) as u16);
            if self.add(mac, gate).is_ok() {
                installed += 1;
            }
            mac = mac.next_populate();
        }
        installed
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let total = self.size * self.bucket;
        let layout = Layout::from_size_align(total * std::mem::size_of::<u64>(), SLOT_ARRAY_ALIGN)
            .expect("slot array layout overflow");
        // SAFETY: `layout` is recomputed from the same `self.size`/
        // `self.bucket` (which never change after construction, Invariant
        // 5) and the same `SLOT_ARRAY_ALIGN`, so it's identical to the
        // `Layout` `new` allocated `self.slots` with; `drop` runs at most
        // once per `Table`.
        unsafe {
            dealloc(self.slots.as_ptr() as *mut u8, layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(size: usize, bucket: usize) -> Table {
        Table::new(TableConfig { size, bucket }).unwrap()
    }

    fn mac(text: &str) -> MacAddress {
        MacAddress::parse(text).unwrap()
    }

    #[test]
    fn init_entry_find_delete_scenario() {
        let mut t = table(4, 4);
        let addr = MacAddress::from_internal(0x0123_4567_0123_4567);
        t.add(addr, GateId::new(0x0123)).unwrap();
        assert_eq!(t.find(addr), Some(GateId::new(0x0123)));
        assert_eq!(t.find(MacAddress::from_internal(0x9876_5432_1098_7654)), None);
        t.delete(addr).unwrap();
        assert_eq!(t.delete(addr), Err(TableError::NotFound));
        assert_eq!(t.find(addr), None);
    }

    #[test]
    fn flush_clears_table() {
        let mut t = table(4, 4);
        let addr = MacAddress::from_internal(0x0123_4567_0123_4567);
        t.add(addr, GateId::new(0x0123)).unwrap();
        t.flush();
        assert_eq!(t.find(addr), None);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn populate_installs_sequential_macs_with_round_robin_gates() {
        let mut t = table(16, 4);
        let base = mac("00:00:00:00:00:00");
        let installed = t.populate(base, 5, 3);
        assert_eq!(installed, 5);
        let expected_gates = [0u16, 1, 2, 0, 1];
        let mut cur = base;
        for expected_gate in expected_gates {
            assert_eq!(t.find(cur), Some(GateId::new(expected_gate)));
            cur = cur.next_populate();
        }
    }

    #[test]
    fn add_duplicate_fails_and_first_entry_survives() {
        let mut t = table(4, 4);
        let addr = mac("aa:bb:cc:dd:ee:ff");
        t.add(addr, GateId::new(1)).unwrap();
        assert_eq!(t.add(addr, GateId::new(2)), Err(TableError::Exists));
        assert_eq!(t.find(addr), Some(GateId::new(1)));
    }

    #[test]
    fn full_table_rejects_further_inserts_without_overwrite() {
        let mut t = table(1, 1);
        t.add(mac("00:00:00:00:00:00"), GateId::new(0)).unwrap();
        let err = t.add(mac("00:00:00:00:00:01"), GateId::new(1));
        assert_eq!(err, Err(TableError::NoMemory));
        assert_eq!(t.find(mac("00:00:00:00:00:00")), Some(GateId::new(0)));
    }

    #[test]
    fn delete_never_inserted_returns_not_found() {
        let mut t = table(4, 4);
        assert_eq!(t.delete(mac("00:00:00:00:00:00")), Err(TableError::NotFound));
    }

    #[test]
    fn sixteen_random_inserts_are_consistent_with_find() {
        use std::collections::HashSet;
        // Deterministic pseudo-random sequence so the test is reproducible
        // without pulling in a dependency just for this.
        let mut state: u64 = 0x2545F4914F6CDD1D;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let mut t = table(4, 4);
        let mut installed: HashSet<(u64, u16)> = HashSet::new();
        let mut seen_addrs: HashSet<u64> = HashSet::new();
        for _ in 0..16 {
            let raw = next() & 0x0000_FFFF_FFFF_FFFF;
            let addr = MacAddress::from_internal(raw);
            let gate = GateId::new((next() & 0x7FFF) as u16);
            if seen_addrs.contains(&raw) {
                continue;
            }
            seen_addrs.insert(raw);
            match t.add(addr, gate) {
                Ok(()) => {
                    installed.insert((raw, gate.as_u16()));
                }
                Err(TableError::NoMemory) => {
                    assert_eq!(t.find(addr), None);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        for (raw, gate) in installed {
            let addr = MacAddress::from_internal(raw);
            assert_eq!(t.find(addr), Some(GateId::new(gate)));
        }
    }

    #[test]
    fn count_tracks_occupied_slots() {
        let mut t = table(8, 4);
        assert_eq!(t.count(), 0);
        t.add(mac("00:00:00:00:00:01"), GateId::new(0)).unwrap();
        t.add(mac("00:00:00:00:00:02"), GateId::new(0)).unwrap();
        assert_eq!(t.count(), 2);
        t.delete(mac("00:00:00:00:00:01")).unwrap();
        assert_eq!(t.count(), 1);
    }
}
