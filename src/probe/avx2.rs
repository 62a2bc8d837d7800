use crate::bitmask::BitMaskIter;
use crate::slot::PROBE_MASK;
use std::arch::x86_64::*;
use std::sync::OnceLock;

fn avx2_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| is_x86_feature_detected!("avx2"))
}

/// Vector bucket probe: broadcasts `key` into a 256-bit register, loads the
/// four-slot bucket row, masks off the gate field, compares for equality,
/// and returns the first matching slot's index.
///
/// Falls back to the scalar probe at runtime if AVX2 isn't available on
/// this CPU, so callers never need their own feature check.
#[inline]
pub(crate) fn probe_vector(key: u64, row: &[u64]) -> Option<usize> {
    debug_assert_eq!(row.len(), 4);
    if !avx2_available() {
        return super::probe_scalar(key, row);
    }
    // SAFETY: guarded by the runtime `avx2_available` check above.
    unsafe { probe_vector_avx2(key, row) }
}

#[target_feature(enable = "avx2")]
#[inline]
unsafe fn probe_vector_avx2(key: u64, row: &[u64]) -> Option<usize> {
    let query = _mm256_set1_epi64x(key as i64);
    let mask = _mm256_set1_epi64x(PROBE_MASK as i64);
    // Each row is a 32-byte slice of the table's 64-byte-aligned slot array
    // (the allocation in `table.rs` guarantees `SLOT_ARRAY_ALIGN`), so an
    // aligned load is sound here rather than just permitted.
    let bucket = _mm256_load_si256(row.as_ptr() as *const __m256i);
    let masked = _mm256_and_si256(bucket, mask);
    let cmp = _mm256_cmpeq_epi64(masked, query);
    // Each 64-bit lane that matched is all-ones; `movemask_pd` reinterprets
    // the comparison as four doubles and extracts one bit per lane's sign
    // bit, giving a 4-bit "which lanes matched" mask.
    let lane_mask = _mm256_movemask_pd(_mm256_castsi256_pd(cmp)) as u32;
    BitMaskIter::new(lane_mask).next()
}
