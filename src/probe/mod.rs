//! Bucket-row probing: given a query key and up to four slot words making
//! up one bucket row, find the first matching slot.
//!
//! Two implementations exist with an identical contract (§4.2 of the spec
//! this crate implements): a scalar one that always works, and an AVX2 one
//! used when `B == 4` and the `simd` feature is enabled on `x86_64`.
//! Both are cross-validated in `tests::scalar_matches_vector`.

mod scalar;

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod avx2;

pub(crate) use scalar::probe_scalar;

/// Probes a bucket row of up to four slots and returns the index of the
/// first occupied slot whose probe-masked value equals `key`, if any.
///
/// Dispatches to the AVX2 implementation when the row is exactly four
/// slots wide, the `simd` feature is enabled, and the target is
/// `x86_64`; falls back to the scalar probe otherwise, including for
/// narrower rows (`B < 4`).
#[inline]
pub(crate) fn probe_row(key: u64, row: &[u64]) -> Option<usize> {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if row.len() == 4 {
            // SAFETY: dispatch only reached when the CPU feature is
            // detected at runtime, inside `avx2::probe_vector`.
            return avx2::probe_vector(key, row);
        }
    }
    probe_scalar(key, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::PROBE_MASK;

    fn row_of(values: [u64; 4]) -> [u64; 4] {
        let mut row = values;
        for v in row.iter_mut() {
            *v &= PROBE_MASK;
        }
        row
    }

    #[test]
    fn scalar_and_vector_agree_on_miss() {
        let row = row_of([0, 0, 0, 0]);
        assert_eq!(probe_scalar(0x8000_0000_0000_0001, &row), None);
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        assert_eq!(super::avx2::probe_vector(0x8000_0000_0000_0001, &row), None);
    }

    #[test]
    fn scalar_and_vector_agree_on_hit_at_each_position() {
        for i in 0..4 {
            let mut values = [0u64; 4];
            values[i] = 0x8000_0000_0000_0042;
            let row = row_of(values);
            let key = 0x8000_0000_0000_0042u64 & PROBE_MASK;
            assert_eq!(probe_scalar(key, &row), Some(i));
            #[cfg(all(feature = "simd", target_arch = "x86_64"))]
            assert_eq!(super::avx2::probe_vector(key, &row), Some(i));
        }
    }

    #[test]
    fn lowest_index_wins_on_impossible_multi_match() {
        // Invariant 2 forbids two occupied slots sharing an address, but
        // the probe contract (§9 open question) is defined even if a
        // torn write under racy mutation produced one transiently: the
        // lowest-indexed match wins.
        let key = 0x8000_0000_0000_0042u64 & PROBE_MASK;
        let row = row_of([key, key, 0, 0]);
        assert_eq!(probe_scalar(key, &row), Some(0));
        #[cfg(all(feature = "simd", target_arch = "x86_64"))]
        assert_eq!(super::avx2::probe_vector(key, &row), Some(0));
    }

    #[test]
    fn probe_row_dispatches_without_panicking_on_narrow_rows() {
        let row = row_of([0x8000_0000_0000_0007, 0, 0, 0]);
        assert_eq!(probe_row(0x8000_0000_0000_0007u64 & PROBE_MASK, &row[..1]), Some(0));
    }
}
