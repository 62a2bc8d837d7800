use crate::bitmask::BitMaskIter;
use crate::slot::PROBE_MASK;

/// Scalar bucket probe: the masked-elementwise comparison applied across
/// up to four slot words, used for `B != 4` and as the fallback/reference
/// implementation everywhere else.
#[inline]
pub(crate) fn probe_scalar(key: u64, row: &[u64]) -> Option<usize> {
    debug_assert!(row.len() <= 4);
    let mut matches = 0u32;
    for (i, &word) in row.iter().enumerate() {
        if (word & PROBE_MASK) == key {
            matches |= 1 << i;
        }
    }
    BitMaskIter::new(matches).next()
}
