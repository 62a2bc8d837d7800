use crate::mac::MacAddress;
use crc::{Crc, CRC_32_ISO_HDLC};

/// CRC-32 instance, computed once and reused the way a long-lived checksum
/// table is normally memoized rather than rebuilt per call.
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// 32-bit MurmurHash mixing constant used to derive the alternate index
/// from the primary hash.
const MURMUR_MIX: u32 = 0x5bd1_e995;

/// Computes the primary hash of a MAC address: a CRC-32 over its 8-byte
/// internal-form word (the top two bytes are zero and therefore neutral).
#[inline]
pub(crate) fn primary_hash(addr: MacAddress) -> u32 {
    CRC32.checksum(&addr.as_internal().to_le_bytes())
}

/// Primary bucket-row index: `hash & (N - 1)`.
#[inline]
pub(crate) fn primary_index(hash: u32, bucket_mask: usize) -> usize {
    hash as usize & bucket_mask
}

/// Derives the alternate bucket-row index from the primary hash and
/// primary index. Involutive: applying this to `alt` with the same hash
/// recovers `primary`.
///
/// The `tag` multiply truncates in 32-bit arithmetic by design (§9 of the
/// spec this crate implements) and must keep doing so.
#[inline]
pub(crate) fn alt_index(hash: u32, primary: usize, size_power: u32) -> usize {
    let tag = (hash >> size_power).wrapping_add(1);
    let tag = tag.wrapping_mul(MURMUR_MIX);
    // size_power == 0 means a single-row table: the lower half of the
    // index space collapses to just index 0.
    let half_mask = (1usize << size_power.saturating_sub(1)).wrapping_sub(1);
    (primary ^ tag as usize) & half_mask
}
