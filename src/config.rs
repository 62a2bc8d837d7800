use crate::error::L2Error;

/// Upper bound on `size`, matching the table's `size_power` fitting in a
/// `u8` comfortably while keeping the slot array allocation sane.
pub const MAX_TABLE_SIZE: usize = 1 << 26;

/// Default number of table rows (`N`).
pub const DEFAULT_SIZE: usize = 1024;

/// Default bucket width (`B`).
pub const DEFAULT_BUCKET: usize = 4;

/// Widest bucket row the scalar/vector probes support.
pub const MAX_BUCKET: usize = 4;

/// Construction-time configuration for a [`crate::table::Table`].
///
/// Read from the surrounding module's `init` configuration map in the full
/// pipeline; exposed here as a plain struct so the crate is configurable
/// without that map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableConfig {
    /// `N`, number of bucket rows. Must be a power of two in `[1, MAX_TABLE_SIZE]`.
    pub size: usize,
    /// `B`, slots per bucket row. Must be a power of two in `[1, MAX_BUCKET]`.
    pub bucket: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig { size: DEFAULT_SIZE, bucket: DEFAULT_BUCKET }
    }
}

impl TableConfig {
    /// Validates `size`/`bucket` against the boundary rules in the spec,
    /// quoting the offending field by name on failure.
    pub fn validate(&self) -> Result<(), L2Error> {
        if self.size == 0 || !self.size.is_power_of_two() || self.size > MAX_TABLE_SIZE {
            return Err(L2Error::invalid_argument(format!(
                "size must be a power of two in [1, {MAX_TABLE_SIZE}], got {}",
                self.size
            )));
        }
        if self.bucket == 0 || !self.bucket.is_power_of_two() || self.bucket > MAX_BUCKET {
            return Err(L2Error::invalid_argument(format!(
                "bucket must be a power of two in [1, {MAX_BUCKET}], got {}",
                self.bucket
            )));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn size_power(&self) -> u32 {
        self.size.trailing_zeros()
    }
}
