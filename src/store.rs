//! The ordered access-point set plus index-wide configuration.

use crate::error::{Error, Result};
use crate::point::AccessPoint;

const DEFAULT_SPACING: u32 = 1_048_576;
const DEFAULT_WINDOW_SIZE: u32 = 32_768;
const MIN_WINDOW_SIZE: u32 = 32_768;
const DEFAULT_READBUF_SIZE: u32 = 16_384;
const INITIAL_CAPACITY: usize = 8;

/// Which offset space a `locate` lookup is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Domain {
    Uncompressed,
    Compressed,
}

/// An ordered, growable set of access points over one compressed stream,
/// plus the configuration used to build it and the logical read cursor
/// maintained across `seek`/`read` calls.
///
/// Constructed with [`Index::init`]; points are only ever added by
/// [`Index::build`](crate) and never mutated afterwards.
#[derive(Debug)]
pub struct Index {
    pub(crate) spacing: u32,
    pub(crate) window_size: u32,
    pub(crate) readbuf_size: u32,
    pub(crate) points: Vec<AccessPoint>,
    pub(crate) built: bool,
    pub(crate) uncmp_seek_offset: u64,
}

impl Index {
    /// Applies defaults (`0` means "use the default"), validates
    /// `window_size >= 32768`, and allocates an empty point list.
    pub fn init(spacing: u32, window_size: u32, readbuf_size: u32) -> Result<Self> {
        let spacing = if spacing == 0 { DEFAULT_SPACING } else { spacing };
        let window_size = if window_size == 0 {
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };
        let readbuf_size = if readbuf_size == 0 {
            DEFAULT_READBUF_SIZE
        } else {
            readbuf_size
        };

        if window_size < MIN_WINDOW_SIZE {
            return Err(Error::ConfigInvalid("window_size must be >= 32768"));
        }

        log::debug!(
            "index init: spacing={} window_size={} readbuf_size={}",
            spacing,
            window_size,
            readbuf_size
        );

        Ok(Self {
            spacing,
            window_size,
            readbuf_size,
            points: Vec::with_capacity(INITIAL_CAPACITY),
            built: false,
            uncmp_seek_offset: 0,
        })
    }

    /// Releases the index. Provided for parity with the C contract's
    /// explicit `zran_free`; `Drop` already does this, so calling it is
    /// optional and only documents intent at the call site.
    pub fn free(self) {
        drop(self);
    }

    pub fn spacing(&self) -> u32 {
        self.spacing
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn readbuf_size(&self) -> u32 {
        self.readbuf_size
    }

    pub fn uncmp_seek_offset(&self) -> u64 {
        self.uncmp_seek_offset
    }

    /// The access points captured by the most recent successful `build`,
    /// in increasing `uncmp_offset` order.
    pub fn points(&self) -> &[AccessPoint] {
        &self.points
    }

    /// Appends a newly captured point. Crate-private: only the builder may
    /// grow the list, and it is trusted to uphold the monotonicity
    /// invariant since points are derived from a single forward pass.
    pub(crate) fn append(&mut self, point: AccessPoint) {
        debug_assert!(point.bits < 8);
        debug_assert!(self
            .points
            .last()
            .map(|prev| prev.uncmp_offset < point.uncmp_offset
                && prev.cmp_offset <= point.cmp_offset)
            .unwrap_or(true));
        self.points.push(point);
    }

    /// Shrinks the backing storage to fit exactly. Non-fatal: `Vec` cannot
    /// fail this in safe Rust, unlike a hand-rolled `realloc`.
    pub(crate) fn trim(&mut self) {
        self.points.shrink_to_fit();
    }

    /// Returns the last point whose key (per `domain`) is `<= offset`.
    ///
    /// The store is sorted by construction, so this is a binary search
    /// rather than a linear scan.
    pub(crate) fn locate(&self, offset: u64, domain: Domain) -> Result<&AccessPoint> {
        if self.points.is_empty() {
            return Err(Error::NotBuilt);
        }

        let key = |p: &AccessPoint| match domain {
            Domain::Uncompressed => p.uncmp_offset,
            Domain::Compressed => {
                if p.bits > 0 {
                    p.cmp_offset - 1
                } else {
                    p.cmp_offset
                }
            }
        };

        // Find the partition point: first index whose key is > offset.
        let idx = self.points.partition_point(|p| key(p) <= offset);
        if idx == 0 {
            // Every key is already > offset; the first point (uncmp_offset
            // == 0) still anchors any non-negative uncompressed offset, but
            // for the compressed domain this can only happen for offsets
            // before the very first point, which callers never produce.
            return Ok(&self.points[0]);
        }
        Ok(&self.points[idx - 1])
    }
}
