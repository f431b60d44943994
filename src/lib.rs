//! Static approximate membership query (AMQ) filters over 64-bit integer
//! keys.
//!
//! A filter is built once from a fixed key set and answers `contains`
//! queries with no false negatives and a small, tunable false positive
//! rate. There is no deletion and no insertion after construction.
//!
//! Two axes combine into the four public filter types:
//!
//! - **Geometry**: [`Xor`] (three disjoint fingerprint blocks, the original
//!   xor filter) or [`Fuse`] (three overlapping segments, a higher load
//!   factor at a more involved construction — the "binary fuse" filter).
//! - **Fingerprint width**: `u8` or `u16`, trading memory for false
//!   positive rate.
//!
//! giving [`Xor8`], [`Xor16`], [`Fuse8`], and [`Fuse16`].
//!
//! ```
//! # extern crate alloc;
//! use amq_filters::{Filter, Fuse8};
//! use core::convert::TryFrom;
//! # use alloc::vec::Vec;
//!
//! let keys: Vec<u64> = (0..10_000).collect();
//! let filter = Fuse8::try_from(&keys).unwrap();
//!
//! assert!(filter.contains(&42));
//! assert!(!filter.contains(&20_000));
//! ```

#![no_std]
#![warn(missing_docs)]
#![forbid(clippy::all, clippy::cargo, clippy::nursery)]

extern crate alloc;

mod error;
mod fuse;
mod fuse16;
mod fuse8;
mod hash_proxy;
mod murmur3;
mod prelude;
mod splitmix64;
mod xor;
mod xor16;
mod xor8;

pub use error::Error;
pub use fuse::Fuse;
pub use fuse16::Fuse16;
pub use fuse8::Fuse8;
pub use hash_proxy::HashProxy;
pub use xor::Xor;
pub use xor16::Xor16;
pub use xor8::Xor8;

/// Common behavior across all filter types: approximate membership query
/// and the number of fingerprint cells backing it.
pub trait Filter<T> {
    /// Returns `true` if the filter possibly contains the specified key.
    /// Has no false negatives, but has a false positive rate dependent on
    /// the underlying filter type.
    fn contains(&self, key: &T) -> bool;

    /// Returns the number of fingerprints in the filter.
    fn len(&self) -> usize;

    /// Returns `true` if the filter contains no fingerprints.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
