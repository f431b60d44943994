//! [`Fuse16`]: the binary-fuse geometry with 16-bit fingerprints.
//!
//! A `Fuse16` trades the same construction-time cost as [`crate::Fuse8`] for
//! a much lower false positive rate: ~16.1 bits per entry, <0.002%.
//!
//! ```
//! # extern crate alloc;
//! use amq_filters::{Filter, Fuse16};
//! use core::convert::TryFrom;
//! # use alloc::vec::Vec;
//! # use rand::Rng;
//!
//! # let mut rng = rand::thread_rng();
//! const SAMPLE_SIZE: usize = 1_000_000;
//! let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
//! let filter = Fuse16::try_from(&keys).unwrap();
//!
//! for key in &keys {
//!     assert!(filter.contains(key));
//! }
//! ```

/// Binary-fuse filter using 16-bit fingerprints. A type alias of the generic
/// [`crate::Fuse`], which carries the actual implementation.
pub type Fuse16 = crate::Fuse<u16>;
