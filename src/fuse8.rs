//! [`Fuse8`]: the binary-fuse geometry with 8-bit fingerprints.
//!
//! A `Fuse8` packs more entries per bit than [`crate::Xor8`] at a
//! construction-time cost: ~8.1 bits per entry, <0.4% false positive rate.
//!
//! ```
//! # extern crate alloc;
//! use amq_filters::{Filter, Fuse8};
//! use core::convert::TryFrom;
//! # use alloc::vec::Vec;
//! # use rand::Rng;
//!
//! # let mut rng = rand::thread_rng();
//! const SAMPLE_SIZE: usize = 1_000_000;
//! let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
//! let filter = Fuse8::try_from(&keys).unwrap();
//!
//! for key in &keys {
//!     assert!(filter.contains(key));
//! }
//! ```

/// Binary-fuse filter using 8-bit fingerprints. A type alias of the generic
/// [`crate::Fuse`], which carries the actual implementation.
pub type Fuse8 = crate::Fuse<u8>;
