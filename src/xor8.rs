//! [`Xor8`]: the disjoint-block xor geometry with 8-bit fingerprints.
//!
//! An `Xor8` uses <10 bits per entry of the set it's constructed from, and
//! has a false positive rate of <0.4%. As with other probabilistic filters,
//! more entries lowers the bits-per-entry but raises the false positive
//! rate.
//!
//! ```
//! # extern crate alloc;
//! use amq_filters::{Filter, Xor8};
//! use core::convert::TryFrom;
//! # use alloc::vec::Vec;
//! # use rand::Rng;
//!
//! # let mut rng = rand::thread_rng();
//! const SAMPLE_SIZE: usize = 1_000_000;
//! let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
//! let filter = Xor8::try_from(&keys).unwrap();
//!
//! for key in &keys {
//!     assert!(filter.contains(key));
//! }
//!
//! let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);
//! assert!(bpe < 10., "Bits per entry is {}", bpe);
//! ```

/// Xor filter using 8-bit fingerprints. A type alias of the generic
/// [`crate::Xor`], which carries the actual implementation.
pub type Xor8 = crate::Xor<u8>;
