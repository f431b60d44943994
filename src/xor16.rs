//! [`Xor16`]: the disjoint-block xor geometry with 16-bit fingerprints.
//!
//! An `Xor16` uses <20 bits per entry of the set it's constructed from, and
//! has a false positive rate of <0.002%.
//!
//! ```
//! # extern crate alloc;
//! use amq_filters::{Filter, Xor16};
//! use core::convert::TryFrom;
//! # use alloc::vec::Vec;
//! # use rand::Rng;
//!
//! # let mut rng = rand::thread_rng();
//! const SAMPLE_SIZE: usize = 1_000_000;
//! let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
//! let filter = Xor16::try_from(&keys).unwrap();
//!
//! for key in &keys {
//!     assert!(filter.contains(key));
//! }
//!
//! let bpe = (filter.len() as f64) * 16.0 / (SAMPLE_SIZE as f64);
//! assert!(bpe < 20., "Bits per entry is {}", bpe);
//! ```

/// Xor filter using 16-bit fingerprints. A type alias of the generic
/// [`crate::Xor`], which carries the actual implementation.
pub type Xor16 = crate::Xor<u16>;
