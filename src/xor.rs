//! Implements xor filters as described in [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters].
//!
//! Three disjoint fingerprint blocks; each key maps to exactly one cell in each block.
//!
//! [Xor Filters: Faster and Smaller Than Bloom and Cuckoo Filters]: https://arxiv.org/abs/1912.08258

use crate::prelude::geometry::{xor_block_length, xor_hash_of_hash};
use crate::prelude::{make_fp_block, mix, Fingerprint};
use crate::splitmix64::splitmix64;
use crate::{Error, Filter};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::convert::TryFrom;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "bincode")]
use bincode::{Decode, Encode};

/// Populate retries with a fresh seed this many times before giving up.
/// Expected iterations per successful build is < 2; exhausting this budget
/// for distinct keys is astronomically improbable.
const MAX_ITERATIONS: usize = 100;
/// After this many retries with no success, the caller's keys are assumed to
/// contain duplicates: sort and deduplicate in place, then keep retrying
/// with the now-smaller key count.
const SORT_ITERATIONS: usize = 10;

/// A construction-time mapping cell: the running xor of all hashes currently
/// assigned to it, and how many keys are assigned. Kept as a small record
/// with two named fields rather than a packed byte counter (spec.md §9).
#[derive(Default, Clone, Copy)]
struct Cell {
    count: u32,
    mask: u64,
}

/// Xor filter geometry: three disjoint fingerprint blocks of `block_length`
/// cells each, one cell touched per block per key. Generic over fingerprint
/// width (`u8` for [`crate::Xor8`], `u16` for [`crate::Xor16`]) — the two
/// axes of the crate (fingerprint width, geometry) are orthogonal, so this
/// type only varies along width while [`crate::Fuse`] covers the other
/// geometry.
///
/// An `Xor<FP>` is constructed from a set of 64-bit unsigned integers and is
/// immutable once built.
///
/// ```
/// # extern crate alloc;
/// use amq_filters::{Filter, Xor8};
/// use core::convert::TryFrom;
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 10_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = Xor8::try_from(&keys).unwrap();
///
/// // no false negatives
/// for key in &keys {
///     assert!(filter.contains(key));
/// }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct Xor<FP: Fingerprint> {
    /// The seed chosen at build time; mixed with each key before hashing.
    pub seed: u64,
    /// Cells per block; the fingerprint array has `3 * block_length` cells.
    pub block_length: usize,
    /// The fingerprints for the filter.
    pub fingerprints: Box<[FP]>,
}

impl<FP: Fingerprint> Filter<u64> for Xor<FP> {
    /// Returns `true` if the filter possibly contains the specified key. Has
    /// no false negatives and a false-positive rate of approximately
    /// `2^-(8*FP::BYTES)`.
    fn contains(&self, key: &u64) -> bool {
        let hash = mix(*key, self.seed);
        let fp = FP::truncate(hash);
        let (h0, h1, h2) = xor_hash_of_hash(hash, self.block_length);
        fp == self.fingerprints[h0] ^ self.fingerprints[h1] ^ self.fingerprints[h2]
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

impl<FP: Fingerprint> Xor<FP> {
    /// In-memory footprint of this filter, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.fingerprints.len() * FP::BYTES
    }

    /// Constructs a filter from a key iterator. Can be used directly if you
    /// don't have a contiguous array of u64 keys.
    ///
    /// Note: the iterator is materialized into a scratch `Vec` up front,
    /// since `populate` may need to sort and deduplicate it on retry.
    pub fn try_from_iterator<T>(keys: T) -> Result<Self, Error>
    where
        T: ExactSizeIterator<Item = u64>,
    {
        let mut keys: Vec<u64> = keys.collect();
        Self::populate(&mut keys)
    }

    /// Builds a filter over `keys`, retrying with a fresh seed on peeling
    /// failure. `keys` may be sorted and deduplicated in place if repeated
    /// failures indicate duplicate keys (spec.md §4.4); the filter is built
    /// over the possibly-reduced key set in that case.
    pub fn populate(keys: &mut Vec<u64>) -> Result<Self, Error> {
        Self::populate_impl(keys, false)
    }

    /// Equivalent to [`Self::populate`], but stages cell updates in
    /// coarse-grained slots before folding them into the mapping array, to
    /// reduce cache pressure at large key counts (spec.md §4.4). Must
    /// produce fingerprints identical to [`Self::populate`] for the same
    /// input: update order does not affect the final xor/count per cell.
    pub fn populate_buffered(keys: &mut Vec<u64>) -> Result<Self, Error> {
        Self::populate_impl(keys, true)
    }

    fn populate_impl(keys: &mut Vec<u64>, buffered: bool) -> Result<Self, Error> {
        let mut n = keys.len();
        let mut rng_state = 1u64;
        let mut sorted = false;

        for attempt in 0..MAX_ITERATIONS {
            let block_length = xor_block_length(n);
            let capacity = 3 * block_length;
            let seed = splitmix64(&mut rng_state);

            let mut cells: Vec<Cell> = vec![Cell::default(); capacity];

            if buffered {
                map_buffered(keys, seed, block_length, &mut cells);
            } else {
                for &key in keys.iter() {
                    let hash = mix(key, seed);
                    let (h0, h1, h2) = xor_hash_of_hash(hash, block_length);
                    for h in [h0, h1, h2] {
                        cells[h].mask ^= hash;
                        cells[h].count += 1;
                    }
                }
            }

            let mut queues: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];
            for (b, queue) in queues.iter_mut().enumerate() {
                for idx in 0..block_length {
                    let cell = b * block_length + idx;
                    if cells[cell].count == 1 {
                        queue.push(cell);
                    }
                }
            }

            let mut stack: Vec<(usize, u64)> = Vec::with_capacity(n);
            while queues.iter().any(|q| !q.is_empty()) {
                for b in 0..3 {
                    while let Some(cell) = queues[b].pop() {
                        if cells[cell].count != 1 {
                            continue;
                        }
                        let hash = cells[cell].mask;
                        stack.push((cell, hash));

                        let (h0, h1, h2) = xor_hash_of_hash(hash, block_length);
                        for other in [h0, h1, h2] {
                            if other == cell {
                                continue;
                            }
                            cells[other].mask ^= hash;
                            cells[other].count -= 1;
                            if cells[other].count == 1 {
                                queues[other / block_length].push(other);
                            }
                        }
                    }
                }
            }

            if stack.len() == n {
                let mut fingerprints = make_fp_block::<FP>(capacity);
                for &(cell, hash) in stack.iter().rev() {
                    let (h0, h1, h2) = xor_hash_of_hash(hash, block_length);
                    let others = if cell == h0 {
                        fingerprints[h1] ^ fingerprints[h2]
                    } else if cell == h1 {
                        fingerprints[h0] ^ fingerprints[h2]
                    } else {
                        fingerprints[h0] ^ fingerprints[h1]
                    };
                    fingerprints[cell] = FP::truncate(hash) ^ others;
                }

                return Ok(Self {
                    seed,
                    block_length,
                    fingerprints,
                });
            }

            if attempt + 1 == SORT_ITERATIONS && !sorted {
                keys.sort_unstable();
                keys.dedup();
                n = keys.len();
                sorted = true;
            }
        }

        Err(Error::ConstructionFailed)
    }

    /// Bytes required by [`Self::serialize`]'s dense wire format.
    pub fn serialization_bytes(&self) -> usize {
        16 + self.fingerprints.len() * FP::BYTES
    }

    /// Writes the dense wire format, native byte order: `seed` (8B),
    /// `block_length` (8B), then the raw fingerprint array.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let needed = self.serialization_bytes();
        if buf.len() < needed {
            return Err(Error::BufferTooSmall);
        }
        buf[0..8].copy_from_slice(&self.seed.to_ne_bytes());
        buf[8..16].copy_from_slice(&(self.block_length as u64).to_ne_bytes());
        let mut off = 16;
        for fp in self.fingerprints.iter() {
            fp.write_ne(&mut buf[off..off + FP::BYTES]);
            off += FP::BYTES;
        }
        Ok(needed)
    }

    /// Reads the dense wire format produced by [`Self::serialize`].
    pub fn deserialize(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 16 {
            return Err(Error::Truncated);
        }
        let seed = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let block_length = u64::from_ne_bytes(buf[8..16].try_into().unwrap()) as usize;
        let capacity = 3 * block_length;
        let needed = 16 + capacity * FP::BYTES;
        if buf.len() < needed {
            return Err(Error::Truncated);
        }
        let mut fingerprints: Box<[FP]> = vec![FP::default(); capacity].into_boxed_slice();
        let mut off = 16;
        for slot in fingerprints.iter_mut() {
            *slot = FP::read_ne(&buf[off..off + FP::BYTES]);
            off += FP::BYTES;
        }
        Ok(Self {
            seed,
            block_length,
            fingerprints,
        })
    }

    /// Bytes required by [`Self::pack`] for this filter's current
    /// fingerprint contents.
    pub fn pack_bytes(&self) -> usize {
        let bitmap_bytes = self.fingerprints.len().div_ceil(8);
        let nonzero = self.fingerprints.iter().filter(|fp| !fp.is_zero()).count();
        16 + bitmap_bytes + nonzero * FP::BYTES
    }

    /// Writes the packed (sparse) wire format: `seed` (8B), `block_length`
    /// (8B), a presence bitmap (LSB-of-byte-first), then only the nonzero
    /// fingerprints in ascending cell order. Returns 0 if `buf` is smaller
    /// than [`Self::pack_bytes`].
    pub fn pack(&self, buf: &mut [u8]) -> usize {
        let needed = self.pack_bytes();
        if buf.len() < needed {
            return 0;
        }
        buf[0..8].copy_from_slice(&self.seed.to_ne_bytes());
        buf[8..16].copy_from_slice(&(self.block_length as u64).to_ne_bytes());
        let bitmap_bytes = self.fingerprints.len().div_ceil(8);
        let (bitmap, body) = buf[16..needed].split_at_mut(bitmap_bytes);
        for b in bitmap.iter_mut() {
            *b = 0;
        }
        let mut off = 0;
        for (i, fp) in self.fingerprints.iter().enumerate() {
            if fp.is_zero() {
                continue;
            }
            bitmap[i / 8] |= 1 << (i % 8);
            fp.write_ne(&mut body[off..off + FP::BYTES]);
            off += FP::BYTES;
        }
        needed
    }

    /// Reads the packed wire format produced by [`Self::pack`].
    pub fn unpack(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 16 {
            return Err(Error::Truncated);
        }
        let seed = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let block_length = u64::from_ne_bytes(buf[8..16].try_into().unwrap()) as usize;
        let capacity = 3 * block_length;
        let bitmap_bytes = capacity.div_ceil(8);
        if buf.len() < 16 + bitmap_bytes {
            return Err(Error::Truncated);
        }
        let bitmap = &buf[16..16 + bitmap_bytes];
        let nonzero = (0..capacity)
            .filter(|&i| bitmap[i / 8] & (1 << (i % 8)) != 0)
            .count();
        let needed = 16 + bitmap_bytes + nonzero * FP::BYTES;
        if buf.len() < needed {
            return Err(Error::Truncated);
        }
        let body = &buf[16 + bitmap_bytes..needed];
        let mut fingerprints: Box<[FP]> = vec![FP::default(); capacity].into_boxed_slice();
        let mut off = 0;
        for i in 0..capacity {
            if bitmap[i / 8] & (1 << (i % 8)) != 0 {
                fingerprints[i] = FP::read_ne(&body[off..off + FP::BYTES]);
                off += FP::BYTES;
            }
        }
        Ok(Self {
            seed,
            block_length,
            fingerprints,
        })
    }
}

/// Stages cell updates in slots keyed by the top bits of the global cell
/// index, then flushes each slot into `cells` in turn. The final xor/count
/// per cell is independent of update order, so this produces the exact same
/// `cells` state as folding in key order — the locality win is purely in
/// which memory gets touched together.
fn map_buffered(keys: &[u64], seed: u64, block_length: usize, cells: &mut [Cell]) {
    const SLOT_BITS: u32 = 10;
    let slot_count = (cells.len() >> SLOT_BITS) + 1;
    let mut staged: Vec<Vec<(usize, u64)>> = (0..slot_count).map(|_| Vec::new()).collect();

    for &key in keys {
        let hash = mix(key, seed);
        let (h0, h1, h2) = xor_hash_of_hash(hash, block_length);
        for h in [h0, h1, h2] {
            staged[h >> SLOT_BITS].push((h, hash));
        }
    }

    for slot in staged.iter() {
        for &(idx, hash) in slot {
            cells[idx].mask ^= hash;
            cells[idx].count += 1;
        }
    }
}

impl<FP: Fingerprint> TryFrom<&[u64]> for Xor<FP> {
    type Error = Error;

    fn try_from(keys: &[u64]) -> Result<Self, Error> {
        let mut keys = keys.to_vec();
        Self::populate(&mut keys)
    }
}

impl<FP: Fingerprint> TryFrom<&Vec<u64>> for Xor<FP> {
    type Error = Error;

    fn try_from(keys: &Vec<u64>) -> Result<Self, Error> {
        Self::try_from(keys.as_slice())
    }
}

impl<FP: Fingerprint> TryFrom<Vec<u64>> for Xor<FP> {
    type Error = Error;

    fn try_from(mut keys: Vec<u64>) -> Result<Self, Error> {
        Self::populate(&mut keys)
    }
}
