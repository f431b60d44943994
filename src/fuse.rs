//! Implements binary-fuse filters: overlapping 3-segment windows, giving a
//! higher load factor than the disjoint-block [`crate::Xor`] geometry at the
//! cost of a more involved construction (stable peeling via pre-bucketed key
//! ordering, inline duplicate detection).
//!
//! Ported from [FastFilter/xorfilter's `binaryfusefilter.go`], by way of the
//! teacher's `BinaryFuse8`/`BinaryFuse16`.
//!
//! [FastFilter/xorfilter's `binaryfusefilter.go`]: https://github.com/FastFilter/xorfilter

use crate::prelude::geometry::{fuse_hash_of_hash, mod3, FuseGeometry};
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
const MAX_ITERATIONS: usize = 100;

/// Binary-fuse filter geometry: overlapping 3-segment windows. Generic over
/// fingerprint width (`u8` for [`crate::Fuse8`], `u16` for [`crate::Fuse16`]).
///
/// A `Fuse<FP>` is constructed from a set of 64-bit unsigned integers and is
/// immutable once built. Construction may fail, though only in practice if
/// there are far more duplicate keys than the ~0.1% the inline
/// duplicate-detection fallback tolerates.
///
/// ```
/// # extern crate alloc;
/// use amq_filters::{Filter, Fuse8};
/// use core::convert::TryFrom;
/// # use alloc::vec::Vec;
/// # use rand::Rng;
///
/// # let mut rng = rand::thread_rng();
/// const SAMPLE_SIZE: usize = 10_000;
/// let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();
/// let filter = Fuse8::try_from(&keys).unwrap();
///
/// for key in &keys {
///     assert!(filter.contains(key));
/// }
/// ```
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct Fuse<FP: Fingerprint> {
    /// The seed chosen at build time.
    pub seed: u64,
    /// Number of distinct keys successfully inserted.
    pub size: u32,
    /// Cells per segment; a power of two.
    pub segment_length: u32,
    /// Number of starting segments.
    pub segment_count: u32,
    /// `segment_count * segment_length`.
    pub segment_count_length: u32,
    /// Total fingerprint cells: `(segment_count + 2) * segment_length`.
    pub array_length: u32,
    /// The fingerprints for the filter.
    pub fingerprints: Box<[FP]>,
}

impl<FP: Fingerprint> Fuse<FP> {
    fn geometry(&self) -> FuseGeometry {
        FuseGeometry {
            segment_length: self.segment_length,
            segment_length_mask: self.segment_length - 1,
            segment_count: self.segment_count,
            segment_count_length: self.segment_count_length,
            array_length: self.array_length,
        }
    }
}

impl<FP: Fingerprint> Filter<u64> for Fuse<FP> {
    /// Returns `true` if the filter possibly contains the specified key. Has
    /// no false negatives.
    fn contains(&self, key: &u64) -> bool {
        let hash = mix(*key, self.seed);
        let fp = FP::truncate(hash);
        let (h0, h1, h2) = fuse_hash_of_hash(hash, &self.geometry());
        fp == self.fingerprints[h0] ^ self.fingerprints[h1] ^ self.fingerprints[h2]
    }

    fn len(&self) -> usize {
        self.fingerprints.len()
    }
}

/// One cell of the construction-time mapping array: how many keys are
/// currently mapped to it, the running xor of their hashes, and — once the
/// cell is down to one key — which of that key's three positions (0/1/2)
/// this cell occupies. `t2count` in spec.md §3.2 packs the count and
/// position tag into one byte; kept here as a small record with named
/// fields instead, per spec.md §9's own suggestion.
#[derive(Default, Clone, Copy)]
struct Cell {
    count: u32,
    position_tag: u8,
    hash: u64,
}

impl<FP: Fingerprint> Fuse<FP> {
    /// In-memory footprint of this filter, in bytes.
    pub fn size_in_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.fingerprints.len() * FP::BYTES
    }

    /// Constructs a filter from a key iterator. Can be used directly if you
    /// don't have a contiguous array of u64 keys.
    pub fn try_from_iterator<T>(keys: T) -> Result<Self, Error>
    where
        T: ExactSizeIterator<Item = u64>,
    {
        let mut keys: Vec<u64> = keys.collect();
        Self::populate(&mut keys)
    }

    /// Builds a filter over `keys` (spec.md §4.3). `n` is implicitly
    /// `keys.len()`; on repeated failure signalling duplicate keys, `keys` is
    /// sorted and deduplicated in place and the smaller key set is used.
    pub fn populate(keys: &mut Vec<u64>) -> Result<Self, Error> {
        let mut n = keys.len();
        let mut deduped = false;

        loop {
            match Self::populate_once(keys, n) {
                Ok(filter) => return Ok(filter),
                Err(saw_duplicates) => {
                    if saw_duplicates && !deduped {
                        keys.sort_unstable();
                        keys.dedup();
                        n = keys.len();
                        deduped = true;
                        continue;
                    }
                    return Err(Error::ConstructionFailed);
                }
            }
        }
    }

    /// One dedup-free attempt at `populate`, spending the full
    /// `MAX_ITERATIONS` retry budget on fresh seeds. Returns `Err(true)` if
    /// any duplicate-hash signature was observed along the way, so the
    /// caller knows a sort-and-dedup retry might still succeed.
    fn populate_once(keys: &[u64], n: usize) -> Result<Self, bool> {
        let mut rng_state = 1u64;
        let mut saw_duplicates = false;

        for _ in 0..MAX_ITERATIONS {
            let geom = FuseGeometry::for_size(n as u32);
            let capacity = geom.array_length as usize;
            let seed = splitmix64(&mut rng_state);

            let mut cells: Vec<Cell> = vec![Cell::default(); capacity];
            let reverse_order = bucket_by_hash(keys, seed, n, &geom);

            let mut duplicates = 0usize;
            let mut overflowed = false;
            for &hash in reverse_order.iter() {
                let (i0, i1, i2) = fuse_hash_of_hash(hash, &geom);

                if fold_in(&mut cells, i0, 0, hash)
                    || fold_in(&mut cells, i1, 1, hash)
                    || fold_in(&mut cells, i2, 2, hash)
                {
                    overflowed = true;
                    break;
                }

                // Duplicate detection: a key whose hash exactly cancels an
                // identical hash already folded into all three of its cells
                // shows up as a zero running xor with a count of exactly 2
                // (two keys folded into that cell, their hashes equal).
                let is_dup_signature = |cell: &Cell| cell.hash == 0 && cell.count == 2;
                if cells[i0].hash & cells[i1].hash & cells[i2].hash == 0
                    && (is_dup_signature(&cells[i0])
                        || is_dup_signature(&cells[i1])
                        || is_dup_signature(&cells[i2]))
                {
                    duplicates += 1;
                    unfold(&mut cells, i0, 0, hash);
                    unfold(&mut cells, i1, 1, hash);
                    unfold(&mut cells, i2, 2, hash);
                }
            }

            if duplicates > 0 {
                saw_duplicates = true;
            }

            if overflowed {
                continue;
            }

            let mut alone: Vec<usize> = Vec::new();
            for (i, cell) in cells.iter().enumerate() {
                if cell.count == 1 {
                    alone.push(i);
                }
            }

            let mut reverse_order: Vec<u64> = Vec::with_capacity(n);
            let mut reverse_h: Vec<u8> = Vec::with_capacity(n);
            while let Some(index) = alone.pop() {
                if cells[index].count != 1 {
                    continue;
                }
                let hash = cells[index].hash;
                let found = cells[index].position_tag;
                reverse_h.push(found);
                reverse_order.push(hash);

                let (i0, i1, i2) = fuse_hash_of_hash(hash, &geom);
                let others = [i0, i1, i2];

                let other1 = others[mod3(found + 1) as usize];
                if cells[other1].count == 2 {
                    alone.push(other1);
                }
                cells[other1].count -= 1;
                cells[other1].position_tag ^= mod3(found + 1);
                cells[other1].hash ^= hash;

                let other2 = others[mod3(found + 2) as usize];
                if cells[other2].count == 2 {
                    alone.push(other2);
                }
                cells[other2].count -= 1;
                cells[other2].position_tag ^= mod3(found + 2);
                cells[other2].hash ^= hash;
            }

            if reverse_order.len() + duplicates != n {
                continue;
            }

            let mut fingerprints = make_fp_block::<FP>(capacity);
            for (hash, found) in reverse_order.iter().zip(reverse_h.iter()).rev() {
                let (i0, i1, i2) = fuse_hash_of_hash(*hash, &geom);
                let others = [i0, i1, i2];
                let cell = others[*found as usize];
                let other1 = others[mod3(found + 1) as usize];
                let other2 = others[mod3(found + 2) as usize];
                fingerprints[cell] = FP::truncate(*hash) ^ fingerprints[other1] ^ fingerprints[other2];
            }

            return Ok(Self {
                seed,
                size: n as u32,
                segment_length: geom.segment_length,
                segment_count: geom.segment_count,
                segment_count_length: geom.segment_count_length,
                array_length: geom.array_length,
                fingerprints,
            });
        }

        Err(saw_duplicates)
    }

    /// Bytes required by [`Self::serialize`]'s dense wire format.
    pub fn serialization_bytes(&self) -> usize {
        28 + self.fingerprints.len() * FP::BYTES
    }

    /// Writes the dense wire format, native byte order: `seed` (8B), `size`
    /// (4B), `segment_length` (4B), `segment_count` (4B),
    /// `segment_count_length` (4B), `array_length` (4B), then the raw
    /// fingerprint array (spec.md §6).
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let needed = self.serialization_bytes();
        if buf.len() < needed {
            return Err(Error::BufferTooSmall);
        }
        buf[0..8].copy_from_slice(&self.seed.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.size.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.segment_length.to_ne_bytes());
        buf[16..20].copy_from_slice(&self.segment_count.to_ne_bytes());
        buf[20..24].copy_from_slice(&self.segment_count_length.to_ne_bytes());
        buf[24..28].copy_from_slice(&self.array_length.to_ne_bytes());
        let mut off = 28;
        for fp in self.fingerprints.iter() {
            fp.write_ne(&mut buf[off..off + FP::BYTES]);
            off += FP::BYTES;
        }
        Ok(needed)
    }

    /// Reads the dense wire format produced by [`Self::serialize`].
    /// `segment_length_mask` is recomputed on load rather than carried on
    /// the wire.
    pub fn deserialize(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < 28 {
            return Err(Error::Truncated);
        }
        let seed = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let size = u32::from_ne_bytes(buf[8..12].try_into().unwrap());
        let segment_length = u32::from_ne_bytes(buf[12..16].try_into().unwrap());
        let segment_count = u32::from_ne_bytes(buf[16..20].try_into().unwrap());
        let segment_count_length = u32::from_ne_bytes(buf[20..24].try_into().unwrap());
        let array_length = u32::from_ne_bytes(buf[24..28].try_into().unwrap());

        let needed = 28 + array_length as usize * FP::BYTES;
        if buf.len() < needed {
            return Err(Error::Truncated);
        }
        let mut fingerprints: Box<[FP]> = vec![FP::default(); array_length as usize].into_boxed_slice();
        let mut off = 28;
        for slot in fingerprints.iter_mut() {
            *slot = FP::read_ne(&buf[off..off + FP::BYTES]);
            off += FP::BYTES;
        }

        Ok(Self {
            seed,
            size,
            segment_length,
            segment_count,
            segment_count_length,
            array_length,
            fingerprints,
        })
    }

    /// Bytes required by [`Self::pack`] for this filter's current
    /// fingerprint contents.
    pub fn pack_bytes(&self) -> usize {
        let bitmap_bytes = self.fingerprints.len().div_ceil(8);
        let nonzero = self.fingerprints.iter().filter(|fp| !fp.is_zero()).count();
        12 + bitmap_bytes + nonzero * FP::BYTES
    }

    /// Writes the packed (sparse) wire format: `seed` (8B), `size` (4B), a
    /// presence bitmap over `array_length` cells (LSB-of-byte-first), then
    /// only the nonzero fingerprints in ascending cell order. The remaining
    /// geometry fields are recomputed from `size` on [`Self::unpack`] since
    /// they're a pure function of it (spec.md §4.2), so they don't need to
    /// ride on the wire. Returns 0 if `buf` is smaller than
    /// [`Self::pack_bytes`].
    pub fn pack(&self, buf: &mut [u8]) -> usize {
        let needed = self.pack_bytes();
        if buf.len() < needed {
            return 0;
        }
        buf[0..8].copy_from_slice(&self.seed.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.size.to_ne_bytes());
        let bitmap_bytes = self.fingerprints.len().div_ceil(8);
        let (bitmap, body) = buf[12..needed].split_at_mut(bitmap_bytes);
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
        if buf.len() < 12 {
            return Err(Error::Truncated);
        }
        let seed = u64::from_ne_bytes(buf[0..8].try_into().unwrap());
        let size = u32::from_ne_bytes(buf[8..12].try_into().unwrap());
        let geom = FuseGeometry::for_size(size);
        let capacity = geom.array_length as usize;

        let bitmap_bytes = capacity.div_ceil(8);
        if buf.len() < 12 + bitmap_bytes {
            return Err(Error::Truncated);
        }
        let bitmap = &buf[12..12 + bitmap_bytes];
        let nonzero = (0..capacity)
            .filter(|&i| bitmap[i / 8] & (1 << (i % 8)) != 0)
            .count();
        let needed = 12 + bitmap_bytes + nonzero * FP::BYTES;
        if buf.len() < needed {
            return Err(Error::Truncated);
        }
        let body = &buf[12 + bitmap_bytes..needed];
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
            size,
            segment_length: geom.segment_length,
            segment_count: geom.segment_count,
            segment_count_length: geom.segment_count_length,
            array_length: geom.array_length,
            fingerprints,
        })
    }
}

/// Folds `hash` into `cells[index]` as the key's `position`'th cell.
/// Returns `true` if this pushed the cell's count past what an 8-bit
/// counter could hold (spec.md §4.3), signalling that the iteration must
/// restart with a fresh seed.
#[inline]
fn fold_in(cells: &mut [Cell], index: usize, position: u8, hash: u64) -> bool {
    cells[index].count += 1;
    cells[index].position_tag ^= position;
    cells[index].hash ^= hash;
    cells[index].count > 255
}

#[inline]
fn unfold(cells: &mut [Cell], index: usize, position: u8, hash: u64) {
    cells[index].count -= 1;
    cells[index].position_tag ^= position;
    cells[index].hash ^= hash;
}

/// Pre-buckets the hashes of `keys` by the top `block_bits` bits, so phase 4
/// peeling walks a stable, cache-friendly order instead of raw key order
/// (spec.md §4.3). `reverse_order` is allocated one slot past `n` and that
/// slot is seeded with a sentinel (nonzero, never a target of `start_pos`);
/// without it, the top bucket's cursor can reach exactly `n` once its region
/// fills, and the next probe that lands on that bucket would index past the
/// end of the array. Returns only the first `n` slots, now holding a stable
/// permutation of every key's hash.
fn bucket_by_hash(keys: &[u64], seed: u64, n: usize, geom: &FuseGeometry) -> Vec<u64> {
    let block_bits = geom.block_bits();
    let bucket_count = 1usize << block_bits;
    let mut start_pos: Vec<usize> = (0..bucket_count)
        .map(|i| ((i as u64 * n as u64) >> block_bits) as usize)
        .collect();
    let mut reverse_order = vec![0u64; n + 1];
    reverse_order[n] = 1;

    for &key in keys {
        let hash = mix(key, seed);
        let mut bucket = (hash >> (64 - block_bits)) as usize;
        while reverse_order[start_pos[bucket]] != 0 {
            bucket = (bucket + 1) & (bucket_count - 1);
        }
        reverse_order[start_pos[bucket]] = hash;
        start_pos[bucket] += 1;
    }

    reverse_order.truncate(n);
    reverse_order
}

impl<FP: Fingerprint> TryFrom<&[u64]> for Fuse<FP> {
    type Error = Error;

    fn try_from(keys: &[u64]) -> Result<Self, Error> {
        let mut keys = keys.to_vec();
        Self::populate(&mut keys)
    }
}

impl<FP: Fingerprint> TryFrom<&Vec<u64>> for Fuse<FP> {
    type Error = Error;

    fn try_from(keys: &Vec<u64>) -> Result<Self, Error> {
        Self::try_from(keys.as_slice())
    }
}

impl<FP: Fingerprint> TryFrom<Vec<u64>> for Fuse<FP> {
    type Error = Error;

    fn try_from(mut keys: Vec<u64>) -> Result<Self, Error> {
        Self::populate(&mut keys)
    }
}

#[cfg(test)]
mod test {
    use crate::{Error, Filter, Fuse16, Fuse8};
    use alloc::vec::Vec;
    use core::convert::TryFrom;
    use rand::Rng;

    #[test]
    fn test_initialization() {
        const SAMPLE_SIZE: usize = 100_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse8::try_from(&keys).unwrap();
        for key in &keys {
            assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_bits_per_entry() {
        const SAMPLE_SIZE: usize = 100_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse8::try_from(&keys).unwrap();
        let bpe = (filter.len() as f64) * 8.0 / (SAMPLE_SIZE as f64);
        assert!(bpe < 9.2, "Bits per entry is {}", bpe);
    }

    #[test]
    fn test_false_positives_fuse8() {
        const SAMPLE_SIZE: usize = 100_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse8::try_from(&keys).unwrap();
        let false_positives: usize = (0..SAMPLE_SIZE)
            .map(|_| rng.gen())
            .filter(|n| filter.contains(n))
            .count();
        let fp_rate: f64 = (false_positives * 100) as f64 / SAMPLE_SIZE as f64;
        assert!(fp_rate < 0.5, "False positive rate is {}", fp_rate);
    }

    #[test]
    fn test_false_positives_fuse16() {
        const SAMPLE_SIZE: usize = 100_000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse16::try_from(&keys).unwrap();
        let false_positives: usize = (0..SAMPLE_SIZE)
            .map(|_| rng.gen())
            .filter(|n| filter.contains(n))
            .count();
        let fp_rate: f64 = (false_positives * 100) as f64 / SAMPLE_SIZE as f64;
        assert!(fp_rate < 0.01, "False positive rate is {}", fp_rate);
    }

    #[test]
    fn test_empty() {
        let filter = Fuse8::try_from(Vec::new()).unwrap();
        assert!(!filter.contains(&0));
        assert!(!filter.contains(&42));
    }

    #[test]
    fn test_singleton_and_pair() {
        let filter = Fuse8::try_from(alloc::vec![42u64]).unwrap();
        assert!(filter.contains(&42));

        let filter = Fuse8::try_from(alloc::vec![1u64, 2]).unwrap();
        assert!(filter.contains(&1));
        assert!(filter.contains(&2));
    }

    #[test]
    fn test_duplicate_tolerance() {
        // Ten duplicates at the tail of an otherwise-distinct key set.
        let mut keys: Vec<u64> = (0..999_990u64).collect();
        keys.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let filter = Fuse8::try_from(keys).unwrap();
        for key in 0..999_990u64 {
            assert!(filter.contains(&key));
        }
    }

    #[test]
    fn test_failure_rate_bound() {
        let mut failures = 0;
        for _ in 0..1000 {
            let mut rng = rand::thread_rng();
            let mut seen = alloc::collections::BTreeSet::new();
            while seen.len() < 5000 {
                seen.insert(rng.gen::<u64>());
            }
            let keys: Vec<u64> = seen.into_iter().collect();
            if Fuse16::try_from(keys).is_err() {
                failures += 1;
            }
        }
        assert!(failures <= 1, "failures = {}", failures);
    }

    #[test]
    fn test_dense_round_trip() {
        const SAMPLE_SIZE: usize = 1000;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse16::try_from(&keys).unwrap();
        let mut buf = alloc::vec![0u8; filter.serialization_bytes()];
        let written = filter.serialize(&mut buf).unwrap();
        assert_eq!(written, buf.len());

        let restored = crate::Fuse16::deserialize(&buf).unwrap();
        assert_eq!(restored.size, filter.size);
        assert_eq!(restored.fingerprints, filter.fingerprints);
        for key in &keys {
            assert!(restored.contains(key));
        }
    }

    #[test]
    fn test_serialize_buffer_too_small() {
        let filter = Fuse8::try_from(alloc::vec![1u64, 2, 3]).unwrap();
        let mut buf = alloc::vec![0u8; filter.serialization_bytes() - 1];
        assert_eq!(filter.serialize(&mut buf), Err(Error::BufferTooSmall));
    }

    #[test]
    fn test_packed_round_trip() {
        const SAMPLE_SIZE: usize = 64;
        let mut rng = rand::thread_rng();
        let keys: Vec<u64> = (0..SAMPLE_SIZE).map(|_| rng.gen()).collect();

        let filter = Fuse16::try_from(&keys).unwrap();
        let mut buf = alloc::vec![0u8; filter.pack_bytes()];
        let written = filter.pack(&mut buf);
        assert_eq!(written, buf.len());

        let restored = crate::Fuse16::unpack(&buf).unwrap();
        for key in &keys {
            assert!(restored.contains(key));
        }
    }

    #[test]
    fn test_pack_buffer_too_small() {
        let filter = Fuse8::try_from(alloc::vec![1u64, 2, 3]).unwrap();
        let mut buf = alloc::vec![0u8; filter.pack_bytes() - 1];
        assert_eq!(filter.pack(&mut buf), 0);
    }
}
