//! Primitives shared by the xor and fuse filter geometries: hashing, the
//! fingerprint width axis, and the fingerprint-block allocator.

pub mod geometry;

use crate::murmur3;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Applies a finalization mix to a randomly-seeded key, resulting in an avalanched hash. This
/// helps avoid high false-positive ratios (see Section 4 in the paper).
#[inline]
pub const fn mix(key: u64, seed: u64) -> u64 {
    murmur3::mix64(key.overflowing_add(seed).0)
}

/// The high 64 bits of a 64x64 multiply, used to map a hash uniformly into `[0, n)` without
/// requiring `n` to be a power of two (unlike [`reduce`]).
#[inline]
pub const fn mulhi(a: u64, b: u32) -> u32 {
    (((a as u128) * (b as u128)) >> 64) as u32
}

/// [A fast alternative to the modulo reduction](http://lemire.me/blog/2016/06/27/a-fast-alternative-to-the-modulo-reduction/).
/// Maps the low 32 bits of `hash` uniformly into `[0, n)`.
#[inline]
pub const fn reduce(hash: u32, n: usize) -> usize {
    ((hash as u64 * n as u64) >> 32) as usize
}

/// Truncates an avalanched 64-bit hash down to its low 32 "fingerprint" bits, folding the high
/// half in by xor so both halves of the hash contribute.
#[inline]
pub const fn fingerprint64(hash: u64) -> u64 {
    hash ^ (hash >> 32)
}

/// A fingerprint type a filter can be built over (`u8` or `u16`). The two axes of the crate,
/// fingerprint width and geometry (xor vs. fuse), are orthogonal: this trait is the width axis,
/// and the `Xor<FP>`/`Fuse<FP>` geometries are generic over it rather than hand-duplicated per
/// width.
pub trait Fingerprint:
    Copy + Default + PartialEq + core::ops::BitXor<Output = Self> + 'static
{
    /// Width of this fingerprint on the wire and in memory, in bytes.
    const BYTES: usize;

    /// Truncates an avalanched hash down to this fingerprint's width.
    fn truncate(hash: u64) -> Self;

    /// `true` iff every bit of this fingerprint is zero. Used by the packed wire format to
    /// decide whether a cell is worth storing.
    fn is_zero(&self) -> bool;

    /// Writes `self` to `out` in native byte order. `out.len()` must equal `Self::BYTES`.
    fn write_ne(&self, out: &mut [u8]);

    /// Reads a value from `bytes` in native byte order. `bytes.len()` must equal `Self::BYTES`.
    fn read_ne(bytes: &[u8]) -> Self;
}

impl Fingerprint for u8 {
    const BYTES: usize = 1;

    #[inline]
    fn truncate(hash: u64) -> Self {
        fingerprint64(hash) as u8
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0
    }

    #[inline]
    fn write_ne(&self, out: &mut [u8]) {
        out[0] = *self;
    }

    #[inline]
    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl Fingerprint for u16 {
    const BYTES: usize = 2;

    #[inline]
    fn truncate(hash: u64) -> Self {
        fingerprint64(hash) as u16
    }

    #[inline]
    fn is_zero(&self) -> bool {
        *self == 0
    }

    #[inline]
    fn write_ne(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_ne_bytes());
    }

    #[inline]
    fn read_ne(bytes: &[u8]) -> Self {
        u16::from_ne_bytes([bytes[0], bytes[1]])
    }
}

/// Creates a block to store output fingerprints.
///
/// Inevitably some fingerprint entries will not be used. If all of these unused entries are 0,
/// then the false-positive rate for an element x where fingerprint(x) = 0 is significantly higher
/// than if the unused entries are uniformly random. The tradeoff is that generating random
/// elements is more expensive than memsetting a bunch of zeroes, so the option is configurable
/// with the `uniform-random` feature.
#[cfg(feature = "uniform-random")]
pub fn make_fp_block<FP>(size: usize) -> Box<[FP]>
where
    FP: Fingerprint,
    rand::distributions::Standard: rand::distributions::Distribution<FP>,
{
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut block = Vec::with_capacity(size);
    for _ in 0..size {
        block.push(rng.gen());
    }
    block.into_boxed_slice()
}

/// Creates a block to store output fingerprints, zeroed.
#[cfg(not(feature = "uniform-random"))]
pub fn make_fp_block<FP: Fingerprint>(size: usize) -> Box<[FP]> {
    alloc::vec![FP::default(); size].into_boxed_slice()
}
