//! A hashing proxy that lets arbitrary [`Hash`] types ride on top of a
//! `Filter<u64>`.

use crate::{Error, Filter};
use alloc::vec::Vec;
use core::convert::TryFrom;
use core::hash::{Hash, Hasher};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "bincode")]
use bincode::{Decode, Encode};

/// Arbitrary key type proxy for the four filter types.
///
/// A `HashProxy` exposes a [`Filter`] trait for arbitrary key types, using a
/// `Filter<u64>` as an underlying keystore. The performance and collision
/// rate of the `HashProxy` filter depends on the choice of [`Hasher`] and
/// underlying [`Filter`]. A `HashProxy` is immutable once constructed.
///
/// ```
/// # extern crate alloc;
/// # extern crate std;
/// use std::collections::hash_map::DefaultHasher;
/// use amq_filters::{Filter, HashProxy, Xor8};
/// use core::convert::TryFrom;
/// # use alloc::vec::Vec;
/// # use rand::distributions::Alphanumeric;
/// # use rand::Rng;
///
/// const SAMPLE_SIZE: usize = 100_000;
/// let passwords: Vec<String> = (0..SAMPLE_SIZE)
///     .map(|_| rand::thread_rng().sample_iter(&Alphanumeric).take(30).map(char::from).collect())
///     .collect();
///
/// let pw_filter: HashProxy<String, DefaultHasher, Xor8> = HashProxy::try_from(&passwords).unwrap();
///
/// for password in passwords {
///     assert!(pw_filter.contains(&password));
/// }
/// ```
///
/// While a `HashProxy` persists type information about the keys it is
/// constructed with, in most cases the key type parameter can be elided.
/// Because of it, the existence of a key can only be checked using types a
/// `HashProxy` is constructed with — passing a pre-hashed `u64` of the same
/// value will not compile against the original key type.
///
/// [`Filter`]: crate::Filter
/// [`Hasher`]: core::hash::Hasher
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "bincode", derive(Encode, Decode))]
#[derive(Debug, Clone)]
pub struct HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    filter: F,
    _hasher: core::marker::PhantomData<H>,
    _type: core::marker::PhantomData<T>,
}

#[inline]
fn hash<T: Hash, H: Hasher + Default>(key: &T) -> u64 {
    let mut hasher = H::default();
    key.hash(&mut hasher);
    hasher.finish()
}

impl<T, H, F> Filter<T> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64>,
{
    /// Returns `true` if the underlying filter contains the specified key.
    fn contains(&self, key: &T) -> bool {
        self.filter.contains(&hash::<T, H>(key))
    }

    fn len(&self) -> usize {
        self.filter.len()
    }
}

impl<T, H, F> TryFrom<&[T]> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64> + TryFrom<Vec<u64>, Error = Error>,
{
    type Error = Error;

    fn try_from(keys: &[T]) -> Result<Self, Error> {
        let keys: Vec<u64> = keys.iter().map(hash::<T, H>).collect();
        Ok(Self {
            filter: F::try_from(keys)?,
            _hasher: core::marker::PhantomData,
            _type: core::marker::PhantomData,
        })
    }
}

impl<T, H, F> TryFrom<&Vec<T>> for HashProxy<T, H, F>
where
    T: Hash,
    H: Hasher + Default,
    F: Filter<u64> + TryFrom<Vec<u64>, Error = Error>,
{
    type Error = Error;

    fn try_from(v: &Vec<T>) -> Result<Self, Error> {
        Self::try_from(v.as_slice())
    }
}

#[cfg(test)]
mod test {
    use crate::{Filter, Fuse8, HashProxy, Xor16, Xor8};

    use alloc::vec::Vec;
    use core::convert::TryFrom;
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    extern crate std;
    use std::collections::hash_map::DefaultHasher;
    use std::string::String;

    #[test]
    fn test_initialization_from() {
        const SAMPLE_SIZE: usize = 100_000;
        let keys: Vec<String> = (0..SAMPLE_SIZE)
            .map(|_| {
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(15)
                    .map(char::from)
                    .collect()
            })
            .collect();

        macro_rules! drive_test {
            ($filter_ty:ty) => {{
                let keys = keys.clone();
                let filter: HashProxy<_, DefaultHasher, $filter_ty> =
                    HashProxy::try_from(&keys).unwrap();
                for key in keys {
                    assert!(filter.contains(&key));
                }
            }};
        }

        drive_test!(Xor8);
        drive_test!(Xor16);
        drive_test!(Fuse8);
    }
}
