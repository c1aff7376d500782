//! Hashers shared by the unit tests.

use core::hash::BuildHasher;
use core::hash::Hasher;

use rand::TryRngCore;
use rand::rngs::OsRng;
use siphasher::sip::SipHasher;

/// Keyed SipHash with random keys, so tests do not depend on a fixed layout.
#[derive(Clone)]
pub(crate) struct SipHashBuilder {
    k0: u64,
    k1: u64,
}

impl Default for SipHashBuilder {
    fn default() -> Self {
        let mut rng = OsRng;
        Self {
            k0: rng.try_next_u64().unwrap_or(0),
            k1: rng.try_next_u64().unwrap_or(0),
        }
    }
}

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> SipHasher {
        SipHasher::new_with_keys(self.k0, self.k1)
    }
}

/// Hashes an integer key to itself. With a native size of 8, key `k` starts
/// probing at slot `k % 8`, which makes collisions and wraparound easy to set
/// up by hand.
#[derive(Clone, Copy, Default)]
pub(crate) struct IdentityState;

pub(crate) struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 = (self.0 << 8) | u64::from(*byte);
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

impl BuildHasher for IdentityState {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}
