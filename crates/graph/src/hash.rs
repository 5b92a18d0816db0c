//! Stable hashing for every decision that would otherwise need randomness.
//!
//! Tie-breaks, exploration picks, rotation offsets and alternative jitter all
//! derive from FNV-1a (64-bit) over stable keys (slugs, `source->target`
//! pairs). `std`'s `DefaultHasher` is randomly keyed per process and must
//! never be used here.

const FNV_OFFSET: u64 = 14_695_981_039_346_656_037;
const FNV_PRIME: u64 = 1_099_511_628_211;

pub fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_extend(FNV_OFFSET, bytes)
}

fn fnv1a64_extend(mut hash: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

pub fn stable_hash(key: &str) -> u64 {
    fnv1a64(key.as_bytes())
}

/// Hash of the key `"{source}->{target}"`, without allocating it.
pub fn pair_hash(source: &str, target: &str) -> u64 {
    let hash = fnv1a64_extend(FNV_OFFSET, source.as_bytes());
    let hash = fnv1a64_extend(hash, b"->");
    fnv1a64_extend(hash, target.as_bytes())
}

/// Per-slug pseudo-random stream (splitmix64 seeded from the slug hash)
#[derive(Debug, Clone)]
pub struct Jitter {
    state: u64,
}

impl Jitter {
    pub fn for_slug(slug: &str) -> Self {
        Self {
            state: stable_hash(slug),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `[0, 1)`
    pub fn next_unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}
