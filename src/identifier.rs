//! Ring identifier arithmetic: hashing and the clockwise "between" predicate.

use sha1::{Digest, Sha1};

/// Number of bits in the identifier space. All ids live in `[0, 2^M)`.
pub const M: u32 = 16;

/// A point on the ring.
pub type Id = u64;

/// `2^M`, i.e. one past the largest valid id.
pub const fn ring_size() -> u64 {
    1u64 << M
}

/// `H(s) = int(SHA1(utf8(s))) mod 2^M`.
///
/// `mod 2^M` only depends on the low-order `M` bits of the digest, which
/// (for byte-aligned `M`, the only case this crate supports) are exactly
/// its trailing `M / 8` bytes in big-endian order.
pub fn hash(s: &str) -> Id {
    debug_assert_eq!(M % 8, 0, "M must be byte-aligned");
    let mut hasher = Sha1::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    let num_bytes = (M / 8) as usize;
    let mut acc: u64 = 0;
    for byte in &digest[digest.len() - num_bytes..] {
        acc = (acc << 8) | (*byte as u64);
    }
    acc
}

/// Id of a `NodeRef`-like `(address, port)` pair, as specified: `H(address + ":" + port)`.
pub fn hash_address(address: &str, port: u16) -> Id {
    hash(&format!("{}:{}", address, port))
}

/// True iff `x` lies on the clockwise half-open arc `(a, b]`.
///
/// - if `a < b`:  `a < x <= b`
/// - if `a == b`: the whole ring, always true
/// - if `a > b`:  `x > a || x <= b`
pub fn between(x: Id, a: Id, b: Id) -> bool {
    match a.cmp(&b) {
        std::cmp::Ordering::Less => a < x && x <= b,
        std::cmp::Ordering::Equal => true,
        std::cmp::Ordering::Greater => x > a || x <= b,
    }
}

/// True iff `x` lies on the clockwise open arc `(a, b)`, used by
/// `closest_preceding_node` to scan fingers strictly between self and target.
pub fn between_open(x: Id, a: Id, b: Id) -> bool {
    if a == b {
        // open interval around the whole ring excludes both endpoints, i.e. everything but a.
        return x != a;
    }
    if a < b {
        a < x && x < b
    } else {
        x > a || x < b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_matches_scenario_s6() {
        assert!(between(15, 10, 20));
        assert!(between(20, 10, 20));
        assert!(!between(10, 10, 20));
        assert!(between(0, 7, 7));
    }

    #[test]
    fn between_wraps_clockwise() {
        // a > b: arc wraps through 0
        assert!(between(60000, 50000, 100));
        assert!(between(50, 50000, 100));
        assert!(!between(20000, 50000, 100));
    }

    #[test]
    fn hash_is_deterministic_and_in_range() {
        let a = hash("key-0");
        let b = hash("key-0");
        assert_eq!(a, b);
        assert!(a < ring_size());
    }

    #[test]
    fn hash_address_matches_spec_format() {
        assert_eq!(hash_address("127.0.0.1", 50001), hash("127.0.0.1:50001"));
    }

    #[test]
    fn between_open_excludes_endpoints() {
        assert!(!between_open(10, 10, 20));
        assert!(!between_open(20, 10, 20));
        assert!(between_open(15, 10, 20));
    }
}
