//! Stable 64-bit name hashing.
//!
//! Prototype ids and state flag keys/values travel through the command ABI
//! as 64-bit hashes of their names. FNV-1a is used because it is stable
//! across platforms and builds.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// FNV-1a 64 of a name.
pub const fn hash_name(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut h = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        h ^= bytes[i] as u64;
        h = h.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(hash_name(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(hash_name("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_distinct_names() {
        assert_ne!(hash_name("moving"), hash_name("facing"));
        assert_eq!(hash_name("east"), hash_name("east"));
    }
}
