//! Stable content hashing for deduplication keys and blob names.
//!
//! FNV-1a 64-bit over little-endian byte views of the hashed buffers, so a
//! digest computed on one machine names the same blob on another.
//! FNV-1a is not cryptographically secure; it only needs to be stable.

/// 64-bit FNV-1a offset basis.
pub const FNV1A_OFFSET_BASIS_64: u64 = 0xcbf29ce484222325;
/// 64-bit FNV-1a prime.
pub const FNV1A_PRIME_64: u64 = 0x0000_0100_0000_01B3;

/// Mix bytes into an existing FNV-1a 64-bit hash state.
#[inline]
pub const fn fnv1a64_mix(mut hash: u64, bytes: &[u8]) -> u64 {
    let mut i = 0usize;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV1A_PRIME_64);
        i += 1;
    }
    hash
}

/// Hash an arbitrary byte slice with FNV-1a 64-bit.
#[inline]
pub const fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_mix(FNV1A_OFFSET_BASIS_64, bytes)
}

/// Incremental hasher over typed buffers.
///
/// Every `write_*` call is length-prefixed so that `[a, b] + [c]` and
/// `[a] + [b, c]` hash differently.
#[derive(Clone, Copy, Debug)]
pub struct StableHasher {
    state: u64,
}

impl StableHasher {
    pub fn new() -> Self {
        Self {
            state: FNV1A_OFFSET_BASIS_64,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.state = fnv1a64_mix(self.state, &(bytes.len() as u64).to_le_bytes());
        self.state = fnv1a64_mix(self.state, bytes);
        self
    }

    pub fn write_str(&mut self, s: &str) -> &mut Self {
        self.write_bytes(s.as_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write_bytes(&value.to_le_bytes())
    }

    pub fn write_f64s(&mut self, values: &[f64]) -> &mut Self {
        #[cfg(target_endian = "little")]
        {
            self.write_bytes(bytemuck::cast_slice(values))
        }
        #[cfg(not(target_endian = "little"))]
        {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            self.write_bytes(&bytes)
        }
    }

    pub fn write_u64s(&mut self, values: &[u64]) -> &mut Self {
        #[cfg(target_endian = "little")]
        {
            self.write_bytes(bytemuck::cast_slice(values))
        }
        #[cfg(not(target_endian = "little"))]
        {
            let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
            self.write_bytes(&bytes)
        }
    }

    pub fn finish(&self) -> u64 {
        self.state
    }
}

impl Default for StableHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width lowercase hex rendering used in blob file names.
pub fn digest_hex(digest: u64) -> String {
    format!("{digest:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv_reference_vectors() {
        assert_eq!(fnv1a64(b""), FNV1A_OFFSET_BASIS_64);
        assert_eq!(fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn length_prefix_separates_buffers() {
        let mut a = StableHasher::new();
        a.write_f64s(&[1.0, 2.0]).write_f64s(&[3.0]);
        let mut b = StableHasher::new();
        b.write_f64s(&[1.0]).write_f64s(&[2.0, 3.0]);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn hex_is_fixed_width() {
        assert_eq!(digest_hex(0xab), "00000000000000ab");
    }
}
