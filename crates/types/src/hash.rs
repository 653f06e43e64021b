use blake3::Hasher as Blake3;

/// 32-byte BLAKE3 digest.
pub type Hash32 = [u8; 32];

/// Parent hash of the genesis block and the root of an empty transaction list.
pub const ZERO_HASH: Hash32 = [0u8; 32];

/// Hash a single byte string.
pub fn hash_bytes(data: &[u8]) -> Hash32 {
    *blake3::hash(data).as_bytes()
}

/// Lowercase hex encoding, used for storage keys and log fields.
pub fn hash_hex(hash: &Hash32) -> String {
    hex::encode(hash)
}

/// First eight hex characters of a digest.
pub fn short_hex(hash: &Hash32) -> String {
    hex::encode(&hash[..4])
}

/// Parse a 64-character hex digest.
pub fn parse_hash_hex(value: &str) -> Option<Hash32> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).ok()?;
    bytes.try_into().ok()
}

/// Binary Merkle root over an ordered list of digests.
///
/// An odd node at any level is paired with itself; the empty list yields
/// [`ZERO_HASH`] and a single element is its own root.
pub fn merkle_root(items: &[Hash32]) -> Hash32 {
    if items.is_empty() {
        return ZERO_HASH;
    }

    let mut level: Vec<Hash32> = items.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let left = pair[0];
            let right = if pair.len() == 2 { pair[1] } else { pair[0] };
            let mut hasher = Blake3::new();
            hasher.update(&left);
            hasher.update(&right);
            next.push(*hasher.finalize().as_bytes());
        }
        level = next;
    }

    level[0]
}
