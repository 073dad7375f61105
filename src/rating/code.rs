use rand::Rng;

/// Characters allowed in a room code. 32 symbols, chosen so nothing is
/// easily misread when a code is shown on a projector: no 0/O, no 1/I.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a canonical room code
pub const CODE_LEN: usize = 6;

/// Longest raw code input we bother normalizing before lookup
const MAX_RAW_LEN: usize = 32;

/// Draw a random candidate room code.
///
/// Purely memoryless; uniqueness against live rooms is the registry's job.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Normalize a client-supplied room code for lookup: trim, cap runaway
/// input, uppercase, truncate to canonical length. A malformed code comes
/// out as a string that matches no live room, which is all lookup needs.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .take(MAX_RAW_LEN)
        .collect::<String>()
        .to_uppercase()
        .chars()
        .take(CODE_LEN)
        .collect()
}
