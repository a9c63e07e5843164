#[cfg(test)]
mod rand_test;

use rand::Rng;

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RUNES_CANDIDATE_ID: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+/";

/// ufrag is at least 24 bits of randomness (RFC 8445 5.3); 16 characters
/// gives plenty of margin.
const UFRAG_LEN: usize = 16;
/// pwd must be at least 128 bits; 24 characters over a 64-symbol alphabet
/// comfortably exceeds it and satisfies the >= 22 character floor.
const PWD_LEN: usize = 24;

fn random_string(runes: &[u8], n: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..n)
        .map(|_| runes[rng.gen_range(0..runes.len())] as char)
        .collect()
}

/// Generates an ICE username fragment.
pub fn generate_ufrag() -> String {
    random_string(RUNES_ALPHA, UFRAG_LEN)
}

/// Generates an ICE password.
pub fn generate_pwd() -> String {
    random_string(RUNES_CANDIDATE_ID, PWD_LEN)
}

/// Generates a candidate identifier.
pub fn generate_cand_id() -> String {
    format!("candidate:{}", random_string(RUNES_CANDIDATE_ID, 24))
}
