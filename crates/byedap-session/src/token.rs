//! Random token generation for sentinels and socket names
//!
//! Tokens are short lowercase-alphabetic strings. They are not cryptographic:
//! a collision only risks a false-positive handshake match against program
//! output, which at ten characters is astronomically unlikely.

use rand::Rng;

/// Generate a random string of `len` lowercase ASCII letters.
pub fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'a' + rng.random_range(0..26)))
        .collect()
}
