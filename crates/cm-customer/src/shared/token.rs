//! Random token and code generation.
//!
//! All values come from the thread-local CSPRNG.

use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// Random bytes behind an email verification token (64 hex chars).
pub const VERIFY_TOKEN_BYTES: usize = 32;

/// Random bytes behind a signup temp token (32 hex chars).
pub const TEMP_TOKEN_BYTES: usize = 16;

/// Random bytes behind a raw API access key.
pub const ACCESSKEY_TOKEN_BYTES: usize = 32;

/// Hex-encode `len` random bytes.
pub fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn generate_verify_token() -> String {
    random_hex(VERIFY_TOKEN_BYTES)
}

pub fn generate_temp_token() -> String {
    random_hex(TEMP_TOKEN_BYTES)
}

/// Six-digit one-time code, uniform over `100000..=999999`.
pub fn generate_otp() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("{:06}", code)
}

/// Hex SHA-256 of the input.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lengths() {
        assert_eq!(generate_verify_token().len(), 64);
        assert_eq!(generate_temp_token().len(), 32);
        assert!(generate_temp_token().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_verify_token(), generate_verify_token());
    }

    #[test]
    fn test_otp_range() {
        for _ in 0..1000 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let value: u32 = otp.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
