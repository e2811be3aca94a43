//! C2/C3: the crypto seam. `primitives` wraps the raw AES/HMAC/RNG
//! operations; `key_schedule` turns an authentication result into the four
//! session keys the secure exchange engine (C5) signs and encrypts with.

pub mod key_schedule;
pub mod primitives;

pub use key_schedule::{compute_session_keys, SessionKeys};
pub use primitives::{aes128_cbc_decrypt, aes128_cbc_encrypt, aes128_ecb_encrypt_block, get_random, hmac_sha256};
