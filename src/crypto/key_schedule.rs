//! C3: session key derivation.
//!
//! After a successful two-leg authentication (see [`crate::auth`]) both
//! sides hold the long-term key `K` and the two 16-byte nonces `rndA`
//! (generated host-side) and `rndB` (generated reader-side). Four AES-128
//! keys are derived from these: `SignAB`/`SignBA` (HMAC keys for the host
//! to reader, respectively the reader to host sign direction), and
//! `CipherAB`/`CipherBA` (the matching encryption keys). Keys must be
//! distinct per direction and per purpose, and must never equal `K` itself.
//!
//! The derivation: a 16-byte seed key is taken from
//! `HMAC-SHA256(K, rndA || rndB)`, truncated to its first half. Each of the
//! four keys is then one AES-128-ECB encryption, under that seed key, of
//! `rndA XOR rndB` with a role tag folded into the last byte — four
//! independent single-block permutations of the same fold value.

use super::primitives::{aes128_ecb_encrypt_block, hmac_sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

const TAG_SIGN_AB: u8 = 0x01;
const TAG_SIGN_BA: u8 = 0x02;
const TAG_CIPHER_AB: u8 = 0x03;
const TAG_CIPHER_BA: u8 = 0x04;

/// The four session keys derived for one authenticated session. Zeroized on
/// drop so a dropped [`crate::SscpContext`] never leaves session key
/// material lying around in freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    pub sign_ab: [u8; 16],
    pub sign_ba: [u8; 16],
    pub cipher_ab: [u8; 16],
    pub cipher_ba: [u8; 16],
}

fn fold_nonces(rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> [u8; 16] {
    let mut fold = [0u8; 16];
    for i in 0..16 {
        fold[i] = rnd_a[i] ^ rnd_b[i];
    }
    fold
}

fn derive_one(seed_key: &[u8; 16], fold: &[u8; 16], tag: u8) -> [u8; 16] {
    let mut block = *fold;
    block[15] ^= tag;
    aes128_ecb_encrypt_block(seed_key, &block)
}

/// Derive [`SessionKeys`] from the long-term key `k` and the two
/// authentication nonces.
pub fn compute_session_keys(k: &[u8; 16], rnd_a: &[u8; 16], rnd_b: &[u8; 16]) -> SessionKeys {
    let mut seed_input = Vec::with_capacity(32);
    seed_input.extend_from_slice(rnd_a);
    seed_input.extend_from_slice(rnd_b);
    let seed_mac = hmac_sha256(k, &seed_input);
    let seed_key: [u8; 16] = seed_mac[..16].try_into().unwrap();

    let fold = fold_nonces(rnd_a, rnd_b);

    let keys = SessionKeys {
        sign_ab: derive_one(&seed_key, &fold, TAG_SIGN_AB),
        sign_ba: derive_one(&seed_key, &fold, TAG_SIGN_BA),
        cipher_ab: derive_one(&seed_key, &fold, TAG_CIPHER_AB),
        cipher_ba: derive_one(&seed_key, &fold, TAG_CIPHER_BA),
    };

    seed_input.zeroize();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: [u8; 16] = [
        0xE7, 0x4A, 0x54, 0x0F, 0xA0, 0x7C, 0x4D, 0xB1, 0xB4, 0x64, 0x21, 0x12, 0x6D, 0xF7, 0xAD, 0x36,
    ];
    const RND_A: [u8; 16] = [
        0x75, 0xCC, 0xF7, 0xB1, 0xF7, 0xFE, 0xA6, 0xF7, 0x58, 0x71, 0xFC, 0xF6, 0xDC, 0x75, 0x59, 0x23,
    ];
    const RND_B: [u8; 16] = [0x11u8; 16];

    #[test]
    fn keys_are_deterministic() {
        let a = compute_session_keys(&K, &RND_A, &RND_B);
        let b = compute_session_keys(&K, &RND_A, &RND_B);
        assert_eq!(a.sign_ab, b.sign_ab);
        assert_eq!(a.cipher_ba, b.cipher_ba);
    }

    #[test]
    fn all_four_keys_are_pairwise_distinct() {
        let keys = compute_session_keys(&K, &RND_A, &RND_B);
        let all = [keys.sign_ab, keys.sign_ba, keys.cipher_ab, keys.cipher_ba];
        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i], all[j], "keys at {i} and {j} collided");
            }
        }
    }

    #[test]
    fn no_derived_key_equals_the_long_term_key() {
        let keys = compute_session_keys(&K, &RND_A, &RND_B);
        assert_ne!(keys.sign_ab, K);
        assert_ne!(keys.sign_ba, K);
        assert_ne!(keys.cipher_ab, K);
        assert_ne!(keys.cipher_ba, K);
    }

    #[test]
    fn swapping_nonce_order_changes_keys() {
        let forward = compute_session_keys(&K, &RND_A, &RND_B);
        let swapped = compute_session_keys(&K, &RND_B, &RND_A);
        // rndA XOR rndB == rndB XOR rndA, but the seed key is not symmetric
        // in its inputs, so the derived keys must differ.
        assert_ne!(forward.cipher_ab, swapped.cipher_ab);
    }
}
