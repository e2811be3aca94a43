//! C2: thin typed wrapper over the primitive crypto operations the protocol
//! needs. Swapping the algorithms here would break wire compatibility with a
//! real reader, so this module is intentionally minimal — a seam, not a
//! crypto library.

use crate::error::{Result, SscpError};
use aes::cipher::{generic_array::GenericArray, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::cipher::block_padding::NoPadding;
use aes::Aes128;
use cbc::{Decryptor, Encryptor};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;
type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;

/// `HMAC(key16, buf) -> mac32`.
pub fn hmac_sha256(key: &[u8; 16], buf: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(buf);
    mac.finalize().into_bytes().into()
}

/// AES-128-CBC encrypt `buf` in place. `buf.len()` must already be a
/// multiple of 16; the protocol layer is responsible for padding before
/// calling this.
pub fn aes128_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut Vec<u8>) -> Result<()> {
    if buf.len() % 16 != 0 {
        return Err(SscpError::InternalFailure);
    }
    let len = buf.len();
    let ct = Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| SscpError::InternalFailure)?;
    let ct_len = ct.len();
    buf.truncate(ct_len);
    Ok(())
}

/// Inverse of [`aes128_cbc_encrypt`].
pub fn aes128_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut Vec<u8>) -> Result<()> {
    if buf.len() % 16 != 0 {
        return Err(SscpError::InternalFailure);
    }
    let pt = Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| SscpError::InternalFailure)?;
    let pt_len = pt.len();
    buf.truncate(pt_len);
    Ok(())
}

/// Single-block AES-128-ECB encryption, used only by the key schedule (C3)
/// to turn derivation constants into session key material.
pub fn aes128_ecb_encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut b = *GenericArray::from_slice(block);
    cipher.encrypt_block(&mut b);
    b.into()
}

/// Fill `buf` with cryptographically strong random bytes.
pub fn get_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbc_roundtrip_preserves_plaintext() {
        let key = [0x11u8; 16];
        let iv = [0x22u8; 16];
        let mut buf = b"0123456789ABCDEF0123456789ABCDEF".to_vec();
        buf.truncate(32); // two full blocks
        let original = buf.clone();

        aes128_cbc_encrypt(&key, &iv, &mut buf).unwrap();
        assert_ne!(buf, original);
        aes128_cbc_decrypt(&key, &iv, &mut buf).unwrap();
        assert_eq!(buf, original);
    }

    #[test]
    fn cbc_rejects_misaligned_length() {
        let key = [0u8; 16];
        let iv = [0u8; 16];
        let mut buf = vec![0u8; 17];
        assert!(aes128_cbc_encrypt(&key, &iv, &mut buf).is_err());
    }

    #[test]
    fn cbc_misroutes_keys_detectably() {
        // Invariant from the spec: Decrypt(CipherBA, IV, Encrypt(CipherAB, IV, P)) != P
        // when the keys differ, catching a misrouted session key.
        let key_ab = [0x01u8; 16];
        let key_ba = [0x02u8; 16];
        let iv = [0x03u8; 16];
        let mut buf = vec![0xAAu8; 16];
        let original = buf.clone();

        aes128_cbc_encrypt(&key_ab, &iv, &mut buf).unwrap();
        aes128_cbc_decrypt(&key_ba, &iv, &mut buf).unwrap();
        assert_ne!(buf, original);
    }

    #[test]
    fn hmac_is_deterministic_and_key_sensitive() {
        let key_a = [0x01u8; 16];
        let key_b = [0x02u8; 16];
        let data = b"authenticate me";
        assert_eq!(hmac_sha256(&key_a, data), hmac_sha256(&key_a, data));
        assert_ne!(hmac_sha256(&key_a, data), hmac_sha256(&key_b, data));
    }

    #[test]
    fn ecb_block_is_reversible_by_decrypt() {
        use aes::cipher::BlockDecrypt;
        let key = [0x05u8; 16];
        let block = [0x10u8; 16];
        let encrypted = aes128_ecb_encrypt_block(&key, &block);
        assert_ne!(encrypted, block);

        let cipher = Aes128::new(GenericArray::from_slice(&key));
        let mut b = *GenericArray::from_slice(&encrypted);
        cipher.decrypt_block(&mut b);
        let decrypted: [u8; 16] = b.into();
        assert_eq!(decrypted, block);
    }
}
