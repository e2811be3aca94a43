//! C4: mutual authentication and session establishment.

use crate::context::SscpContext;
use crate::crypto::{compute_session_keys, get_random, hmac_sha256};
use crate::error::{Result, SscpError};
use crate::selftest;
use tracing::trace;

/// Built-in authentication key, used when the caller omits one.
pub const DEFAULT_AUTH_KEY: [u8; 16] = [
    0xE7, 0x4A, 0x54, 0x0F, 0xA0, 0x7C, 0x4D, 0xB1, 0xB4, 0x64, 0x21, 0x12, 0x6D, 0xF7, 0xAD, 0x36,
];

/// Protocol byte used by both authentication legs.
pub const PROTOCOL_AUTHENTICATE: u8 = 0x20;

/// Run the two-leg mutual authentication handshake against `ctx`'s
/// transport, deriving and installing session keys on success. `key`
/// defaults to [`DEFAULT_AUTH_KEY`] when `None`.
pub fn authenticate(ctx: &mut SscpContext, key: Option<&[u8; 16]>) -> Result<()> {
    let key = key.copied().unwrap_or(DEFAULT_AUTH_KEY);

    let mut rnd_a = [0u8; 16];
    if ctx.config.self_test {
        rnd_a = selftest::RND_A;
    } else {
        get_random(&mut rnd_a);
    }

    // Leg 1: 00 00 || rndA
    let mut leg1 = Vec::with_capacity(18);
    leg1.extend_from_slice(&[0x00, 0x00]);
    leg1.extend_from_slice(&rnd_a);

    let leg1_response = if ctx.config.self_test {
        selftest::AUTH_LEG1_RESPONSE.to_vec()
    } else {
        ctx.exchange_raw(PROTOCOL_AUTHENTICATE, &leg1)?
    };

    if leg1_response.len() < 4 + 4 + 16 + 16 + 32 {
        return Err(SscpError::WrongResponseLength);
    }

    let b: [u8; 4] = leg1_response[0..4].try_into().unwrap();
    let a: [u8; 4] = leg1_response[4..8].try_into().unwrap();
    let rnd_a_echo: [u8; 16] = leg1_response[8..24].try_into().unwrap();
    let rnd_b: [u8; 16] = leg1_response[24..40].try_into().unwrap();
    let h_b_received = &leg1_response[40..72];
    let _ = rnd_a_echo; // opaque at this layer, per spec.md

    let h_b = hmac_sha256(&key, &leg1_response[..40]);
    if h_b != h_b_received {
        return Err(SscpError::WrongResponseSignature);
    }
    trace!("authentication leg 1 signature verified");

    // Leg 2: A || rndB || hA
    let mut leg2_signed = Vec::with_capacity(20);
    leg2_signed.extend_from_slice(&a);
    leg2_signed.extend_from_slice(&rnd_b);
    let h_a = hmac_sha256(&key, &leg2_signed);

    let mut leg2 = leg2_signed;
    leg2.extend_from_slice(&h_a);

    let leg2_response = if ctx.config.self_test {
        selftest::AUTH_LEG2_ACK.to_vec()
    } else {
        ctx.exchange_raw(PROTOCOL_AUTHENTICATE, &leg2)?
    };
    let _ = leg2_response; // content is an opaque ACK, per spec.md

    let keys = compute_session_keys(&key, &rnd_a, &rnd_b);
    ctx.session_keys = Some(keys);
    ctx.counter = 1;
    ctx.record_session_established();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SscpConfig;

    #[test]
    fn self_test_authentication_derives_session_and_sets_counter() {
        let mut ctx = SscpContext::new(SscpConfig::self_test());
        authenticate(&mut ctx, None).unwrap();
        assert!(ctx.authenticated());
        assert_eq!(ctx.counter, 1);
    }

    #[test]
    fn wrong_leg1_signature_is_rejected() {
        let mut ctx = SscpContext::new(SscpConfig::self_test());
        // Corrupt the canned self-test vector's signature by authenticating
        // under a key that does not match the vector's HMAC.
        let wrong_key = [0xFFu8; 16];
        let rc = authenticate(&mut ctx, Some(&wrong_key));
        assert_eq!(rc, Err(SscpError::WrongResponseSignature));
        assert!(!ctx.authenticated());
    }
}
