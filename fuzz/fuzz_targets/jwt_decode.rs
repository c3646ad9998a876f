#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_access::{decode_jwt_claims_unverified, JwtVerifier};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    if let Ok(claims) = decode_jwt_claims_unverified(&raw) {
        if let Some(principal) = claims.principal() {
            assert!(!principal.username.is_empty());
        }
    }

    let Ok(verifier) = JwtVerifier::new("HS256", "fuzz-secret") else {
        return;
    };
    // Arbitrary input cannot carry a valid signature for the fuzz key.
    assert!(verifier.verify(&raw).is_err());
});
