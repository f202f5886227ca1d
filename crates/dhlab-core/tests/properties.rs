//! Property-based tests for the arithmetic and signature layers.

use dhlab_core::{
    DomainParameters, ExchangeSession, Modulus, SigningKey, derive_shared_secret, pow, pow_trace,
    sign, verify,
};
use proptest::prelude::*;

/// 65521 * 65519, e = 65537.
const LARGE_MODULUS: u64 = 4_292_870_399;
const LARGE_PUBLIC: u64 = 65_537;
const LARGE_PRIVATE: u64 = 1_475_213_633;

fn naive_pow(base: u64, exponent: u64, modulus: u64) -> u64 {
    let mut result = 1 % modulus;
    for _ in 0..exponent {
        result = result * (base % modulus) % modulus;
    }
    result
}

fn lifecycle_group() -> DomainParameters {
    DomainParameters::new(2_147_483_647, 7).unwrap()
}

proptest! {
    #[test]
    fn pow_matches_repeated_multiplication(
        base in 0u64..1000,
        exponent in 0u64..200,
        modulus in 1u64..5000,
    ) {
        let m = Modulus::new(modulus).unwrap();
        prop_assert_eq!(pow(base, exponent, m), naive_pow(base, exponent, modulus));
    }

    #[test]
    fn pow_stays_below_modulus(
        base in any::<u64>(),
        exponent in any::<u64>(),
        modulus in 1u64..=(1u64 << 32),
    ) {
        let m = Modulus::new(modulus).unwrap();
        prop_assert!(pow(base, exponent, m) < modulus);
    }

    #[test]
    fn exponents_commute(a in 1u64..2_147_483_646, b in 1u64..2_147_483_646) {
        let params = lifecycle_group();
        let m = params.modulus();
        let g = params.generator();
        prop_assert_eq!(pow(pow(g, a, m), b, m), pow(pow(g, b, m), a, m));
    }

    #[test]
    fn trace_agrees_with_pow(base in 0u64..100_000, exponent in 0u64..100_000) {
        let m = Modulus::new(2_147_483_647).unwrap();
        let trace = pow_trace(base, exponent, m);
        prop_assert_eq!(trace.result, pow(base, exponent, m));
    }

    #[test]
    fn honest_exchange_agrees_or_rejects_weak_keys(a in 1u64..=22, b in 1u64..=22) {
        match ExchangeSession::run(DomainParameters::educational(), a, b) {
            Ok(session) => {
                let secret = session.shared_secret();
                prop_assert!(secret.is_some());
                prop_assert_eq!(session.shared_secret_a(), session.shared_secret_b());
            },
            Err(err) => {
                // 5^11 = 22 and 5^22 = 1 are the only weak public keys
                prop_assert!(err.is_weak_key());
                prop_assert!([11, 22].contains(&a) || [11, 22].contains(&b));
            },
        }
    }

    #[test]
    fn derivation_is_symmetric_in_large_group(
        a in 2u64..2_147_483_645,
        b in 2u64..2_147_483_645,
    ) {
        let params = lifecycle_group();
        let public_a = pow(params.generator(), a, params.modulus());
        let public_b = pow(params.generator(), b, params.modulus());
        prop_assume!(public_a > 1 && public_a < params.prime() - 1);
        prop_assume!(public_b > 1 && public_b < params.prime() - 1);

        prop_assert_eq!(
            derive_shared_secret(a, public_b, &params).unwrap(),
            derive_shared_secret(b, public_a, &params).unwrap()
        );
    }

    #[test]
    fn signatures_verify(message in ".{0,64}") {
        let signature = sign(&message, LARGE_PRIVATE, LARGE_MODULUS).unwrap();
        prop_assert!(verify(&message, &signature, LARGE_PUBLIC, LARGE_MODULUS));
    }

    #[test]
    fn altered_signature_fails(message in ".{0,64}") {
        let mut signature = sign(&message, LARGE_PRIVATE, LARGE_MODULUS).unwrap();
        signature.value = (signature.value + 1) % LARGE_MODULUS;
        prop_assert!(!verify(&message, &signature, LARGE_PUBLIC, LARGE_MODULUS));
    }

    #[test]
    fn authority_signatures_verify(public_key in 2u64..22) {
        let key = SigningKey::authority();
        let message = format!("DH_PUBLIC_KEY:{public_key}");
        let signature = key.sign(&message);
        prop_assert!(key.verifying_key().check(&message, &signature).is_valid());
    }
}

#[test]
fn large_signing_key_is_consistent() {
    assert!(SigningKey::new(LARGE_MODULUS, LARGE_PUBLIC, LARGE_PRIVATE).is_ok());
}
