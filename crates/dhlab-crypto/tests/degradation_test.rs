//! Production-mode behaviour across providers.

use dhlab_core::DomainParameters;
use dhlab_crypto::{
    CryptoProvider, DEFAULT_DERIVED_BITS, DalekProvider, ExchangeOutcome, Group, Mode,
    ProviderError, SymmetricCipher, UnavailableProvider, hybrid_demo, provider_exchange,
    run_exchange,
};
use dhlab_harness::SimEnv;

#[tokio::test]
async fn seeded_production_exchange_is_reproducible() {
    let first = provider_exchange(&DalekProvider::new(SimEnv::with_seed(10)), Group::X25519, 128)
        .await
        .unwrap();
    let second = provider_exchange(&DalekProvider::new(SimEnv::with_seed(10)), Group::X25519, 128)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.shared_bits.len(), 16);
    assert_eq!(first.provider, "x25519-dalek");
}

#[tokio::test]
async fn every_capability_of_an_unavailable_provider_degrades() {
    let provider = UnavailableProvider;
    let errors = [
        provider.encrypt(&[0; 32], &[0; 24], b"x").await.unwrap_err(),
        provider.decrypt(&[0; 32], &[0; 24], b"x").await.unwrap_err(),
        provider.generate_key_pair(Group::X25519).await.unwrap_err(),
    ];
    assert!(errors.iter().all(ProviderError::is_unavailable));
}

#[tokio::test]
async fn degraded_outcome_carries_reason() {
    let env = SimEnv::with_seed(11);
    let outcome = run_exchange(
        Mode::Production,
        &UnavailableProvider,
        &env,
        &DomainParameters::educational(),
    )
    .await
    .unwrap();

    let ExchangeOutcome::Pedagogical { degraded_from: Some(reason), .. } = &outcome else {
        panic!("expected degradation");
    };
    assert!(reason.is_unavailable());
}

#[tokio::test]
async fn hybrid_production_matches_derived_key_length() {
    let env = SimEnv::with_seed(12);
    let provider = DalekProvider::new(env.clone());
    let transcript = hybrid_demo(
        Mode::Production,
        &provider,
        &env,
        &DomainParameters::educational(),
        b"forward secrecy",
    )
    .await
    .unwrap();

    let ExchangeOutcome::Production(exchange) = &transcript.exchange else {
        panic!("expected production exchange");
    };
    assert_eq!(exchange.shared_bits.len() * 8, DEFAULT_DERIVED_BITS);
    assert_ne!(transcript.ciphertext, b"forward secrecy");
    assert!(transcript.round_trips(b"forward secrecy"));
}
