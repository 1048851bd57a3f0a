// [tests/mirror/libs/core/vault/vault_roundtrip.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL MOTOR DE CUSTODIA
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL CICLO SELLADO -> LEDGER -> APERTURA
 * =================================================================
 */

use chrono::{Duration, Utc};
use showrunner_core_vault::{TokenBundle, VaultCryptoEngine, VaultError};

#[test]
fn certify_seal_open_roundtrip_preserves_material() {
    let engine = VaultCryptoEngine::new("showrunner-ops-master-2026");

    let bundle = TokenBundle {
        access_token: "ya29.a0AfH6-demo-access".into(),
        refresh_token: "1//0demo-refresh".into(),
        expires_at: Utc::now() + Duration::minutes(55),
    };

    let sealed = engine
        .seal_bundle(&bundle)
        .expect("SEAL_FAULT: nominal bundle rejected");

    // El material sellado jamás expone el token en claro.
    assert!(!sealed.contains("demo-access"));

    let recovered = engine
        .open_bundle(&sealed)
        .expect("OPEN_FAULT: sealed bundle rejected by its own engine");

    assert_eq!(recovered.access_token, bundle.access_token);
    assert_eq!(recovered.refresh_token, bundle.refresh_token);
    assert_eq!(
        recovered.expires_at.timestamp(),
        bundle.expires_at.timestamp()
    );
}

#[test]
fn certify_nonce_freshness_produces_distinct_ciphertexts() {
    // Dos sellados del mismo bundle deben divergir (nonce aleatorio):
    // un ciphertext repetido delataría material de llave reutilizado.
    let engine = VaultCryptoEngine::new("showrunner-ops-master-2026");
    let bundle = TokenBundle {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_at: Utc::now(),
    };

    let first = engine.seal_bundle(&bundle).expect("SEAL_FAULT");
    let second = engine.seal_bundle(&bundle).expect("SEAL_FAULT");
    assert_ne!(first, second);
}

#[test]
fn certify_tampered_material_is_vetoed() {
    let engine = VaultCryptoEngine::new("showrunner-ops-master-2026");
    let bundle = TokenBundle {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_at: Utc::now(),
    };

    let sealed = engine.seal_bundle(&bundle).expect("SEAL_FAULT");

    // Mutación de un carácter del material Base64.
    let mut hostile: Vec<char> = sealed.chars().collect();
    let pivot = hostile.len() / 2;
    hostile[pivot] = if hostile[pivot] == 'A' { 'B' } else { 'A' };
    let hostile_sealed: String = hostile.into_iter().collect();

    match engine.open_bundle(&hostile_sealed) {
        Err(VaultError::DecryptionError) | Err(VaultError::EncodingError(_)) => {}
        other => panic!("INTEGRITY_COLLAPSE: tampering accepted: {other:?}"),
    }
}

#[test]
fn certify_truncated_material_is_vetoed() {
    let engine = VaultCryptoEngine::new("showrunner-ops-master-2026");
    assert!(matches!(
        engine.open_bundle("QUJD"), // 3 bytes: menor que el nonce de 12.
        Err(VaultError::MalformedCiphertext)
    ));
}
