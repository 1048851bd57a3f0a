// INICIO DEL ARCHIVO [libs/core/vault/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CREDENTIAL VAULT ENGINE (RUST EDITION)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CIFRADO AUTENTICADO AES-256-GCM DE TOKEN BUNDLES
 *
 * # Mathematical Proof (Ciphertext-Only Custody):
 * El Ledger sólo persiste nonce || ciphertext en Base64. La llave de
 * 256 bits se deriva de la frase maestra del proceso mediante
 * PBKDF2-HMAC-SHA256 y jamás se persiste junto al material cifrado.
 * El tag GCM garantiza que cualquier mutación del ciphertext sea
 * detectada antes de entregar un solo byte en claro.
 * =================================================================
 */

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("[L1_VAULT_FAULT]: BASE64_DECODE_FAULT -> {0}")]
    EncodingError(#[from] base64::DecodeError),

    #[error("[L1_VAULT_FAULT]: CIPHERTEXT_TRUNCATED")]
    MalformedCiphertext,

    #[error("[L1_VAULT_FAULT]: DECRYPTION_MALFUNCTION -> Integrity compromised or incorrect master key")]
    DecryptionError,

    #[error("[L1_VAULT_FAULT]: BUNDLE_SERIALIZATION_FAULT -> {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Material de sesión de un servicio externo, por canal.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenBundle {
    /// Verdadero si el token expira dentro de la ventana dada.
    pub fn expires_within(&self, window: Duration) -> bool {
        self.expires_at <= Utc::now() + window
    }
}

/// Motor simétrico de custodia. Una instancia por proceso, llave en RAM.
pub struct VaultCryptoEngine {
    derived_key_material: [u8; Self::KEY_LENGTH_BYTES],
}

impl VaultCryptoEngine {
    const PBKDF2_ITERATIONS: u32 = 150_000;
    const KEY_LENGTH_BYTES: usize = 32;
    const NONCE_LENGTH_BYTES: usize = 12;
    /// Sal determinista de dominio; separa esta llave de cualquier otra
    /// derivada de la misma frase en otro subsistema.
    const SALT_DOMAIN_LABEL: &'static str = "showrunner_credential_vault_v1";

    /**
     * Forja el motor derivando la llave soberana desde la frase maestra.
     *
     * # Performance:
     * La derivación PBKDF2 (150k iteraciones) ocurre una única vez por
     * proceso; cifrar/descifrar es O(len) sobre AES-NI.
     */
    pub fn new(master_key_phrase: &str) -> Self {
        let mut derived_key_buffer = [0u8; Self::KEY_LENGTH_BYTES];
        pbkdf2_hmac::<Sha256>(
            master_key_phrase.as_bytes(),
            Self::SALT_DOMAIN_LABEL.as_bytes(),
            Self::PBKDF2_ITERATIONS,
            &mut derived_key_buffer,
        );
        Self {
            derived_key_material: derived_key_buffer,
        }
    }

    /**
     * Sella un bundle de tokens: JSON -> AES-256-GCM -> Base64(nonce || ct).
     */
    pub fn seal_bundle(&self, bundle: &TokenBundle) -> Result<String, VaultError> {
        let plaintext = serde_json::to_vec(bundle)?;

        let key = Key::<Aes256Gcm>::from_slice(&self.derived_key_material);
        let cipher_engine = Aes256Gcm::new(key);

        let mut nonce_buffer = [0u8; Self::NONCE_LENGTH_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce_buffer);
        let nonce = Nonce::from_slice(&nonce_buffer);

        let ciphertext = cipher_engine
            .encrypt(nonce, plaintext.as_ref())
            .map_err(|_| VaultError::DecryptionError)?;

        let mut sealed_material = Vec::with_capacity(Self::NONCE_LENGTH_BYTES + ciphertext.len());
        sealed_material.extend_from_slice(&nonce_buffer);
        sealed_material.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(sealed_material))
    }

    /**
     * Abre un bundle sellado verificando el tag de integridad GCM.
     *
     * # Errors:
     * - `MalformedCiphertext`: material más corto que el nonce.
     * - `DecryptionError`: tag inválido (mutación o llave incorrecta).
     */
    pub fn open_bundle(&self, sealed_base64: &str) -> Result<TokenBundle, VaultError> {
        let sealed_material = BASE64.decode(sealed_base64)?;
        if sealed_material.len() <= Self::NONCE_LENGTH_BYTES {
            return Err(VaultError::MalformedCiphertext);
        }

        let (nonce_bytes, ciphertext) = sealed_material.split_at(Self::NONCE_LENGTH_BYTES);

        let key = Key::<Aes256Gcm>::from_slice(&self.derived_key_material);
        let cipher_engine = Aes256Gcm::new(key);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher_engine
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptionError)?;

        Ok(serde_json::from_slice(&plaintext)?)
    }
}

// FIN DEL ARCHIVO [libs/core/vault/src/lib.rs]
