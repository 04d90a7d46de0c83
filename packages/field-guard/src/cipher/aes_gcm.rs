use super::Cipher;
use crate::{
    config::{DEFAULT_ALGORITHM, KEY_LENGTH},
    error::{ConfigError, DecryptError, EncryptError},
    registry::AlgorithmId,
};
use aws_lc_rs::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    hmac,
};
use std::fmt::{self, Debug};

const TAG_LEN: usize = 16;

const ENCRYPTION_KEY_LABEL: &[u8] = b"field-guard/aes-256-gcm-det/encryption";
const NONCE_KEY_LABEL: &[u8] = b"field-guard/aes-256-gcm-det/nonce";

///
/// AES-256-GCM with a synthetic nonce.
///
/// The nonce is the first 96 bits of HMAC-SHA256 over the plaintext, so equal plaintexts produce equal ciphertexts
/// and equality predicates keep working against encrypted columns.
/// The encryption key and the nonce key are both derived from the master key with HMAC-SHA256.
///
/// Output is hex of `nonce || ciphertext || tag`.
///
pub struct DeterministicAesGcm {
    algorithm: AlgorithmId,
    key: LessSafeKey,
    nonce_key: hmac::Key,
}

impl DeterministicAesGcm {
    pub fn new(master_key: &[u8; KEY_LENGTH]) -> Result<Self, ConfigError> {
        let master = hmac::Key::new(hmac::HMAC_SHA256, master_key);

        let encryption_key = hmac::sign(&master, ENCRYPTION_KEY_LABEL);
        let nonce_key = hmac::sign(&master, NONCE_KEY_LABEL);

        let key = UnboundKey::new(&AES_256_GCM, encryption_key.as_ref()).map_err(|_| {
            ConfigError::CipherInit {
                algorithm: DEFAULT_ALGORITHM.to_string(),
            }
        })?;

        Ok(DeterministicAesGcm {
            algorithm: AlgorithmId::new(DEFAULT_ALGORITHM),
            key: LessSafeKey::new(key),
            nonce_key: hmac::Key::new(hmac::HMAC_SHA256, nonce_key.as_ref()),
        })
    }

    fn nonce_for(&self, plaintext: &[u8]) -> [u8; NONCE_LEN] {
        let tag = hmac::sign(&self.nonce_key, plaintext);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&tag.as_ref()[..NONCE_LEN]);
        nonce
    }
}

impl Debug for DeterministicAesGcm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeterministicAesGcm")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Cipher for DeterministicAesGcm {
    fn algorithm(&self) -> &AlgorithmId {
        &self.algorithm
    }

    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptError> {
        let nonce = self.nonce_for(plaintext.as_bytes());

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| EncryptError::Seal)?;

        let mut output = Vec::with_capacity(NONCE_LEN + in_out.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&in_out);

        Ok(hex::encode(output))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptError> {
        let bytes = hex::decode(ciphertext)?;

        let expected = NONCE_LEN + TAG_LEN;
        if bytes.len() < expected {
            return Err(DecryptError::Truncated {
                expected,
                received: bytes.len(),
            });
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce).map_err(|_| DecryptError::Authentication)?;

        let mut in_out = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| DecryptError::Authentication)?;

        Ok(String::from_utf8(plaintext.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> DeterministicAesGcm {
        DeterministicAesGcm::new(&[7u8; KEY_LENGTH]).unwrap()
    }

    #[test]
    fn round_trip() {
        let cipher = cipher();

        for plaintext in ["alice@example.com", "", "ünïcødé 🔐"] {
            let ciphertext = cipher.encrypt(plaintext).unwrap();
            assert_ne!(ciphertext, plaintext);
            assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn encryption_is_deterministic() {
        let cipher = cipher();

        let a = cipher.encrypt("13800138000").unwrap();
        let b = cipher.encrypt("13800138000").unwrap();
        let c = cipher.encrypt("13800138001").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn different_keys_give_different_ciphertext() {
        let other = DeterministicAesGcm::new(&[8u8; KEY_LENGTH]).unwrap();
        let ciphertext = cipher().encrypt("secret").unwrap();

        assert_ne!(other.encrypt("secret").unwrap(), ciphertext);
        assert!(matches!(
            other.decrypt(&ciphertext),
            Err(DecryptError::Authentication)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = cipher();
        let mut bytes = hex::decode(cipher.encrypt("secret").unwrap()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        assert!(matches!(
            cipher.decrypt(&hex::encode(bytes)),
            Err(DecryptError::Authentication)
        ));
    }

    #[test]
    fn malformed_ciphertext() {
        let cipher = cipher();

        assert!(matches!(
            cipher.decrypt("zz"),
            Err(DecryptError::Encoding(_))
        ));
        assert!(matches!(
            cipher.decrypt("abcd"),
            Err(DecryptError::Truncated {
                expected: 28,
                received: 2
            })
        ));
    }

    #[test]
    fn debug_does_not_print_keys() {
        let debug = format!("{:?}", cipher());
        assert!(debug.contains(DEFAULT_ALGORITHM));
    }
}
