//! Decrypts encrypted fields of materialized result rows.

mod descriptors;
mod row;

pub use descriptors::{DescriptorRegistry, EncryptedField, FieldDescriptorProvider};
pub use row::{Record, Row};

use crate::{
    cipher::{strip_marker, CipherSuite},
    error::DecryptError,
    log::DECRYPT,
    metrics::{DECRYPTED_VALUES_TOTAL, DECRYPTION_DURATION_SECONDS, DECRYPTION_ERROR_TOTAL},
};
use metrics::{counter, histogram};
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};
use tracing::{debug, warn};

type FieldCache = HashMap<String, Arc<[EncryptedField]>>;

pub struct Decryptor {
    provider: Arc<dyn FieldDescriptorProvider>,
    ciphers: CipherSuite,
    // Types without encrypted fields are cached as empty slices
    fields: RwLock<FieldCache>,
}

impl Decryptor {
    pub fn new(provider: Arc<dyn FieldDescriptorProvider>, ciphers: CipherSuite) -> Self {
        Decryptor {
            provider,
            ciphers,
            fields: RwLock::new(HashMap::new()),
        }
    }

    fn encrypted_fields(&self, type_name: &str) -> Arc<[EncryptedField]> {
        let cached = self
            .fields
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(type_name)
            .cloned();

        if let Some(fields) = cached {
            return fields;
        }

        let fields: Arc<[EncryptedField]> = self.provider.encrypted_fields(type_name).into();
        debug!(target: DECRYPT, msg = "Encrypted fields", type_name, count = fields.len());

        self.fields
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(type_name.to_owned())
            .or_insert_with(|| fields.clone())
            .clone()
    }

    ///
    /// Decrypts the encrypted fields of one row in place.
    ///
    /// Fields whose value is not a string starting with the marker prefix are left untouched.
    /// Returns the number of fields decrypted.
    ///
    pub fn decrypt_row(&self, row: &mut dyn Row) -> Result<usize, DecryptError> {
        let fields = self.encrypted_fields(row.type_name());
        if fields.is_empty() {
            return Ok(0);
        }

        let mut decrypted = 0;

        for EncryptedField { field, algorithm } in fields.iter() {
            let Some(Value::String(value)) = row.get(field) else {
                continue;
            };

            let Some(ciphertext) = strip_marker(value) else {
                continue;
            };

            let cipher = self
                .ciphers
                .get(algorithm)
                .ok_or_else(|| DecryptError::UnknownAlgorithm {
                    type_name: row.type_name().to_owned(),
                    field: field.to_owned(),
                    algorithm: algorithm.to_string(),
                })?;

            let plaintext = cipher.decrypt(ciphertext).map_err(|err| {
                warn!(
                    target: DECRYPT,
                    msg = "Field could not be decrypted",
                    type_name = row.type_name(),
                    field,
                    error = err.to_string()
                );
                DecryptError::CouldNotDecrypt {
                    type_name: row.type_name().to_owned(),
                    field: field.to_owned(),
                }
            })?;

            row.set(field, Value::String(plaintext));
            decrypted += 1;
        }

        Ok(decrypted)
    }

    /// Decrypts every row, stopping at the first failure.
    pub fn decrypt_rows<R: Row>(&self, rows: &mut [R]) -> Result<usize, DecryptError> {
        let start = Instant::now();
        let mut decrypted = 0;

        for row in rows.iter_mut() {
            decrypted += self.decrypt_row(row).inspect_err(|_| {
                counter!(DECRYPTION_ERROR_TOTAL).increment(1);
            })?;
        }

        if decrypted > 0 {
            counter!(DECRYPTED_VALUES_TOTAL).increment(decrypted as u64);
            histogram!(DECRYPTION_DURATION_SECONDS).record(start.elapsed());
        }

        debug!(target: DECRYPT, msg = "Decrypted rows", rows = rows.len(), decrypted);

        Ok(decrypted)
    }
}
