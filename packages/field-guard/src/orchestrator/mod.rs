//! Encrypts bound parameters before execution and writes the plaintext back afterwards.

mod context;
mod parameters;

pub use context::{OperationContext, RestorationRecord};
pub use parameters::{BoundParameters, Locator, Parameters};

use crate::{
    cipher::{is_marked, mark, CipherSuite},
    error::{EncryptError, Error},
    log::{CONTEXT, ENCRYPT},
    metrics::{
        ENCRYPTED_VALUES_TOTAL, ENCRYPTION_DURATION_SECONDS, ENCRYPTION_ERROR_TOTAL,
        RESTORED_VALUES_TOTAL,
    },
    registry::{column_variants, AlgorithmId, FieldRegistry},
};
use metrics::{counter, histogram};
use serde_json::Value;
use sql_gather::{ParameterMapping, SqlGather};
use std::time::Instant;
use tracing::{debug, warn};

/// A placeholder that binds to an encrypted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDescriptor {
    pub table: String,
    pub column: String,
    pub algorithm: AlgorithmId,
}

///
/// Joins one parameter mapping against the registry.
///
/// A resolved table is the only candidate. Otherwise every table of the statement is tried, main table first.
/// Each candidate is tried with the column as written, in snake_case and in camelCase.
///
pub fn descriptor_for(
    mapping: &ParameterMapping,
    gather: &SqlGather,
    registry: &dyn FieldRegistry,
) -> Option<EncryptionDescriptor> {
    let field = mapping.field.as_ref()?;

    let candidates: Vec<&str> = match &field.table_name {
        Some(table) => vec![table.as_str()],
        None => gather.tables.iter().map(|t| t.name.as_str()).collect(),
    };

    let variants = column_variants(&field.column);

    candidates.iter().find_map(|table| {
        variants.iter().find_map(|column| {
            registry
                .algorithm_for(table, column)
                .map(|algorithm| EncryptionDescriptor {
                    table: table.to_string(),
                    column: field.column.to_owned(),
                    algorithm,
                })
        })
    })
}

/// One entry per placeholder, `Some` where the placeholder binds to an encrypted column.
pub fn descriptors(
    gather: &SqlGather,
    registry: &dyn FieldRegistry,
) -> Vec<Option<EncryptionDescriptor>> {
    gather
        .parameter_mappings
        .iter()
        .map(|mapping| descriptor_for(mapping, gather, registry))
        .collect()
}

///
/// Encrypts every parameter that binds to an encrypted column, recording the plaintext in `context`.
///
/// Values that already carry the marker prefix are left alone, as are nulls and non-string values.
/// On error every parameter recorded in `context` is restored before the error is returned.
///
/// Returns the number of values encrypted.
///
pub fn encrypt(
    context: &mut OperationContext,
    gather: &SqlGather,
    registry: &dyn FieldRegistry,
    ciphers: &CipherSuite,
    params: &mut dyn Parameters,
) -> Result<usize, Error> {
    let start = Instant::now();

    match encrypt_parameters(context, gather, registry, ciphers, params) {
        Ok(encrypted) => {
            if encrypted > 0 {
                counter!(ENCRYPTED_VALUES_TOTAL).increment(encrypted as u64);
                histogram!(ENCRYPTION_DURATION_SECONDS).record(start.elapsed());
            }
            Ok(encrypted)
        }
        Err(err) => {
            counter!(ENCRYPTION_ERROR_TOTAL).increment(1);
            warn!(
                target: ENCRYPT,
                msg = "Encryption failed, restoring parameters",
                id = %context.id(),
                error = err.to_string()
            );

            if let Err(restore_err) = restore_records(context, params) {
                warn!(
                    target: CONTEXT,
                    msg = "Parameters could not all be restored",
                    id = %context.id(),
                    error = restore_err.to_string()
                );
            }
            Err(err)
        }
    }
}

fn encrypt_parameters(
    context: &mut OperationContext,
    gather: &SqlGather,
    registry: &dyn FieldRegistry,
    ciphers: &CipherSuite,
    params: &mut dyn Parameters,
) -> Result<usize, Error> {
    let mut encrypted = 0;

    for mapping in &gather.parameter_mappings {
        let Some(descriptor) = descriptor_for(mapping, gather, registry) else {
            continue;
        };

        let Some(locator) = params.locate(mapping.index) else {
            debug!(
                target: ENCRYPT,
                msg = "No parameter for placeholder",
                index = mapping.index,
                column = descriptor.column
            );
            continue;
        };

        let plaintext = match params.read(&locator)? {
            Some(Value::String(s)) if is_marked(&s) => {
                debug!(target: ENCRYPT, msg = "Parameter is already encrypted", %locator);
                continue;
            }
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => continue,
            Some(other) => {
                debug!(
                    target: ENCRYPT,
                    msg = "Passing through non-string parameter",
                    %locator,
                    column = descriptor.column,
                    kind = kind_of(&other)
                );
                continue;
            }
        };

        let cipher =
            ciphers
                .get(&descriptor.algorithm)
                .ok_or_else(|| EncryptError::UnknownAlgorithm {
                    table: descriptor.table.to_owned(),
                    column: descriptor.column.to_owned(),
                    algorithm: descriptor.algorithm.to_string(),
                })?;

        let ciphertext = cipher.encrypt(&plaintext).map_err(|err| {
            warn!(
                target: ENCRYPT,
                msg = "Parameter could not be encrypted",
                %locator,
                table = descriptor.table,
                column = descriptor.column,
                error = err.to_string()
            );
            EncryptError::CouldNotEncrypt {
                table: descriptor.table.to_owned(),
                column: descriptor.column.to_owned(),
            }
        })?;

        params.write(&locator, Value::String(mark(&ciphertext)))?;
        context.record(locator, Value::String(plaintext));
        encrypted += 1;

        let label = mapping.field.as_ref().map(|f| f.label.as_str());
        debug!(
            target: ENCRYPT,
            msg = "Encrypted parameter",
            id = %context.id(),
            index = mapping.index,
            table = descriptor.table,
            label,
            algorithm = %descriptor.algorithm
        );
    }

    Ok(encrypted)
}

///
/// Writes every recorded plaintext back, consuming the context.
///
/// Individual write failures do not stop the restore. The first failure is returned once every record was tried.
///
pub fn restore(mut context: OperationContext, params: &mut dyn Parameters) -> Result<(), Error> {
    restore_records(&mut context, params)
}

fn restore_records(
    context: &mut OperationContext,
    params: &mut dyn Parameters,
) -> Result<(), Error> {
    let records = context.take_records();
    if records.is_empty() {
        return Ok(());
    }

    let mut first_error = None;
    let mut restored = 0;

    for RestorationRecord { locator, original } in records {
        match params.write(&locator, original) {
            Ok(()) => restored += 1,
            Err(err) => {
                warn!(
                    target: CONTEXT,
                    msg = "Parameter could not be restored",
                    id = %context.id(),
                    %locator,
                    error = err.to_string()
                );
                first_error.get_or_insert(err);
            }
        }
    }

    counter!(RESTORED_VALUES_TOTAL).increment(restored);
    debug!(target: CONTEXT, msg = "Restored parameters", id = %context.id(), restored);

    match first_error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::strip_marker;
    use crate::config::CipherConfig;
    use crate::error::LocatorError;
    use crate::registry::EncryptConfig;
    use crate::test_helpers::TEST_KEY;
    use serde_json::json;
    use sql_gather::analyze;

    fn registry() -> EncryptConfig {
        let mut config = EncryptConfig::new();
        config.insert("users", "email", "aes-256-gcm-det".into());
        config.insert("users", "phone_number", "aes-256-gcm-det".into());
        config.insert("dept", "code", "aes-256-gcm-det".into());
        config
    }

    fn ciphers() -> CipherSuite {
        CipherSuite::from_config(&CipherConfig::new(TEST_KEY)).unwrap()
    }

    fn decrypt(ciphers: &CipherSuite, value: &Value) -> String {
        let ciphertext = strip_marker(value.as_str().unwrap()).unwrap();
        ciphers.default_cipher().unwrap().decrypt(ciphertext).unwrap()
    }

    #[test]
    fn encrypts_only_encrypted_columns() {
        let gather = analyze("SELECT * FROM users WHERE email = ? AND id = ? LIMIT ?");
        let ciphers = ciphers();
        let mut params = vec![json!("a@example.com"), json!("7"), json!(10)];
        let mut context = OperationContext::new();

        let count = encrypt(&mut context, &gather, &registry(), &ciphers, &mut params).unwrap();

        assert_eq!(count, 1);
        assert!(is_marked(params[0].as_str().unwrap()));
        assert_eq!(decrypt(&ciphers, &params[0]), "a@example.com");
        assert_eq!(params[1], json!("7"));
        assert_eq!(params[2], json!(10));

        restore(context, &mut params).unwrap();
        assert_eq!(params[0], json!("a@example.com"));
    }

    #[test]
    fn camel_case_columns_match_snake_case_registry() {
        let gather = analyze("UPDATE users SET phoneNumber = ? WHERE id = ?");
        let mut params = vec![json!("13800138000"), json!(1)];
        let mut context = OperationContext::new();

        let count = encrypt(&mut context, &gather, &registry(), &ciphers(), &mut params).unwrap();
        assert_eq!(count, 1);

        restore(context, &mut params).unwrap();
    }

    #[test]
    fn unresolved_fields_try_every_table() {
        let gather =
            analyze("SELECT * FROM users u JOIN dept d ON d.id = u.dept_id WHERE code = ?");
        let descriptors = descriptors(&gather, &registry());

        assert_eq!(
            descriptors[0],
            Some(EncryptionDescriptor {
                table: "dept".into(),
                column: "code".into(),
                algorithm: "aes-256-gcm-det".into(),
            })
        );
    }

    #[test]
    fn marked_values_are_not_encrypted_twice() {
        let gather = analyze("SELECT * FROM users WHERE email = ?");
        let ciphers = ciphers();
        let mut params = vec![json!("a@example.com")];

        let mut context = OperationContext::new();
        encrypt(&mut context, &gather, &registry(), &ciphers, &mut params).unwrap();
        let once = params[0].clone();

        let mut second = OperationContext::new();
        let count = encrypt(&mut second, &gather, &registry(), &ciphers, &mut params).unwrap();

        assert_eq!(count, 0);
        assert_eq!(params[0], once);
        assert!(second.is_empty());

        restore(second, &mut params).unwrap();
        restore(context, &mut params).unwrap();
        assert_eq!(params[0], json!("a@example.com"));
    }

    #[test]
    fn nulls_and_numbers_pass_through() {
        let gather = analyze("SELECT * FROM users WHERE email = ? OR phone_number = ?");
        let mut params = vec![Value::Null, json!(13800138000u64)];
        let mut context = OperationContext::new();

        let count = encrypt(&mut context, &gather, &registry(), &ciphers(), &mut params).unwrap();

        assert_eq!(count, 0);
        assert_eq!(params, vec![Value::Null, json!(13800138000u64)]);
        restore(context, &mut params).unwrap();
    }

    #[test]
    fn in_list_encrypts_each_value() {
        let gather = analyze("SELECT * FROM users WHERE email IN (?, ?, ?)");
        let ciphers = ciphers();
        let mut params = vec![json!("a"), json!("b"), json!("a")];
        let mut context = OperationContext::new();

        let count = encrypt(&mut context, &gather, &registry(), &ciphers, &mut params).unwrap();

        assert_eq!(count, 3);
        assert_eq!(params[0], params[2]);
        assert_ne!(params[0], params[1]);
        restore(context, &mut params).unwrap();
        assert_eq!(params, vec![json!("a"), json!("b"), json!("a")]);
    }

    #[test]
    fn unknown_algorithm_restores_and_fails() {
        let mut registry = registry();
        registry.insert("users", "phone_number", "rot13".into());

        let gather = analyze("UPDATE users SET email = ?, phone_number = ? WHERE id = ?");
        let mut params = vec![json!("a@example.com"), json!("13800138000"), json!(1)];
        let mut context = OperationContext::new();

        let err = encrypt(&mut context, &gather, &registry, &ciphers(), &mut params).unwrap_err();

        assert!(matches!(
            err,
            Error::Encrypt(EncryptError::UnknownAlgorithm { .. })
        ));
        assert_eq!(params[0], json!("a@example.com"));
        assert!(context.is_empty());
    }

    #[derive(Debug)]
    struct Unsealable(AlgorithmId);

    impl crate::cipher::Cipher for Unsealable {
        fn algorithm(&self) -> &AlgorithmId {
            &self.0
        }

        fn encrypt(&self, _: &str) -> Result<String, EncryptError> {
            Err(EncryptError::Seal)
        }

        fn decrypt(&self, _: &str) -> Result<String, crate::error::DecryptError> {
            unimplemented!()
        }
    }

    #[test]
    fn cipher_failure_names_the_column_and_restores() {
        let mut registry = registry();
        registry.insert("users", "phone_number", "broken".into());

        let mut ciphers = ciphers();
        ciphers.register(std::sync::Arc::new(Unsealable("broken".into())));

        let gather = analyze("UPDATE users SET email = ?, phone_number = ? WHERE id = ?");
        let mut params = vec![json!("a@example.com"), json!("13800138000"), json!(1)];
        let mut context = OperationContext::new();

        let err = encrypt(&mut context, &gather, &registry, &ciphers, &mut params).unwrap_err();

        assert!(matches!(
            err,
            Error::Encrypt(EncryptError::CouldNotEncrypt { ref table, ref column })
                if table == "users" && column == "phone_number"
        ));
        assert_eq!(params[0], json!("a@example.com"));
        assert!(context.is_empty());
    }

    #[test]
    fn write_failure_restores_earlier_parameters() {
        let gather = analyze("INSERT INTO users (email, phone_number) VALUES (?, ?)");
        let mut params = BoundParameters::new(
            ["email", "phone"],
            json!({ "email": "a@example.com" }),
        )
        .with_named("phone", json!("13800138000"))
        .with_read_only("phone");
        let mut context = OperationContext::new();

        let err = encrypt(&mut context, &gather, &registry(), &ciphers(), &mut params).unwrap_err();

        assert!(matches!(
            err,
            Error::Locator(LocatorError::ReadOnly { .. })
        ));
        assert_eq!(params.object()["email"], "a@example.com");
        assert!(context.is_empty());
    }

    #[test]
    fn restore_continues_past_failures() {
        let mut context = OperationContext::new();
        context.record(Locator::Position(5), json!("lost"));
        context.record(Locator::Position(0), json!("kept"));

        let mut params = vec![json!("ENC:00")];
        let err = restore(context, &mut params).unwrap_err();

        assert!(matches!(err, Error::Locator(LocatorError::NotFound { .. })));
        assert_eq!(params[0], json!("kept"));
    }
}
