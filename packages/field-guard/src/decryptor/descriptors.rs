use crate::registry::AlgorithmId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    pub field: String,
    pub algorithm: AlgorithmId,
}

///
/// Answers which fields of a result type hold ciphertext.
///
/// An empty answer means the type has no encrypted fields. Answers are cached per type by the
/// [`Decryptor`](super::Decryptor), so an implementation should be stable for a given type name.
///
pub trait FieldDescriptorProvider: Send + Sync {
    fn encrypted_fields(&self, type_name: &str) -> Vec<EncryptedField>;
}

/// Encrypted fields registered up front, per type name.
#[derive(Debug, Clone, Default)]
pub struct DescriptorRegistry {
    types: HashMap<String, Vec<EncryptedField>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        algorithm: impl Into<AlgorithmId>,
    ) -> Self {
        self.types
            .entry(type_name.into())
            .or_default()
            .push(EncryptedField {
                field: field.into(),
                algorithm: algorithm.into(),
            });
        self
    }
}

impl FieldDescriptorProvider for DescriptorRegistry {
    fn encrypted_fields(&self, type_name: &str) -> Vec<EncryptedField> {
        self.types.get(type_name).cloned().unwrap_or_default()
    }
}
