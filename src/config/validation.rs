use thiserror::Error;

use super::models::Config;
use crate::documents::CellAddress;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("uploads.chunk_size must be greater than zero")]
    ChunkSizeZero,

    #[error("uploads.max_upload_bytes must be greater than zero")]
    MaxUploadZero,

    #[error("uploads.allowed_extensions must not be empty")]
    NoAllowedExtensions,

    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,

    #[error("documents.mapping entry '{field}' has invalid cell address '{address}'")]
    InvalidMappingAddress { field: String, address: String },
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.uploads.chunk_size.as_u64() == 0 {
        return Err(ValidationError::ChunkSizeZero);
    }
    if config.uploads.max_upload_bytes.as_u64() == 0 {
        return Err(ValidationError::MaxUploadZero);
    }
    if config.uploads.allowed_extensions.is_empty() {
        return Err(ValidationError::NoAllowedExtensions);
    }
    if config.retry.max_attempts == 0 {
        return Err(ValidationError::NoAttempts);
    }

    for (field, address) in &config.documents.mapping {
        if CellAddress::parse(address).is_err() {
            return Err(ValidationError::InvalidMappingAddress {
                field: field.clone(),
                address: address.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = Config::default();
        config.uploads.chunk_size = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ChunkSizeZero)
        ));
    }

    #[test]
    fn empty_extension_list_is_rejected() {
        let mut config = Config::default();
        config.uploads.allowed_extensions.clear();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::NoAllowedExtensions)
        ));
    }

    #[test]
    fn bad_mapping_address_is_rejected() {
        let mut config = Config::default();
        config
            .documents
            .mapping
            .insert("price".to_string(), "nope".to_string());
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidMappingAddress { field, .. } if field == "price"
        ));
    }
}
