//! Document service errors.

use thiserror::Error;

use milvault_provider::ProviderError;

use crate::model::MAX_FILE_SIZE;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The operation needs a signed-in user.
    #[error("sign in to manage documents")]
    NotAuthenticated,

    #[error("no file content provided")]
    EmptyFile,

    /// Size cap is checked before any bytes leave the machine.
    #[error("file is {size} bytes, over the {MAX_FILE_SIZE} byte limit")]
    TooLarge { size: u64 },

    #[error("file type {0} is not allowed")]
    UnsupportedType(String),

    #[error("document not found")]
    NotFound,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_offending_size_and_type() {
        let err = DocumentError::TooLarge {
            size: MAX_FILE_SIZE + 1,
        };
        assert!(err.to_string().contains(&(MAX_FILE_SIZE + 1).to_string()));

        let err = DocumentError::UnsupportedType("application/x-msdownload".into());
        assert!(err.to_string().contains("application/x-msdownload"));
    }
}
