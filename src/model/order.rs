use crate::error::{Result, TapeLibraryError};
use serde::{Deserialize, Serialize};

/// Request to copy one file mark of a cartridge to the staging area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOrder {
    pub tape_code: String,
    pub file_position: u32,
    pub file_name: String,
}

impl ReadOrder {
    pub fn new(tape_code: &str, file_position: u32, file_name: &str) -> Self {
        Self {
            tape_code: tape_code.to_string(),
            file_position,
            file_name: file_name.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tape_code.trim().is_empty() {
            return Err(TapeLibraryError::parameter_validation(
                "read order tape code is required",
            ));
        }
        if self.file_name.trim().is_empty() {
            return Err(TapeLibraryError::parameter_validation(
                "read order file name is required",
            ));
        }
        Ok(())
    }
}

/// Request to append one staged file to a cartridge of the given bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOrder {
    pub bucket: String,
    /// Relative to the worker's input directory
    pub file_path: String,
    pub size: u64,
}

impl WriteOrder {
    pub fn new(bucket: &str, file_path: &str, size: u64) -> Self {
        Self {
            bucket: bucket.to_string(),
            file_path: file_path.to_string(),
            size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(TapeLibraryError::parameter_validation(
                "write order bucket is required",
            ));
        }
        if self.file_path.trim().is_empty() {
            return Err(TapeLibraryError::parameter_validation(
                "write order file path is required",
            ));
        }
        if self.size == 0 {
            return Err(TapeLibraryError::parameter_validation(
                "write order size must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_validation() {
        assert!(ReadOrder::new("T1", 0, "file.tar").validate().is_ok());
        assert!(matches!(
            ReadOrder::new("", 0, "file.tar").validate(),
            Err(TapeLibraryError::ParameterValidation(_))
        ));
        assert!(ReadOrder::new("T1", 0, " ").validate().is_err());

        assert!(WriteOrder::new("bucket", "in/file.tar", 10).validate().is_ok());
        assert!(WriteOrder::new("", "in/file.tar", 10).validate().is_err());
        assert!(WriteOrder::new("bucket", "in/file.tar", 0).validate().is_err());
    }
}
