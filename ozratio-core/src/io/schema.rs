//! Header checks for loaded files.

use crate::error::PipelineError;

/// Column names of a loaded file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Position of the first column with this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Positions of `required`, in order. Fails naming every absent column.
    pub fn positions(&self, file: &str, required: &[&str]) -> Result<Vec<usize>, PipelineError> {
        require_columns(file, self, required)?;
        Ok(required
            .iter()
            .filter_map(|name| self.position(name))
            .collect())
    }
}

/// Check that every required column is present.
pub fn require_columns(file: &str, header: &Header, required: &[&str]) -> Result<(), PipelineError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !header.contains(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::SchemaViolation {
            file: file.to_string(),
            missing,
            present: header.names.clone(),
        })
    }
}
