use crate::error::ConfigError;

/// Per-pipeline knobs validated lazily on the first `process()` call.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub name: String,
    /// Consecutive-record-error threshold; 0 disables the circuit breaker.
    pub max_errors: u32,
    pub enabled: bool,
}

impl PipelineSettings {
    pub fn new(name: &str) -> Self {
        PipelineSettings {
            name: name.to_string(),
            max_errors: 0,
            enabled: true,
        }
    }

    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        assert!(PipelineSettings::new("  ").validate().is_err());
        assert!(PipelineSettings::new("orders").validate().is_ok());
    }
}
