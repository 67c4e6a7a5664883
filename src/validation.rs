//! Message validation.

/// One failed validation rule.
#[derive(Debug, Clone)]
pub struct ValidationViolation {
    pub field: String,
    pub message: String,
}

/// The violations collected for one validation pass. Empty means valid.
#[derive(Debug, Clone, Default)]
pub struct ValidationFailure {
    pub violations: Vec<ValidationViolation>,
}

impl ValidationFailure {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(ValidationViolation {
            field: field.into(),
            message: message.into(),
        });
    }
}
