use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DfeResult<T> = Result<T, DfeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DfeErrorCategory {
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl DfeErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "InputValidationError",
            Self::IoSystemError => "IoSystemError",
            Self::ComputationError => "ComputationError",
            Self::InternalError => "InternalError",
        }
    }
}

/// Crate-wide error carried across module boundaries and out to the CLI.
///
/// `placeholder` is a stable dotted identifier (`RUN.CACHE_BUILD`,
/// `INPUT.MISSING_GAMMA`, ...) that scripts can match on without parsing the
/// free-form message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfeError {
    category: DfeErrorCategory,
    placeholder: &'static str,
    message: String,
}

impl DfeError {
    pub fn new(
        category: DfeErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
        }
    }

    pub fn input_validation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DfeErrorCategory::InputValidationError, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DfeErrorCategory::IoSystemError, placeholder, message)
    }

    pub fn computation(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DfeErrorCategory::ComputationError, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(DfeErrorCategory::InternalError, placeholder, message)
    }

    pub const fn category(&self) -> DfeErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }

    pub fn fatal_exit_line(&self) -> String {
        format!("FATAL EXIT CODE: {}", self.exit_code())
    }
}

impl Display for DfeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.as_str(),
            self.placeholder,
            self.message
        )
    }
}

impl Error for DfeError {}

#[cfg(test)]
mod tests {
    use super::{DfeError, DfeErrorCategory};

    #[test]
    fn exit_codes_are_stable_per_category() {
        let cases = [
            (DfeErrorCategory::InputValidationError, 2),
            (DfeErrorCategory::IoSystemError, 3),
            (DfeErrorCategory::ComputationError, 4),
            (DfeErrorCategory::InternalError, 5),
        ];

        for (category, exit_code) in cases {
            assert_eq!(category.exit_code(), exit_code);
        }
    }

    #[test]
    fn fatal_error_renders_diagnostic_lines() {
        let error = DfeError::computation(
            "RUN.CACHE_BUILD",
            "2 of 10 gammas failed to solve: -1, -0.5",
        );

        assert_eq!(error.exit_code(), 4);
        assert_eq!(
            error.diagnostic_line(),
            "ERROR: [RUN.CACHE_BUILD] 2 of 10 gammas failed to solve: -1, -0.5"
        );
        assert_eq!(error.fatal_exit_line(), "FATAL EXIT CODE: 4");
        assert_eq!(
            error.to_string(),
            "ComputationError [RUN.CACHE_BUILD] 2 of 10 gammas failed to solve: -1, -0.5"
        );
    }
}
