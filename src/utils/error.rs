use thiserror::Error;

#[derive(Error, Debug)]
pub enum LidarError {
    #[error("{part} expected to have model ID 0x{expected:02x}, got 0x{actual:02x}")]
    IncorrectModelId {
        part: &'static str,
        expected: u16,
        actual: u16,
    },

    #[error("Timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    #[error("No spad info")]
    NoSpadInfo,

    #[error("Data not ready: {what}")]
    NotReady { what: String },

    #[error("I2C bus error: {message}")]
    Bus { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV output error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration validation error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Hardware,
    Timeout,
    Configuration,
    Io,
    Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LidarError {
    pub fn timeout(waiting_for: impl Into<String>) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn not_ready(what: impl Into<String>) -> Self {
        Self::NotReady { what: what.into() }
    }

    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
        }
    }

    /// Stable dotted code, suitable for matching in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IncorrectModelId { .. } => "incorrect.model.id",
            Self::Timeout { .. } => "timeout",
            Self::NoSpadInfo => "no.spad.info",
            Self::NotReady { .. } => "not.ready",
            Self::Bus { .. } => "bus",
            Self::InvalidArgument { .. } => "invalid.argument",
            Self::InvalidState { .. } => "invalid.state",
            Self::IoError(_) => "io",
            Self::SerializationError(_) => "serialization",
            Self::CsvError(_) => "csv",
            Self::ConfigValidationError { .. } => "config.validation",
            Self::InvalidConfigValueError { .. } => "config.invalid.value",
            Self::MissingConfigError { .. } => "config.missing",
        }
    }

    /// `[code] message`, the form used when reporting to a driver station.
    pub fn report(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IncorrectModelId { .. } | Self::NoSpadInfo | Self::Bus { .. } => {
                ErrorCategory::Hardware
            }
            Self::Timeout { .. } | Self::NotReady { .. } => ErrorCategory::Timeout,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) | Self::CsvError(_) => {
                ErrorCategory::Io
            }
            Self::InvalidArgument { .. } | Self::InvalidState { .. } => ErrorCategory::Usage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotReady { .. } => ErrorSeverity::Low,
            Self::Timeout { .. } | Self::NoSpadInfo => ErrorSeverity::Medium,
            Self::IncorrectModelId { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidState { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::SerializationError(_)
            | Self::CsvError(_) => ErrorSeverity::High,
            Self::Bus { .. } | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::IncorrectModelId { .. } => {
                "Check that the selected sensor kind matches the board wired to this address"
            }
            Self::Timeout { .. } => {
                "Check wiring and power, or raise the timeout if the sensor is slow to respond"
            }
            Self::NoSpadInfo => "Power-cycle the sensor and initialize it again",
            Self::NotReady { .. } => "Poll the data-ready flag before reading continuous results",
            Self::Bus { .. } => {
                "Check that the I2C device exists, that you have permission to open it, and that the sensor is connected"
            }
            Self::InvalidArgument { .. } | Self::InvalidState { .. } => {
                "Review the values passed to the driver"
            }
            Self::IoError(_) => "Check file paths and permissions",
            Self::SerializationError(_) | Self::CsvError(_) => {
                "Check the output destination and format"
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Fix the configuration and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Hardware => format!("Sensor problem: {}", self),
            ErrorCategory::Timeout => format!("Sensor did not respond in time: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Io => format!("Output problem: {}", self),
            ErrorCategory::Usage => format!("Invalid request: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LidarError>;
