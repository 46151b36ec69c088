use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Store request for '{path}' failed: {message}")]
    StoreError { path: String, message: String },

    #[error("Object storage error: {message}")]
    StorageError { message: String },

    #[error("Outbound message delivery failed: {message}")]
    DeliveryError { message: String },

    #[error("{operation} timed out after {seconds}s")]
    TimeoutError { operation: String, seconds: u64 },

    #[error("Service is currently closed")]
    ServiceClosed,

    #[error("Permission denied: {action}")]
    PermissionDenied { action: String },

    #[error("Account is blocked")]
    AccountBlocked,

    #[error("{what} '{id}' not found")]
    NotFound { what: String, id: String },

    #[error("Invalid session transition from {from} via {via}")]
    InvalidTransition { from: String, via: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Access,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StorefrontError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn permission(action: impl Into<String>) -> Self {
        Self::PermissionDenied {
            action: action.into(),
        }
    }

    pub fn not_found(what: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_)
            | Self::StoreError { .. }
            | Self::StorageError { .. }
            | Self::DeliveryError { .. }
            | Self::TimeoutError { .. } => ErrorCategory::Network,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ValidationError { .. } | Self::ServiceClosed => ErrorCategory::Input,
            Self::PermissionDenied { .. }
            | Self::AccountBlocked
            | Self::InvalidTransition { .. } => ErrorCategory::Access,
            Self::IoError(_) | Self::SerializationError(_) | Self::NotFound { .. } => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DeliveryError { .. } => ErrorSeverity::Low,
            Self::ApiError(_)
            | Self::StoreError { .. }
            | Self::StorageError { .. }
            | Self::TimeoutError { .. } => ErrorSeverity::Medium,
            Self::ValidationError { .. }
            | Self::ServiceClosed
            | Self::PermissionDenied { .. }
            | Self::AccountBlocked
            | Self::NotFound { .. }
            | Self::InvalidTransition { .. } => ErrorSeverity::High,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    /// 網路類錯誤可以重試，權限與輸入錯誤不行
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) | Self::StoreError { .. } => {
                "Network error. Please check your internet connection and try again.".to_string()
            }
            Self::TimeoutError { operation, .. } => {
                format!("{} timed out. Please try again.", operation)
            }
            Self::StorageError { .. } => "Upload failed. Please check your connection.".to_string(),
            Self::DeliveryError { .. } => {
                "Could not send the notification. Your order was saved, but the designer may not be notified immediately.".to_string()
            }
            Self::ServiceClosed => "Service is currently closed.".to_string(),
            Self::PermissionDenied { .. } => {
                "You do not have permission to perform this action.".to_string()
            }
            Self::AccountBlocked => {
                "Your account has been restricted by the administrator.".to_string()
            }
            Self::ValidationError { message } => message.clone(),
            Self::NotFound { what, id } => format!("{} {} was not found.", what, id),
            Self::InvalidTransition { .. } => "Please sign in and try again.".to_string(),
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => format!("Configuration problem: {}", self),
            Self::IoError(_) | Self::SerializationError(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Network => {
                "Check connectivity to the store endpoint and retry".to_string()
            }
            ErrorCategory::Configuration => {
                "Fix the configuration file or the referenced environment variables".to_string()
            }
            ErrorCategory::Input => match self {
                Self::ServiceClosed => "Try again during working hours".to_string(),
                _ => "Correct the input and submit again".to_string(),
            },
            ErrorCategory::Access => "Sign in with an account that is allowed to do this".to_string(),
            ErrorCategory::Data => "Inspect the stored data for corruption".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
