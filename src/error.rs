//! Process-level error carrying the exit code `smard` terminates with.

/// Exit code for a missing or unreadable configuration document.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when the store never became ready.
pub const EXIT_STORE_UNAVAILABLE: u8 = 3;
/// Exit code for read-side store failures (`smard show`).
pub const EXIT_STORE_READ: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<crate::io::config::ConfigError> for AppError {
    fn from(err: crate::io::config::ConfigError) -> Self {
        AppError::new(EXIT_CONFIG, err.to_string())
    }
}

/// Only building the HTTP client reaches the boundary; per-call fetch
/// failures are swallowed by the driver.
impl From<crate::data::FetchError> for AppError {
    fn from(err: crate::data::FetchError) -> Self {
        AppError::new(EXIT_CONFIG, format!("Failed to build HTTP client: {err}"))
    }
}
