//! Process exit codes
//!
//! Codes are stable so scripts can react to specific failures.

use bmu_core::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    UsageError = 2,
    NetworkError = 3,
    AuthError = 4,
    NotFound = 5,
    Conflict = 6,
}

impl ExitCode {
    /// Exit code matching a failed store operation
    pub fn from_error(error: &Error) -> Self {
        match error {
            // missing container, missing file, or nothing to delete
            Error::Store(_) | Error::NotFound(_) => ExitCode::NotFound,
            Error::Conflict(_) => ExitCode::Conflict,
            Error::Network(_) => ExitCode::NetworkError,
            Error::Auth(_) => ExitCode::AuthError,
            Error::InvalidPath(_) | Error::InvalidPattern(_) => ExitCode::UsageError,
            Error::Config(_) | Error::Io(_) | Error::General(_) => ExitCode::GeneralError,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.code())
    }
}
