//! Common error types for HAL operations

use core::fmt;

/// HAL operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// Invalid parameter provided
    InvalidParameter,
    /// Peripheral is busy
    Busy,
    /// Operation timed out
    Timeout,
    /// Hardware error occurred
    HardwareError,
    /// Configuration error
    ConfigurationError,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::Busy => write!(f, "peripheral busy"),
            Self::Timeout => write!(f, "operation timeout"),
            Self::HardwareError => write!(f, "hardware error"),
            Self::ConfigurationError => write!(f, "configuration error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

#[cfg(feature = "defmt")]
impl defmt::Format for HalError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            Self::Busy => defmt::write!(fmt, "Busy"),
            Self::Timeout => defmt::write!(fmt, "Timeout"),
            Self::HardwareError => defmt::write!(fmt, "HardwareError"),
            Self::ConfigurationError => defmt::write!(fmt, "ConfigurationError"),
        }
    }
}

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;
