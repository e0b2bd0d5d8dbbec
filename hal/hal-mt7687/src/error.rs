//! SPI master error types

use core::fmt;

use hal::HalError;

/// Result type used throughout the SPI master driver
pub type Result<T> = core::result::Result<T, SpiMasterError>;

/// Errors reported by the SPI master driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiMasterError {
    /// Null/empty buffer, oversized single-shot request or mismatched lengths
    InvalidParameter,
    /// The requested master or slave port does not exist
    InvalidPort,
    /// The session has not been initialized with a configuration
    NotInitialized,
    /// Another request already holds the controller
    Busy,
    /// The busy bit did not clear within the polling budget
    HardwareTimeout,
    /// The controller flagged a failure in its status register
    Unclassified,
}

impl SpiMasterError {
    /// Numeric status code of the vendor C API for this error
    pub const fn status_code(self) -> i32 {
        match self {
            SpiMasterError::Unclassified | SpiMasterError::HardwareTimeout => -4,
            SpiMasterError::Busy => -3,
            SpiMasterError::InvalidPort => -2,
            SpiMasterError::InvalidParameter | SpiMasterError::NotInitialized => -1,
        }
    }
}

impl fmt::Display for SpiMasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpiMasterError::InvalidParameter => write!(f, "invalid parameter"),
            SpiMasterError::InvalidPort => write!(f, "invalid SPI master port"),
            SpiMasterError::NotInitialized => write!(f, "SPI master not initialized"),
            SpiMasterError::Busy => write!(f, "SPI master busy"),
            SpiMasterError::HardwareTimeout => write!(f, "SPI master hardware timeout"),
            SpiMasterError::Unclassified => write!(f, "SPI master error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SpiMasterError {}

#[cfg(feature = "defmt")]
impl defmt::Format for SpiMasterError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SpiMasterError::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            SpiMasterError::InvalidPort => defmt::write!(fmt, "InvalidPort"),
            SpiMasterError::NotInitialized => defmt::write!(fmt, "NotInitialized"),
            SpiMasterError::Busy => defmt::write!(fmt, "Busy"),
            SpiMasterError::HardwareTimeout => defmt::write!(fmt, "HardwareTimeout"),
            SpiMasterError::Unclassified => defmt::write!(fmt, "Unclassified"),
        }
    }
}

impl From<SpiMasterError> for HalError {
    fn from(err: SpiMasterError) -> Self {
        match err {
            SpiMasterError::InvalidParameter | SpiMasterError::InvalidPort => {
                HalError::InvalidParameter
            }
            SpiMasterError::NotInitialized => HalError::ConfigurationError,
            SpiMasterError::Busy => HalError::Busy,
            SpiMasterError::HardwareTimeout => HalError::Timeout,
            SpiMasterError::Unclassified => HalError::HardwareError,
        }
    }
}
