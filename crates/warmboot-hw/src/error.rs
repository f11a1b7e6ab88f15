//! ASIC SDK error types and status handling.
//!
//! Raw SDK return codes are converted into [`HwError`] so callers can
//! propagate them with `?`. The only distinction the reconciliation layer
//! cares about is [`HwError::is_not_found`]: a delete target that is
//! already gone is benign, everything else is fatal.

use std::fmt;
use thiserror::Error;

/// SDK status codes as returned by the switch ASIC API.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwStatus {
    Success = 0,
    Internal = -1,
    Memory = -2,
    Unit = -3,
    Param = -4,
    Empty = -5,
    Full = -6,
    NotFound = -7,
    Exists = -8,
    Timeout = -9,
    Busy = -10,
    Fail = -11,
    Disabled = -12,
    BadId = -13,
    Resource = -14,
    Config = -15,
    Unavail = -16,
    Init = -17,
    Port = -18,
}

impl HwStatus {
    /// Creates a status from a raw SDK return code.
    ///
    /// Unknown codes map to [`HwStatus::Internal`].
    pub fn from_raw(rv: i32) -> Self {
        match rv {
            0 => HwStatus::Success,
            -2 => HwStatus::Memory,
            -3 => HwStatus::Unit,
            -4 => HwStatus::Param,
            -5 => HwStatus::Empty,
            -6 => HwStatus::Full,
            -7 => HwStatus::NotFound,
            -8 => HwStatus::Exists,
            -9 => HwStatus::Timeout,
            -10 => HwStatus::Busy,
            -11 => HwStatus::Fail,
            -12 => HwStatus::Disabled,
            -13 => HwStatus::BadId,
            -14 => HwStatus::Resource,
            -15 => HwStatus::Config,
            -16 => HwStatus::Unavail,
            -17 => HwStatus::Init,
            -18 => HwStatus::Port,
            _ => HwStatus::Internal,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == HwStatus::Success
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self, context: impl Into<String>) -> HwResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(HwError::from_status(self, context))
        }
    }
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HwStatus::Success => "E_NONE",
            HwStatus::Internal => "E_INTERNAL",
            HwStatus::Memory => "E_MEMORY",
            HwStatus::Unit => "E_UNIT",
            HwStatus::Param => "E_PARAM",
            HwStatus::Empty => "E_EMPTY",
            HwStatus::Full => "E_FULL",
            HwStatus::NotFound => "E_NOT_FOUND",
            HwStatus::Exists => "E_EXISTS",
            HwStatus::Timeout => "E_TIMEOUT",
            HwStatus::Busy => "E_BUSY",
            HwStatus::Fail => "E_FAIL",
            HwStatus::Disabled => "E_DISABLED",
            HwStatus::BadId => "E_BADID",
            HwStatus::Resource => "E_RESOURCE",
            HwStatus::Config => "E_CONFIG",
            HwStatus::Unavail => "E_UNAVAIL",
            HwStatus::Init => "E_INIT",
            HwStatus::Port => "E_PORT",
        };
        write!(f, "{}", s)
    }
}

/// Error type for ASIC operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwError {
    /// The SDK returned a non-success status.
    #[error("{context}: SDK returned {status}")]
    Status { status: HwStatus, context: String },

    /// The addressed object does not exist in hardware.
    #[error("not found in hardware: {item}")]
    NotFound { item: String },

    /// The platform does not implement the requested table or feature.
    #[error("not supported: {feature}")]
    NotSupported { feature: String },

    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// A single traversed record could not be decoded.
    ///
    /// Scoped to that one record; the rest of the traversal is usable.
    #[error("malformed record: {item}")]
    Malformed { item: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl HwError {
    /// Creates an error from an SDK status code.
    pub fn from_status(status: HwStatus, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            HwStatus::Success => HwError::Internal {
                message: format!("{}: from_status called with success status", context),
            },
            HwStatus::NotFound => HwError::NotFound { item: context },
            HwStatus::Unavail => HwError::NotSupported { feature: context },
            HwStatus::Param | HwStatus::BadId => HwError::InvalidParameter {
                message: format!("{}: SDK returned {}", context, status),
            },
            _ => HwError::Status { status, context },
        }
    }

    pub fn not_found(item: impl Into<String>) -> Self {
        HwError::NotFound { item: item.into() }
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        HwError::NotSupported {
            feature: feature.into(),
        }
    }

    pub fn malformed(item: impl Into<String>) -> Self {
        HwError::Malformed { item: item.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HwError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the target object was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HwError::NotFound { .. }
                | HwError::Status {
                    status: HwStatus::NotFound,
                    ..
                }
        )
    }

    /// Returns true if the error only invalidates the record it was raised for.
    pub fn is_entry_scoped(&self) -> bool {
        matches!(self, HwError::Malformed { .. })
    }

    /// Returns the underlying SDK status if this is a Status error.
    pub fn status(&self) -> Option<HwStatus> {
        match self {
            HwError::Status { status, .. } => Some(*status),
            HwError::NotFound { .. } => Some(HwStatus::NotFound),
            _ => None,
        }
    }
}

/// Result type for ASIC operations.
pub type HwResult<T> = Result<T, HwError>;

/// Extension trait for converting raw SDK return codes.
pub trait HwStatusExt {
    fn to_hw_result(self, context: impl Into<String>) -> HwResult<()>;
}

impl HwStatusExt for i32 {
    fn to_hw_result(self, context: impl Into<String>) -> HwResult<()> {
        HwStatus::from_raw(self).into_result(context)
    }
}
