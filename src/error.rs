//! Error types for the fill strategies.

use thiserror::Error;

/// Errors produced while acquiring a device or running a fill.
///
/// Every variant is contained at the boundary of the strategy that raised
/// it; the runner turns it into a failed column and keeps going.
#[derive(Debug, Error)]
pub enum FillError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("host allocation of {len} elements failed")]
    HostAllocation { len: usize },

    #[error("device allocation failed: {0}")]
    DeviceAllocation(String),

    #[error("kernel load failed: {0}")]
    Kernel(String),

    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("buffer mapping failed: {0}")]
    BufferMap(String),

    #[error("cuda error: {0}")]
    Cuda(String),

    #[error("strategy panicked: {0}")]
    Panicked(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, FillError>;

impl FillError {
    /// Builds a `Panicked` error from a payload returned by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        FillError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payload_str_is_kept() {
        let err = FillError::from_panic(Box::new("driver exploded"));
        assert_eq!(err.to_string(), "strategy panicked: driver exploded");
    }

    #[test]
    fn panic_payload_string_is_kept() {
        let err = FillError::from_panic(Box::new(String::from("lib not found")));
        assert!(matches!(err, FillError::Panicked(ref m) if m == "lib not found"));
    }

    #[test]
    fn panic_payload_unknown_type() {
        let err = FillError::from_panic(Box::new(42u8));
        assert!(matches!(err, FillError::Panicked(_)));
    }

    #[test]
    fn host_allocation_message_names_length() {
        let err = FillError::HostAllocation { len: 10 };
        assert_eq!(err.to_string(), "host allocation of 10 elements failed");
    }
}
