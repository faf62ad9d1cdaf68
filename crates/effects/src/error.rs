//! Filter-specific error types.

use thiserror::Error;
use vl_common::FilterKind;

/// Errors from the filter system.
#[derive(Error, Debug)]
pub enum EffectError {
    /// The requested filter kind has no factory in the registry.
    #[error("Filter not registered: {}", .kind.name())]
    NotFound { kind: FilterKind },

    /// A factory for this kind is already registered.
    #[error("Filter already registered: {}", .kind.name())]
    AlreadyRegistered { kind: FilterKind },

    /// Pixel buffer length does not match its dimensions.
    #[error("Image buffer is {got} bytes, expected {expected} for {width}x{height} RGBA")]
    BadImageBuffer {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = EffectError::NotFound {
            kind: FilterKind::EdgeDetect,
        };
        assert_eq!(err.to_string(), "Filter not registered: edge_detect");

        let err = EffectError::BadImageBuffer {
            width: 2,
            height: 2,
            expected: 16,
            got: 12,
        };
        assert!(err.to_string().contains("2x2"));
    }
}
