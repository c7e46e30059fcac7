//! Bitstream decoder seam.
//!
//! A [`HevcDecoder`] hands out one [`DecodeSession`] per tile. Opening a
//! session is context creation; dropping it is teardown, so the two are
//! always paired.

use super::{DecodeError, PlanarFrame};

/// Factory for per-call decode contexts.
///
/// Implementations must be shareable across worker threads; the sessions
/// they open are not.
pub trait HevcDecoder: Send + Sync {
    /// Create a fresh decode context.
    fn open(&self) -> Result<Box<dyn DecodeSession>, DecodeError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// One decode context, fed exactly one access unit.
pub trait DecodeSession {
    /// Submit an Annex-B access unit.
    ///
    /// Returns `DecodeError::Submit` when the bitstream is rejected.
    fn submit(&mut self, access_unit: &[u8]) -> Result<(), DecodeError>;

    /// Take the decoded frame, if the decoder produced one.
    fn receive_frame(&mut self) -> Result<Option<PlanarFrame>, DecodeError>;
}

impl<T: HevcDecoder + ?Sized> HevcDecoder for &T {
    fn open(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        (**self).open()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: HevcDecoder + ?Sized> HevcDecoder for Box<T> {
    fn open(&self) -> Result<Box<dyn DecodeSession>, DecodeError> {
        (**self).open()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
