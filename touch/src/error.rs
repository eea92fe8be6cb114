use core::fmt;

/// Errors reported by channel registration and sensor reads.
///
/// Every failing operation leaves the engine state exactly as it found it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The board pin has no CTSU channel on this board
    Unsupported,
    /// The board pin is already registered with the engine
    AlreadyConfigured,
    /// Every channel slot of the engine is in use
    CapacityExceeded,
    /// A scan did not complete within the configured timeout
    ScanTimeout,
    /// The sensor was read before a successful `begin()`
    NotConfigured,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => write!(f, "pin does not support touch sensing"),
            Self::AlreadyConfigured => write!(f, "pin already configured for touch sensing"),
            Self::CapacityExceeded => write!(f, "no free touch channel slots"),
            Self::ScanTimeout => write!(f, "touch scan timed out"),
            Self::NotConfigured => write!(f, "touch sensor not started"),
        }
    }
}
