//! The crate's single error type, replacing the source project's negative-`errno`
//! convention with a typed enum (see the design note in `SPEC_FULL.md` §9).

use thiserror::Error;

/// Every failure mode this crate's operations can report.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed address string, bad IP header, unsupported architecture, missing
    /// required image, or invalid load address.
    #[error("invalid argument")]
    InvalidArgument,
    /// Buffer or RAM-region allocation failed.
    #[error("out of memory")]
    NoMemory,
    /// No network device, or no image handler matched.
    #[error("no device")]
    NoDevice,
    /// Device lacks an IP address and the target is unicast.
    #[error("network not ready")]
    NoNetwork,
    /// ARP resolution exceeded its retry budget.
    #[error("timed out")]
    Timeout,
    /// The caller's cancellation token fired mid-wait.
    #[error("interrupted")]
    Interrupted,
    /// CRC/hash check on a uImage payload failed.
    #[error("image verification failed")]
    VerifyFailed,
    /// An inbound frame matched no registered connection.
    #[error("no matching connection")]
    NotFound,
}

/// Maps a typed [`Error`] to the source project's negative-`errno` convention, for
/// hosts that still want that shape at their own FFI boundary. Internal code never
/// constructs or matches on this integer form.
impl From<Error> for i32 {
    fn from(err: Error) -> i32 {
        let errno = match err {
            Error::InvalidArgument => 22,  // EINVAL
            Error::NoMemory => 12,         // ENOMEM
            Error::NoDevice => 19,         // ENODEV
            Error::NoNetwork => 100,       // ENETDOWN
            Error::Timeout => 110,         // ETIMEDOUT
            Error::Interrupted => 4,       // EINTR
            Error::VerifyFailed => 74,     // EBADMSG
            Error::NotFound => 2,          // ENOENT
        };
        -errno
    }
}

pub type Result<T> = core::result::Result<T, Error>;
