use core::fmt;

/// Errors returned by the controller core.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A packet or buffer specified an invalid length value or was too short.
    InvalidLength,

    /// Invalid value supplied for a field.
    InvalidValue,

    /// Unexpectedly ran out of buffer space while reading or writing data.
    Eof,

    /// No packet or event buffers are available right now.
    ///
    /// This is a transient condition; the operation may be retried once a
    /// buffer has been consumed and freed.
    NoBuffers,

    /// The radio hardware failed to initialize or lost sync.
    Hardware,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid length value specified",
            Error::InvalidValue => "invalid value for field",
            Error::Eof => "end of buffer",
            Error::NoBuffers => "out of buffers",
            Error::Hardware => "radio hardware failure",
        })
    }
}
