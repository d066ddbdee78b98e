use snafu::Snafu;

/// The public Error type for this library.
#[derive(Debug, Snafu)]
pub struct Error(LibError);

/// The public Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// The internal Result type for this library.
pub(crate) type LibResult<T> = std::result::Result<T, LibError>;

impl Error {
    /// Returns `true` if this error signals that playback is over and no
    /// further events will be produced. Callers typically treat this as a
    /// normal end-of-stream condition rather than a failure.
    pub fn is_playback_ended(&self) -> bool {
        matches!(self.0, LibError::PlaybackEnded { .. })
    }
}

/// The internal Error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum LibError {
    #[snafu(display("{}: error while reading bytes: {}", site, source))]
    Io {
        site: String,
        source: crate::source::SourceError,
    },

    #[snafu(display("{}: error while writing bytes: {}", site, source))]
    Write {
        site: String,
        source: std::io::Error,
    },

    #[snafu(display("{}: the MIDI header is invalid: {}", site, description))]
    InvalidHeader { site: String, description: String },

    #[snafu(display("{}: declared length disagrees with data: {}", site, description))]
    LengthMismatch { site: String, description: String },

    #[snafu(display("{}: variable-length quantity exceeds four bytes", site))]
    OverlongVarlen { site: String },

    #[snafu(display("{}: an event handler failed: {}", site, description))]
    Dispatch { site: String, description: String },

    #[snafu(display("playback has ended, no more events are available"))]
    PlaybackEnded,

    #[snafu(display("{}: track data exceeds the maximum chunk length", site))]
    TrackTooLong { site: String },
}

macro_rules! site {
    () => {
        format!("{}:{}", file!(), line!())
    };
}

macro_rules! io {
    () => {
        crate::error::IoSnafu { site: site!() }
    };
}

macro_rules! wr {
    () => {
        crate::error::WriteSnafu { site: site!() }
    };
}

macro_rules! invalid_header {
    ($($arg:expr),+) => {
        return Err(crate::Error::from(
            crate::error::InvalidHeaderSnafu {
                site: site!(),
                description: format!($($arg),+),
            }
            .build(),
        ))
    };
}

macro_rules! length_mismatch {
    ($($arg:expr),+) => {
        return Err(crate::Error::from(
            crate::error::LengthMismatchSnafu {
                site: site!(),
                description: format!($($arg),+),
            }
            .build(),
        ))
    };
}

/// Builds a public [`Error`] carrying a dispatch failure, for use in event
/// handlers, which return the public error type.
macro_rules! dispatch_error {
    ($($arg:expr),+) => {
        return Err(crate::Error::from(
            crate::error::DispatchSnafu {
                site: site!(),
                description: format!($($arg),+),
            }
            .build(),
        ))
    };
}
