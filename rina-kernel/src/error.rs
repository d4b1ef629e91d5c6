//
// Copyright (c) The RINA Daemon Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::warn;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    ChannelClosed,
}

impl Error {
    pub fn log(&self) {
        match self {
            Error::Io(error) => warn!(%error, "{}", self),
            Error::ChannelClosed => warn!("{}", self),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(..) => write!(f, "kernel channel I/O error"),
            Error::ChannelClosed => write!(f, "kernel channel closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(error) => Some(error),
            Error::ChannelClosed => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::Io(error)
    }
}
