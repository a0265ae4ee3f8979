//! Error types
use std::{convert::From, error, fmt, io, result};

#[derive(Debug)]
pub enum Error {
    IO(io::Error),
    Serde(serde_json::Error),
    Http(Box<ureq::Error>),
    Regex(regex::Error),
    Soap(SoapFault),
    UnknownDevice(String),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IO(_) => f.write_str("Error talking to the network"),
            Error::Serde(_) => f.write_str("Could not parse the configuration"),
            Error::Http(err) => write!(f, "Error connecting to the device: {}", err),
            Error::Regex(err) => write!(f, "Invalid pattern: {}", err),
            Error::Soap(fault) => write!(f, "Device rejected the request: {}", fault),
            Error::UnknownDevice(name) => write!(f, "Unknown WeMo device: {}", name),
            Error::Other(err) => f.write_str(err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IO(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Http(err) => Some(err.as_ref()),
            Error::Regex(err) => Some(err),
            Error::Soap(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serde(error)
    }
}

impl From<ureq::Error> for Error {
    fn from(error: ureq::Error) -> Self {
        Error::Http(Box::new(error))
    }
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Error::Regex(error)
    }
}

impl From<String> for Error {
    fn from(error: String) -> Self {
        Error::Other(error)
    }
}

impl From<SoapFault> for Error {
    fn from(error: SoapFault) -> Self {
        Error::Soap(error)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// UPnP error reported in the body of a SOAP fault
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFault {
    pub code: String,
    pub description: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)
    }
}

impl error::Error for SoapFault {}
