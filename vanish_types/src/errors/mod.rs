use std::fmt::{Debug, Display, Formatter};

/// The default error type for the vanish crates
pub enum Error {
    /// Malformed duration or download-limit input. The buffer it was meant for is untouched
    Validation(String),
    /// The stored checksum no longer matches the payload of the named buffer
    Integrity(String),
    /// Authenticated decryption failed. Deliberately carries no detail: a wrong
    /// passphrase and corrupted ciphertext must look identical
    Crypto,
    /// No live buffer is registered under the name
    NotFound(String),
    /// A live buffer is already registered under the name
    DuplicateName(String),
    /// The named buffer has served its final permitted download
    LimitReached(String),
    /// Pinning, unpinning or another OS-level resource operation failed
    Resource(String),
}

impl Error {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn resource<T: Into<String>>(msg: T) -> Self {
        Self::Resource(msg.into())
    }

    fn to_msg(&self) -> String {
        match self {
            Error::Validation(msg) => format!("Invalid input: {msg}"),
            Error::Integrity(name) => format!("Checksum mismatch for buffer {name}"),
            Error::Crypto => "Unable to decrypt payload".to_string(),
            Error::NotFound(name) => format!("Buffer {name} does not exist"),
            Error::DuplicateName(name) => format!("Buffer {name} already exists"),
            Error::LimitReached(name) => format!("Download limit reached for buffer {name}"),
            Error::Resource(msg) => format!("Resource failure: {msg}"),
        }
    }

    /// Consumes self and returns the underlying error message
    pub fn into_string(self) -> String {
        self.to_msg()
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_msg())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Validation(a), Error::Validation(b)) => a == b,
            (Error::Integrity(a), Error::Integrity(b)) => a == b,
            (Error::Crypto, Error::Crypto) => true,
            (Error::NotFound(a), Error::NotFound(b)) => a == b,
            (Error::DuplicateName(a), Error::DuplicateName(b)) => a == b,
            (Error::LimitReached(a), Error::LimitReached(b)) => a == b,
            (Error::Resource(a), Error::Resource(b)) => a == b,
            _ => false,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Resource(err.to_string())
    }
}

impl std::error::Error for Error {}
