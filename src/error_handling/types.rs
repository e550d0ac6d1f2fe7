use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    ListenEmpty,
    BadListenSpec(String),
    ResolveFailed(String, std::io::Error),
    DirectoryDoesNotExist(PathBuf),
    NotADirectory(PathBuf),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::ListenEmpty => write!(f, "No listen specification given"),
            ConfigError::BadListenSpec(s) => write!(f, "Bad listen specification: {}", s),
            ConfigError::ResolveFailed(s, e) => write!(f, "Cannot resolve {}: {}", s, e),
            ConfigError::DirectoryDoesNotExist(p) => {
                write!(f, "Directory does not exist: {}", p.display())
            }
            ConfigError::NotADirectory(p) => write!(f, "Not a directory: {}", p.display()),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum NetworkError {
    SockError(std::io::Error),
    BindError(std::io::Error),
    RecvError(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::SockError(e) => write!(f, "Socket error: {}", e),
            NetworkError::BindError(e) => write!(f, "Bind error: {}", e),
            NetworkError::RecvError(e) => write!(f, "Receive error: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum CaptureError {
    DirectorySetup(PathBuf, std::io::Error),
    DirectoryOccupied(PathBuf),
    FileCreate(PathBuf, std::io::Error),
    WriteFailed(std::io::Error),
    NetworkError(NetworkError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::DirectorySetup(p, e) => {
                write!(f, "Directory setup failed for {}: {}", p.display(), e)
            }
            CaptureError::DirectoryOccupied(p) => {
                write!(f, "Path exists but is not a directory: {}", p.display())
            }
            CaptureError::FileCreate(p, e) => {
                write!(f, "Capture file create failed for {}: {}", p.display(), e)
            }
            CaptureError::WriteFailed(e) => write!(f, "Capture write failed: {}", e),
            CaptureError::NetworkError(e) => write!(f, "Network error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<NetworkError> for CaptureError {
    fn from(err: NetworkError) -> Self {
        CaptureError::NetworkError(err)
    }
}
