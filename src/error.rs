use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum PanelError {
    /// The generator path file was missing or unreadable.
    ConfigLoad { path: PathBuf, message: String },
    /// The external generator could not be started.
    Launch(String),
    /// A generator process from a previous run is still alive.
    RunInProgress,
    Io { path: PathBuf, source: io::Error },
    Decode { path: PathBuf, message: String },
    Encode(String),
    Settings(String),
}

impl PanelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PanelError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PanelError::ConfigLoad { path, message } => {
                write!(f, "Failed to load {}: {}", path.display(), message)
            }
            PanelError::Launch(message) => write!(f, "Failed to start generator: {}", message),
            PanelError::RunInProgress => write!(f, "A generator run is still in progress"),
            PanelError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            PanelError::Decode { path, message } => {
                write!(f, "Failed to decode {}: {}", path.display(), message)
            }
            PanelError::Encode(message) => write!(f, "Failed to encode animation: {}", message),
            PanelError::Settings(message) => write!(f, "Settings error: {}", message),
        }
    }
}

impl std::error::Error for PanelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PanelError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<image::ImageError> for PanelError {
    fn from(err: image::ImageError) -> Self {
        PanelError::Encode(err.to_string())
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(err: serde_json::Error) -> Self {
        PanelError::Settings(err.to_string())
    }
}
