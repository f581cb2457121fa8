use thiserror::Error;

/// Main error type for the automix library
#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Mixing error: {0}")]
    Mix(#[from] MixError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid audio buffer: {details}")]
    InvalidBuffer { details: String },

    #[error("Unsupported channel layout: {channels} -> {target} channels")]
    UnsupportedChannelLayout { channels: u16, target: u16 },

    #[error("Resampling failed: {reason}")]
    ResampleFailed { reason: String },

    #[error("Audio analysis failed: {reason}")]
    AnalysisFailed { reason: String },

    #[error("Failed to write audio file: {path}")]
    WriteFailed { path: String },
}

/// Mix-specific errors
#[derive(Error, Debug)]
pub enum MixError {
    #[error("Invalid mix parameters: {details}")]
    InvalidParameters { details: String },

    #[error("Input track is empty: {track}")]
    EmptyInput { track: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using MixerError
pub type Result<T> = std::result::Result<T, MixerError>;

impl MixerError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Audio(AudioError::LoadFailed { .. }) => true,
            Self::Audio(AudioError::WriteFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::LoadFailed { path }) => {
                format!("Could not load audio file '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Audio(AudioError::UnsupportedChannelLayout { channels, target }) => {
                format!("Cannot mix a {}-channel track into a {}-channel track. Convert one of them to mono or matching channels first.", channels, target)
            }
            Self::Mix(MixError::EmptyInput { track }) => {
                format!("Track '{}' contains no audio after trimming.", track)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
