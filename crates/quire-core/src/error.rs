use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    ManifestNotFound = 2,
    ManifestFormat = 3,
    SourceNotFound = 4,
    Conversion = 5,
    Write = 6,
}

impl ExitCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::Failure),
            2 => Some(Self::ManifestNotFound),
            3 => Some(Self::ManifestFormat),
            4 => Some(Self::SourceNotFound),
            5 => Some(Self::Conversion),
            6 => Some(Self::Write),
            _ => None,
        }
    }
}

/// Failures that abort a render run. None of them is recovered locally.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("manifest {path} not found")]
    ManifestNotFound { path: PathBuf },

    #[error("malformed manifest {path}: {message}")]
    ManifestFormat { path: PathBuf, message: String },

    #[error(
        "source {} not found under {}{}",
        .path.display(),
        .root.display(),
        suggestion_hint(.suggestion)
    )]
    SourceNotFound {
        path: PathBuf,
        root: PathBuf,
        suggestion: Option<PathBuf>,
    },

    #[error("failed to convert {path}: {message}")]
    Conversion { path: PathBuf, message: String },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl BookError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::ManifestNotFound { .. } => ExitCode::ManifestNotFound,
            Self::ManifestFormat { .. } => ExitCode::ManifestFormat,
            Self::SourceNotFound { .. } => ExitCode::SourceNotFound,
            Self::Conversion { .. } => ExitCode::Conversion,
            Self::Write { .. } => ExitCode::Write,
        }
    }

    pub(crate) fn manifest_format(path: &Path, message: impl Into<String>) -> Self {
        Self::ManifestFormat {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn conversion(path: &Path, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

fn suggestion_hint(suggestion: &Option<PathBuf>) -> String {
    match suggestion {
        Some(candidate) => format!(" (did you mean '{}'?)", candidate.display()),
        None => String::new(),
    }
}

pub type BookResult<T> = Result<T, BookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_round_trip_through_u8() {
        for code in [
            ExitCode::Success,
            ExitCode::Failure,
            ExitCode::ManifestNotFound,
            ExitCode::ManifestFormat,
            ExitCode::SourceNotFound,
            ExitCode::Conversion,
            ExitCode::Write,
        ] {
            assert_eq!(ExitCode::from_u8(code as u8), Some(code));
        }
        assert_eq!(ExitCode::from_u8(42), None);
    }

    #[test]
    fn missing_source_message_names_path_and_suggestion() {
        let err = BookError::SourceNotFound {
            path: PathBuf::from("missing.md"),
            root: PathBuf::from("/book"),
            suggestion: Some(PathBuf::from("mising.md")),
        };
        assert_eq!(
            err.to_string(),
            "source missing.md not found under /book (did you mean 'mising.md'?)"
        );
        assert_eq!(err.exit_code(), ExitCode::SourceNotFound);
    }
}
