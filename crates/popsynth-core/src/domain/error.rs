//! Domain-level error taxonomy for popsynth.

use std::path::PathBuf;

/// Errors produced while reading a grid file.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("line {line}: unknown grid option: --{option}")]
    UnknownOption { line: usize, option: String },

    #[error("line {line}: grid option --{option} is missing a value")]
    MissingValue { line: usize, option: String },

    #[error("line {line}: invalid value '{value}' for grid option --{option}")]
    InvalidValue {
        line: usize,
        option: String,
        value: String,
    },

    #[error("line {line}: expected an option, found '{token}'")]
    UnexpectedToken { line: usize, token: String },

    #[error("failed to read grid file: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the logging collaborator.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to create output container {path:?}: {source}")]
    ContainerCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {file}: {source}")]
    Write {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to close {file}")]
    NotClosed { file: String },

    #[error("logging service is not running")]
    NotStarted,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors produced when an object cannot be fully constructed.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("initial mass must be positive and finite, got {0}")]
    InvalidMass(f64),

    #[error("metallicity must lie in (0, 1), got {0}")]
    InvalidMetallicity(f64),

    #[error("semi-major axis must be positive and finite, got {0}")]
    InvalidSeparation(f64),

    #[error("stars touch at birth: separation {separation} AU, summed radii {radii} AU")]
    TouchingAtBirth { separation: f64, radii: f64 },
}

/// Problems raised while one object evolves. They are catalogued per object
/// and do not stop the sweep.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectError {
    #[error("allowed evolution time exceeded at {0:.3} Myr")]
    TimeLimitReached(f64),

    #[error("allowed number of timesteps exceeded ({0})")]
    TimestepLimitReached(u64),
}

impl ObjectError {
    /// Catalog key: one entry per kind per object.
    pub fn kind(&self) -> &'static str {
        match self {
            ObjectError::TimeLimitReached(_) => "time_limit",
            ObjectError::TimestepLimitReached(_) => "timestep_limit",
        }
    }
}

/// Top-level popsynth errors.
#[derive(Debug, thiserror::Error)]
pub enum PopsynthError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    #[error("logging error: {0}")]
    Log(#[from] LogError),

    #[error("construction error: {0}")]
    Construction(#[from] ConstructionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for popsynth operations.
pub type Result<T> = std::result::Result<T, PopsynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_error_display_names_line_and_option() {
        let err = GridError::InvalidValue {
            line: 4,
            option: "initial-mass".to_string(),
            value: "heavy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("line 4"));
        assert!(msg.contains("--initial-mass"));
        assert!(msg.contains("heavy"));
    }

    #[test]
    fn test_popsynth_error_wraps_sources() {
        let err: PopsynthError = LogError::NotClosed {
            file: "BSE_Detailed_Output_3".to_string(),
        }
        .into();
        assert!(err.to_string().contains("logging error"));
        assert!(err.to_string().contains("BSE_Detailed_Output_3"));

        let err: PopsynthError = ConstructionError::InvalidMass(-1.0).into();
        assert!(err.to_string().contains("construction error"));
    }
}
