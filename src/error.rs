use miette::Diagnostic;
use thiserror::Error;

/// Main error type for sitekit operations
#[derive(Error, Diagnostic, Debug)]
pub enum SiteError {
    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(sitekit::io))]
    Io {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Config error: {message}")]
    #[diagnostic(code(sitekit::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Style error in {path}: {message}")]
    #[diagnostic(code(sitekit::style))]
    Style {
        path: std::path::PathBuf,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Markup error in {path}: {message}")]
    #[diagnostic(code(sitekit::markup))]
    Markup {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Image error in {path}: {message}")]
    #[diagnostic(code(sitekit::image))]
    Image {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Sprite error: {message}")]
    #[diagnostic(code(sitekit::sprite))]
    Sprite {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Task graph error: {message}")]
    #[diagnostic(code(sitekit::graph))]
    Graph { message: String },

    #[error("Task {task} failed: {message}")]
    #[diagnostic(code(sitekit::task))]
    Task { task: String, message: String },

    #[error("Server error: {message}")]
    #[diagnostic(code(sitekit::server))]
    Server {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Watch error: {message}")]
    #[diagnostic(code(sitekit::watch))]
    Watch { message: String },
}

impl SiteError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<std::path::PathBuf>, action: &str, err: std::io::Error) -> Self {
        SiteError::Io {
            path: path.into(),
            message: format!("{}: {}", action, err),
        }
    }

    /// Whether this is a source error (malformed style or markup input).
    pub fn is_source_error(&self) -> bool {
        matches!(self, SiteError::Style { .. } | SiteError::Markup { .. })
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
