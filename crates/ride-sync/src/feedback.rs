/// Run-scoped messages collected by the sync engine.
///
/// Components never write to a process-global logger; they push feedback
/// into the engine, and the caller decides how much of it to surface
/// (the CLI filters by its configured log level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Progress and outcome notes.
    Info(String),
    /// The run continued, but degraded or skipped something.
    Warning(String),
}

impl Feedback {
    pub fn info(msg: impl Into<String>) -> Self {
        Self::Info(msg.into())
    }

    pub fn warning(msg: impl Into<String>) -> Self {
        Self::Warning(msg.into())
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Warning(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Info(msg) | Self::Warning(msg) => msg,
        }
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info(msg) => write!(f, "{msg}"),
            Self::Warning(msg) => write!(f, "warning: {msg}"),
        }
    }
}
