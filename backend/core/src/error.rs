use thiserror::Error;

/// Top-level error type for the Raven plugin platform.
#[derive(Debug, Error)]
pub enum RavenError {
    /// Malformed or missing plugin descriptor. Fatal at boot.
    #[error("manifest error in {location}: {message}")]
    Manifest { location: String, message: String },

    /// An export references an unknown sub-namespace or member.
    #[error("cannot resolve export {plugin}:{export}: {message}")]
    Resolution {
        plugin: String,
        export: String,
        message: String,
    },

    /// A lifecycle context entry failed to acquire. Already-acquired entries
    /// have been released by the time this is returned.
    #[error("lifecycle acquisition failed for {plugin}.{context_key}: {source}")]
    LifecycleAcquisition {
        plugin: String,
        context_key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("duplicate lifecycle context key: {plugin}.{context_key}")]
    DuplicateRegistration { plugin: String, context_key: String },

    /// A plugin export failed while gathering or executing.
    #[error("plugin {plugin}:{export} failed: {source}")]
    PluginExecution {
        plugin: String,
        export: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("executor {executor} is not offered by {plugin}:{export}")]
    UnknownExecutor {
        plugin: String,
        export: String,
        executor: String,
    },

    #[error("resource {resource} is not a valid target for executor {executor}")]
    TargetMismatch { executor: String, resource: String },

    #[error("invalid arguments for executor {executor}: {message}")]
    InvalidArguments { executor: String, message: String },

    #[error("access denied: requires {}", required.join(", "))]
    Authorization { required: Vec<String> },

    #[error("undecodable event: {0}")]
    EventDecode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RavenResult<T> = Result<T, RavenError>;

impl RavenError {
    pub fn manifest(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Manifest {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn resolution(
        plugin: impl Into<String>,
        export: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            plugin: plugin.into(),
            export: export.into(),
            message: message.into(),
        }
    }

    /// True for errors that must abort boot rather than be isolated.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Manifest { .. }
                | Self::LifecycleAcquisition { .. }
                | Self::DuplicateRegistration { .. }
                | Self::Config(_)
        )
    }
}
