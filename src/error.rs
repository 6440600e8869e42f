use crate::ecs::components::InstanceId;

/// What kind of identifier failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Anchor,
    Template,
    Instance,
}

/// Recoverable failures inside a frame. None of these are fatal: the caller
/// logs them and skips the affected anchor or entity for this tick.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("no {kind:?} found for '{id}'")]
    LookupMiss { kind: LookupKind, id: String },

    #[error("anchor '{anchor}' is already bound to {instance}")]
    DuplicateBinding { anchor: String, instance: InstanceId },

    #[error("{0} no longer exists")]
    StaleReference(InstanceId),

    #[error("{0} unavailable this frame")]
    UnavailableDependency(&'static str),
}

impl CoreError {
    pub fn anchor_miss(id: impl Into<String>) -> Self {
        Self::LookupMiss {
            kind: LookupKind::Anchor,
            id: id.into(),
        }
    }

    pub fn template_miss(id: impl Into<String>) -> Self {
        Self::LookupMiss {
            kind: LookupKind::Template,
            id: id.into(),
        }
    }

    pub fn instance_miss(id: InstanceId) -> Self {
        Self::LookupMiss {
            kind: LookupKind::Instance,
            id: id.to_string(),
        }
    }

    /// Log at the severity this failure class warrants.
    pub fn log_skipped(&self, context: &str) {
        match self {
            Self::LookupMiss { .. } | Self::UnavailableDependency(_) => {
                log::warn!("{context}: {self}");
            }
            Self::DuplicateBinding { .. } | Self::StaleReference(_) => {
                log::debug!("{context}: {self}");
            }
        }
    }
}

/// Failures loading configuration or template tables from disk.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
