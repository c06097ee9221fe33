use serde::Serialize;

/// Where image data lives for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Records survive restarts.
    #[default]
    Durable,
    /// Records are kept in process memory only.
    Memory,
}

impl StorageMode {
    /// Returns true for durable mode.
    #[must_use]
    pub const fn is_durable(self) -> bool {
        matches!(self, Self::Durable)
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Durable => write!(f, "durable"),
            Self::Memory => write!(f, "memory-only"),
        }
    }
}
