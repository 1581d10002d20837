use serde::{Deserialize, Serialize};

use crate::cloning::Cloning;

/// Construction options for a [`RootStore`](crate::RootStore).
///
/// Deserializable so a hosting application can keep it in its own config:
///
/// ```
/// let config: slice_store::StoreConfig =
///     serde_json::from_str(r#"{ "cloning": "deep" }"#).unwrap();
/// assert_eq!(config.cloning, slice_store::Cloning::Deep);
/// assert_eq!(config.worker_name, "slice-store");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub cloning: Cloning,
    /// Name of the worker thread that processes actions.
    pub worker_name: String,
}

impl StoreConfig {
    pub fn new(cloning: Cloning) -> Self {
        Self {
            cloning,
            ..Self::default()
        }
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cloning: Cloning::NoCopy,
            worker_name: "slice-store".to_string(),
        }
    }
}
