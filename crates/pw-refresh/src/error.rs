use thiserror::Error;

use pw_common::StatCategory;
use pw_directory::DirectoryError;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Upstream directory error: {0}")]
    Upstream(#[from] DirectoryError),

    #[error("Storage error: {error:#}")]
    Storage { error: anyhow::Error },

    #[error("Failed to store {category}: {error:#}")]
    CategoryStorage {
        category: StatCategory,
        error: anyhow::Error,
    },

    #[error("{failures} entries failed to reconcile, request re-queued")]
    PartialReconcile { failures: usize },

    #[error("Refresh cancelled")]
    Cancelled,
}

impl RefreshError {
    pub fn storage(error: anyhow::Error) -> Self {
        Self::Storage { error }
    }
}
