//! Durable draft storage

use tracing::debug;

use crate::errors::DeckError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::wizard::draft::Draft;

/// Key the deployment wizard draft is stored under
pub const DRAFT_KEY: &str = "deploy-wizard-draft";

/// One JSON document per draft key inside a directory
#[derive(Debug, Clone)]
pub struct DraftStore {
    file: File,
}

impl DraftStore {
    /// Store for the deployment wizard draft in `dir`
    pub fn new(dir: &Dir) -> Self {
        Self::with_key(dir, DRAFT_KEY)
    }

    pub fn with_key(dir: &Dir, key: &str) -> Self {
        Self {
            file: dir.file(&format!("{}.json", key)),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Load the saved draft, or defaults when nothing was saved.
    /// A file that cannot be decoded is an error, not an empty draft.
    pub async fn load(&self) -> Result<Draft, DeckError> {
        if !self.file.exists().await {
            return Ok(Draft::default());
        }
        self.file.read_json::<Draft>().await.map_err(|e| {
            DeckError::StorageError(format!(
                "Corrupt draft at {}: {}",
                self.file.path().display(),
                e
            ))
        })
    }

    pub async fn save(&self, draft: &Draft) -> Result<(), DeckError> {
        debug!("Saving wizard draft at step {}", draft.current_step);
        self.file.write_json_atomic(draft).await
    }

    /// Forget the saved draft; the next load starts from defaults
    pub async fn clear(&self) -> Result<(), DeckError> {
        self.file.delete().await
    }
}
