//! Reading repository files.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::client::Scope;
use crate::errors::{ProviderError, Result};
use crate::gitlab::GitLabFile;
use crate::info::CommitFile;
use crate::refs::RepositoryRef;

/// Decode the base64 body of a files API response.
fn decode_content(file: &GitLabFile) -> Result<String> {
    let compact: String = file.content.split_whitespace().collect();
    let bytes = STANDARD.decode(compact).map_err(|e| {
        ProviderError::invalid_server_data(format!("file {}: {e}", file.file_path))
    })?;
    String::from_utf8(bytes).map_err(|e| {
        ProviderError::invalid_server_data(format!("file {}: {e}", file.file_path))
    })
}

/// Files of one repository.
#[derive(Debug, Clone)]
pub struct FileClient {
    scope: Scope,
    reference: RepositoryRef,
}

impl FileClient {
    pub(crate) fn new(scope: Scope, reference: RepositoryRef) -> Self {
        Self { scope, reference }
    }

    /// All files directly inside the directory `path` on `branch`, with content.
    pub async fn get(&self, path: &str, branch: &str) -> Result<Vec<CommitFile>> {
        let repo = self.reference.full_path();
        let nodes = self
            .scope
            .gitlab
            .list_tree(&repo, branch, Some(path), false)
            .await?;

        let mut files = Vec::new();
        for node in nodes.into_iter().filter(|n| n.kind == "blob") {
            let file = self.scope.gitlab.get_file(&repo, &node.path, branch).await?;
            files.push(CommitFile {
                path: node.path,
                content: Some(decode_content(&file)?),
            });
        }
        Ok(files)
    }
}
