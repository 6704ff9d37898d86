//! Object store backed by an external transfer tool.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::Path;

use crate::command::{run_template, CommandError};

use super::config::CommandStoreConfig;
use super::error::TransferError;
use super::traits::ObjectStore;
use super::types::RemoteObject;

/// Object store that shells out to configured copy/list/remove commands.
pub struct CommandObjectStore {
    config: CommandStoreConfig,
    listing_line: Regex,
}

impl CommandObjectStore {
    /// Creates a new store with the given configuration.
    pub fn new(config: CommandStoreConfig) -> Self {
        Self {
            config,
            // <size> [<ISO-8601 timestamp>] <location>; the location is the
            // rest of the line so paths may contain spaces.
            listing_line: Regex::new(r"^\s*(\d+)\s+(?:\d{4}-\d{2}-\d{2}T\S*\s+)?(\S.*?)\s*$")
                .expect("listing pattern is valid"),
        }
    }

    /// Parses listing output into objects, skipping headers, totals and prefixes.
    pub fn parse_listing(&self, output: &str) -> Vec<RemoteObject> {
        output
            .lines()
            .filter_map(|line| {
                let caps = self.listing_line.captures(line)?;
                let size_bytes = caps.get(1)?.as_str().parse().ok()?;
                let path = caps.get(2)?.as_str();
                (!path.ends_with('/')).then(|| RemoteObject {
                    path: path.to_string(),
                    size_bytes,
                })
            })
            .collect()
    }

    fn is_not_found(&self, error: &CommandError) -> bool {
        let CommandError::Failed { stderr, .. } = error else {
            return false;
        };
        let stderr = stderr.to_ascii_lowercase();
        self.config
            .not_found_patterns
            .iter()
            .any(|p| stderr.contains(&p.to_ascii_lowercase()))
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<(), TransferError> {
        run_template(
            &self.config.copy,
            &[("source", source), ("dest", dest)],
            self.config.timeout_secs,
            None,
        )
        .await
        .map_err(|e| TransferError::copy_failed(source, dest, e))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for CommandObjectStore {
    fn name(&self) -> &str {
        "command"
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransferError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::LocalPath {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        self.copy(remote, &local.to_string_lossy()).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        self.copy(&local.to_string_lossy(), remote).await
    }

    async fn stat(&self, remote: &str) -> Result<Option<u64>, TransferError> {
        let objects = self.list(remote).await?;
        Ok(objects
            .into_iter()
            .find(|o| o.path == remote)
            .map(|o| o.size_bytes))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, TransferError> {
        match run_template(
            &self.config.list,
            &[("path", prefix)],
            self.config.timeout_secs,
            None,
        )
        .await
        {
            Ok(output) => Ok(self.parse_listing(&output.stdout)),
            Err(e) if self.is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(TransferError::ListFailed {
                location: prefix.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn remove(&self, prefix: &str) -> Result<(), TransferError> {
        match run_template(
            &self.config.remove,
            &[("path", prefix)],
            self.config.timeout_secs,
            None,
        )
        .await
        {
            Ok(_) => Ok(()),
            // Never read stderr as "already gone" here: a failed removal is
            // a failure, and callers confirm absence with `list`.
            Err(e) => Err(TransferError::remove_failed(prefix, e)),
        }
    }

    async fn validate(&self) -> Result<(), TransferError> {
        for template in [&self.config.copy, &self.config.list, &self.config.remove] {
            if template.is_empty() {
                return Err(TransferError::Command(CommandError::EmptyTemplate));
            }
        }
        Ok(())
    }
}
