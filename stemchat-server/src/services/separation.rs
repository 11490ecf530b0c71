//! Separation job runner
//!
//! Runs the external separation tool (spleeter by default) on one inbox file.
//! A failed separation is an expected outcome reported as
//! [`JobOutcome::Failure`], not an error.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::time::SystemTime;
use stemchat_common::config::SeparationConfig;
use tracing::{debug, error, info, warn};

use super::FileStore;

/// Result of one separation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobOutcome {
    /// At least one artifact for the source is now in the outbox
    Success,
    /// No artifacts guaranteed; the inbox file is untouched
    Failure,
}

/// Separation job runner
///
/// Callers guarantee the file exists in the inbox. `run` returns only when
/// the job is over; there is no progress reporting, cancellation or timeout.
#[async_trait::async_trait]
pub trait SeparationRunner: Send + Sync {
    async fn run(&self, filename: &str) -> JobOutcome;
}

/// Runs `<program> <args...> -o <outbox> <inbox>/<filename>`
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    store: FileStore,
}

impl CommandRunner {
    pub fn new(config: &SeparationConfig, store: &FileStore) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            store: store.clone(),
        }
    }

    fn command(&self, input: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("-o")
            .arg(self.store.outbox())
            .arg(input);
        command
    }
}

#[async_trait::async_trait]
impl SeparationRunner for CommandRunner {
    async fn run(&self, filename: &str) -> JobOutcome {
        let input = match self.store.input_path(filename) {
            Ok(input) => input,
            Err(e) => {
                warn!(file = %filename, error = %e, "Refusing to separate file outside the inbox");
                return JobOutcome::Failure;
            }
        };
        let outbox = self.store.outbox();

        info!(
            file = %filename,
            program = %self.program,
            outbox = %outbox.display(),
            "Starting separation"
        );

        let before = snapshot_outbox(outbox).await;

        let mut command = self.command(&input);
        let output = match tokio::task::spawn_blocking(move || command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(file = %filename, program = %self.program, error = %e, "Failed to execute separation tool");
                return JobOutcome::Failure;
            }
            Err(e) => {
                error!(file = %filename, error = %e, "Separation task join error");
                return JobOutcome::Failure;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                file = %filename,
                exit_code = ?output.status.code(),
                stderr = %stderr.trim(),
                "Separation failed"
            );
            return JobOutcome::Failure;
        }

        let artifacts = new_artifacts(outbox, filename, &before).await;
        if artifacts.is_empty() {
            warn!(file = %filename, "Separation tool exited cleanly but produced no outputs");
            return JobOutcome::Failure;
        }

        info!(file = %filename, artifacts = ?artifacts, "Separation complete");
        JobOutcome::Success
    }
}

/// Source file name without its extension
pub fn source_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// Outbox entry names with their modification times
async fn snapshot_outbox(outbox: &Path) -> HashMap<String, Option<SystemTime>> {
    let mut snapshot = HashMap::new();

    let mut entries = match tokio::fs::read_dir(outbox).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(outbox = %outbox.display(), error = %e, "Cannot read outbox");
            return snapshot;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(name) = entry.file_name().into_string() {
            let modified = entry.metadata().await.and_then(|m| m.modified()).ok();
            snapshot.insert(name, modified);
        }
    }

    snapshot
}

/// Outputs `<stem>_*` created or rewritten since `before` was taken
async fn new_artifacts(
    outbox: &Path,
    filename: &str,
    before: &HashMap<String, Option<SystemTime>>,
) -> Vec<String> {
    let prefix = format!("{}_", source_stem(filename));

    let mut found: Vec<String> = snapshot_outbox(outbox)
        .await
        .into_iter()
        .filter(|(name, modified)| {
            name.starts_with(&prefix)
                && match before.get(name) {
                    None => true,
                    Some(previous) => previous != modified,
                }
        })
        .map(|(name, _)| name)
        .collect();
    found.sort();

    for name in &found {
        debug!(artifact = %name, "Found separation output");
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use stemchat_common::config::StoragePaths;

    fn runner_for(program: &str, args: &[&str]) -> (tempfile::TempDir, FileStore, CommandRunner) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(StoragePaths::under(temp_dir.path())).unwrap();
        let config = SeparationConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        let runner = CommandRunner::new(&config, &store);
        (temp_dir, store, runner)
    }

    #[test]
    fn test_source_stem() {
        assert_eq!(source_stem("song.mp3"), "song");
        assert_eq!(source_stem("my.song.wav"), "my.song");
        assert_eq!(source_stem("noext"), "noext");
    }

    #[test]
    fn test_command_layout() {
        let (_temp, store, runner) = runner_for("spleeter", &["separate", "-p", "spleeter:2stems"]);
        let input = store.inbox().join("song.mp3");
        let command = runner.command(&input);

        assert_eq!(command.get_program(), "spleeter");
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "separate");
        assert_eq!(args[3], "-o");
        assert_eq!(args[4], store.outbox().as_os_str());
        assert_eq!(args[5], input.as_os_str());
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let (_temp, store, runner) = runner_for("stemchat-no-such-separator", &[]);
        store.put("song.mp3", b"x").await.unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let (_temp, store, runner) = runner_for("false", &[]);
        store.put("song.mp3", b"x").await.unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_without_outputs_is_failure() {
        let (_temp, store, runner) = runner_for("true", &[]);
        store.put("song.mp3", b"x").await.unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_outputs_named_after_source_is_success() {
        // sh -c <script> sep -o <outbox> <input>: $2 = outbox, $3 = input
        let script = r#"stem=$(basename "$3"); stem="${stem%.*}"; cp "$3" "$2/${stem}_vocals.wav""#;
        let (_temp, store, runner) = runner_for("sh", &["-c", script, "sep"]);
        store.put("song.mp3", b"audio").await.unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Success);
        assert_eq!(
            store.list_outputs().await.unwrap(),
            vec!["song_vocals.wav".to_string()]
        );
        // Source is left in place
        assert!(store.exists("song.mp3").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unrelated_outputs_do_not_count() {
        let (_temp, store, runner) = runner_for("true", &[]);
        store.put("song.mp3", b"x").await.unwrap();
        std::fs::write(store.outbox().join("songbird_vocals.wav"), b"other").unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stale_outputs_do_not_count() {
        let (_temp, store, runner) = runner_for("true", &[]);
        store.put("song.mp3", b"x").await.unwrap();
        std::fs::write(store.outbox().join("song_vocals.wav"), b"old run").unwrap();

        assert_eq!(runner.run("song.mp3").await, JobOutcome::Failure);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_names_outside_inbox_are_not_separated() {
        // Copies whatever input it is handed into the outbox
        let script = r#"cp "$3" "$2/secret_vocals.wav""#;
        let (temp, store, runner) = runner_for("sh", &["-c", script, "sep"]);
        std::fs::write(temp.path().join("secret.mp3"), b"private").unwrap();

        assert_eq!(runner.run("../secret.mp3").await, JobOutcome::Failure);
        assert!(store.list_outputs().await.unwrap().is_empty());
    }
}
