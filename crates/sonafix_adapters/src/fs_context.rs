//! Filesystem-backed context extraction.
//!
//! Reads the snippet around a flagged line straight from the checked
//! out repository. Line numbers are 1-based; the requested window is
//! clamped to the file's bounds.

use std::path::PathBuf;

use async_trait::async_trait;

use sonafix_core::{CodeContext, ContextProvider, CoreResult, FixerError};

/// `ContextProvider` reading from a local checkout.
pub struct FsContextProvider {
    root: PathBuf,
}

impl FsContextProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContextProvider for FsContextProvider {
    async fn get_context(
        &self,
        path: &str,
        line: u32,
        before: usize,
        after: usize,
    ) -> CoreResult<CodeContext> {
        let full_path = self.root.join(path);
        let content = tokio::fs::read_to_string(&full_path).await.map_err(|_| {
            FixerError::ContextMissing {
                path: path.to_string(),
                line,
            }
        })?;
        let lines: Vec<&str> = content.lines().collect();
        if line == 0 || line as usize > lines.len() {
            return Err(FixerError::ContextMissing {
                path: path.to_string(),
                line,
            });
        }

        let start_line = line.saturating_sub(before as u32).max(1);
        let end_line = (line as usize + after).min(lines.len()) as u32;
        let snippet = lines[(start_line as usize - 1)..end_line as usize].join("\n") + "\n";

        Ok(CodeContext {
            file_path: path.to_string(),
            target_line: line,
            start_line,
            end_line,
            snippet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn checkout_with(path: &str, content: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
        dir
    }

    fn numbered_file(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {}\n", i)).collect()
    }

    #[tokio::test]
    async fn test_window_around_middle_line() {
        let dir = checkout_with("src/app.py", &numbered_file(30));
        let provider = FsContextProvider::new(dir.path());

        let ctx = provider.get_context("src/app.py", 15, 2, 2).await.unwrap();
        assert_eq!(ctx.start_line, 13);
        assert_eq!(ctx.end_line, 17);
        assert_eq!(ctx.snippet, "line 13\nline 14\nline 15\nline 16\nline 17\n");
    }

    #[tokio::test]
    async fn test_window_is_clamped_at_file_start_and_end() {
        let dir = checkout_with("src/app.py", &numbered_file(5));
        let provider = FsContextProvider::new(dir.path());

        let top = provider.get_context("src/app.py", 1, 10, 2).await.unwrap();
        assert_eq!(top.start_line, 1);
        assert_eq!(top.end_line, 3);

        let bottom = provider.get_context("src/app.py", 5, 2, 10).await.unwrap();
        assert_eq!(bottom.start_line, 3);
        assert_eq!(bottom.end_line, 5);
    }

    #[tokio::test]
    async fn test_missing_file_is_context_missing() {
        let dir = TempDir::new().unwrap();
        let provider = FsContextProvider::new(dir.path());

        let err = provider.get_context("gone.py", 3, 2, 2).await.unwrap_err();
        assert!(matches!(err, FixerError::ContextMissing { .. }));
    }

    #[tokio::test]
    async fn test_line_past_end_is_context_missing() {
        let dir = checkout_with("src/app.py", &numbered_file(5));
        let provider = FsContextProvider::new(dir.path());

        let err = provider.get_context("src/app.py", 99, 2, 2).await.unwrap_err();
        assert!(matches!(err, FixerError::ContextMissing { line: 99, .. }));
    }
}
