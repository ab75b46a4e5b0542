//! Built-in tools: a clock and workspace-confined file access.

use std::path::{Component, Path, PathBuf};

use scommon::{unix_millis, unix_seconds};
use serde_json::{Value, json};
use sprovider::ToolDefinition;

use crate::{
    Tool, ToolError, ToolExecutionContext, ToolFuture, ToolRegistry, object_args, required_string,
};

pub const CURRENT_TIME: &str = "current_time";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";

#[derive(Debug, Default, Clone, Copy)]
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            CURRENT_TIME,
            "Returns the current time as unix seconds and milliseconds.",
            json!({"type": "object", "properties": {}}),
        )
    }

    fn invoke<'a>(
        &'a self,
        _input: &'a Value,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<Value, ToolError>> {
        Box::pin(async {
            Ok(json!({
                "unix_seconds": unix_seconds(),
                "unix_millis": unix_millis(),
            }))
        })
    }

    fn describe_use(&self, _input: &Value) -> String {
        "Checking the current time".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            READ_FILE,
            "Reads a UTF-8 text file relative to the workspace root.",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        )
    }

    fn decode_input(&self, input: Value) -> Result<Value, ToolError> {
        required_string(object_args(&input)?, "path")?;
        Ok(input)
    }

    fn invoke<'a>(
        &'a self,
        input: &'a Value,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<Value, ToolError>> {
        Box::pin(async move {
            let relative = required_string(object_args(input)?, "path")?;
            let path = confine(&self.root, relative)?;
            let content = tokio::fs::read_to_string(&path).await.map_err(|err| {
                ToolError::execution(format!("failed to read '{relative}': {err}"))
            })?;

            Ok(json!({ "path": relative, "content": content }))
        })
    }

    fn describe_use(&self, input: &Value) -> String {
        match input.get("path").and_then(Value::as_str) {
            Some(path) => format!("Reading {path}"),
            None => "Reading a file".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Tool for WriteFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            WRITE_FILE,
            "Writes a UTF-8 text file relative to the workspace root, creating parent directories.",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                },
                "required": ["path", "content"],
            }),
        )
    }

    fn requires_approval(&self) -> bool {
        true
    }

    fn decode_input(&self, input: Value) -> Result<Value, ToolError> {
        let args = object_args(&input)?;
        required_string(args, "path")?;
        required_string(args, "content")?;
        Ok(input)
    }

    fn invoke<'a>(
        &'a self,
        input: &'a Value,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<Value, ToolError>> {
        Box::pin(async move {
            let args = object_args(input)?;
            let relative = required_string(args, "path")?;
            let content = required_string(args, "content")?;
            let path = confine(&self.root, relative)?;

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|err| {
                    ToolError::execution(format!("failed to create '{}': {err}", parent.display()))
                })?;
            }
            tokio::fs::write(&path, content).await.map_err(|err| {
                ToolError::execution(format!("failed to write '{relative}': {err}"))
            })?;

            Ok(json!({ "path": relative, "bytes_written": content.len() }))
        })
    }

    fn describe_use(&self, input: &Value) -> String {
        match input.get("path").and_then(Value::as_str) {
            Some(path) => format!("Writing {path}"),
            None => "Writing a file".to_string(),
        }
    }
}

/// Joins `relative` onto `root`, refusing absolute paths, `..` segments and
/// symlinks that resolve outside the root.
fn confine(root: &Path, relative: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(relative);
    let escapes = candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if relative.trim().is_empty() || escapes {
        return Err(outside_root(relative));
    }

    let canonical_root = root.canonicalize().map_err(|err| {
        ToolError::execution(format!(
            "workspace root '{}' is unavailable: {err}",
            root.display()
        ))
    })?;
    let joined = root.join(candidate);

    // The deepest entry that exists, symlinks included, decides where the path lands.
    let Some(existing) = joined
        .ancestors()
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
    else {
        return Err(outside_root(relative));
    };
    let resolved = existing
        .canonicalize()
        .map_err(|_| outside_root(relative))?;
    if !resolved.starts_with(&canonical_root) {
        return Err(outside_root(relative));
    }

    Ok(joined)
}

fn outside_root(relative: &str) -> ToolError {
    ToolError::unauthorized(format!("path '{relative}' is outside the workspace root"))
}

/// Registers the clock plus, when a root is given, the file tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry, workspace_root: Option<&Path>) {
    registry.register(CurrentTimeTool);
    if let Some(root) = workspace_root {
        registry.register(ReadFileTool::new(root));
        registry.register(WriteFileTool::new(root));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolErrorKind;

    #[test]
    fn confine_rejects_escaping_paths() {
        let workspace = tempfile::tempdir().expect("tempdir should be created");
        let root = workspace.path();
        assert_eq!(
            confine(root, "notes/a.txt").expect("relative path is allowed"),
            root.join("notes/a.txt")
        );

        for escaping in ["../etc/passwd", "/etc/passwd", "a/../../b", ""] {
            let error = confine(root, escaping).expect_err("path must be refused");
            assert_eq!(error.kind, ToolErrorKind::Unauthorized);
        }
    }

    #[test]
    fn confine_requires_an_existing_root() {
        let error = confine(Path::new("/nonexistent/sluice-workspace"), "a.txt")
            .expect_err("missing root should fail");
        assert_eq!(error.kind, ToolErrorKind::Execution);
    }

    #[cfg(unix)]
    #[test]
    fn confine_follows_symlinks_before_checking_the_root() {
        use std::os::unix::fs::symlink;

        let workspace = tempfile::tempdir().expect("tempdir should be created");
        let outside = tempfile::tempdir().expect("tempdir should be created");
        let root = workspace.path();
        std::fs::write(outside.path().join("secret.txt"), "hidden").expect("file should be written");
        std::fs::create_dir(root.join("docs")).expect("dir should be created");
        std::fs::write(root.join("docs/readme.txt"), "hi").expect("file should be written");

        symlink(outside.path(), root.join("escape")).expect("dir link should be created");
        symlink(outside.path().join("secret.txt"), root.join("secret.txt"))
            .expect("file link should be created");
        symlink(outside.path().join("new.txt"), root.join("dangling.txt"))
            .expect("dangling link should be created");
        symlink(root.join("docs"), root.join("docs-link")).expect("inner link should be created");

        for escaping in ["escape/secret.txt", "escape/new/file.txt", "secret.txt", "dangling.txt"] {
            let error = confine(root, escaping).expect_err("symlink escape must be refused");
            assert_eq!(error.kind, ToolErrorKind::Unauthorized, "{escaping}");
        }

        confine(root, "docs-link/readme.txt").expect("links inside the root are allowed");
        confine(root, "docs/new.txt").expect("new files inside the root are allowed");
    }

    #[test]
    fn only_write_file_requires_approval() {
        assert!(!CurrentTimeTool.requires_approval());
        assert!(!ReadFileTool::new("/tmp").requires_approval());
        assert!(WriteFileTool::new("/tmp").requires_approval());
    }

    #[test]
    fn builtin_registration_respects_workspace_root() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, None);
        assert_eq!(registry.len(), 1);

        register_builtin_tools(&mut registry, Some(Path::new("/tmp")));
        assert!(registry.contains(READ_FILE));
        assert!(registry.contains(WRITE_FILE));
    }
}
