//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Path of a transcript fixture.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("transcripts")
        .join(format!("{}.jsonl", name))
}

/// Load a transcript fixture.
pub fn load_fixture(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e))
}

/// Create `<root>/<project>` and return it.
pub fn project_dir(root: &Path, project: &str) -> PathBuf {
    let dir = root.join(project);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Append raw bytes to a file, creating it if needed.
pub fn append(path: &Path, content: &str) {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// A single assistant line invoking `tool` on `file_path`.
pub fn tool_line(tool: &str, file_path: &str, timestamp: &str) -> String {
    let line = serde_json::json!({
        "type": "assistant",
        "timestamp": timestamp,
        "message": {"content": [{"type": "tool_use", "name": tool, "input": {"file_path": file_path}}]}
    });
    format!("{}\n", line)
}
