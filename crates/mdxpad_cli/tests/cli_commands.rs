//! Integration tests for CLI commands
//!
//! Tests for init, render and live.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a command for the mdxpad CLI
fn mdxpad_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mdxpad"))
}

fn write_doc(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

/// Parses each stdout line of `live` as JSON.
fn frames(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

mod init_command {
    use super::*;

    #[test]
    fn creates_new_config_file() {
        let temp_dir = TempDir::new().unwrap();

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .assert()
            .success()
            .stderr(predicate::str::contains("Created .mdxpad.jsonc"));

        let config_path = temp_dir.path().join(".mdxpad.jsonc");
        let content = fs::read_to_string(config_path).unwrap();
        assert!(content.contains("gfm"));
        assert!(content.contains("debounceMs"));
        assert!(content.contains("props"));
    }

    #[test]
    fn fails_when_config_exists_without_force() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".mdxpad.jsonc"), "{}").unwrap();

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .assert()
            .failure()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn overwrites_config_with_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".mdxpad.jsonc");
        fs::write(&config_path, r#"{"gfm": true}"#).unwrap();

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("init")
            .arg("--force")
            .assert()
            .success();

        let content = fs::read_to_string(config_path).unwrap();
        assert!(content.contains(r#""gfm": false"#));
    }
}

mod render_command {
    use super::*;

    #[test]
    fn renders_heading_as_html() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "doc.mdx", "# Title\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "doc.mdx"])
            .assert()
            .success()
            .stdout("<h1>Title</h1>\n");
    }

    #[test]
    fn reports_compile_error() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "broken.mdx", "<div>\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "broken.mdx"])
            .assert()
            .code(1)
            .stdout("")
            .stderr(predicate::str::contains("error broken.mdx:"));
    }

    #[test]
    fn reports_render_fault() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "fault.mdx", "{props.user.name}\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "fault.mdx"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Cannot read properties of undefined"));
    }

    #[test]
    fn gfm_flag_enables_strikethrough() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "doc.mdx", "~~gone~~\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "doc.mdx"])
            .assert()
            .success()
            .stdout("<p>~~gone~~</p>\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "doc.mdx", "--gfm"])
            .assert()
            .success()
            .stdout("<p><del>gone</del></p>\n");
    }

    #[test]
    fn uses_discovered_config() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".mdxpad.jsonc"),
            r#"{
  // Greeting target
  "props": { "name": "World" }
}"#,
        )
        .unwrap();
        write_doc(temp_dir.path(), "doc.mdx", "Hello {props.name}\n");

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "doc.mdx"])
            .assert()
            .success()
            .stdout("<p>Hello World</p>\n");
    }

    #[test]
    fn outputs_json() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "doc.mdx", "# Title\n");

        let assert = mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "doc.mdx", "--format", "json"])
            .assert()
            .success();

        let json: serde_json::Value =
            serde_json::from_slice(&assert.get_output().stdout).unwrap();
        assert_eq!(json["path"], "doc.mdx");
        assert_eq!(json["diagnostics"], serde_json::json!([]));
        assert_eq!(json["output"]["state"], "document");
    }

    #[test]
    fn fails_on_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["render", "missing.mdx"])
            .assert()
            .code(2);
    }
}

mod live_command {
    use super::*;

    #[test]
    fn renders_final_text() {
        let temp_dir = TempDir::new().unwrap();

        let assert = mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("live")
            .write_stdin("{\"type\":\"change\",\"text\":\"# Hi\"}\n")
            .assert()
            .success();

        let frames = frames(&assert.get_output().stdout);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["sequence"], 1);
        assert_eq!(frames[0]["state"], "document");
        assert_eq!(frames[0]["html"], "<h1>Hi</h1>");
    }

    #[test]
    fn last_edit_wins() {
        let temp_dir = TempDir::new().unwrap();

        let assert = mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("live")
            .write_stdin(concat!(
                "{\"type\":\"change\",\"text\":\"a\"}\n",
                "{\"type\":\"change\",\"text\":\"ab\"}\n",
                "{\"type\":\"change\",\"text\":\"abc\"}\n",
            ))
            .assert()
            .success();

        let frames = frames(&assert.get_output().stdout);
        let last = frames.last().unwrap();
        assert_eq!(last["html"], "<p>abc</p>");
        assert_eq!(last["sequence"], 2);
    }

    #[test]
    fn toggle_recompiles() {
        let temp_dir = TempDir::new().unwrap();

        let assert = mdxpad_cmd()
            .current_dir(temp_dir.path())
            .args(["live", "--debounce-ms", "0"])
            .write_stdin(concat!(
                "{\"type\":\"change\",\"text\":\"~~x~~\"}\n",
                "{\"type\":\"flush\"}\n",
                "{\"type\":\"toggle\",\"gfm\":true}\n",
            ))
            .assert()
            .success();

        let frames = frames(&assert.get_output().stdout);
        assert_eq!(frames.last().unwrap()["html"], "<p><del>x</del></p>");
    }

    #[test]
    fn reports_compile_error_inline() {
        let temp_dir = TempDir::new().unwrap();

        let assert = mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("live")
            .write_stdin("{\"type\":\"change\",\"text\":\"<div>\"}\n")
            .assert()
            .success();

        let frames = frames(&assert.get_output().stdout);
        assert_eq!(frames[0]["state"], "compileError");
        assert_eq!(frames[0]["diagnostics"][0]["fatal"], true);
    }

    #[test]
    fn ignores_invalid_events() {
        let temp_dir = TempDir::new().unwrap();

        mdxpad_cmd()
            .current_dir(temp_dir.path())
            .arg("live")
            .write_stdin("not json\n")
            .assert()
            .success()
            .stdout("")
            .stderr(predicate::str::contains("Ignoring invalid event"));
    }
}
