//! Integration tests for the developer helpers

mod common;

use camino::Utf8Path;
use common::{ScriptedRunner, utf8, write_file};
use electron_decompiler::models::DecompilerSettings;
use electron_decompiler::services::CommandOutput;
use electron_decompiler::services::devtools::{analyze_source_maps, install_tools};
use tempfile::TempDir;

#[tokio::test]
async fn test_install_continues_after_failure() {
    let runner = ScriptedRunner::new(|index, _| {
        if index == 1 {
            CommandOutput::failed(1, "npm ERR! 404 Not Found")
        } else {
            CommandOutput::succeeded()
        }
    });
    let tools = DecompilerSettings::default().global_tools;

    let results = install_tools(&runner, Utf8Path::new("/fake/bin/npm"), &tools).await;

    assert_eq!(results.len(), tools.len());
    assert!(results[0].succeeded());
    assert_eq!(results[1].error.as_deref(), Some("npm ERR! 404 Not Found"));
    assert!(results[2..].iter().all(|r| r.succeeded()));

    let calls = runner.calls();
    assert_eq!(calls.len(), tools.len());
    assert_eq!(calls[0].program, "/fake/bin/npm");
    assert_eq!(calls[0].args, vec!["install", "-g", tools[0].as_str()]);
}

#[tokio::test]
async fn test_source_map_failures_do_not_stop_analysis() {
    let temp = TempDir::new().unwrap();
    let root = utf8(&temp);
    for name in ["a", "b", "c"] {
        write_file(&root.join(format!("{}.js", name)), b"x");
        write_file(&root.join(format!("{}.js.map", name)), b"{}");
    }

    let runner = ScriptedRunner::new(|index, _| {
        if index == 0 {
            CommandOutput::failed(1, "bad map")
        } else {
            CommandOutput::succeeded()
        }
    });

    let report = analyze_source_maps(&runner, &root).await;

    assert_eq!(runner.calls().len(), 3);
    assert_eq!(report.analyzed, 2);
    assert_eq!(report.failed, vec![root.join("a.js.map")]);
}

#[tokio::test]
async fn test_no_source_maps_runs_nothing() {
    let temp = TempDir::new().unwrap();
    let root = utf8(&temp);
    write_file(&root.join("main.js"), b"x");

    let runner = ScriptedRunner::failing();
    let report = analyze_source_maps(&runner, &root).await;

    assert_eq!(report.analyzed, 0);
    assert!(runner.calls().is_empty());
}
