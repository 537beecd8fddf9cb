//! Integration tests for the extraction orchestrator
//!
//! The packer is never spawned: a scripted runner stands in for it and
//! writes output files the way `asar extract` would.

mod common;

use common::{Fixture, ScriptedRunner, output_arg, write_file};
use electron_decompiler::models::ExtractionSource;
use electron_decompiler::services::extraction::{
    EXTRACTED_ARCHIVE_DIR, EXTRACTED_SCRIPTS_DIR, UNPACKED_RESOURCES_DIR,
};
use electron_decompiler::services::{CommandOutput, Extractor, WorkflowError};
use std::fs;

#[tokio::test]
async fn test_extraction_stops_at_first_successful_variant() {
    let fixture = Fixture::new("Slack");
    let archive = fixture.app_dir.join("resources").join("app.asar");
    write_file(&archive, b"asar");

    let runner = ScriptedRunner::new(|index, invocation| {
        let out = output_arg(invocation);
        match index {
            0 => {
                // Partial output from a failing variant must not survive
                write_file(&out.join("partial.js"), b"half");
                CommandOutput::failed(1, "npm ERR! could not determine executable to run")
            }
            1 => {
                write_file(&out.join("main.js"), b"from variant 2");
                write_file(&out.join("lib").join("util.js"), b"util");
                CommandOutput::succeeded()
            }
            _ => panic!("Third variant must never run"),
        }
    });

    let session = fixture.session();
    let result = Extractor::new(&runner).run(&session).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program, "/fake/bin/npm");
    assert_eq!(calls[1].program, "asar");
    assert_eq!(calls[1].args[0], "extract");
    assert_eq!(calls[1].args[1], archive.as_str());

    let out = session.working_dir.clone().unwrap().join(EXTRACTED_ARCHIVE_DIR);
    assert_eq!(result.root, out);
    assert_eq!(result.source, ExtractionSource::Archive(archive));
    assert_eq!(
        result.files,
        vec![out.join("lib").join("util.js"), out.join("main.js")]
    );
    assert_eq!(fs::read(out.join("main.js")).unwrap(), b"from variant 2");
    assert!(!out.join("partial.js").exists());
}

#[tokio::test]
async fn test_all_variants_fail() {
    let fixture = Fixture::new("Slack");
    write_file(
        &fixture.app_dir.join("resources").join("app.asar"),
        b"asar",
    );

    let runner = ScriptedRunner::new(|index, invocation| {
        write_file(&output_arg(invocation).join("partial.js"), b"half");
        CommandOutput::failed(1, format!("variant {} failed", index + 1))
    });

    let session = fixture.session();
    let err = Extractor::new(&runner).run(&session).await.unwrap_err();

    assert_eq!(runner.calls().len(), 3);
    match &err {
        WorkflowError::ExtractionFailed { attempts, .. } => {
            let diagnostics: Vec<_> = attempts.iter().map(|a| a.diagnostic.as_str()).collect();
            assert_eq!(
                diagnostics,
                vec!["variant 1 failed", "variant 2 failed", "variant 3 failed"]
            );
        }
        other => panic!("Expected ExtractionFailed, got {:?}", other),
    }

    // No partial output is accepted
    let out = session.working_dir.clone().unwrap().join(EXTRACTED_ARCHIVE_DIR);
    assert!(!out.exists());
}

#[tokio::test]
async fn test_archive_without_tool_is_refused() {
    let fixture = Fixture::new("Slack");
    write_file(
        &fixture.app_dir.join("resources").join("app.asar"),
        b"asar",
    );

    let mut session = fixture.session();
    session.npm_path = None;
    let runner = ScriptedRunner::failing();

    let err = Extractor::new(&runner).run(&session).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ToolNotFound));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_unpacked_resources_copied_without_packer() {
    let fixture = Fixture::new("Unpacked");
    write_file(
        &fixture.app_dir.join("resources").join("index.js"),
        b"require('electron')",
    );
    write_file(
        &fixture.app_dir.join("resources").join("assets").join("icon.png"),
        b"png",
    );

    let mut session = fixture.session();
    // Copying needs no packer
    session.npm_path = None;
    let runner = ScriptedRunner::failing();

    let result = Extractor::new(&runner).run(&session).await.unwrap();

    let out = session
        .working_dir
        .clone()
        .unwrap()
        .join(UNPACKED_RESOURCES_DIR);
    assert!(runner.calls().is_empty());
    assert_eq!(result.file_count(), 2);
    assert_eq!(
        fs::read_to_string(out.join("index.js")).unwrap(),
        "require('electron')"
    );
    assert!(out.join("assets").join("icon.png").is_file());
}

#[tokio::test]
async fn test_loose_scripts_copied() {
    let fixture = Fixture::new("Scripts");
    write_file(&fixture.app_dir.join("src").join("main.js"), b"main");
    write_file(&fixture.app_dir.join("notes.txt"), b"ignored");

    let session = fixture.session();
    let runner = ScriptedRunner::failing();
    let result = Extractor::new(&runner).run(&session).await.unwrap();

    let out = session
        .working_dir
        .clone()
        .unwrap()
        .join(EXTRACTED_SCRIPTS_DIR);
    assert_eq!(result.files, vec![out.join("src").join("main.js")]);
    assert!(!out.join("notes.txt").exists());
}

#[tokio::test]
async fn test_nothing_found() {
    let fixture = Fixture::new("Empty");
    write_file(&fixture.app_dir.join("readme.txt"), b"nothing here");

    let session = fixture.session();
    let runner = ScriptedRunner::failing();
    let err = Extractor::new(&runner).run(&session).await.unwrap_err();

    assert!(matches!(err, WorkflowError::NothingFound { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_extraction_requires_selection() {
    let fixture = Fixture::new("Slack");
    let session = electron_decompiler::Session::new(fixture.tool_root.clone());
    let runner = ScriptedRunner::failing();

    let err = Extractor::new(&runner).run(&session).await.unwrap_err();
    assert!(matches!(err, WorkflowError::NoApplicationSelected));
}

#[tokio::test]
async fn test_tool_beside_application() {
    let fixture = Fixture::new("Slack");
    // Tool kept in the same folder as the app folder
    let tool_root = fixture.app_dir.parent().unwrap().to_path_buf();
    write_file(
        &fixture.app_dir.join("resources").join("main.js"),
        b"require('electron')",
    );

    let mut session = electron_decompiler::Session::new(tool_root.clone());
    let working = session
        .select_application(electron_decompiler::ApplicationSelection::new(
            fixture.app_dir.clone(),
        ))
        .unwrap();
    assert_eq!(working, tool_root.join("Slack_extracted"));

    let runner = ScriptedRunner::failing();
    let result = Extractor::new(&runner).run(&session).await.unwrap();

    assert_eq!(
        result.source,
        ExtractionSource::UnpackedResources(fixture.app_dir.join("resources"))
    );
    assert_eq!(result.root, working.join(UNPACKED_RESOURCES_DIR));
    assert!(!fixture.app_dir.join(UNPACKED_RESOURCES_DIR).exists());
}

#[tokio::test]
async fn test_archive_beside_tool_extracts_outside_application() {
    let fixture = Fixture::new("Slack");
    let tool_root = fixture.app_dir.parent().unwrap().to_path_buf();
    let archive = fixture.app_dir.join("resources").join("app.asar");
    write_file(&archive, b"asar");

    let mut session = electron_decompiler::Session::new(tool_root);
    session.npm_path = Some("/fake/bin/npm".into());
    session
        .select_application(electron_decompiler::ApplicationSelection::new(
            fixture.app_dir.clone(),
        ))
        .unwrap();

    let runner = ScriptedRunner::new(|_, invocation| {
        write_file(&output_arg(invocation).join("main.js"), b"main");
        CommandOutput::succeeded()
    });
    let result = Extractor::new(&runner).run(&session).await.unwrap();

    assert!(!result.root.starts_with(&fixture.app_dir));
    assert!(!fixture.app_dir.join(EXTRACTED_ARCHIVE_DIR).exists());
}
