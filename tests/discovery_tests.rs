//! Integration tests for archive discovery
//!
//! These tests verify:
//! - Fixed paths win over the recursive walk, in priority order
//! - The walk stays within two parent levels and the configured depth
//! - Unpacked resources and loose scripts are found when no archive exists

mod common;

use camino::Utf8PathBuf;
use common::{Fixture, utf8, write_file};
use electron_decompiler::models::{ApplicationSelection, DecompilerSettings, prepare_working_dir};
use electron_decompiler::services::WorkflowError;
use electron_decompiler::services::discovery::{
    ArchiveDiscovery, CandidateOrigin, Discovery, FIXED_ARCHIVE_PATHS, existing_originals,
};
use proptest::prelude::*;
use std::fs;
use tempfile::TempDir;

fn join_fixed(root: &camino::Utf8Path, relative: &str) -> Utf8PathBuf {
    relative.split('/').fold(root.to_path_buf(), |p, part| p.join(part))
}

#[test]
fn test_fixed_path_found_before_walk() {
    let fixture = Fixture::new("Slack");
    let settings = DecompilerSettings::default();
    let fixed = fixture.app_dir.join("resources").join("app.asar");
    write_file(&fixed, b"asar");
    // Sorted first by the walk, but must lose to the fixed path
    write_file(&fixture.app_dir.join("aaa").join("early.asar"), b"decoy");

    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
        .unwrap();

    match found {
        Discovery::Archive(candidate) => {
            assert_eq!(candidate.path, fixed);
            assert_eq!(candidate.origin, CandidateOrigin::FixedPath);
        }
        other => panic!("Expected archive, got {:?}", other),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_first_existing_fixed_path_wins(present in prop::collection::vec(any::<bool>(), FIXED_ARCHIVE_PATHS.len())) {
        prop_assume!(present.iter().any(|p| *p));

        let fixture = Fixture::new("App");
        for (relative, exists) in FIXED_ARCHIVE_PATHS.iter().zip(&present) {
            if *exists {
                write_file(&join_fixed(&fixture.app_dir, relative), relative.as_bytes());
            }
        }
        let expected_index = present.iter().position(|p| *p).unwrap();
        let expected = join_fixed(&fixture.app_dir, FIXED_ARCHIVE_PATHS[expected_index]);

        let settings = DecompilerSettings::default();
        let found = ArchiveDiscovery::new(&settings)
            .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
            .unwrap();

        prop_assert_eq!(
            found,
            Discovery::Archive(electron_decompiler::services::ArchiveCandidate {
                path: expected,
                origin: CandidateOrigin::FixedPath,
            })
        );
    }
}

#[test]
fn test_selected_archive_used_directly() {
    let fixture = Fixture::new("Discord");
    let archive = fixture.app_dir.join("custom.asar");
    write_file(&archive, b"asar");
    // Would otherwise win as a fixed path
    write_file(&fixture.app_dir.join("resources").join("app.asar"), b"asar");

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(archive.clone()))
        .unwrap();

    assert!(matches!(
        found,
        Discovery::Archive(ref c) if c.path == archive && c.origin == CandidateOrigin::Selected
    ));
}

#[test]
fn test_parent_level_fixed_path() {
    let fixture = Fixture::new("bin");
    let exe = fixture.app_dir.join("app.exe");
    write_file(&exe, b"MZ");
    let parent_archive = fixture.root.join("apps").join("resources").join("app.asar");
    write_file(&parent_archive, b"asar");

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(exe))
        .unwrap();

    assert!(matches!(found, Discovery::Archive(ref c) if c.path == parent_archive));
}

#[test]
fn test_walk_finds_nested_archive() {
    let fixture = Fixture::new("Teams");
    let nested = fixture
        .app_dir
        .join("versions")
        .join("1.2.3")
        .join("core.asar");
    write_file(&nested, b"asar");

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
        .unwrap();

    assert!(matches!(
        found,
        Discovery::Archive(ref c) if c.path == nested && c.origin == CandidateOrigin::Walk
    ));
}

#[test]
fn test_walk_bound_never_reaches_decoys() {
    // <temp>/outside/l1/l2/app: walk roots are app, l2 and l1
    let temp = TempDir::new().unwrap();
    let outside = utf8(&temp).join("outside");
    let l1 = outside.join("l1");
    let app = l1.join("l2").join("app");
    fs::create_dir_all(&app).unwrap();
    fs::write(app.join("readme.txt"), "not a script").unwrap();

    // Three levels up: outside the parent bound
    write_file(&outside.join("decoy.asar"), b"decoy");
    // Under a walk root, but deeper than the walk depth
    let too_deep = ["a", "b", "c", "d", "e"]
        .iter()
        .fold(l1.clone(), |p, part| p.join(part))
        .join("deep.asar");
    write_file(&too_deep, b"decoy");

    let settings = DecompilerSettings::default();
    assert_eq!(settings.walk_depth, 5);
    let result = ArchiveDiscovery::new(&settings).discover(&ApplicationSelection::new(app.clone()));

    match result {
        Err(WorkflowError::NothingFound { searched }) => assert_eq!(searched, app),
        other => panic!("Expected NothingFound, got {:?}", other),
    }
}

#[test]
fn test_excluded_working_directory_is_skipped() {
    let fixture = Fixture::new("Slack");
    let working = fixture.app_dir.join("work");
    write_file(&working.join("app.asar"), b"our own output");

    let settings = DecompilerSettings::default();
    let discovery = ArchiveDiscovery::new(&settings).excluding([working.clone()]);

    assert_eq!(discovery.walk_for_archive(&fixture.app_dir), None);
}

#[test]
fn test_other_working_directories_are_skipped() {
    // tools/ sits inside the grandparent walk of apps/Slack
    let fixture = Fixture::new("Slack");
    let other = fixture.tool_root.join("Discord");
    prepare_working_dir(&other).unwrap();
    write_file(&other.join("app.asar"), b"repacked by another session");
    write_file(&fixture.app_dir.join("main.js"), b"main");

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
        .unwrap();

    assert!(
        matches!(found, Discovery::LooseScripts { .. }),
        "Got {:?}",
        found
    );
}

#[test]
fn test_exclusion_never_hides_the_application() {
    let fixture = Fixture::new("Slack");
    write_file(
        &fixture.app_dir.join("resources").join("main.js"),
        b"require('electron')",
    );
    let core = fixture.app_dir.join("lib").join("core.asar");
    write_file(&core, b"asar");

    let settings = DecompilerSettings::default();
    // Excluding the app folder itself and its parent must not hide it
    let discovery = ArchiveDiscovery::new(&settings)
        .excluding([fixture.app_dir.clone(), fixture.root.join("apps")]);

    assert_eq!(discovery.walk_for_archive(&fixture.app_dir), Some(core));
    assert_eq!(
        discovery.find_unpacked(&fixture.app_dir),
        Some(fixture.app_dir.join("resources"))
    );
}

#[test]
fn test_unpacked_resources_found_without_archive() {
    let fixture = Fixture::new("Unpacked");
    write_file(
        &fixture.app_dir.join("resources").join("index.js"),
        b"require('electron')",
    );

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
        .unwrap();

    assert_eq!(
        found,
        Discovery::UnpackedResources(fixture.app_dir.join("resources"))
    );
}

#[test]
fn test_loose_scripts_collected() {
    let fixture = Fixture::new("Scripts");
    write_file(&fixture.app_dir.join("src").join("main.js"), b"main");
    write_file(&fixture.app_dir.join("src").join("preload.MJS"), b"preload");
    write_file(&fixture.app_dir.join("notes.txt"), b"ignored");

    let settings = DecompilerSettings::default();
    let found = ArchiveDiscovery::new(&settings)
        .discover(&ApplicationSelection::new(fixture.app_dir.clone()))
        .unwrap();

    match found {
        Discovery::LooseScripts { root, files } => {
            assert_eq!(root, fixture.app_dir);
            assert_eq!(
                files,
                vec![
                    fixture.app_dir.join("src").join("main.js"),
                    fixture.app_dir.join("src").join("preload.MJS"),
                ]
            );
        }
        other => panic!("Expected loose scripts, got {:?}", other),
    }
}

#[test]
fn test_existing_originals_lists_every_fixed_archive() {
    let fixture = Fixture::new("Multi");
    let app = fixture.app_dir.join("resources").join("app.asar");
    let default_app = fixture.app_dir.join("resources").join("default_app.asar");
    write_file(&app, b"a");
    write_file(&default_app, b"b");

    let originals = existing_originals(&ApplicationSelection::new(fixture.app_dir.clone()));
    assert_eq!(originals, vec![app, default_app]);
}
