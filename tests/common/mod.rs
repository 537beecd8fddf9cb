//! Shared fixtures for the workflow integration tests.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use electron_decompiler::models::{ApplicationSelection, Session};
use electron_decompiler::services::{
    CommandError, CommandOutput, CommandRunner, Elevation, Invocation,
};
use std::cell::RefCell;
use std::fs;
use tempfile::TempDir;

pub fn utf8(temp: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap()
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Utf8Path, contents: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

type Handler = Box<dyn Fn(usize, &Invocation) -> CommandOutput>;

/// Runner that records every invocation and answers from a script.
///
/// The handler gets the zero-based call index and the invocation, and may
/// touch the filesystem to simulate the packer's side effects.
pub struct ScriptedRunner {
    calls: RefCell<Vec<Invocation>>,
    handler: Handler,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(usize, &Invocation) -> CommandOutput + 'static) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            handler: Box::new(handler),
        }
    }

    /// Every invocation fails with exit code 1.
    pub fn failing() -> Self {
        Self::new(|_, _| CommandOutput::failed(1, "simulated failure"))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let index = self.calls.borrow().len();
        self.calls.borrow_mut().push(invocation.clone());
        Ok((self.handler)(index, invocation))
    }
}

/// The path argument the packer writes to: the last argument.
pub fn output_arg(invocation: &Invocation) -> Utf8PathBuf {
    Utf8PathBuf::from(invocation.args.last().unwrap())
}

/// Elevation adapter with scripted outcomes. A successful copy really copies.
pub struct FakeElevation {
    pub grant_succeeds: bool,
    pub copy_succeeds: bool,
    pub calls: RefCell<Vec<String>>,
}

impl FakeElevation {
    pub fn new(grant_succeeds: bool, copy_succeeds: bool) -> Self {
        Self {
            grant_succeeds,
            copy_succeeds,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Elevation for FakeElevation {
    async fn grant_write_access(&self, target: &Utf8Path) -> Result<(), String> {
        self.calls.borrow_mut().push(format!("grant {}", target));
        if self.grant_succeeds {
            Ok(())
        } else {
            Err("access denied".to_string())
        }
    }

    async fn elevated_copy(&self, source: &Utf8Path, target: &Utf8Path) -> Result<(), String> {
        self.calls.borrow_mut().push(format!("copy {}", target));
        if self.copy_succeeds {
            fs::copy(source, target).map(|_| ()).map_err(|e| e.to_string())
        } else {
            Err("elevation declined".to_string())
        }
    }
}

/// Layout shared by the orchestration tests:
///
/// ```text
/// <temp>/tools/            tool root, working directories land here
/// <temp>/apps/<name>/      the selected application
/// ```
///
/// The app sits two levels below the temp root so the discovery walk
/// (app, parent, grandparent) never leaves the temp directory.
pub struct Fixture {
    pub temp: TempDir,
    pub root: Utf8PathBuf,
    pub tool_root: Utf8PathBuf,
    pub app_dir: Utf8PathBuf,
}

impl Fixture {
    pub fn new(app_name: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = utf8(&temp);
        let tool_root = root.join("tools");
        let app_dir = root.join("apps").join(app_name);
        fs::create_dir_all(&tool_root).unwrap();
        fs::create_dir_all(&app_dir).unwrap();
        Self {
            temp,
            root,
            tool_root,
            app_dir,
        }
    }

    /// Session with the app selected and npm "located".
    pub fn session(&self) -> Session {
        let mut session = Session::new(self.tool_root.clone());
        session.npm_path = Some(Utf8PathBuf::from("/fake/bin/npm"));
        session
            .select_application(ApplicationSelection::new(self.app_dir.clone()))
            .unwrap();
        session
    }
}
