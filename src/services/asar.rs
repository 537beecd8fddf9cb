//! Invocation variants of the external `asar` packer.
//!
//! The packer is reached three ways, tried in this order:
//! 1. `npm exec <package> <op> ...` through the located npm invoker
//! 2. the globally installed binary, `asar <op> ...`
//! 3. `npm exec --yes <package> <op> ...`, which auto-confirms the package download

use crate::services::runner::Invocation;
use camino::Utf8Path;

/// The two operations the packer supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AsarOperation {
    /// `extract <archive> <output dir>`
    Extract,
    /// `pack <input dir> <archive>`
    Pack,
}

impl AsarOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Pack => "pack",
        }
    }
}

/// Builds the ordered invocation variants for one packer operation.
#[derive(Clone, Copy, Debug)]
pub struct AsarCommands<'a> {
    npm: &'a Utf8Path,
    package: &'a str,
}

impl<'a> AsarCommands<'a> {
    pub fn new(npm: &'a Utf8Path, package: &'a str) -> Self {
        Self { npm, package }
    }

    /// Name of the globally installed binary, e.g. `asar` for `@electron/asar`.
    pub fn global_binary(&self) -> &'a str {
        self.package.rsplit('/').next().unwrap_or(self.package)
    }

    /// Labelled variants in fallback order. `from` and `to` are the operation's
    /// two path arguments (archive then directory for extract, the reverse for pack).
    pub fn variants(
        &self,
        operation: AsarOperation,
        from: &Utf8Path,
        to: &Utf8Path,
    ) -> Vec<(&'static str, Invocation)> {
        let op_args = [operation.as_str(), from.as_str(), to.as_str()];

        vec![
            (
                "npm exec",
                Invocation::new(self.npm.as_str())
                    .args(["exec", self.package])
                    .args(op_args),
            ),
            (
                "global asar",
                Invocation::new(self.global_binary()).args(op_args),
            ),
            (
                "npm exec --yes",
                Invocation::new(self.npm.as_str())
                    .args(["exec", "--yes", self.package])
                    .args(op_args),
            ),
        ]
    }
}
