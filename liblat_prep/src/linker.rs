use std::path::Path;

/// Outcome of InstrumentStateLinker::ensure. None of these stop a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Created,
    AlreadyPresent,
    Failed(String),
}

#[cfg(target_family = "unix")]
fn make_link(source: &Path, alias: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, alias)
}

#[cfg(target_family = "windows")]
fn make_link(source: &Path, alias: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(source, alias)
}

/// InstrumentStateLinker places an alias to the shared spacecraft file in a selection's
/// working directory.
///
/// An existing alias is never touched, even if it points somewhere else; that case is only
/// reported with a warning. A broken alias will make the time filter and livetime stages fail
/// with a clear message of their own, so linking problems are not fatal here.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentStateLinker;

impl InstrumentStateLinker {
    pub fn ensure(&self, source: &Path, alias: &Path) -> LinkStatus {
        // symlink_metadata so that a dangling link still counts as present
        if alias.symlink_metadata().is_ok() {
            Self::check_existing(source, alias);
            return LinkStatus::AlreadyPresent;
        }

        match make_link(source, alias) {
            Ok(()) => LinkStatus::Created,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => LinkStatus::AlreadyPresent,
            Err(e) => LinkStatus::Failed(format!(
                "could not link {} to {}: {e}",
                alias.display(),
                source.display()
            )),
        }
    }

    fn check_existing(source: &Path, alias: &Path) {
        match std::fs::read_link(alias) {
            Ok(target) if target == source => (),
            Ok(target) => log::warn!(
                "{} already links to {}, not {}; leaving it in place",
                alias.display(),
                target.display(),
                source.display()
            ),
            Err(_) => log::warn!(
                "{} already exists and is not a link to {}; leaving it in place",
                alias.display(),
                source.display()
            ),
        }
    }
}
