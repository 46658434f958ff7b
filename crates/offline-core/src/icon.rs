//! Opaque icon handles for tracked executables.
//!
//! The core never loads pixels. An [`IconHandle`] is a stable key plus a
//! coarse kind; a presentation layer resolves it to an image (and may cache
//! by `key`). Handles are cheap to re-derive and are never persisted.

use std::path::Path;

use serde::Serialize;

use crate::path::identity_key;

/// Coarse classification used to pick a fallback icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IconKind {
    Executable,
    Script,
    Bundle,
    Generic,
}

/// Reference to an executable's icon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IconHandle {
    /// blake3 hex digest of the path's identity key.
    pub key: String,
    pub kind: IconKind,
}

impl IconHandle {
    /// Derives the handle for the executable at `path`.
    pub fn derive(path: &Path) -> Self {
        let key = blake3::hash(identity_key(path).as_bytes()).to_hex().to_string();
        IconHandle {
            key,
            kind: IconKind::from_path(path),
        }
    }
}

impl IconKind {
    fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
        match extension.as_deref() {
            None | Some("exe" | "com" | "msi" | "bin" | "appimage") => IconKind::Executable,
            Some("bat" | "cmd" | "ps1" | "sh" | "py" | "pl" | "rb") => IconKind::Script,
            Some("app" | "lnk") => IconKind::Bundle,
            Some(_) => IconKind::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_extension() {
        assert_eq!(IconKind::from_path(Path::new("/a/tool.EXE")), IconKind::Executable);
        assert_eq!(IconKind::from_path(Path::new("/usr/bin/tool")), IconKind::Executable);
        assert_eq!(IconKind::from_path(Path::new("/a/run.sh")), IconKind::Script);
        assert_eq!(IconKind::from_path(Path::new("/a/Foo.app")), IconKind::Bundle);
        assert_eq!(IconKind::from_path(Path::new("/a/readme.txt")), IconKind::Generic);
    }

    #[test]
    fn key_is_stable_and_path_specific() {
        let a = IconHandle::derive(Path::new("/a/tool.exe"));
        let again = IconHandle::derive(Path::new("/a/tool.exe"));
        let b = IconHandle::derive(Path::new("/b/tool.exe"));
        assert_eq!(a, again);
        assert_ne!(a.key, b.key);
        assert_eq!(a.key.len(), 64);
    }
}
