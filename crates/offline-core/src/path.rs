//! Path identity for tracked executables.
//!
//! A program is identified by its absolute path. Paths are normalized
//! lexically (no symlink resolution, which would change what the user
//! picked), and compared with the case rules of the host filesystem.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Whether the host filesystem treats paths case-insensitively by default.
pub const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// Makes `path` absolute against the current directory and folds `.` and
/// `..` components.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(clean(path))
    } else {
        Ok(clean(&std::env::current_dir()?.join(path)))
    }
}

/// Lexically removes `.` components and resolves `..` against the preceding
/// normal component. `..` never climbs above the root.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                let at_root = matches!(last, Some(Component::RootDir | Component::Prefix(_)));
                let after_normal = matches!(last, Some(Component::Normal(_)));
                if after_normal {
                    out.pop();
                } else if !at_root {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Compares two already-normalized paths under host filesystem semantics.
pub fn same_path(a: &Path, b: &Path) -> bool {
    if CASE_INSENSITIVE {
        folded(a).eq(folded(b))
    } else {
        a == b
    }
}

/// Case-folded key of a path; equal keys mean the same program on this host.
pub fn identity_key(path: &Path) -> String {
    if CASE_INSENSITIVE {
        folded(path).collect::<Vec<_>>().join("/")
    } else {
        path.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn folded(path: &Path) -> impl Iterator<Item = String> + '_ {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
}
