//! Desktop wallpaper integration, best effort.
//!
//! An unsupported platform is a reported outcome, never an error: the
//! rest of a run (fetch, store, trim) must not fail because the desktop
//! could not be reached.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Result of a wallpaper application attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The wallpaper was changed to this picture.
    Applied { path: PathBuf },

    /// Nothing was changed; the reason says why.
    Unavailable { reason: String },
}

/// Whether this platform has a wallpaper backend at all.
pub fn is_supported() -> bool {
    cfg!(any(target_os = "macos", target_os = "windows", target_os = "linux"))
}

/// Apply the first existing picture from an ordered list (most recent
/// first) as the desktop wallpaper.
///
/// The underlying backend sets one global wallpaper, so only the head of
/// the list is used; the remainder is a fallback for missing files.
pub fn apply(paths: &[PathBuf]) -> Outcome {
    if !is_supported() {
        return Outcome::Unavailable {
            reason: format!("unsupported platform: {}", std::env::consts::OS),
        };
    }

    let Some(path) = paths.iter().find(|p| p.is_file()) else {
        return Outcome::Unavailable {
            reason: "no existing picture files to apply".to_string(),
        };
    };

    if paths.len() > 1 {
        debug!("{} pictures available, applying the most recent", paths.len());
    }

    set_from_path(path)
}

fn set_from_path(path: &Path) -> Outcome {
    let Some(path_str) = path.to_str() else {
        return Outcome::Unavailable {
            reason: format!("non-UTF-8 path: {}", path.display()),
        };
    };

    match ::wallpaper::set_from_path(path_str) {
        Ok(()) => {
            info!("Set wallpaper to {}", path.display());
            Outcome::Applied {
                path: path.to_path_buf(),
            }
        }
        Err(e) => Outcome::Unavailable {
            reason: e.to_string(),
        },
    }
}
