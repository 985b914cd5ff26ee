use std::{
    env,
    fmt::Display,
    path::PathBuf,
    sync::{LazyLock, RwLock},
};

use chanmirror_core::{
    error::{ErrorContext, MirrorError},
    MirrorResult,
};
use nu_ansi_term::Color;
use serde::Serialize;

pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✓";
    pub const CROSS: &str = "✗";
}

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static PROGRESS: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static JSON: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(false));

pub fn progress_enabled() -> bool {
    *PROGRESS.read().unwrap()
}

pub fn json_output() -> bool {
    *JSON.read().unwrap()
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = COLOR.read().unwrap();
        if *color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// `package.list` next to the directory holding the executable.
pub fn default_packages_list() -> MirrorResult<PathBuf> {
    let exe = env::current_exe().with_context(|| "locating the current executable".into())?;
    let exe_dir = exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(exe_dir.join("..").join("package.list"))
}

/// Prints `value` as a single JSON line on stdout.
pub fn print_json<T: Serialize>(value: &T) -> MirrorResult<()> {
    let line = serde_json::to_string(value)
        .map_err(|err| MirrorError::Custom(format!("Failed to serialize summary: {err}")))?;
    crate::progress::suspend(|| println!("{line}"));
    Ok(())
}
