use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::anyhow;
use anyhow::{Context, Result};
use log::debug;

fn find_on_path(executable_name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(executable_name))
        .find(|candidate| candidate.is_file())
}

/// The first of `varients` found on `PATH`.
pub fn find_executable<'a>(varients: &[&'a str]) -> Result<&'a str> {
    for varient in varients {
        if let Some(path) = find_on_path(varient) {
            debug!("using {}", path.display());
            return Ok(varient);
        }
    }
    Err(anyhow!("Could not find any of {:?} on path", varients))
}

/// Runs a generated program with the first Python interpreter on `PATH`,
/// returning its exit code.
pub fn run_python(script: &Path, args: &[String]) -> Result<i32> {
    let python = find_executable(&["python3", "python"])?;
    debug!("running {} {} {:?}", python, script.display(), args);
    let status = Command::new(python)
        .arg(script)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {} {}", python, script.display()))?;
    Ok(status.code().unwrap_or(1))
}
