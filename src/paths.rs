use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("ytrackie"))
}

pub fn database_file_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("YTRACKIE_DB") {
        return Ok(PathBuf::from(custom));
    }
    Ok(data_dir()?.join("ytrackie.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("ytrackie.log"))
}
