// mongobackup/src/utils/process.rs
use anyhow::{Context, Result};
use std::process::Command;
use tracing::info;
use url::Url;

use super::find_executable;

const MASK: &str = "****";

/// Runs external tools. Implemented by [`SystemRunner`] and by recorders in tests.
pub trait ProcessRunner {
    /// Runs `program` to completion, failing on a non-zero exit status.
    fn run(&self, program: &str, args: &[String]) -> Result<()>;
}

/// Runs tools found on PATH with the parent's stdio attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<()> {
        let executable = find_executable(program)?;
        info!("Executing {}", display_command(program, args));

        let status = Command::new(&executable)
            .args(args)
            .status()
            .with_context(|| format!("Failed to execute {}", executable.display()))?;

        if !status.success() {
            anyhow::bail!("{} failed with status: {}", program, status);
        }
        Ok(())
    }
}

/// Command line for logs, with password values masked.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            parts.push(MASK.to_string());
            mask_next = false;
            continue;
        }
        if arg == "--password" {
            mask_next = true;
            parts.push(arg.clone());
        } else if arg.starts_with("--password=") {
            parts.push(format!("--password={}", MASK));
        } else {
            parts.push(mask_uri_password(arg));
        }
    }
    parts.join(" ")
}

/// Replaces the password component of a connection string, leaving other text as is.
pub fn mask_uri_password(value: &str) -> String {
    let (prefix, uri) = match value.split_once('=') {
        Some((flag, rest)) if flag.starts_with("--") => (format!("{}=", flag), rest),
        _ => (String::new(), value),
    };
    if !uri.contains("://") {
        return value.to_string();
    }

    if let Ok(mut parsed) = Url::parse(uri) {
        if parsed.password().is_some() && parsed.set_password(Some(MASK)).is_ok() {
            return format!("{}{}", prefix, parsed);
        }
    }

    // Multi-host connection strings do not always parse as URLs.
    let Some((scheme, rest)) = uri.split_once("://") else {
        return value.to_string();
    };
    let Some((userinfo, hosts)) = rest.split_once('@') else {
        return value.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}{}://{}:{}@{}", prefix, scheme, user, MASK, hosts),
        None => value.to_string(),
    }
}
