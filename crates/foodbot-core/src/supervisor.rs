//! Restart through pm2.
//!
//! `pm2 id <name>` prints something like `[ 3 ]`; an empty list means pm2 does not manage
//! a process with that name. A successful `pm2 restart` kills this process, so the caller
//! usually never sees the `Ok(true)`.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{errors::Error, ports::ProcessSupervisor, Result};

#[derive(Clone, Debug)]
pub struct Pm2Supervisor {
    pm2_path: PathBuf,
    process_name: String,
}

impl Pm2Supervisor {
    pub fn new(pm2_path: impl Into<PathBuf>, process_name: impl Into<String>) -> Self {
        Self {
            pm2_path: pm2_path.into(),
            process_name: process_name.into(),
        }
    }

    async fn lookup_id(&self) -> Result<Option<String>> {
        let out = Command::new(&self.pm2_path)
            .arg("id")
            .arg(&self.process_name)
            .output()
            .await
            .map_err(|e| Error::External(format!("failed to run pm2: {e}")))?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        tracing::info!(
            status = %out.status,
            stdout = %stdout.trim(),
            stderr = %String::from_utf8_lossy(&out.stderr).trim(),
            "pm2 id"
        );
        Ok(parse_pm2_id(&stdout))
    }
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn restart(&self) -> Result<bool> {
        let Some(id) = self.lookup_id().await? else {
            tracing::warn!(name = %self.process_name, "pm2 does not know this process");
            return Ok(false);
        };

        tracing::info!(pm2_id = %id, "restarting through pm2");
        let status = Command::new(&self.pm2_path)
            .arg("restart")
            .arg(&id)
            .status()
            .await
            .map_err(|e| Error::External(format!("failed to run pm2: {e}")))?;

        Ok(status.success())
    }
}

/// `"[ 3 ]\n"` -> `Some("3")`; `"[]"` -> `None`. Multiple ids keep the first.
pub fn parse_pm2_id(output: &str) -> Option<String> {
    let inner = output.replace(['[', ']'], "");
    inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
