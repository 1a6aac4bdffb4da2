use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use std::process::Command;

/// Where a secret comes from. Secrets are never stored in the config file
/// itself, only a reference to the environment or a command printing them.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Key {
    Env { env: String },
    Cmd { cmd: String },
}

impl Key {
    pub fn env(name: &str) -> Self {
        Self::Env {
            env: name.to_owned(),
        }
    }

    /// Human-readable origin, used when reporting missing secrets.
    pub fn source(&self) -> String {
        match self {
            Self::Env { env } => format!("environment variable '{env}'"),
            Self::Cmd { cmd } => format!("command '{cmd}'"),
        }
    }

    pub fn get_value(&self) -> Result<String> {
        let value = match self {
            Self::Env { env } => std::env::var(env)
                .map_err(|_| anyhow!("Environment variable '{env}' not found"))?,
            Self::Cmd { cmd } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(cmd)
                    .output()
                    .map_err(|e| anyhow!("Failed to execute command '{cmd}': {e}"))?;

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    bail!("Command '{cmd}' failed: {}", stderr.trim());
                }

                String::from_utf8_lossy(&output.stdout).into_owned()
            }
        };

        let value = value.trim();
        if value.is_empty() {
            bail!("{} is empty", self.source());
        }
        Ok(value.to_owned())
    }
}
