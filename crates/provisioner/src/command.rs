//! Command provisioner: creates accounts by running an external program
//!
//! The program is expected to create one account and print its identifier on
//! stdout. Anything on stderr is only used for error reporting. This matches
//! how randomness accounts are typically created: a small Node script using the
//! network's SDK, invoked with the queue, payer keypair and RPC URL.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::{Provisioner, normalize_account_id};

/// Runs `program args...` once per account.
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvisioner {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self) -> Result<String> {
        debug!(program = %self.program, args = ?self.args, "running provisioning command");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Spawn(format!("{}: {e}", self.program)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| Error::CommandFailed(format!("waiting for child: {e}")))?
            }
            Err(_) => {
                return Err(Error::CommandFailed(format!(
                    "timed out after {}ms",
                    self.timeout.as_millis()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(Error::CommandFailed(format!(
                "exit status {code}: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Scripts often log progress before the id; the id is the last line.
        let last_line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("");
        normalize_account_id(last_line)
    }
}

impl Provisioner for CommandProvisioner {
    fn id(&self) -> &str {
        "command"
    }

    fn create_account(&self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            match self.run().await {
                Ok(account_id) => {
                    info!(account_id = %account_id, "provisioning command created account");
                    Ok(account_id)
                }
                Err(e) => {
                    warn!(program = %self.program, error = %e, "provisioning command failed");
                    Err(e)
                }
            }
        })
    }
}
