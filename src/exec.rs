use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::job::Job;
use crate::registry::{FuncRegistry, JobFuture};

/// Name under which the built-in shell handler registers itself.
pub const SHELL_FUNC_NAME: &str = "shell.run";

/// Register the built-in handler that runs `args["cmd"]` through `sh -c`.
pub fn register_shell_func(registry: &FuncRegistry) {
    registry.register(
        SHELL_FUNC_NAME,
        "run args[\"cmd\"] through sh -c",
        shell_func,
    );
}

fn shell_func(token: CancellationToken, job: Job) -> JobFuture {
    Box::pin(async move {
        let Some(cmd) = job.args.get("cmd").and_then(|v| v.as_str()).map(String::from) else {
            tracing::warn!(job = %job.full_name(), "shell job missing `cmd` arg");
            return;
        };

        tracing::info!(job = %job.full_name(), cmd, "shell job executing");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(job = %job.full_name(), error = %e, "shell job spawn failed");
                return;
            }
        };

        let output = tokio::select! {
            output = child.wait_with_output() => output,
            _ = token.cancelled() => {
                tracing::warn!(job = %job.full_name(), "shell job cancelled");
                return;
            }
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if output.status.success() {
                    tracing::info!(
                        job = %job.full_name(),
                        stdout = %stdout.trim_end(),
                        "shell job completed"
                    );
                } else {
                    tracing::error!(
                        job = %job.full_name(),
                        exit_code = ?output.status.code(),
                        stderr = %stderr.trim_end(),
                        "shell job failed"
                    );
                }
            }
            Err(e) => {
                tracing::error!(job = %job.full_name(), error = %e, "shell job wait failed");
            }
        }
    })
}
