//! External template builder
//!
//! Initializing a database (installing modules, loading demo data) belongs
//! to the ERP framework. Stencil runs a configured command for it and only
//! cares whether the database exists afterwards.

use crate::config::schema::BuilderConfig;
use crate::error::{StencilError, StencilResult};
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// What the builder should produce
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Name of the database to create
    pub database: &'a str,
    /// Modules to install
    pub modules: &'a [String],
    /// Load demo data
    pub with_demo: bool,
}

impl BuildRequest<'_> {
    /// Environment passed to the builder command
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("STENCIL_DATABASE", self.database.to_string()),
            ("STENCIL_MODULES", self.modules.join(",")),
            ("STENCIL_WITH_DEMO", u8::from(self.with_demo).to_string()),
        ]
    }
}

/// Runs the configured database initialization command
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl TemplateBuilder {
    /// Create a builder for `command args...`
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
        }
    }

    /// Create a builder from the `[builder]` config section
    pub fn from_config(config: &BuilderConfig) -> StencilResult<Self> {
        let command = config
            .command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(StencilError::BuilderNotConfigured)?;

        Ok(Self {
            command: command.to_string(),
            args: config.args.clone(),
            env: config.env.clone(),
        })
    }

    /// Command line for display
    pub fn display_command(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the builder, streaming its output lines to `on_output`
    pub async fn build(
        &self,
        request: &BuildRequest<'_>,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> StencilResult<()> {
        info!("Building database {} with: {}", request.database, self.display_command());

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .envs(&self.env)
            .envs(request.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StencilError::command_failed(self.display_command(), e))?;

        let output = stream_child_output(&mut child, on_output).await?;
        let status = child
            .wait()
            .await
            .map_err(|e| StencilError::command_failed(self.display_command(), e))?;

        if status.success() {
            debug!("Builder finished for {}", request.database);
            Ok(())
        } else {
            Err(StencilError::BuildFailed {
                database: request.database.to_string(),
                code: status.code().unwrap_or(-1),
                output: output_tail(&output),
            })
        }
    }
}

/// Last `BUILD_ERROR_TAIL_LINES` lines of output, for error diagnostics
fn output_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
async fn stream_child_output(
    child: &mut Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> StencilResult<Vec<String>> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| StencilError::Internal("builder stderr not piped".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| StencilError::Internal("builder stdout not piped".to_string()))?;

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut all_output = Vec::new();
    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    Ok(all_output)
}
