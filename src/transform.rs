use crate::error::JobError;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

pub const DEFAULT_TOOL: &str = "fabric";
pub const DEFAULT_PATTERN: &str = "summarize_linkedin_profile";

/// Turns the bytes of one artifact into a text artifact at `output_path`.
///
/// Implementations are called concurrently from the worker pool and must not
/// assume any ordering between calls.
pub trait Transformer: Send + Sync {
    fn transform(&self, input: &[u8], output_path: &Path) -> Result<(), JobError>;

    fn describe(&self) -> String {
        String::from("transformer")
    }
}

/// Runs `<program> -p <pattern tokens...> -o <output>` with the artifact on
/// stdin. Only the exit status is interpreted; stdout and stderr pass through.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    program: String,
    pattern_args: Vec<String>,
}

impl CommandTransformer {
    pub fn new(program: impl Into<String>, pattern: &str) -> Self {
        Self {
            program: program.into(),
            pattern_args: pattern.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn pattern_args(&self) -> &[String] {
        &self.pattern_args
    }

    fn command(&self, output_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-p")
            .args(&self.pattern_args)
            .arg("-o")
            .arg(output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl Default for CommandTransformer {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL, DEFAULT_PATTERN)
    }
}

impl Transformer for CommandTransformer {
    fn transform(&self, input: &[u8], output_path: &Path) -> Result<(), JobError> {
        let mut child = self.command(output_path).spawn().map_err(|source| JobError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the handle closes stdin and signals end of input.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input),
            None => Ok(()),
        };
        if let Err(source) = write_result {
            // Reap the child before reporting so it does not linger as a zombie.
            let _ = child.wait();
            return Err(JobError::Pipe { program: self.program.clone(), source });
        }

        let status = child.wait().map_err(|source| JobError::Wait {
            program: self.program.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(JobError::ExitStatus { program: self.program.clone(), status })
        }
    }

    fn describe(&self) -> String {
        format!("{} -p {}", self.program, self.pattern_args.join(" "))
    }
}
