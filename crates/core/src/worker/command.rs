use std::path::PathBuf;

use tokio::process::Command;

/// How to invoke the worker program.
///
/// The three job paths are always appended after `leading_args`, in the
/// order standard file, subject file, result file.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: String,
    leading_args: Vec<String>,
}

/// File locations handed to one worker invocation.
#[derive(Debug, Clone)]
pub struct JobPaths {
    /// Reference (standard) table uploaded by the client.
    pub standard: PathBuf,
    /// Subject file to validate against the standard.
    pub subject: PathBuf,
    /// Where the worker must write its result table.
    pub result: PathBuf,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the job paths, e.g. the script name when
    /// `program` is an interpreter.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }

    /// Build the full argument list for a job.
    pub fn args_for(&self, paths: &JobPaths) -> Vec<String> {
        let mut args = self.leading_args.clone();
        for path in [&paths.standard, &paths.subject, &paths.result] {
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }

    pub(crate) fn build(&self, paths: &JobPaths) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args_for(paths));
        cmd
    }
}
