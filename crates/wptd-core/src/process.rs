//! Subprocess boundary.
//!
//! Every external tool the pipeline touches (git, `./wpt`, browsers, gsutil)
//! goes through [`CommandRunner`], so the pipeline can be driven by a
//! scripted runner in tests. All calls block until the child exits.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A command to run, with its working directory and optional stdin payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    /// Capture stdout instead of inheriting it.
    pub capture_stdout: bool,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            stdin: None,
            capture_stdout: false,
        }
    }

    /// Build from a full argv; an empty argv yields an empty program name.
    pub fn from_argv(argv: &[String]) -> Self {
        let mut iter = argv.iter().cloned();
        let program = iter.next().unwrap_or_default();
        Self::new(program, iter)
    }

    pub fn in_dir(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn capturing_stdout(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// Space-joined command line, for logs and error messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a finished child exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub code: Option<i32>,
    /// Captured stdout; empty unless the spec asked for capture.
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit description for error messages.
    pub fn describe_exit(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs commands to completion.
///
/// `Err` means the program could not be started (missing binary,
/// permissions); a program that ran and failed is an `Ok` with a non-zero
/// code.
pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands on the host via `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        if spec.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        if spec.capture_stdout {
            cmd.stdout(Stdio::piped());
        }

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();

        // The writer runs beside the reader so a child that fills its stdout
        // pipe before draining stdin cannot block us. `wait_with_output`
        // always reaps the child.
        let (output, written) = std::thread::scope(|scope| {
            let writer = match (stdin, spec.stdin.as_deref()) {
                (Some(mut pipe), Some(input)) => {
                    Some(scope.spawn(move || pipe.write_all(input.as_bytes())))
                }
                _ => None,
            };
            let output = child.wait_with_output();
            let written = match writer {
                Some(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
                None => Ok(()),
            };
            (output, written)
        });
        let output = output?;

        match written {
            // The child exited without reading all of its input; its exit
            // status says whether that was a failure.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            other => other?,
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted runner for pipeline tests.

    use super::*;
    use std::sync::Mutex;

    type Hook = Box<dyn Fn(&CommandSpec) + Send>;

    /// Answers commands from a script keyed by command-line prefix and records
    /// every call. Unscripted commands succeed with empty output.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        script: Vec<(String, io::Result<CommandOutput>)>,
        hooks: Vec<(String, Hook)>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Respond to commands starting with `prefix` with exit code and stdout.
        pub(crate) fn respond(mut self, prefix: &str, code: i32, stdout: &str) -> Self {
            self.script.push((
                prefix.to_string(),
                Ok(CommandOutput {
                    code: Some(code),
                    stdout: stdout.to_string(),
                }),
            ));
            self
        }

        /// Make commands starting with `prefix` fail to spawn.
        pub(crate) fn missing(mut self, prefix: &str) -> Self {
            self.script.push((
                prefix.to_string(),
                Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory")),
            ));
            self
        }

        /// Run `hook` for commands starting with `prefix` before answering.
        pub(crate) fn on(mut self, prefix: &str, hook: impl Fn(&CommandSpec) + Send + 'static) -> Self {
            self.hooks.push((prefix.to_string(), Box::new(hook)));
            self
        }

        pub(crate) fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn command_lines(&self) -> Vec<String> {
            self.calls().iter().map(CommandSpec::display).collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            let line = spec.display();
            for (prefix, hook) in &self.hooks {
                if line.starts_with(prefix.as_str()) {
                    hook(spec);
                }
            }
            for (prefix, answer) in &self.script {
                if line.starts_with(prefix.as_str()) {
                    return match answer {
                        Ok(out) => Ok(out.clone()),
                        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                    };
                }
            }
            Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
            })
        }
    }
}
