use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, OutputMode, ProcessCommand, ProcessOutput, ProcessRunner};

/// Scripted `ProcessRunner` for tests
///
/// Expectations are matched in registration order by program name and an
/// optional argument matcher. When a command redirects its output to a file,
/// the scripted stdout is appended to that file so log contents can be asserted.
#[derive(Clone)]
pub struct MockProcessRunner {
    expectations: Arc<Mutex<Vec<MockExpectation>>>,
    call_history: Arc<Mutex<Vec<ProcessCommand>>>,
}

struct MockExpectation {
    program: String,
    #[allow(clippy::type_complexity)]
    args_matcher: Option<Box<dyn Fn(&[String]) -> bool + Send + Sync>>,
    response: ProcessOutput,
    error: Option<fn() -> ProcessError>,
    times_called: usize,
    expected_times: Option<usize>,
}

pub struct MockCommandConfig {
    runner: MockProcessRunner,
    expectation: MockExpectation,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self {
            expectations: Arc::new(Mutex::new(Vec::new())),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn expect_command(&mut self, program: &str) -> MockCommandConfig {
        MockCommandConfig {
            runner: self.clone(),
            expectation: MockExpectation {
                program: program.to_string(),
                args_matcher: None,
                response: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                },
                error: None,
                times_called: 0,
                expected_times: None,
            },
        }
    }

    pub fn verify_called(&self, program: &str, times: usize) -> bool {
        let history = self.call_history.lock().unwrap();
        let count = history.iter().filter(|cmd| cmd.program == program).count();
        count == times
    }

    /// Count recorded calls to `program` whose first argument is `subcommand`
    pub fn count_subcommand(&self, program: &str, subcommand: &str) -> usize {
        self.call_history
            .lock()
            .unwrap()
            .iter()
            .filter(|cmd| {
                cmd.program == program && cmd.args.first().map(String::as_str) == Some(subcommand)
            })
            .count()
    }

    pub fn get_call_history(&self) -> Vec<ProcessCommand> {
        self.call_history.lock().unwrap().clone()
    }

    pub fn reset(&mut self) {
        self.expectations.lock().unwrap().clear();
        self.call_history.lock().unwrap().clear();
    }

    fn mirror_output(command: &ProcessCommand, stdout: &str) -> Result<(), ProcessError> {
        let path = match &command.output {
            OutputMode::Capture => return Ok(()),
            OutputMode::AppendTo(path) | OutputMode::Tee(path) => path,
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(stdout.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        self.call_history.lock().unwrap().push(command.clone());

        let response = {
            let mut expectations = self.expectations.lock().unwrap();
            let mut matched = None;

            for expectation in expectations.iter_mut() {
                if expectation.program != command.program {
                    continue;
                }

                if let Some(ref args_matcher) = expectation.args_matcher {
                    if !(args_matcher)(&command.args) {
                        continue;
                    }
                }

                expectation.times_called += 1;

                if let Some(expected) = expectation.expected_times {
                    if expectation.times_called > expected {
                        return Err(ProcessError::MockExpectationNotMet(format!(
                            "Command '{}' called {} times, expected {}",
                            command.program, expectation.times_called, expected
                        )));
                    }
                }

                if let Some(make_error) = expectation.error {
                    return Err(make_error());
                }

                matched = Some(expectation.response.clone());
                break;
            }

            matched.ok_or_else(|| {
                ProcessError::MockExpectationNotMet(format!(
                    "No expectation found for command: {} {:?}",
                    command.program, command.args
                ))
            })?
        };

        if command.output == OutputMode::Capture {
            return Ok(response);
        }

        Self::mirror_output(&command, &response.stdout)?;
        Ok(ProcessOutput {
            stdout: String::new(),
            ..response
        })
    }
}

impl MockCommandConfig {
    pub fn with_args<F>(mut self, matcher: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.expectation.args_matcher = Some(Box::new(matcher));
        self
    }

    pub fn returns_stdout(mut self, stdout: &str) -> Self {
        self.expectation.response.stdout = stdout.to_string();
        self
    }

    pub fn returns_stderr(mut self, stderr: &str) -> Self {
        self.expectation.response.stderr = stderr.to_string();
        self
    }

    pub fn returns_exit_code(mut self, code: i32) -> Self {
        self.expectation.response.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    pub fn returns_success(mut self) -> Self {
        self.expectation.response.status = ExitStatus::Success;
        self
    }

    /// Fail the call itself (spawn error, timeout) instead of returning an exit status
    pub fn returns_error(mut self, make_error: fn() -> ProcessError) -> Self {
        self.expectation.error = Some(make_error);
        self
    }

    pub fn times(mut self, n: usize) -> Self {
        self.expectation.expected_times = Some(n);
        self
    }

    pub fn finish(self) {
        self.runner
            .expectations
            .lock()
            .unwrap()
            .push(self.expectation);
    }
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}
