use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::fs;
use std::io::{self, BufRead, Write};
use std::os::fd::{AsFd, AsRawFd, IntoRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;

use crate::builtin::{self, Dispatch};
use crate::cond;
use crate::config::REDIRECT_MODE;
use crate::global;
use crate::job;
use crate::parser::{self, ParseResult};
use crate::signal;
use crate::types::*;

#[derive(Error, Debug)]
pub enum ExecError {
	#[error("{0}")]
	Nix(#[from] nix::Error),
	#[error("{0}")]
	Io(#[from] io::Error),
	#[error("argument contains a nul byte: {0}")]
	Nul(#[from] NulError),
}

impl ExecError {
	/// Exit code of a child that failed before or during exec.
	fn exit_code(&self) -> i32 {
		match *self {
			ExecError::Nix(errno) => errno as i32,
			ExecError::Io(ref e) => e.raw_os_error().unwrap_or(1),
			ExecError::Nul(_) => 126,
		}
	}
}

#[derive(Debug, PartialEq, Eq)]
pub enum EvalResult {
	Done(i32),
	Background(Pid),
}

type Pipe = (OwnedFd, OwnedFd);

fn open_redirect(redirect: &Redirect) -> io::Result<fs::File> {
	let mut oopt = fs::OpenOptions::new();
	let _ = oopt.write(true).create(true).mode(REDIRECT_MODE);
	let _ = match redirect.mode {
		RedirectMode::Truncate => oopt.truncate(true),
		RedirectMode::Append => oopt.append(true),
	};
	oopt.open(&redirect.target)
}

fn do_exec_stage(argv: &[CString], input: Option<Pipe>, output: Option<Pipe>,
                 redirect: Option<&Redirect>) -> Result<Infallible, ExecError> {
	if let Some((read, write)) = input {
		unistd::dup2(read.as_raw_fd(), libc::STDIN_FILENO)?;
		drop((read, write));
	}
	if let Some((read, write)) = output {
		unistd::dup2(write.as_raw_fd(), libc::STDOUT_FILENO)?;
		drop((read, write));
	}
	// Applied after the pipes so a redirect wins over the pipe on the same stream.
	if let Some(redirect) = redirect {
		let fd = open_redirect(redirect)?.into_raw_fd();
		unistd::dup2(fd, redirect.stream.fd())?;
		unistd::close(fd)?;
	}
	let prog = match argv.first() {
		Some(prog) => prog,
		None => { return Err(ExecError::Nix(Errno::EINVAL)); },
	};
	Ok(unistd::execvp(prog, argv)?)
}

fn exec_stage(argv: &[CString], input: Option<Pipe>, output: Option<Pipe>,
              redirect: Option<&Redirect>, take_terminal: bool) -> ! {
	// SIGTTOU is still ignored here, so a background group may claim the terminal.
	if take_terminal {
		let _ = unistd::tcsetpgrp(io::stdin().as_fd(), unistd::getpgrp());
	}
	signal::restore_defaults();

	let code = match do_exec_stage(argv, input, output, redirect) {
		Ok(never) => match never {},
		Err(e) => {
			let name = argv.first().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
			let mut stderr = io::stderr();
			let _ = match e {
				ExecError::Nix(Errno::ENOENT) => writeln!(stderr, "psh: {}: command not found", name),
				ref e => writeln!(stderr, "psh: {}: {}", name, e),
			};
			let _ = stderr.flush();
			e.exit_code()
		},
	};
	unsafe { libc::_exit(code) }
}

fn spawn_stages(argvs: &[Vec<CString>], pipeline: &Pipeline, take_terminal: bool,
                job_builder: &mut job::JobBuilder) -> Result<(), ExecError> {
	let mut prev: Option<Pipe> = None;
	for (i, argv) in argvs.iter().enumerate() {
		let is_last = i + 1 == argvs.len();
		let cur = if is_last { None } else { Some(unistd::pipe2(OFlag::O_CLOEXEC)?) };
		match job_builder.push_fork()? {
			ForkResult::Parent { child } => {
				log::debug!("spawned stage {} as pid {}", i, child);
				// `prev` is closed here: its reader now holds its own copy.
				// `cur` stays open until the next stage has inherited it.
				prev = cur;
			},
			ForkResult::Child => {
				let redirect = if is_last { pipeline.redirect.as_ref() } else { None };
				exec_stage(argv, prev, cur, redirect, take_terminal);
			},
		}
	}
	Ok(())
}

/// Runs a pipeline as one process group. Foreground pipelines are waited for
/// and update `last_exit_status`; background ones are left running untracked.
pub fn run(state: &mut global::State, pipeline: &Pipeline) -> Result<EvalResult, ExecError> {
	let argvs = pipeline.stages.iter()
		.map(|stage| stage.args.iter().map(|a| CString::new(a.as_str())).collect::<Result<Vec<_>, _>>())
		.collect::<Result<Vec<_>, _>>()?;
	if argvs.is_empty() || argvs.iter().any(Vec::is_empty) {
		return Ok(EvalResult::Done(state.last_exit_status));
	}

	// Buffered output would otherwise interleave with the children's.
	let _ = io::stdout().flush();
	let _ = io::stderr().flush();

	let take_terminal = state.job_control && !pipeline.background;
	let mut job_builder = job::JobBuilder::new(argvs.len());
	let spawned = spawn_stages(&argvs, pipeline, take_terminal, &mut job_builder);
	let job = match (spawned, job_builder.build()) {
		(Ok(()), Some(job)) => job,
		(Ok(()), None) => { return Ok(EvalResult::Done(state.last_exit_status)); },
		(Err(e), partial) => {
			if let Some(mut job) = partial {
				job.kill();
				let _ = job.wait();
			}
			return Err(e);
		},
	};
	let pgid = job.pgid;

	if pipeline.background {
		println!("[{}]", pgid);
		return Ok(EvalResult::Background(pgid));
	}

	if take_terminal {
		if let Err(e) = unistd::tcsetpgrp(io::stdin().as_fd(), pgid) {
			log::warn!("tcsetpgrp {}: {}", pgid, e);
		}
	}
	let waited = state.job.insert(job).wait();
	state.job = None;
	if take_terminal {
		if let Err(e) = unistd::tcsetpgrp(io::stdin().as_fd(), unistd::getpgrp()) {
			log::warn!("reclaiming terminal: {}", e);
		}
	}

	let status = waited?;
	log::debug!("job {} finished with {}", pgid, status);
	state.last_exit_status = status;
	Ok(EvalResult::Done(status))
}

/// Parses a line that must run in the foreground (an `if` clause).
pub fn parse_foreground(state: &global::State, line: &str) -> ParseResult<Pipeline> {
	let mut pipeline = parser::parse(line, &state.vars, state.config.max_stages)?;
	pipeline.background = false;
	Ok(pipeline)
}

/// Built-ins first, then the pipeline itself.
pub fn eval(state: &mut global::State, pipeline: &Pipeline, input: &mut dyn BufRead,
            out: &mut dyn Write) -> Flow {
	if pipeline.is_noop() {
		return Flow::Continue;
	}
	match builtin::try_dispatch(state, pipeline, input, out) {
		Dispatch::Quit => { return Flow::Quit; },
		Dispatch::Handled => { return Flow::Continue; },
		Dispatch::NotBuiltin => {},
	}
	match run(state, pipeline) {
		Ok(EvalResult::Done(status)) => log::debug!("status {}", status),
		Ok(EvalResult::Background(pgid)) => log::debug!("left job {} in the background", pgid),
		Err(e) => eprintln!("psh: {}", e),
	}
	Flow::Continue
}

/// One accepted line: `!!` resolution, parsing, then evaluation.
pub fn eval_line(state: &mut global::State, line: &str, input: &mut dyn BufRead,
                 out: &mut dyn Write) -> Flow {
	let resolved = match state.accept_line(line) {
		Ok(resolved) => resolved,
		Err(e) => {
			eprintln!("{}", e);
			return Flow::Continue;
		},
	};
	// Each clause of a piped `if` is its own pipeline with its own stage limit.
	if cond::starts_with_if(&resolved) && resolved.contains('|') {
		return match cond::execute_if(state, &resolved, input, out) {
			Dispatch::Quit => Flow::Quit,
			Dispatch::Handled | Dispatch::NotBuiltin => Flow::Continue,
		};
	}
	match parser::parse(&resolved, &state.vars, state.config.max_stages) {
		Ok(pipeline) => eval(state, &pipeline, input, out),
		Err(e) => {
			eprintln!("psh: {}", e);
			Flow::Continue
		},
	}
}
