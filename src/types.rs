/// Status recorded when the last stage was killed by a signal or stopped.
pub const SIGNALED_STATUS: i32 = -1;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectMode { Truncate, Append }

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stream { Stdout, Stderr }

impl Stream {
	pub fn fd(self) -> i32 {
		match self {
			Stream::Stdout => libc::STDOUT_FILENO,
			Stream::Stderr => libc::STDERR_FILENO,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: String,
	pub mode: RedirectMode,
	pub stream: Stream,
}

/// One program invocation; `args[0]` is the program name.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Stage {
	pub args: Vec<String>,
}

impl Stage {
	pub fn is_empty(&self) -> bool {
		self.args.is_empty()
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Pipeline {
	pub stages: Vec<Stage>,
	pub background: bool,
	pub redirect: Option<Redirect>,
	/// The line this pipeline was parsed from, after `!!` resolution.
	pub source: String,
}

impl Pipeline {
	pub fn first(&self) -> Option<&Stage> {
		self.stages.first()
	}

	/// True when there is nothing to run, i.e. the first stage has no arguments.
	pub fn is_noop(&self) -> bool {
		self.first().map_or(true, Stage::is_empty)
	}
}

/// Whether the interactive loop keeps going after a line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow { Continue, Quit }
