use argh::FromArgs;

pub const MAX_STAGES: usize = 10;
pub const MAX_HISTORY_SIZE: usize = 20;
pub const MAX_VARIABLES: usize = 10;
pub const DEFAULT_PROMPT: &str = "hello";
/// Permission bits for files created by `>`, `>>` and `2>`.
pub const REDIRECT_MODE: u32 = 0o660;

#[derive(FromArgs, Debug)]
/// A small interactive shell with pipelines, redirection and job control.
pub struct Args {
	/// execute a single command line and exit
	#[argh(option, short = 'c')]
	pub command: Option<String>,

	/// initial prompt name
	#[argh(option)]
	pub prompt: Option<String>,

	/// number of command lines kept in history
	#[argh(option, default = "MAX_HISTORY_SIZE")]
	pub history_size: usize,

	/// maximum number of shell variables
	#[argh(option, default = "MAX_VARIABLES")]
	pub max_variables: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	pub prompt: String,
	pub history_size: usize,
	pub max_variables: usize,
	pub max_stages: usize,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			prompt: DEFAULT_PROMPT.to_string(),
			history_size: MAX_HISTORY_SIZE,
			max_variables: MAX_VARIABLES,
			max_stages: MAX_STAGES,
		}
	}
}

impl From<&Args> for Config {
	fn from(args: &Args) -> Config {
		Config {
			prompt: args.prompt.clone().unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
			history_size: args.history_size,
			max_variables: args.max_variables,
			..Config::default()
		}
	}
}

/// What the shell does with a terminal on standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalUse {
	/// Compose lines with the raw-mode editor and show the prompt.
	pub line_editor: bool,
	/// Make each foreground job the terminal's foreground process group.
	pub job_control: bool,
}

impl TerminalUse {
	pub fn detect(args: &Args, stdin_is_tty: bool) -> TerminalUse {
		TerminalUse {
			line_editor: stdin_is_tty && args.command.is_none(),
			job_control: stdin_is_tty,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(command: Option<&str>) -> Args {
		Args {
			command: command.map(str::to_string),
			prompt: None,
			history_size: MAX_HISTORY_SIZE,
			max_variables: MAX_VARIABLES,
		}
	}

	#[test]
	fn command_on_a_terminal_still_hands_over_the_terminal() {
		let t = TerminalUse::detect(&args(Some("cat")), true);
		assert!(!t.line_editor);
		assert!(t.job_control);
	}

	#[test]
	fn terminal_session_uses_editor_and_job_control() {
		assert_eq!(TerminalUse::detect(&args(None), true),
		           TerminalUse { line_editor: true, job_control: true });
	}

	#[test]
	fn piped_input_uses_neither() {
		assert_eq!(TerminalUse::detect(&args(None), false),
		           TerminalUse { line_editor: false, job_control: false });
		assert_eq!(TerminalUse::detect(&args(Some("ls")), false),
		           TerminalUse { line_editor: false, job_control: false });
	}

	#[test]
	fn config_from_args() {
		let mut a = args(None);
		a.prompt = Some("psh".to_string());
		a.history_size = 5;
		let c = Config::from(&a);
		assert_eq!(c.prompt, "psh");
		assert_eq!(c.history_size, 5);
		assert_eq!(c.max_stages, MAX_STAGES);
	}
}
