use crate::config::Config;
use crate::history::HistoryBuffer;
use crate::job;
use crate::parser::{self, ParseResult};
use crate::vars::VariableStore;

/// Everything the shell keeps between lines.
pub struct State {
	pub config: Config,
	pub vars: VariableStore,
	pub history: HistoryBuffer,
	pub prompt: String,
	pub last_exit_status: i32,
	/// The last line actually executed, replayed by `!!`.
	pub last_command: Option<String>,
	/// The foreground job being waited for, if any.
	pub job: Option<job::Job>,
	/// Whether standard input is a terminal we hand to foreground jobs.
	pub job_control: bool,
}

impl State {
	pub fn new(config: Config, job_control: bool) -> State {
		let vars = VariableStore::new(config.max_variables);
		let history = HistoryBuffer::new(config.history_size);
		let prompt = config.prompt.clone();
		State {
			config: config,
			vars: vars,
			history: history,
			prompt: prompt,
			last_exit_status: 0,
			last_command: None,
			job: None,
			job_control: job_control,
		}
	}

	/// Resolves `!!` and remembers the line to be executed.
	pub fn accept_line(&mut self, line: &str) -> ParseResult<String> {
		let resolved = parser::resolve_repeat(line, self.last_command.as_deref())?.to_string();
		if line.trim() == parser::REPEAT_TOKEN {
			log::debug!("!! -> {}", resolved);
		} else if !line.trim().is_empty() {
			self.last_command = Some(line.to_string());
		}
		Ok(resolved)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::ParseError;

	#[test]
	fn repeat_replays_without_overwriting() {
		let mut state = State::new(Config::default(), false);
		assert_eq!(state.accept_line("!!"), Err(ParseError::EmptyHistory));
		assert_eq!(state.accept_line("ls -l").unwrap(), "ls -l");
		assert_eq!(state.accept_line("!!").unwrap(), "ls -l");
		assert_eq!(state.last_command.as_deref(), Some("ls -l"));
	}

	#[test]
	fn blank_line_keeps_last_command() {
		let mut state = State::new(Config::default(), false);
		state.accept_line("pwd").unwrap();
		state.accept_line("   ").unwrap();
		assert_eq!(state.accept_line("!!").unwrap(), "pwd");
	}
}
