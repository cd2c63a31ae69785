use thiserror::Error;

use crate::types::*;
use crate::vars::VariableStore;

pub const REPEAT_TOKEN: &str = "!!";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
	#[error("No previous command to repeat.")]
	EmptyHistory,
	#[error("too many pipeline stages ({0}, at most {1})")]
	TooManyStages(usize, usize),
	#[error("empty command in pipeline")]
	EmptyStage,
	#[error("if: {0}")]
	IfSyntax(&'static str),
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Splits `s` on `delim`, trimming surrounding whitespace from every piece.
pub fn split_trimmed(s: &str, delim: char) -> Vec<&str> {
	s.split(delim).map(str::trim).collect()
}

/// Replaces a line consisting only of `!!` with the last executed line.
pub fn resolve_repeat<'a>(line: &'a str, last: Option<&'a str>) -> ParseResult<&'a str> {
	if line.trim() != REPEAT_TOKEN {
		return Ok(line);
	}
	last.ok_or(ParseError::EmptyHistory)
}

fn take_background(args: &mut Vec<String>) -> bool {
	if args.last().map(String::as_str) == Some("&") {
		args.pop();
		true
	} else {
		false
	}
}

// Only one of `>`, `2>`, `>>` is honoured, looked up two tokens from the end.
fn take_redirect(args: &mut Vec<String>) -> Option<Redirect> {
	let len = args.len();
	if len <= 2 {
		return None;
	}
	let (mode, stream) = match args[len - 2].as_str() {
		">" => (RedirectMode::Truncate, Stream::Stdout),
		"2>" => (RedirectMode::Truncate, Stream::Stderr),
		">>" => (RedirectMode::Append, Stream::Stdout),
		_ => { return None; },
	};
	let target = args.pop()?;
	args.pop();
	Some(Redirect { target: target, mode: mode, stream: stream })
}

/// Index of the name in a trailing `name = value`, which must stay unsubstituted.
pub fn assignment_name_index(args: &[String]) -> Option<usize> {
	let len = args.len();
	if len >= 3 && args[len - 2] == "=" {
		Some(len - 3)
	} else {
		None
	}
}

fn substitute(args: &mut [String], vars: &VariableStore) {
	let keep = assignment_name_index(args);
	for (i, arg) in args.iter_mut().enumerate() {
		if Some(i) == keep {
			continue;
		}
		if let Some(value) = vars.get(arg) {
			*arg = value.to_string();
		}
	}
}

pub fn parse(line: &str, vars: &VariableStore, max_stages: usize) -> ParseResult<Pipeline> {
	let segments = split_trimmed(line, '|');
	if segments.len() > max_stages {
		return Err(ParseError::TooManyStages(segments.len(), max_stages));
	}

	let mut stages: Vec<Stage> = segments.iter()
		.map(|seg| Stage { args: seg.split_whitespace().map(str::to_string).collect() })
		.collect();
	if stages.len() > 1 && stages.iter().any(Stage::is_empty) {
		return Err(ParseError::EmptyStage);
	}

	let mut background = false;
	let mut redirect = None;
	if let Some(last) = stages.last_mut() {
		background = take_background(&mut last.args);
		redirect = take_redirect(&mut last.args);
	}
	if let Some(first) = stages.first_mut() {
		substitute(&mut first.args, vars);
	}

	let pipeline = Pipeline {
		stages: stages,
		background: background,
		redirect: redirect,
		source: line.trim().to_string(),
	};
	log::debug!("parsed {:?}", pipeline);
	Ok(pipeline)
}
