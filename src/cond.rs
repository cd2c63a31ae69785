use std::io::{BufRead, Write};

use crate::builtin::Dispatch;
use crate::eval;
use crate::global;
use crate::parser::{ParseError, ParseResult};
use crate::types::Flow;

const IF: &str = "if";
const THEN: &str = "then";
const ELSE: &str = "else";
const FI: &str = "fi";

#[derive(Debug, PartialEq, Eq)]
pub struct IfClauses<'a> {
	pub condition: &'a [&'a str],
	pub then_branch: &'a [&'a str],
	pub else_branch: Option<&'a [&'a str]>,
}

pub fn starts_with_if(line: &str) -> bool {
	line.split_whitespace().next() == Some(IF)
}

fn position_of(tokens: &[&str], keyword: &str) -> ParseResult<Option<usize>> {
	let mut found = tokens.iter().enumerate().filter(|&(_, t)| *t == keyword).map(|(i, _)| i);
	let first = found.next();
	if found.next().is_some() {
		return Err(ParseError::IfSyntax("keyword repeated; nested if is not supported"));
	}
	Ok(first)
}

/// Splits `if c... then t... [else e...] fi` into its clauses.
pub fn split_clauses<'a>(tokens: &'a [&'a str]) -> ParseResult<IfClauses<'a>> {
	if tokens.first() != Some(&IF) {
		return Err(ParseError::IfSyntax("expected if"));
	}
	if tokens.len() < 5 {
		return Err(ParseError::IfSyntax("usage: if <cmd> then <cmd> [else <cmd>] fi"));
	}
	if tokens[1..].contains(&IF) {
		return Err(ParseError::IfSyntax("nested if is not supported"));
	}
	let then_pos = position_of(tokens, THEN)?.ok_or(ParseError::IfSyntax("missing then"))?;
	let fi_pos = position_of(tokens, FI)?.ok_or(ParseError::IfSyntax("missing fi"))?;
	let else_pos = position_of(tokens, ELSE)?;

	if then_pos > fi_pos {
		return Err(ParseError::IfSyntax("then after fi"));
	}
	if fi_pos + 1 != tokens.len() {
		return Err(ParseError::IfSyntax("unexpected words after fi"));
	}
	if then_pos == 1 {
		return Err(ParseError::IfSyntax("missing condition"));
	}
	let (then_end, else_branch) = match else_pos {
		Some(e) if e < then_pos => { return Err(ParseError::IfSyntax("then after else")); },
		Some(e) => (e, Some(&tokens[e + 1 .. fi_pos])),
		None => (fi_pos, None),
	};
	Ok(IfClauses {
		condition: &tokens[1 .. then_pos],
		then_branch: &tokens[then_pos + 1 .. then_end],
		else_branch: else_branch,
	})
}

/// Runs the condition as a foreground pipeline and executes the branch its
/// exit status selects. Built-ins inside a branch are honoured.
pub fn execute_if(state: &mut global::State, line: &str, input: &mut dyn BufRead,
                  out: &mut dyn Write) -> Dispatch {
	let tokens: Vec<&str> = line.split_whitespace().collect();
	let clauses = match split_clauses(&tokens) {
		Ok(clauses) => clauses,
		Err(e) => {
			eprintln!("psh: {}", e);
			return Dispatch::Handled;
		},
	};
	log::debug!("{:?}", clauses);

	let condition = match eval::parse_foreground(state, &clauses.condition.join(" ")) {
		Ok(pipeline) => pipeline,
		Err(e) => {
			eprintln!("psh: {}", e);
			return Dispatch::Handled;
		},
	};
	if let Err(e) = eval::run(state, &condition) {
		eprintln!("psh: {}", e);
		return Dispatch::Handled;
	}

	let branch = if state.last_exit_status == 0 {
		Some(clauses.then_branch)
	} else {
		clauses.else_branch
	};
	let branch = match branch {
		Some(branch) if !branch.is_empty() => branch,
		_ => { return Dispatch::Handled; },
	};
	match eval::parse_foreground(state, &branch.join(" ")) {
		Ok(pipeline) => match eval::eval(state, &pipeline, input, out) {
			Flow::Continue => Dispatch::Handled,
			Flow::Quit => Dispatch::Quit,
		},
		Err(e) => {
			eprintln!("psh: {}", e);
			Dispatch::Handled
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn words(line: &str) -> Vec<&str> {
		line.split_whitespace().collect()
	}

	#[test]
	fn then_and_else() {
		let t = words("if grep -q x f then echo yes else echo no fi");
		let c = split_clauses(&t).unwrap();
		assert_eq!(c.condition, &["grep", "-q", "x", "f"]);
		assert_eq!(c.then_branch, &["echo", "yes"]);
		assert_eq!(c.else_branch, Some(&["echo", "no"][..]));
	}

	#[test]
	fn then_only() {
		let t = words("if true then x = 1 fi");
		let c = split_clauses(&t).unwrap();
		assert_eq!(c.condition, &["true"]);
		assert_eq!(c.then_branch, &["x", "=", "1"]);
		assert_eq!(c.else_branch, None);
	}

	#[test]
	fn pipeline_condition() {
		let t = words("if ls | grep foo then echo found fi");
		let c = split_clauses(&t).unwrap();
		assert_eq!(c.condition, &["ls", "|", "grep", "foo"]);
	}

	#[test]
	fn if_is_recognised_by_first_word() {
		assert!(starts_with_if("  if true then ls fi"));
		assert!(!starts_with_if("iffy then fi"));
		assert!(!starts_with_if("echo if"));
		assert!(!starts_with_if(""));
	}

	#[test]
	fn syntax_errors() {
		let cases = [
			"if true echo yes fi",
			"if true then echo yes",
			"if true fi echo then",
			"if true else echo then echo fi",
			"if true then echo fi else",
			"if true then echo fi fi",
			"if true then if x fi",
			"if then echo yes fi",
			"if true then fi",
		];
		for case in &cases {
			let t = words(case);
			assert!(split_clauses(&t).is_err(), "{}", case);
		}
	}
}
