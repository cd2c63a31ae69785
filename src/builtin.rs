use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cond;
use crate::global;
use crate::types::Pipeline;

#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
	Handled,
	NotBuiltin,
	Quit,
}

fn builtin_echo(out: &mut dyn Write, args: &[&str]) -> Result<()> {
	for arg in args {
		write!(out, "{} ", arg)?;
	}
	writeln!(out)?;
	Ok(())
}

fn builtin_cd(args: &[&str]) -> Result<()> {
	let target = match args.first() {
		Some(dir) => PathBuf::from(dir),
		None => PathBuf::from(env::var("HOME").context("cd: HOME not set")?),
	};
	env::set_current_dir(&target).with_context(|| format!("cd: {}", target.display()))
}

fn builtin_set(state: &mut global::State, name: &str, value: &str) -> Result<()> {
	state.vars.set(name, value)?;
	Ok(())
}

/// Reads one line and stores it as `$name`.
fn builtin_read(state: &mut global::State, input: &mut dyn BufRead, name: &str) -> Result<()> {
	let mut line = String::new();
	input.read_line(&mut line).context("read")?;
	let value = line.trim_end_matches(|c| c == '\n' || c == '\r');
	builtin_set(state, &format!("${}", name), value)
}

fn match_simple(state: &mut global::State, args: &[&str], input: &mut dyn BufRead,
                out: &mut dyn Write) -> Option<Result<()>> {
	let r = match args {
		["prompt", name] | ["prompt", "=", name] => {
			state.prompt = name.to_string();
			Ok(())
		},
		["echo", "$?"] => writeln!(out, "{}", state.last_exit_status).map_err(Into::into),
		["echo", rest @ ..] => builtin_echo(out, rest),
		["cd", rest @ ..] => builtin_cd(rest),
		[.., name, "=", value] => builtin_set(state, name, value),
		["read", name] => builtin_read(state, input, name),
		_ => { return None; },
	};
	Some(r)
}

/// Handles shell-level commands in-process. Only single-stage pipelines
/// without redirection are candidates; `if` lines go to the conditional
/// executor whatever their shape.
pub fn try_dispatch(state: &mut global::State, pipeline: &Pipeline, input: &mut dyn BufRead,
                    out: &mut dyn Write) -> Dispatch {
	let first = match pipeline.first() {
		Some(first) if !first.is_empty() => first,
		_ => { return Dispatch::NotBuiltin; },
	};

	if pipeline.stages.len() == 1 && pipeline.redirect.is_none() {
		let args: Vec<&str> = first.args.iter().map(String::as_str).collect();
		if args.as_slice() == ["quit"] {
			return Dispatch::Quit;
		}
		if let Some(r) = match_simple(state, &args, input, out) {
			log::debug!("builtin {:?}", args);
			if let Err(e) = r {
				eprintln!("psh: {:#}", e);
			}
			return Dispatch::Handled;
		}
	}

	if cond::starts_with_if(&pipeline.source) {
		return cond::execute_if(state, &pipeline.source, input, out);
	}
	Dispatch::NotBuiltin
}
