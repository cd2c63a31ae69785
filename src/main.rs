mod builtin;
mod cond;
mod config;
mod editor;
mod eval;
mod global;
mod history;
mod job;
mod parser;
mod signal;
mod types;
mod vars;

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};

use crate::editor::ReadOutcome;
use crate::types::Flow;

fn interactive_loop(state: &mut global::State, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
	loop {
		let prompt = format!("{}: ", state.prompt);
		let line = match editor::read_line(out, &prompt, &mut state.history).context("reading command line")? {
			ReadOutcome::Line(line) => line,
			ReadOutcome::Interrupted => { continue; },
			ReadOutcome::Eof => { return Ok(()); },
		};
		// Pressed after Enter; there is no job yet for it to stop.
		let _ = signal::take_interrupt();
		if !line.trim().is_empty() {
			state.history.push(&line);
		}
		if eval::eval_line(state, &line, input, out) == Flow::Quit {
			return Ok(());
		}
	}
}

fn script_loop(state: &mut global::State, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
	let mut buf = String::new();
	loop {
		buf.clear();
		if input.read_line(&mut buf).context("reading command line")? == 0 {
			return Ok(());
		}
		let line = buf.trim_end_matches(|c| c == '\n' || c == '\r');
		let _ = signal::take_interrupt();
		if !line.trim().is_empty() {
			state.history.push(line);
		}
		if eval::eval_line(state, line, input, out) == Flow::Quit {
			return Ok(());
		}
	}
}

fn run(args: &config::Args) -> Result<()> {
	signal::install().context("installing signal handlers")?;

	let stdin = io::stdin();
	let terminal = config::TerminalUse::detect(args, stdin.is_terminal());
	log::debug!("{:?}", terminal);
	let mut state = global::State::new(config::Config::from(args), terminal.job_control);
	let mut input = stdin.lock();
	let mut out = io::stdout();

	if let Some(line) = &args.command {
		eval::eval_line(&mut state, line, &mut input, &mut out);
		return Ok(());
	}
	if terminal.line_editor {
		interactive_loop(&mut state, &mut input, &mut out)
	} else {
		script_loop(&mut state, &mut input, &mut out)
	}
}

fn main() {
	env_logger::init();
	let args: config::Args = argh::from_env();
	if let Err(e) = run(&args) {
		eprintln!("psh: {:#}", e);
		std::process::exit(1);
	}
}
