use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use nix::errno::Errno;
use nix::poll::{self, PollFd, PollFlags};
use nix::sys::signal::SigSet;
use nix::sys::termios::{self, LocalFlags, SetArg, SpecialCharacterIndices, Termios};
use nix::unistd;

use crate::history::HistoryBuffer;
use crate::signal;

const ESC: u8 = 0x1b;
const BACKSPACE: u8 = 127;
const CTRL_H: u8 = 8;
const CTRL_D: u8 = 4;

/// Terminal attributes saved on entry and restored on drop.
pub struct RawMode {
	saved: Termios,
}

impl RawMode {
	pub fn enable() -> nix::Result<RawMode> {
		let stdin = io::stdin();
		let saved = termios::tcgetattr(stdin.as_fd())?;
		let mut raw = saved.clone();
		raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
		raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
		raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
		termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw)?;
		Ok(RawMode { saved: saved })
	}
}

impl Drop for RawMode {
	fn drop(&mut self) {
		if let Err(e) = termios::tcsetattr(io::stdin().as_fd(), SetArg::TCSANOW, &self.saved) {
			log::warn!("restoring terminal mode: {}", e);
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Key {
	Byte(u8),
	Backspace,
	Up,
	Down,
	Enter,
	Eof,
	Ignored,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
enum EscState {
	#[default]
	Ground,
	Escape,
	Csi,
}

/// Turns raw input bytes into keys, recognising `ESC [ A` and `ESC [ B`.
#[derive(Debug, Default)]
pub struct KeyDecoder {
	state: EscState,
}

impl KeyDecoder {
	pub fn feed(&mut self, b: u8) -> Option<Key> {
		match (self.state, b) {
			(EscState::Ground, ESC) => {
				self.state = EscState::Escape;
				None
			},
			(EscState::Ground, b'\n') | (EscState::Ground, b'\r') => Some(Key::Enter),
			(EscState::Ground, BACKSPACE) | (EscState::Ground, CTRL_H) => Some(Key::Backspace),
			(EscState::Ground, CTRL_D) => Some(Key::Eof),
			(EscState::Ground, b'\t') => Some(Key::Byte(b'\t')),
			(EscState::Ground, b) if b < 0x20 => Some(Key::Ignored),
			(EscState::Ground, b) => Some(Key::Byte(b)),
			(EscState::Escape, b'[') => {
				self.state = EscState::Csi;
				None
			},
			(EscState::Escape, _) => {
				self.state = EscState::Ground;
				Some(Key::Ignored)
			},
			// parameter bytes of a longer sequence
			(EscState::Csi, 0x30..=0x3f) => None,
			(EscState::Csi, b) => {
				self.state = EscState::Ground;
				Some(match b {
					b'A' => Key::Up,
					b'B' => Key::Down,
					_ => Key::Ignored,
				})
			},
		}
	}
}

/// What the terminal needs to show after a key.
#[derive(Debug, PartialEq, Eq)]
pub enum Edit {
	Insert(u8),
	Erase,
	Replace,
	Accept(String),
	Eof,
	Nothing,
}

/// The line being composed.
#[derive(Debug, Default)]
pub struct LineBuffer {
	bytes: Vec<u8>,
}

impl LineBuffer {
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	fn set(&mut self, line: &str) {
		self.bytes.clear();
		self.bytes.extend_from_slice(line.as_bytes());
	}

	fn take(&mut self) -> String {
		let line = String::from_utf8_lossy(&self.bytes).into_owned();
		self.bytes.clear();
		line
	}

	// Drops one whole UTF-8 character.
	fn pop_char(&mut self) -> bool {
		while let Some(b) = self.bytes.pop() {
			if b & 0xc0 != 0x80 {
				return true;
			}
		}
		false
	}

	pub fn apply(&mut self, key: Key, history: &mut HistoryBuffer) -> Edit {
		match key {
			Key::Byte(b) => {
				self.bytes.push(b);
				Edit::Insert(b)
			},
			Key::Backspace => if self.pop_char() { Edit::Erase } else { Edit::Nothing },
			Key::Up => match history.older() {
				Some(line) => {
					self.set(line);
					Edit::Replace
				},
				None => Edit::Nothing,
			},
			Key::Down => match history.newer() {
				Some(line) => {
					self.set(line);
					Edit::Replace
				},
				None => Edit::Nothing,
			},
			Key::Enter => Edit::Accept(self.take()),
			Key::Eof => if self.bytes.is_empty() { Edit::Eof } else { Edit::Nothing },
			Key::Ignored => Edit::Nothing,
		}
	}
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
	Line(String),
	Interrupted,
	Eof,
}

// SIGINT is only deliverable inside this call, so it either interrupts the
// wait or stays pending for the next one.
fn wait_readable(fd: BorrowedFd, mask: SigSet) -> nix::Result<()> {
	let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
	poll::ppoll(&mut fds, None, Some(mask)).map(drop)
}

/// Reads one line from the terminal on stdin, echoing and editing it in place.
/// Bytes are read straight from the descriptor, one at a time, so nothing
/// typed ahead is left in a buffer.
pub fn read_line(out: &mut dyn Write, prompt: &str, history: &mut HistoryBuffer) -> io::Result<ReadOutcome> {
	let stdin = io::stdin();
	let fd = stdin.as_fd();
	let _raw = RawMode::enable()?;
	let blocked = signal::Blocked::new(&signal::interrupt_set())?;
	history.reset_cursor();
	// An interrupt that landed while idle has nothing left to kill.
	let _ = signal::take_interrupt();
	write!(out, "{}", prompt)?;
	out.flush()?;

	let mut decoder = KeyDecoder::default();
	let mut line = LineBuffer::default();
	let mut byte = [0u8; 1];
	loop {
		match wait_readable(fd, blocked.previous()) {
			Ok(()) => {},
			Err(Errno::EINTR) if signal::take_interrupt() => {
				writeln!(out)?;
				return Ok(ReadOutcome::Interrupted);
			},
			Err(Errno::EINTR) => { continue; },
			Err(e) => { return Err(e.into()); },
		}
		match unistd::read(fd.as_raw_fd(), &mut byte) {
			Ok(0) => {
				writeln!(out)?;
				return Ok(if line.is_empty() { ReadOutcome::Eof } else { ReadOutcome::Line(line.take()) });
			},
			Ok(_) => {},
			Err(Errno::EINTR) | Err(Errno::EAGAIN) => { continue; },
			Err(e) => { return Err(e.into()); },
		}
		let key = match decoder.feed(byte[0]) {
			Some(key) => key,
			None => { continue; },
		};
		log::trace!("key {:?}", key);
		match line.apply(key, history) {
			Edit::Insert(b) => out.write_all(&[b])?,
			Edit::Erase => out.write_all(b"\x08 \x08")?,
			Edit::Replace => {
				write!(out, "\r\x1b[K{}", prompt)?;
				out.write_all(line.as_bytes())?;
			},
			Edit::Accept(accepted) => {
				writeln!(out)?;
				out.flush()?;
				return Ok(ReadOutcome::Line(accepted));
			},
			Edit::Eof => {
				writeln!(out)?;
				return Ok(ReadOutcome::Eof);
			},
			Edit::Nothing => {},
		}
		out.flush()?;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn keys(bytes: &[u8]) -> Vec<Key> {
		let mut d = KeyDecoder::default();
		bytes.iter().filter_map(|&b| d.feed(b)).collect()
	}

	fn type_keys(bytes: &[u8], history: &mut HistoryBuffer) -> (LineBuffer, Vec<Edit>) {
		let mut line = LineBuffer::default();
		let edits = keys(bytes).into_iter().map(|k| line.apply(k, history)).collect();
		(line, edits)
	}

	#[test]
	fn decodes_arrows_and_editing_keys() {
		assert_eq!(keys(b"a\x1b[A\x1b[B\x7f\n"),
		           vec![Key::Byte(b'a'), Key::Up, Key::Down, Key::Backspace, Key::Enter]);
	}

	#[test]
	fn other_escape_sequences_are_ignored() {
		assert_eq!(keys(b"\x1b[C\x1b[1;5Dx"), vec![Key::Ignored, Key::Ignored, Key::Byte(b'x')]);
	}

	#[test]
	fn backspace_removes_last_character() {
		let mut h = HistoryBuffer::new(3);
		let (line, edits) = type_keys(b"lss\x7f", &mut h);
		assert_eq!(line.as_bytes(), b"ls");
		assert_eq!(edits.last(), Some(&Edit::Erase));
	}

	#[test]
	fn backspace_on_empty_line_does_nothing() {
		let mut h = HistoryBuffer::new(3);
		let (_, edits) = type_keys(b"\x7f", &mut h);
		assert_eq!(edits, vec![Edit::Nothing]);
	}

	#[test]
	fn backspace_removes_whole_utf8_character() {
		let mut h = HistoryBuffer::new(3);
		let (line, _) = type_keys("aé\x7f".as_bytes(), &mut h);
		assert_eq!(line.as_bytes(), b"a");
	}

	#[test]
	fn up_arrow_recalls_history() {
		let mut h = HistoryBuffer::new(3);
		for l in ["a", "b", "c", "d"] {
			h.push(l);
		}
		let (line, _) = type_keys(b"\x1b[A\x1b[A", &mut h);
		assert_eq!(line.as_bytes(), b"c");
		let (_, edits) = type_keys(b"\x1b[A\x1b[A", &mut h);
		assert_eq!(edits, vec![Edit::Replace, Edit::Nothing]);
	}

	#[test]
	fn enter_accepts_and_clears() {
		let mut h = HistoryBuffer::new(3);
		let (line, edits) = type_keys(b"ls -l\r", &mut h);
		assert_eq!(edits.last(), Some(&Edit::Accept("ls -l".to_string())));
		assert!(line.is_empty());
	}

	#[test]
	fn ctrl_d_only_ends_an_empty_line() {
		let mut h = HistoryBuffer::new(3);
		let (_, edits) = type_keys(b"\x04x\x04", &mut h);
		assert_eq!(edits, vec![Edit::Eof, Edit::Insert(b'x'), Edit::Nothing]);
	}
}
