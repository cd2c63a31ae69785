use std::collections::VecDeque;

/// Bounded list of accepted command lines with an up/down recall cursor.
///
/// The cursor ranges over `0..=len()`; `len()` means "composing a new line".
#[derive(Debug)]
pub struct HistoryBuffer {
	entries: VecDeque<String>,
	capacity: usize,
	cursor: usize,
}

impl HistoryBuffer {
	pub fn new(capacity: usize) -> HistoryBuffer {
		HistoryBuffer { entries: VecDeque::with_capacity(capacity), capacity: capacity, cursor: 0 }
	}

	/// Appends a line, evicting the oldest entry once over capacity, and resets the cursor.
	pub fn push(&mut self, line: &str) {
		if self.capacity == 0 {
			return;
		}
		if self.entries.len() == self.capacity {
			self.entries.pop_front();
		}
		self.entries.push_back(line.to_string());
		self.reset_cursor();
	}

	pub fn reset_cursor(&mut self) {
		self.cursor = self.entries.len();
	}

	/// Up-arrow. `None` when already at the oldest entry.
	pub fn older(&mut self) -> Option<&str> {
		if self.cursor == 0 {
			return None;
		}
		self.cursor -= 1;
		self.entries.get(self.cursor).map(String::as_str)
	}

	/// Down-arrow. Moving past the newest entry yields the empty line;
	/// `None` when already composing a new line.
	pub fn newer(&mut self) -> Option<&str> {
		if self.cursor >= self.entries.len() {
			return None;
		}
		self.cursor += 1;
		Some(self.entries.get(self.cursor).map_or("", String::as_str))
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[cfg(test)]
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(String::as_str)
	}
}
