use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VarError {
	#[error("variable table full ({capacity})")]
	Full { capacity: usize },
}

/// Flat name -> value table. Insertion order is kept; names are matched exactly.
#[derive(Debug)]
pub struct VariableStore {
	vars: Vec<(String, String)>,
	capacity: usize,
}

impl VariableStore {
	pub fn new(capacity: usize) -> VariableStore {
		VariableStore { vars: Vec::new(), capacity: capacity }
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
	}

	pub fn set(&mut self, name: &str, value: &str) -> Result<(), VarError> {
		if let Some((_, v)) = self.vars.iter_mut().find(|(k, _)| k == name) {
			*v = value.to_string();
			return Ok(());
		}
		if self.vars.len() >= self.capacity {
			return Err(VarError::Full { capacity: self.capacity });
		}
		self.vars.push((name.to_string(), value.to_string()));
		Ok(())
	}

	#[cfg(test)]
	pub fn len(&self) -> usize {
		self.vars.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_then_get() {
		let mut vars = VariableStore::new(4);
		assert_eq!(vars.get("x"), None);
		vars.set("x", "5").unwrap();
		assert_eq!(vars.get("x"), Some("5"));
		assert_eq!(vars.get("X"), None);
	}

	#[test]
	fn set_overwrites_existing_name() {
		let mut vars = VariableStore::new(1);
		vars.set("x", "5").unwrap();
		vars.set("x", "6").unwrap();
		assert_eq!(vars.get("x"), Some("6"));
		assert_eq!(vars.len(), 1);
	}

	#[test]
	fn overflow_drops_assignment() {
		let mut vars = VariableStore::new(2);
		vars.set("a", "1").unwrap();
		vars.set("b", "2").unwrap();
		assert_eq!(vars.set("c", "3"), Err(VarError::Full { capacity: 2 }));
		assert_eq!(vars.get("c"), None);
		assert_eq!(vars.len(), 2);
	}
}
