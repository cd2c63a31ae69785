use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_: libc::c_int) {
	INTERRUPTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigchld(_: libc::c_int) {}

/// Installs the SIGINT handler (no `SA_RESTART`, so blocking calls see
/// `EINTR`) and ignores SIGTTOU so the shell can take the terminal back.
pub fn install() -> nix::Result<()> {
	let int = SigAction::new(SigHandler::Handler(on_sigint), SaFlags::empty(), SigSet::empty());
	// With a handler installed a blocked SIGCHLD stays pending instead of being discarded.
	let chld = SigAction::new(SigHandler::Handler(on_sigchld), SaFlags::SA_RESTART, SigSet::empty());
	unsafe {
		signal::sigaction(Signal::SIGINT, &int)?;
		signal::sigaction(Signal::SIGCHLD, &chld)?;
		signal::signal(Signal::SIGTTOU, SigHandler::SigIgn)?;
	}
	Ok(())
}

/// Puts back default dispositions and an empty mask; called in a forked child before exec.
pub fn restore_defaults() {
	for sig in [Signal::SIGINT, Signal::SIGCHLD, Signal::SIGTTOU] {
		let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
	}
	let _ = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}

/// Returns whether an interrupt arrived since the last call, clearing it.
pub fn take_interrupt() -> bool {
	INTERRUPTED.swap(false, Ordering::SeqCst)
}

pub fn interrupt_set() -> SigSet {
	let mut set = SigSet::empty();
	set.add(Signal::SIGINT);
	set
}

/// SIGINT and SIGCHLD: what a foreground wait sleeps on.
pub fn job_set() -> SigSet {
	let mut set = interrupt_set();
	set.add(Signal::SIGCHLD);
	set
}

/// Blocks a set of signals until dropped. While blocked they stay pending,
/// so a check followed by `SigSet::wait` or `ppoll` cannot miss one.
pub struct Blocked {
	previous: SigSet,
}

impl Blocked {
	pub fn new(set: &SigSet) -> nix::Result<Blocked> {
		let mut previous = SigSet::empty();
		signal::pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(set), Some(&mut previous))?;
		Ok(Blocked { previous: previous })
	}

	/// The mask in effect before blocking.
	pub fn previous(&self) -> SigSet {
		self.previous
	}
}

impl Drop for Blocked {
	fn drop(&mut self) {
		if let Err(e) = signal::pthread_sigmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
			log::warn!("restoring signal mask: {}", e);
		}
	}
}
