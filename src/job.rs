use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

use crate::signal as sigint;
use crate::types::SIGNALED_STATUS;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum ProcState { Active, Stopped, Terminated }

trait WaitStatusExt {
	fn state(self) -> ProcState;
	fn code(self) -> i32;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> ProcState {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => ProcState::Terminated,
			WaitStatus::Stopped(..) => ProcState::Stopped,
			_ => ProcState::Active,
		}
	}

	fn code(self) -> i32 {
		match self {
			WaitStatus::Exited(_, code) => code,
			_ => SIGNALED_STATUS,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// The process group running one pipeline. `processes` is in stage order.
#[derive(Debug)]
pub struct Job {
	pub pgid: Pid,
	pub processes: Vec<Process>,
}

impl Job {
	pub fn state(&self) -> ProcState {
		self.processes.iter().map(|pr| pr.status.state()).min().unwrap_or(ProcState::Terminated)
	}

	/// Status of the last stage: its exit code, or `SIGNALED_STATUS`.
	pub fn exit_status(&self) -> i32 {
		self.processes.last().map_or(SIGNALED_STATUS, |pr| pr.status.code())
	}

	/// Kills the whole process group.
	pub fn kill(&self) {
		match signal::killpg(self.pgid, Signal::SIGKILL) {
			Ok(()) | Err(Errno::ESRCH) => {},
			Err(e) => log::warn!("killpg {}: {}", self.pgid, e),
		}
	}

	fn update(&mut self, status: WaitStatus) {
		let pid = match status.pid() {
			Some(pid) => pid,
			None => { return; },
		};
		log::debug!("job {}: {:?}", self.pgid, status);
		if let Some(pr) = self.processes.iter_mut().find(|pr| pr.pid == pid) {
			pr.status = status;
		}
		if status.state() == ProcState::Stopped {
			log::warn!("job {} stopped; suspending jobs is not supported, killing it", self.pgid);
			self.kill();
		}
	}

	fn interrupt(&self) {
		eprintln!();
		log::debug!("interrupt: killing job {}", self.pgid);
		self.kill();
	}

	// Collects every pending status change without blocking. False once the
	// group has no children left.
	fn reap(&mut self, group: Pid) -> nix::Result<bool> {
		loop {
			match waitpid(group, Some(WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) => { return Ok(true); },
				Ok(status) => self.update(status),
				Err(Errno::EINTR) => {},
				Err(Errno::ECHILD) => { return Ok(false); },
				Err(e) => { return Err(e); },
			}
		}
	}

	/// Reaps every process of the group, killing the group if an interrupt
	/// arrives meanwhile. Returns the status of the last stage.
	pub fn wait(&mut self) -> nix::Result<i32> {
		let signals = sigint::job_set();
		let _blocked = sigint::Blocked::new(&signals)?;
		let group = Pid::from_raw(-self.pgid.as_raw());
		// Arrived between fork and here, while the handler was still live.
		if sigint::take_interrupt() {
			self.interrupt();
		}
		while self.reap(group)? && self.state() != ProcState::Terminated {
			match signals.wait() {
				Ok(Signal::SIGINT) => self.interrupt(),
				Ok(_) | Err(Errno::EINTR) => {},
				Err(e) => { return Err(e); },
			}
		}
		Ok(self.exit_status())
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { pgid: Pid::from_raw(0), processes: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks one stage into the job's process group. The first child becomes
	/// the group leader. Both sides call `setpgid` so the group exists before
	/// either the parent signals it or the child execs.
	pub fn push_fork(&mut self) -> nix::Result<ForkResult> {
		let job = &mut self.imp;

		let r = unsafe { unistd::fork() }?;
		match r {
			ForkResult::Parent { child: pid } => {
				if job.processes.is_empty() {
					job.pgid = pid;
				}
				// EACCES once the child has already exec'd; its own call won.
				if let Err(e) = unistd::setpgid(pid, job.pgid) {
					log::debug!("setpgid({}, {}): {}", pid, job.pgid, e);
				}
				job.processes.push(Process { pid: pid, status: WaitStatus::StillAlive });
			},
			ForkResult::Child => {
				let pgid = if job.processes.is_empty() { Pid::from_raw(0) } else { job.pgid };
				let _ = unistd::setpgid(Pid::from_raw(0), pgid);
			},
		}
		Ok(r)
	}

	pub fn build(self) -> Option<Job> {
		if self.imp.processes.is_empty() {
			None
		} else {
			Some(self.imp)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn process(pid: i32, status: WaitStatus) -> Process {
		Process { pid: Pid::from_raw(pid), status: status }
	}

	#[test]
	fn job_state_is_least_advanced_process() {
		let job = Job {
			pgid: Pid::from_raw(10),
			processes: vec![
				process(10, WaitStatus::Exited(Pid::from_raw(10), 0)),
				process(11, WaitStatus::StillAlive),
			],
		};
		assert_eq!(job.state(), ProcState::Active);
	}

	#[test]
	fn exit_status_comes_from_last_stage() {
		let job = Job {
			pgid: Pid::from_raw(10),
			processes: vec![
				process(10, WaitStatus::Exited(Pid::from_raw(10), 3)),
				process(11, WaitStatus::Exited(Pid::from_raw(11), 1)),
			],
		};
		assert_eq!(job.state(), ProcState::Terminated);
		assert_eq!(job.exit_status(), 1);
	}

	#[test]
	fn signaled_stage_reports_sentinel() {
		let job = Job {
			pgid: Pid::from_raw(10),
			processes: vec![process(10, WaitStatus::Signaled(Pid::from_raw(10), Signal::SIGKILL, false))],
		};
		assert_eq!(job.exit_status(), SIGNALED_STATUS);
	}

	#[test]
	fn update_matches_by_pid() {
		let mut job = Job {
			pgid: Pid::from_raw(20),
			processes: vec![process(20, WaitStatus::StillAlive), process(21, WaitStatus::StillAlive)],
		};
		job.update(WaitStatus::Exited(Pid::from_raw(21), 7));
		assert_eq!(job.processes[1].status, WaitStatus::Exited(Pid::from_raw(21), 7));
		assert_eq!(job.state(), ProcState::Active);
	}

	#[test]
	fn empty_builder_builds_nothing() {
		assert!(JobBuilder::new(2).build().is_none());
	}
}
