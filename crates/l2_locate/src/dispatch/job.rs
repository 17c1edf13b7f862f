//! Background resolution job.
//!
//! Runs a whole batch off the calling thread and hands the report back
//! through a channel, for callers that poll (UI loops, schedulers) instead of
//! blocking.
//!
//! # Usage
//!
//! ```ignore
//! let mut job = ResolutionJob::spawn(service.clone(), ids, request)?;
//!
//! // Poll from the caller's loop
//! if let Some(result) = job.poll() {
//!     let report = result?;
//!     // ...
//! }
//!
//! // Or stop early; nodes not yet started come back as Cancelled
//! job.abort();
//! let report = job.wait();
//! ```

use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};

use super::{resolve_all_with_abort, AbortHandle};
use crate::config::ResolutionRequest;
use crate::error::ConfigError;
use crate::report::ResolutionReport;
use crate::service::DataService;
use crate::types::Level2Id;

type JobResult = Result<ResolutionReport, ConfigError>;

/// Non-blocking handle to a batch running on rayon's global pool.
pub struct ResolutionJob {
	/// Receiver for the pending report; `None` once collected.
	receiver: Option<Receiver<JobResult>>,
	abort: AbortHandle,
}

impl ResolutionJob {
	/// Validate `request` and start resolving `nodes` in the background.
	///
	/// Configuration errors are returned here, before anything is spawned.
	pub fn spawn<S>(service: Arc<S>, nodes: Vec<Level2Id>, request: ResolutionRequest) -> Result<Self, ConfigError>
	where
		S: DataService + Send + ?Sized + 'static,
	{
		request.validate(service.as_ref())?;

		let (sender, receiver) = channel::bounded(1);
		let abort = AbortHandle::new();
		let worker_abort = abort.clone();

		rayon::spawn(move || {
			let result = resolve_all_with_abort(service.as_ref(), &nodes, &request, &worker_abort);
			// Receiver dropped = caller lost interest
			let _ = sender.send(result);
		});

		Ok(Self {
			receiver: Some(receiver),
			abort,
		})
	}

	/// Check if the report has not been collected yet.
	pub fn is_busy(&self) -> bool {
		self.receiver.is_some()
	}

	/// Poll for the report (non-blocking).
	///
	/// Returns `Some` exactly once, when the batch has finished.
	pub fn poll(&mut self) -> Option<JobResult> {
		let receiver = self.receiver.as_ref()?;

		match receiver.try_recv() {
			Ok(result) => {
				self.receiver = None;
				Some(result)
			}
			Err(TryRecvError::Empty) => None,
			Err(TryRecvError::Disconnected) => {
				self.receiver = None;
				None
			}
		}
	}

	/// Block until the report is ready.
	///
	/// Returns `None` if the report was already collected or the worker died.
	pub fn wait(&mut self) -> Option<JobResult> {
		let receiver = self.receiver.take()?;
		receiver.recv().ok()
	}

	/// Stop handing out new nodes. The report is still delivered.
	pub fn abort(&self) {
		self.abort.abort();
	}

	/// Abort flag shared with the running batch.
	pub fn abort_handle(&self) -> AbortHandle {
		self.abort.clone()
	}
}
