use thiserror::Error;

/// The one user-visible failure path in this crate (§7): everything else
/// degrades to a neutral value instead of raising.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("worker_id {worker_id} is out of range (max_workers = {max_workers})")]
    SlotOutOfRange { worker_id: u32, max_workers: u32 },

    #[error("worker_id {worker_id} is already bound by another thread")]
    SlotBusy { worker_id: u32 },

    #[error("this thread is already bound to worker_id {existing}")]
    ThreadAlreadyBound { existing: u32 },
}
