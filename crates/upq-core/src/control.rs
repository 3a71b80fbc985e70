//! Run control shared by the manager and its workers: pause flag, wake-ups,
//! idle tracking, and per-task abort tokens.
//!
//! Each claimed task is registered with a [`CancellationToken`]. Removing or
//! restarting a task that is in flight cancels its token; the worker notices
//! at the next chunk boundary and abandons the task without touching it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::task::TaskId;

/// A worker's hold on one task.
#[derive(Debug, Clone)]
pub struct ClaimTicket {
    pub token: CancellationToken,
    serial: u64,
}

#[derive(Debug)]
pub struct UploadControl {
    paused: watch::Sender<bool>,
    wake: watch::Sender<u64>,
    idle: watch::Sender<bool>,
    busy: AtomicUsize,
    serial: AtomicU64,
    claims: Mutex<HashMap<TaskId, ClaimTicket>>,
    shutdown: CancellationToken,
}

impl Default for UploadControl {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadControl {
    pub fn new() -> Self {
        Self {
            paused: watch::Sender::new(false),
            wake: watch::Sender::new(0),
            idle: watch::Sender::new(true),
            busy: AtomicUsize::new(0),
            serial: AtomicU64::new(0),
            claims: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.send_replace(paused);
    }

    /// Wake every waiting worker so it re-scans the queue.
    pub fn kick(&self) {
        self.wake.send_modify(|n| *n = n.wrapping_add(1));
    }

    pub fn subscribe_wake(&self) -> watch::Receiver<u64> {
        self.wake.subscribe()
    }

    pub fn set_idle(&self, idle: bool) {
        self.idle.send_if_modified(|cur| {
            let changed = *cur != idle;
            *cur = idle;
            changed
        });
    }

    pub fn subscribe_idle(&self) -> watch::Receiver<bool> {
        self.idle.subscribe()
    }

    /// Number of workers currently driving a task.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Record a claim; the ticket's token is checked between chunks.
    pub fn register(&self, id: &TaskId) -> ClaimTicket {
        let ticket = ClaimTicket {
            token: CancellationToken::new(),
            serial: self.serial.fetch_add(1, Ordering::Relaxed),
        };
        self.claims().insert(id.clone(), ticket.clone());
        self.busy.fetch_add(1, Ordering::SeqCst);
        ticket
    }

    /// The worker finished with `id` (any outcome). A newer claim on the same
    /// id, made after this one was aborted, stays registered.
    pub fn unregister(&self, id: &TaskId, ticket: &ClaimTicket) {
        let mut claims = self.claims();
        if claims.get(id).is_some_and(|t| t.serial == ticket.serial) {
            claims.remove(id);
        }
        self.busy.fetch_sub(1, Ordering::SeqCst);
    }

    /// Cancel the claim on `id`, if any. Returns true when a worker was driving it.
    pub fn abort(&self, id: &TaskId) -> bool {
        match self.claims().remove(id) {
            Some(ticket) => {
                ticket.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every current claim; returns the affected ids.
    pub fn abort_all(&self) -> Vec<TaskId> {
        self.claims()
            .drain()
            .map(|(id, ticket)| {
                ticket.token.cancel();
                id
            })
            .collect()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.kick();
    }

    fn claims(&self) -> MutexGuard<'_, HashMap<TaskId, ClaimTicket>> {
        self.claims.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_cancels_only_the_named_claim() {
        let control = UploadControl::new();
        let a = control.register(&TaskId::from("a"));
        let b = control.register(&TaskId::from("b"));
        assert_eq!(control.busy(), 2);

        assert!(control.abort(&TaskId::from("a")));
        assert!(a.token.is_cancelled());
        assert!(!b.token.is_cancelled());
        assert!(!control.abort(&TaskId::from("missing")));

        control.unregister(&TaskId::from("a"), &a);
        assert_eq!(control.busy(), 1);
    }

    #[test]
    fn stale_unregister_keeps_newer_claim() {
        let control = UploadControl::new();
        let id = TaskId::from("a");
        let old = control.register(&id);
        control.abort(&id);
        let new = control.register(&id);
        control.unregister(&id, &old);
        assert!(control.abort(&id));
        assert!(new.token.is_cancelled());
    }

    #[test]
    fn shutdown_wakes_without_aborting_claims() {
        let control = UploadControl::new();
        let mut wake = control.subscribe_wake();
        wake.borrow_and_update();
        let ticket = control.register(&TaskId::from("a"));
        control.shutdown();
        assert!(control.shutdown_token().is_cancelled());
        assert!(!ticket.token.is_cancelled());
        assert!(wake.has_changed().unwrap());
    }

    #[test]
    fn idle_only_notifies_on_change() {
        let control = UploadControl::new();
        let mut idle = control.subscribe_idle();
        idle.borrow_and_update();
        control.set_idle(true);
        assert!(!idle.has_changed().unwrap());
        control.set_idle(false);
        assert!(idle.has_changed().unwrap());
    }
}
