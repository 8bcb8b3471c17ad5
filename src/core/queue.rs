//! Per-connection transaction queue
//!
//! Only one transaction executes against a connection at a time. Others wait
//! here in submission order, so a `BEGIN ... COMMIT` bracket is never
//! interleaved with another transaction's statements.

use super::driver::Driver;
use super::transaction::{Execution, SqlTransaction, TransactionCallbacks, TransactionPhase};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

struct QueueState {
    waiting: VecDeque<SqlTransaction>,
    /// A transaction is running or a start is scheduled
    active: bool,
    /// `run_next` is on the stack and will pick up the next transaction
    draining: bool,
    /// The running transaction resolved while `draining` was set
    resolved: bool,
}

pub(crate) struct TransactionQueue {
    driver: Arc<dyn Driver>,
    next_id: AtomicU64,
    state: Mutex<QueueState>,
}

impl TransactionQueue {
    pub(crate) fn new(driver: Arc<dyn Driver>) -> Arc<Self> {
        Arc::new(Self {
            driver,
            next_id: AtomicU64::new(1),
            state: Mutex::new(QueueState {
                waiting: VecDeque::new(),
                active: false,
                draining: false,
                resolved: false,
            }),
        })
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Create a transaction in the `Open` phase
    pub(crate) fn create(&self, read_only: bool, callbacks: TransactionCallbacks) -> SqlTransaction {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        SqlTransaction::new(id, read_only, callbacks)
    }

    /// Close registration and queue the transaction for execution
    pub(crate) fn submit(self: &Arc<Self>, tx: SqlTransaction) {
        tx.set_phase(TransactionPhase::Scheduled);
        log::debug!(
            "transaction {} scheduled ({} statement(s), read_only={})",
            tx.id(),
            tx.pending_statements(),
            tx.is_read_only()
        );

        let start = {
            let mut state = self.state.lock();
            state.waiting.push_back(tx);
            !std::mem::replace(&mut state.active, true)
        };

        if start {
            self.schedule_next();
        }
    }

    /// Called by the running transaction once it has resolved
    ///
    /// When the transaction resolved inside `run_next` (synchronous drivers)
    /// the loop there starts the next one, so transactions chained from
    /// callbacks do not nest on the stack.
    pub(crate) fn finish(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.draining {
                state.resolved = true;
                return;
            }
        }
        self.schedule_next();
    }

    /// Transactions waiting for the connection
    pub(crate) fn pending(&self) -> usize {
        self.state.lock().waiting.len()
    }

    fn schedule_next(self: &Arc<Self>) {
        let queue = Arc::clone(self);
        self.driver.schedule(Box::new(move || queue.run_next()));
    }

    fn run_next(self: &Arc<Self>) {
        let _drain = Drain { queue: self };

        loop {
            let next = {
                let mut state = self.state.lock();
                match state.waiting.pop_front() {
                    Some(tx) => {
                        state.draining = true;
                        state.resolved = false;
                        tx
                    }
                    None => {
                        state.active = false;
                        return;
                    }
                }
            };

            let execution = Execution::new(next, Arc::clone(&self.driver), Arc::clone(self));
            Arc::new(execution).start();

            let mut state = self.state.lock();
            if !std::mem::take(&mut state.resolved) {
                // Still waiting on the driver; its completion calls `finish`
                state.draining = false;
                return;
            }
        }
    }
}

/// Clears the draining flag if `run_next` unwinds
struct Drain<'a> {
    queue: &'a TransactionQueue,
}

impl Drop for Drain<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        let mut state = self.queue.state.lock();
        state.draining = false;
        if std::mem::take(&mut state.resolved) {
            // Nobody is left to start the next transaction; the next
            // `submit` restarts the queue from the oldest waiting one
            state.active = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::driver::{Completion, DriverRequest, Job};
    use crate::core::execution_mode::ExecutionMode;
    use crate::core::result_set::RawResult;
    use std::sync::atomic::AtomicUsize;

    /// Holds completions and jobs until `step` is called, like a worker that
    /// has not been polled yet
    #[derive(Default)]
    struct ManualDriver {
        executed: Mutex<Vec<String>>,
        ready: Mutex<VecDeque<Job>>,
    }

    impl ManualDriver {
        fn step(&self) -> bool {
            let job = self.ready.lock().pop_front();
            match job {
                Some(job) => {
                    job();
                    true
                }
                None => false,
            }
        }

        fn run_all(&self) {
            while self.step() {}
        }
    }

    impl Driver for ManualDriver {
        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Queued
        }

        fn execute(&self, request: DriverRequest, done: Completion) {
            self.executed.lock().push(request.sql.clone());
            self.ready
                .lock()
                .push_back(Box::new(move || done(Ok(RawResult::empty()))));
        }

        fn schedule(&self, job: Job) {
            self.ready.lock().push_back(job);
        }
    }

    #[test]
    fn test_transactions_do_not_interleave() {
        let driver = Arc::new(ManualDriver::default());
        let queue = TransactionQueue::new(driver.clone());

        let first = queue.create(false, TransactionCallbacks::new());
        first.execute_sql("a1", vec![]).unwrap();
        first.execute_sql("a2", vec![]).unwrap();
        let second = queue.create(false, TransactionCallbacks::new());
        second.execute_sql("b1", vec![]).unwrap();

        queue.submit(first.clone());
        queue.submit(second.clone());
        assert_eq!(queue.pending(), 2);
        assert_eq!(first.phase(), TransactionPhase::Scheduled);

        driver.run_all();

        assert_eq!(
            *driver.executed.lock(),
            vec!["BEGIN", "a1", "a2", "COMMIT", "BEGIN", "b1", "COMMIT"]
        );
        assert_eq!(first.phase(), TransactionPhase::Committed);
        assert_eq!(second.phase(), TransactionPhase::Committed);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_next_statement_waits_for_completion() {
        let driver = Arc::new(ManualDriver::default());
        let queue = TransactionQueue::new(driver.clone());

        let tx = queue.create(true, TransactionCallbacks::new());
        tx.execute_sql("s1", vec![]).unwrap();
        tx.execute_sql("s2", vec![]).unwrap();
        queue.submit(tx.clone());

        // start job
        assert!(driver.step());
        assert_eq!(*driver.executed.lock(), vec!["s1"]);
        assert_eq!(tx.phase(), TransactionPhase::Executing);

        // s1 completes, s2 is dispatched
        assert!(driver.step());
        assert_eq!(*driver.executed.lock(), vec!["s1", "s2"]);

        driver.run_all();
        assert_eq!(tx.phase(), TransactionPhase::Committed);
    }

    /// Completes requests and runs jobs on the calling thread
    struct InlineDriver;

    impl Driver for InlineDriver {
        fn mode(&self) -> ExecutionMode {
            ExecutionMode::Immediate
        }

        fn execute(&self, _request: DriverRequest, done: Completion) {
            done(Ok(RawResult::empty()));
        }

        fn schedule(&self, job: Job) {
            job();
        }
    }

    fn chain(queue: Arc<TransactionQueue>, remaining: usize, count: Arc<AtomicUsize>) {
        let next = Arc::clone(&queue);
        let tx = queue.create(
            false,
            TransactionCallbacks::new().on_success(move || {
                count.fetch_add(1, Ordering::SeqCst);
                if remaining > 0 {
                    chain(next, remaining - 1, count);
                }
            }),
        );
        tx.execute_sql("step", vec![]).unwrap();
        queue.submit(tx);
    }

    #[test]
    fn test_chained_transactions_run_in_a_loop() {
        let queue = TransactionQueue::new(Arc::new(InlineDriver));
        let count = Arc::new(AtomicUsize::new(0));

        chain(Arc::clone(&queue), 10_000, Arc::clone(&count));

        assert_eq!(count.load(Ordering::SeqCst), 10_001);
        assert_eq!(queue.pending(), 0);
        assert!(!queue.state.lock().active);
    }

    #[test]
    fn test_ids_are_sequential() {
        let driver = Arc::new(ManualDriver::default());
        let queue = TransactionQueue::new(driver);
        let a = queue.create(false, TransactionCallbacks::new());
        let b = queue.create(true, TransactionCallbacks::new());
        assert_eq!(b.id(), a.id() + 1);
    }
}
