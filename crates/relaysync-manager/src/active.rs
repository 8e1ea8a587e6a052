//! Active object: a named worker thread draining a bounded queue into a
//! state/event handler.
//!
//! The handler sees `Entry` once when the worker starts, `Message` for each
//! posted value, `Timed` whenever the queue stays empty for one tick period
//! (if configured) and `Exit` when the object is shut down. Returning
//! [`StateResult::Transition`] dispatches `Exit` to the old state and
//! `Entry` to the new one.

use std::fmt::Debug;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::{debug, error, info, trace};

use crate::error::{ManagerError, QueueFullError};

/// Event delivered to a state handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent<M> {
    /// The state was entered.
    Entry,
    /// A queued message.
    Message(M),
    /// The queue stayed empty for one tick period.
    Timed,
    /// The state is being left.
    Exit,
}

/// What the handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateResult<S> {
    /// Event consumed.
    Handled,
    /// Event not relevant in this state.
    Ignored,
    /// Move to another state.
    Transition(S),
}

/// State machine run by an [`ActiveObject`].
pub trait EventHandler<M>: Send + 'static {
    /// State identifier.
    type State: Copy + Eq + Debug + Send + 'static;

    /// State entered when the worker starts.
    fn initial_state(&self) -> Self::State;

    /// Handle one event in `state`.
    fn handle(&mut self, state: Self::State, event: StateEvent<M>) -> StateResult<Self::State>;
}

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Thread name.
    pub name: String,
    /// Queue depth.
    pub capacity: usize,
    /// How long `post` may block on a full queue.
    pub put_timeout: Duration,
    /// Idle tick period.
    pub tick: Option<Duration>,
}

/// Handle to a running worker.
pub struct ActiveObject<M> {
    name: String,
    tx: Option<Sender<M>>,
    thread: Option<JoinHandle<()>>,
    put_timeout: Duration,
}

impl<M> Debug for ActiveObject<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveObject")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("put_timeout", &self.put_timeout)
            .finish()
    }
}

impl<M: Send + 'static> ActiveObject<M> {
    /// Spawn the worker thread and dispatch `Entry` to the initial state.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::Spawn`] if the thread cannot be created.
    pub fn spawn<H>(config: WorkerConfig, handler: H) -> Result<Self, ManagerError>
    where
        H: EventHandler<M>,
    {
        let (tx, rx) = channel::bounded(config.capacity);
        let tick = config.tick;
        let thread = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || run(handler, rx, tick))
            .map_err(ManagerError::Spawn)?;

        info!(name = %config.name, capacity = config.capacity, "Active object started");
        Ok(Self {
            name: config.name,
            tx: Some(tx),
            thread: Some(thread),
            put_timeout: config.put_timeout,
        })
    }

    /// Queue `message`, blocking up to the put timeout if the queue is full.
    ///
    /// # Errors
    ///
    /// Hands `message` back inside [`QueueFullError`] if the queue stayed
    /// full or the worker has stopped.
    pub fn post(&self, message: M) -> Result<(), QueueFullError<M>> {
        let Some(tx) = &self.tx else {
            return Err(QueueFullError::stopped(message));
        };
        match tx.send_timeout(message, self.put_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(m)) => {
                debug!(name = %self.name, "Queue full, message rejected");
                Err(QueueFullError::timed_out(m, self.put_timeout))
            }
            Err(SendTimeoutError::Disconnected(m)) => Err(QueueFullError::stopped(m)),
        }
    }

    /// Messages waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }
}

impl<M> ActiveObject<M> {
    /// `true` until [`shutdown`](Self::shutdown).
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop accepting messages, let the worker drain its queue, dispatch
    /// `Exit` and join the thread.
    pub fn shutdown(&mut self) {
        self.tx = None;
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(()) => info!(name = %self.name, "Active object stopped"),
                Err(_) => error!(name = %self.name, "Active object thread panicked"),
            }
        }
    }
}

impl<M> Drop for ActiveObject<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<M, H: EventHandler<M>>(mut handler: H, rx: Receiver<M>, tick: Option<Duration>) {
    let mut state = handler.initial_state();
    state = dispatch(&mut handler, state, StateEvent::Entry);

    loop {
        let event = match tick {
            Some(period) => match rx.recv_timeout(period) {
                Ok(message) => StateEvent::Message(message),
                Err(RecvTimeoutError::Timeout) => StateEvent::Timed,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(message) => StateEvent::Message(message),
                Err(_) => break,
            },
        };
        state = dispatch(&mut handler, state, event);
    }

    // The exit result is irrelevant; the worker is going away.
    if let StateResult::Transition(next) = handler.handle(state, StateEvent::Exit) {
        debug!(?next, "Transition requested during shutdown ignored");
    }
}

fn dispatch<M, H: EventHandler<M>>(
    handler: &mut H,
    state: H::State,
    event: StateEvent<M>,
) -> H::State {
    match handler.handle(state, event) {
        StateResult::Handled => state,
        StateResult::Ignored => {
            trace!(?state, "Event ignored");
            state
        }
        StateResult::Transition(next) => {
            debug!(from = ?state, to = ?next, "State transition");
            // Exit/entry results cannot chain further transitions.
            let _exit = handler.handle(state, StateEvent::Exit);
            let _entry = handler.handle(next, StateEvent::Entry);
            next
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::Sender as EventTx;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        First,
        Second,
    }

    struct Recorder {
        events: EventTx<(Phase, String)>,
    }

    impl EventHandler<u32> for Recorder {
        type State = Phase;

        fn initial_state(&self) -> Phase {
            Phase::First
        }

        fn handle(&mut self, state: Phase, event: StateEvent<u32>) -> StateResult<Phase> {
            let label = match &event {
                StateEvent::Entry => "entry".to_string(),
                StateEvent::Exit => "exit".to_string(),
                StateEvent::Timed => "timed".to_string(),
                StateEvent::Message(m) => format!("msg{m}"),
            };
            if self.events.send((state, label)).is_err() {
                return StateResult::Ignored;
            }
            match (state, event) {
                (Phase::First, StateEvent::Message(99)) => StateResult::Transition(Phase::Second),
                _ => StateResult::Handled,
            }
        }
    }

    fn config(capacity: usize) -> WorkerConfig {
        WorkerConfig {
            name: "ao-test".to_string(),
            capacity,
            put_timeout: Duration::from_millis(20),
            tick: None,
        }
    }

    #[test]
    fn test_lifecycle_order() -> Result<(), Box<dyn std::error::Error>> {
        let (tx, rx) = channel::unbounded();
        let mut ao = ActiveObject::spawn(config(4), Recorder { events: tx })?;
        ao.post(1).map_err(|e| e.to_string())?;
        ao.post(99).map_err(|e| e.to_string())?;
        ao.post(2).map_err(|e| e.to_string())?;
        ao.shutdown();

        let seen: Vec<(Phase, String)> = rx.try_iter().collect();
        let expected = vec![
            (Phase::First, "entry".to_string()),
            (Phase::First, "msg1".to_string()),
            (Phase::First, "msg99".to_string()),
            (Phase::First, "exit".to_string()),
            (Phase::Second, "entry".to_string()),
            (Phase::Second, "msg2".to_string()),
            (Phase::Second, "exit".to_string()),
        ];
        assert_eq!(seen, expected);
        Ok(())
    }

    #[test]
    fn test_post_after_shutdown_returns_message() -> Result<(), Box<dyn std::error::Error>> {
        let (tx, _rx) = channel::unbounded();
        let mut ao = ActiveObject::spawn(config(1), Recorder { events: tx })?;
        ao.shutdown();
        match ao.post(5) {
            Err(e) => {
                assert!(e.is_stopped());
                assert_eq!(e.into_message(), 5);
            }
            Ok(()) => return Err("post after shutdown accepted".into()),
        }
        Ok(())
    }

    #[test]
    fn test_timed_events_when_idle() -> Result<(), Box<dyn std::error::Error>> {
        let (tx, rx) = channel::unbounded();
        let mut cfg = config(1);
        cfg.tick = Some(Duration::from_millis(2));
        let mut ao = ActiveObject::spawn(cfg, Recorder { events: tx })?;

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let mut timed = 0;
        while timed < 2 && std::time::Instant::now() < deadline {
            if let Ok((_, label)) = rx.recv_timeout(Duration::from_millis(50))
                && label == "timed"
            {
                timed += 1;
            }
        }
        ao.shutdown();
        assert_eq!(timed, 2);
        Ok(())
    }
}
