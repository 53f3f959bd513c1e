use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RaceConfig;
use crate::error::{BoxError, RaceError, Result};
use crate::observer::{RaceObserver, TracingObserver};

/// A boxed candidate, for lists mixing differently-typed operations.
pub type Candidate<T, E> = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send>>
        + Send,
>;

/// Box a candidate closure so one list can mix different operations.
pub fn boxed<T, E, F, Fut>(operation: F) -> Candidate<T, E>
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: 'static,
    E: 'static,
{
    Box::new(
        move |token| -> Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send>> {
            Box::pin(operation(token))
        },
    )
}

/// Single-slot handoff: the first success takes the sender, everyone after
/// finds it empty.
type WinnerSlot<T> = Arc<Mutex<Option<oneshot::Sender<T>>>>;

/// First failure wins, later ones are dropped.
#[derive(Default)]
struct FirstError(Mutex<Option<BoxError>>);

impl FirstError {
    fn record(&self, error: BoxError) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<BoxError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

enum Outcome<T> {
    Won(T),
    DeadlineElapsed,
    Exhausted,
}

/// Staggered race scheduler.
pub struct Race {
    config: RaceConfig,
    observer: Arc<dyn RaceObserver>,
}

impl Race {
    /// Create a race that reports progress through [`TracingObserver`].
    pub fn new(config: RaceConfig) -> Self {
        Self {
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RaceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> RaceConfig {
        self.config
    }

    /// Race `candidates` in order and return the first success.
    ///
    /// Each candidate is called with a token that fires once the race is
    /// decided or the deadline passes; its future is also dropped at the next
    /// suspension point after that, so anything it owns (an open socket, say)
    /// is released. This call returns only after every launched candidate
    /// has finished.
    pub async fn run<T, E, F, Fut>(&self, candidates: Vec<F>) -> Result<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        if candidates.is_empty() {
            return Err(RaceError::NoCandidates);
        }

        let token = CancellationToken::new();
        let (winner_tx, mut winner_rx) = oneshot::channel();
        let slot: WinnerSlot<T> = Arc::new(Mutex::new(Some(winner_tx)));
        let first_error = Arc::new(FirstError::default());
        let mut tasks = JoinSet::new();
        let mut launched = 0usize;

        let deadline = tokio::time::sleep(self.config.deadline);
        tokio::pin!(deadline);

        let outcome = {
            let launcher = self.launch(
                candidates,
                &token,
                &slot,
                &first_error,
                &mut tasks,
                &mut launched,
            );
            tokio::pin!(launcher);

            tokio::select! {
                biased;
                won = &mut winner_rx => match won {
                    Ok(value) => Outcome::Won(value),
                    Err(_) => Outcome::Exhausted,
                },
                () = &mut deadline => Outcome::DeadlineElapsed,
                () = &mut launcher => match winner_rx.try_recv() {
                    // The last task can win between the two polls above.
                    Ok(value) => Outcome::Won(value),
                    Err(_) => Outcome::Exhausted,
                },
            }
        };

        token.cancel();
        while let Some(joined) = tasks.join_next().await {
            record_join_error(joined, &first_error);
        }

        match outcome {
            Outcome::Won(value) => Ok(value),
            Outcome::DeadlineElapsed => {
                self.observer.deadline_elapsed(launched);
                Err(RaceError::DeadlineElapsed {
                    deadline: self.config.deadline,
                    cause: first_error.take(),
                })
            }
            Outcome::Exhausted => Err(RaceError::Exhausted {
                attempted: launched,
                cause: first_error
                    .take()
                    .unwrap_or_else(|| "every candidate finished without a result".into()),
            }),
        }
    }

    /// Launch candidates one by one, then wait for all of them to finish.
    ///
    /// Stops launching as soon as the race is cancelled.
    async fn launch<T, E, F, Fut>(
        &self,
        candidates: Vec<F>,
        token: &CancellationToken,
        slot: &WinnerSlot<T>,
        first_error: &Arc<FirstError>,
        tasks: &mut JoinSet<()>,
        launched: &mut usize,
    ) where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        for (index, candidate) in candidates.into_iter().enumerate() {
            if token.is_cancelled() {
                break;
            }

            let (done_tx, done_rx) = oneshot::channel::<()>();
            let operation = candidate(token.child_token());
            self.observer.launched(index);
            tasks.spawn(attempt(
                index,
                operation,
                token.clone(),
                Arc::clone(slot),
                Arc::clone(first_error),
                Arc::clone(&self.observer),
                done_tx,
            ));
            *launched += 1;

            tokio::select! {
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.config.stagger) => {
                    self.observer.stagger_elapsed(index);
                }
                _ = done_rx => self.observer.finished_early(index),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            record_join_error(joined, first_error);
        }
    }
}

/// Run one candidate to completion or cancellation.
///
/// `_done` is dropped on return, which is what the launcher waits on.
async fn attempt<T, E, Fut>(
    index: usize,
    operation: Fut,
    token: CancellationToken,
    slot: WinnerSlot<T>,
    first_error: Arc<FirstError>,
    observer: Arc<dyn RaceObserver>,
    _done: oneshot::Sender<()>,
) where
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    let result = tokio::select! {
        biased;
        () = token.cancelled() => {
            observer.abandoned(index);
            return;
        }
        result = operation => result,
    };

    match result {
        Ok(value) => {
            let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            match sender {
                Some(sender) => {
                    if sender.send(value).is_ok() {
                        observer.won(index);
                    } else {
                        observer.discarded(index);
                    }
                    token.cancel();
                }
                None => observer.discarded(index),
            }
        }
        Err(error) => {
            let error = error.into();
            observer.failed(index, error.as_ref());
            first_error.record(error);
        }
    }
}

fn record_join_error(joined: std::result::Result<(), JoinError>, first_error: &FirstError) {
    if let Err(err) = joined {
        if err.is_panic() {
            warn!(%err, "candidate task panicked");
            first_error.record(format!("candidate task panicked: {err}").into());
        }
    }
}
