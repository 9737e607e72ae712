use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use tracing::{error, info, warn};

use crate::TransferError;

/// Cool-down inserted between strategies (never after the last).
const STRATEGY_COOLDOWN: Duration = Duration::from_secs(10);

/// One named end-to-end upload approach.
///
/// The thunk performs a full attempt cycle and may retry internally;
/// the ladder only sees its final outcome.
pub struct Strategy<'a> {
    name: &'static str,
    run: Box<dyn FnMut() -> BoxFuture<'a, Result<(), TransferError>> + Send + 'a>,
}

impl<'a> Strategy<'a> {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: FnMut() -> BoxFuture<'a, Result<(), TransferError>> + Send + 'a,
    {
        Self {
            name,
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered ladder of upload strategies, least to most defensive.
///
/// Strategies run strictly in order and the ladder halts at the first
/// success. On total exhaustion the last underlying error is preserved.
pub struct StrategyLadder<'a> {
    strategies: Vec<Strategy<'a>>,
    cooldown: Duration,
}

impl<'a> StrategyLadder<'a> {
    pub fn new(strategies: Vec<Strategy<'a>>) -> Self {
        Self {
            strategies,
            cooldown: STRATEGY_COOLDOWN,
        }
    }

    /// Overrides the inter-strategy cool-down.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Tries each strategy in turn until one succeeds.
    pub async fn run(mut self) -> Result<(), TransferError> {
        let count = self.strategies.len();
        let mut last: Option<TransferError> = None;

        for (index, strategy) in self.strategies.iter_mut().enumerate() {
            info!(
                strategy = strategy.name,
                index = index + 1,
                count,
                "trying upload strategy"
            );

            let start = Instant::now();
            match (strategy.run)().await {
                Ok(()) => {
                    info!(
                        strategy = strategy.name,
                        elapsed_secs = format_args!("{:.1}", start.elapsed().as_secs_f64()),
                        "upload strategy succeeded"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        strategy = strategy.name,
                        elapsed_secs = format_args!("{:.1}", start.elapsed().as_secs_f64()),
                        error = %e,
                        "upload strategy failed"
                    );
                    last = Some(e);

                    if index + 1 < count {
                        info!(
                            cooldown_secs = self.cooldown.as_secs(),
                            "waiting before next strategy"
                        );
                        tokio::time::sleep(self.cooldown).await;
                    }
                }
            }
        }

        error!(count, "all upload strategies failed");
        Err(match last {
            Some(e) => TransferError::AllStrategiesFailed {
                count,
                last: Box::new(e),
            },
            None => TransferError::Transport("strategy ladder is empty".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant as TokioInstant;

    fn counting_strategy(
        name: &'static str,
        calls: Arc<AtomicU32>,
        result: fn() -> Result<(), TransferError>,
    ) -> Strategy<'static> {
        Strategy::new(name, move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(std::future::ready(result()))
        })
    }

    fn fail() -> Result<(), TransferError> {
        Err(TransferError::Transport("connection reset".into()))
    }

    fn succeed() -> Result<(), TransferError> {
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn halts_at_first_success() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let ladder = StrategyLadder::new(vec![
            counting_strategy("first", Arc::clone(&a), succeed),
            counting_strategy("second", Arc::clone(&b), succeed),
        ]);

        ladder.run().await.unwrap();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 0, "later strategies must not run");
    }

    #[tokio::test(start_paused = true)]
    async fn falls_through_with_single_cooldown() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let ladder = StrategyLadder::new(vec![
            counting_strategy("failing", Arc::clone(&a), fail),
            counting_strategy("fallback", Arc::clone(&b), succeed),
        ]);

        let start = TokioInstant::now();
        ladder.run().await.unwrap();

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn strategies_run_strictly_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut strategies = Vec::new();
        for name in ["one", "two", "three"] {
            let order = Arc::clone(&order);
            strategies.push(Strategy::new(name, move || {
                order.lock().unwrap().push(name);
                Box::pin(std::future::ready(fail()))
            }));
        }

        let err = StrategyLadder::new(strategies).run().await.unwrap_err();

        assert_eq!(*order.lock().unwrap(), vec!["one", "two", "three"]);
        assert!(matches!(
            err,
            TransferError::AllStrategiesFailed { count: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn no_cooldown_after_last_strategy() {
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));
        let ladder = StrategyLadder::new(vec![
            counting_strategy("first", Arc::clone(&a), fail),
            counting_strategy("second", Arc::clone(&b), fail),
        ]);

        let start = TokioInstant::now();
        let _ = ladder.run().await;

        // One cool-down between the two strategies, none trailing.
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_preserves_last_error() {
        let ladder = StrategyLadder::new(vec![
            Strategy::new("a", || {
                Box::pin(std::future::ready(Err(TransferError::Transport(
                    "first error".into(),
                ))))
            }),
            Strategy::new("b", || {
                Box::pin(std::future::ready(Err(TransferError::Rejected {
                    status: 507,
                    body: "insufficient storage".into(),
                })))
            }),
        ]);

        match ladder.run().await.unwrap_err() {
            TransferError::AllStrategiesFailed { count, last } => {
                assert_eq!(count, 2);
                assert!(last.to_string().contains("507"));
            }
            other => panic!("expected AllStrategiesFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn empty_ladder_is_an_error() {
        let err = StrategyLadder::new(Vec::new()).run().await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn strategy_exposes_name() {
        let s = Strategy::new("standard", || Box::pin(std::future::ready(Ok(()))));
        assert_eq!(s.name(), "standard");
    }
}
