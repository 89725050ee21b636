use futures::future::join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::NodeConfig;
use crate::error::CollectError;

/// Which per-node phase a worker belongs to. Decides how a crashed worker is
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Status,
    SequenceNumber,
    Disk,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Status => "status",
            Phase::SequenceNumber => "sequence number",
            Phase::Disk => "disk",
        }
    }

    fn worker_failed(self, reason: String) -> CollectError {
        match self {
            Phase::Status => CollectError::QueryFailed(reason),
            Phase::SequenceNumber => CollectError::AgentUnavailable(reason),
            Phase::Disk => CollectError::DiskLookupFailed(reason),
        }
    }
}

/// Run `work` once per node concurrently and wait for all of them.
///
/// The result has one slot per input node, in input order. Each worker owns
/// its slot. A worker that exceeds `timeout`, or is still running when
/// `cancel` fires, yields `CollectError::Timeout`.
pub async fn fan_out<T, F, Fut>(
    nodes: &[NodeConfig],
    timeout: Duration,
    cancel: &CancellationToken,
    phase: Phase,
    work: F,
) -> Vec<Result<T, CollectError>>
where
    F: Fn(NodeConfig) -> Fut,
    Fut: Future<Output = Result<T, CollectError>> + Send + 'static,
    T: Send + 'static,
{
    let handles: Vec<_> = nodes
        .iter()
        .map(|node| {
            let fut = work(node.clone());
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CollectError::Timeout(format!(
                        "{} check cancelled before completion",
                        phase.name()
                    ))),
                    res = tokio::time::timeout(timeout, fut) => match res {
                        Ok(r) => r,
                        Err(_) => Err(CollectError::Timeout(format!(
                            "{} check did not complete within {:?}",
                            phase.name(),
                            timeout
                        ))),
                    },
                }
            })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .zip(nodes)
        .map(|(joined, node)| match joined {
            Ok(result) => result,
            Err(e) => {
                error!("{} worker for {} failed: {}", phase.name(), node.identity(), e);
                Err(phase.worker_failed(format!("worker failed: {}", e)))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<NodeConfig> {
        (0..n)
            .map(|i| NodeConfig::new("mysql", &i.to_string(), &format!("10.0.0.{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let nodes = nodes(5);
        let cancel = CancellationToken::new();

        // Later nodes finish first.
        let results = fan_out(&nodes, Duration::from_secs(5), &cancel, Phase::Status, |node| async move {
            let i: u64 = node.uuid.parse().unwrap();
            tokio::time::sleep(Duration::from_millis(50 * (5 - i))).await;
            Ok(node.uuid)
        })
        .await;

        let got: Vec<String> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(got, vec!["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_slow_worker_times_out() {
        let nodes = nodes(2);
        let cancel = CancellationToken::new();

        let results = fan_out(&nodes, Duration::from_millis(50), &cancel, Phase::Disk, |node| async move {
            if node.uuid == "1" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(())
        })
        .await;

        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(CollectError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancel_reports_timeout_for_every_pending_worker() {
        let nodes = nodes(3);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let results: Vec<Result<(), CollectError>> =
            fan_out(&nodes, Duration::from_secs(30), &cancel, Phase::SequenceNumber, |_| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert_eq!(results.len(), 3);
        for r in results {
            assert!(matches!(r, Err(CollectError::Timeout(ref m)) if m.contains("cancelled")));
        }
    }

    #[tokio::test]
    async fn test_panicking_worker_keeps_its_slot() {
        let nodes = nodes(2);
        let cancel = CancellationToken::new();

        let results = fan_out(&nodes, Duration::from_secs(5), &cancel, Phase::Status, |node| async move {
            if node.uuid == "0" {
                panic!("boom");
            }
            Ok(1)
        })
        .await;

        assert!(matches!(results[0], Err(CollectError::QueryFailed(_))));
        assert_eq!(results[1].as_ref().unwrap(), &1);
    }
}
