use std::{sync::Arc, time::Duration};

use tokio::{sync::Semaphore, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{capture::CaptureWorker, results::ResultSet, types::CaptureResult};

/// Runs one capture per URL behind a counting gate of `concurrency` permits.
///
/// A worker holds its permit for its own capture *and* the pacing delay, so
/// the delay throttles how fast a freed slot can be reused. It is not a global
/// request rate: with `concurrency` idle permits the first `concurrency`
/// fetches start back to back.
pub struct Dispatcher {
    gate: Arc<Semaphore>,
    concurrency: usize,
    pacing: Duration,
    cancel: CancellationToken,
}

/// The spawned workers of one batch, in input order.
pub struct Batch {
    urls: Vec<String>,
    handles: Vec<JoinHandle<CaptureResult>>,
}

impl Dispatcher {
    pub fn new(concurrency: usize, pacing: Duration, cancel: CancellationToken) -> Self {
        let concurrency = concurrency.max(1);
        Dispatcher {
            gate: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            pacing,
            cancel,
        }
    }

    /// Spawns every worker immediately; the gate decides who gets to work.
    pub fn dispatch(&self, worker: Arc<CaptureWorker>, urls: &[String]) -> Batch {
        info!(
            "dispatching {} urls with {} workers and {}ms pacing",
            urls.len(),
            self.concurrency,
            self.pacing.as_millis()
        );
        let handles = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let serial = i + 1;
                let url = url.clone();
                let gate = self.gate.clone();
                let worker = worker.clone();
                let cancel = self.cancel.clone();
                let pacing = self.pacing;
                tokio::spawn(async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("[{}] cancelled before start", serial);
                            return CaptureResult::empty(serial, &url);
                        }
                        permit = gate.acquire_owned() => match permit {
                            Ok(p) => p,
                            Err(_) => return CaptureResult::empty(serial, &url),
                        },
                    };

                    let result = worker.capture(serial, &url, &cancel).await;

                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sleep(pacing) => {}
                    }
                    result
                })
            })
            .collect();

        Batch {
            urls: urls.to_vec(),
            handles,
        }
    }
}

impl Batch {
    /// Waits for every worker, then hands back the filled result set.
    pub async fn join(self) -> ResultSet {
        let mut set = ResultSet::new(&self.urls);
        let outcomes = futures::future::join_all(self.handles).await;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let result = match outcome {
                Ok(r) => r,
                Err(e) => {
                    error!("[{}] worker for {} died: {}", i + 1, self.urls[i], e);
                    continue;
                }
            };
            if let Err(e) = set.fill(result) {
                error!("dropping result: {}", e);
            }
        }
        debug!("batch of {} joined", set.len());
        set
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        browser_controller::PageRenderer,
        fetcher::Fetcher,
        output::OutputLayout,
        types::{FetchedPage, SnapError},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Records how many fetches overlap.
    #[derive(Default)]
    struct GaugeFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for GaugeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, SnapError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(FetchedPage {
                status: 200,
                content_type: "text/plain".into(),
                body: Some(url.as_bytes().to_vec()),
            })
        }
    }

    async fn worker(fetcher: Arc<dyn Fetcher>, dir: &std::path::Path) -> Arc<CaptureWorker> {
        let layout = OutputLayout::new(dir);
        layout.create().await.unwrap();
        let renderer: Option<Arc<dyn PageRenderer>> = None;
        Arc::new(CaptureWorker::new(
            fetcher,
            renderer,
            layout,
            Duration::from_secs(1),
        ))
    }

    fn urls(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("http://host{}.example/", i)).collect()
    }

    #[tokio::test]
    async fn never_exceeds_the_gate() {
        let tmp = tempfile::tempdir().unwrap();
        let gauge = Arc::new(GaugeFetcher::default());
        let w = worker(gauge.clone(), tmp.path()).await;

        let dispatcher = Dispatcher::new(3, Duration::ZERO, CancellationToken::new());
        let results = dispatcher.dispatch(w, &urls(12)).join().await.finish();

        assert_eq!(results.len(), 12);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn free_slots_start_back_to_back() {
        let tmp = tempfile::tempdir().unwrap();
        let gauge = Arc::new(GaugeFetcher::default());
        let w = worker(gauge.clone(), tmp.path()).await;

        // three slots, six urls, 20ms fetch + 300ms pacing per worker:
        // two waves of three, not six paced fetches in a row
        let dispatcher = Dispatcher::new(3, Duration::from_millis(300), CancellationToken::new());
        let started = Instant::now();
        let results = dispatcher.dispatch(w, &urls(6)).join().await.finish();
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 6);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
        assert!(elapsed >= Duration::from_millis(640), "took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1200), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn pacing_holds_the_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let w = worker(Arc::new(GaugeFetcher::default()), tmp.path()).await;

        // one slot, three urls: each release waits out the delay first
        let dispatcher = Dispatcher::new(1, Duration::from_millis(50), CancellationToken::new());
        let started = Instant::now();
        dispatcher.dispatch(w, &urls(3)).join().await;
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn zero_concurrency_still_makes_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let gauge = Arc::new(GaugeFetcher::default());
        let w = worker(gauge.clone(), tmp.path()).await;

        let dispatcher = Dispatcher::new(0, Duration::ZERO, CancellationToken::new());
        let results = dispatcher.dispatch(w, &urls(2)).join().await.finish();
        assert!(results.iter().all(|r| r.status_code == 200));
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_batch_still_returns_every_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let w = worker(Arc::new(GaugeFetcher::default()), tmp.path()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let dispatcher = Dispatcher::new(2, Duration::from_secs(60), cancel);
        let results = dispatcher.dispatch(w, &urls(4)).join().await.finish();

        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.serial, i + 1);
            assert_eq!(r.status_code, 0);
        }
    }
}
