use std::{future::Future, path::Path, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    browser_controller::PageRenderer,
    fetcher::Fetcher,
    output::OutputLayout,
    types::{CaptureResult, SnapError},
};

/// Produces the [`CaptureResult`] of a single URL.
///
/// Every step (fetch, persist body, render, persist image) is attempted once
/// and its failure only blanks the fields that step would have filled in.
/// `capture` itself never fails.
pub struct CaptureWorker {
    fetcher: Arc<dyn Fetcher>,
    // None when screenshots are skipped for the run
    renderer: Option<Arc<dyn PageRenderer>>,
    layout: OutputLayout,
    // render deadline; an abandoned render still counts against the
    // renderer's own browser limit until Chrome exits
    timeout: Duration,
}

impl CaptureWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        renderer: Option<Arc<dyn PageRenderer>>,
        layout: OutputLayout,
        timeout: Duration,
    ) -> Self {
        CaptureWorker {
            fetcher,
            renderer,
            layout,
            timeout,
        }
    }

    pub async fn capture(
        &self,
        serial: usize,
        url: &str,
        cancel: &CancellationToken,
    ) -> CaptureResult {
        let page = match race(cancel, self.fetcher.fetch(url)).await {
            Ok(p) => p,
            Err(e) => {
                warn!("[{}] fetch of {} failed: {}", serial, url, e);
                return CaptureResult::empty(serial, url);
            }
        };

        let mut result = CaptureResult {
            serial,
            url: url.into(),
            status_code: page.status,
            content_type: page.content_type,
            ..Default::default()
        };

        if let Some(body) = page.body {
            result.content_length = body.len() as u64;
            let path = self.layout.response_path(serial);
            if persist(&path, &body).await {
                result.response_ref = self.layout.response_ref(&path);
            }
        }

        if let Some(renderer) = &self.renderer {
            result.screenshot_ref = self.screenshot(renderer.as_ref(), serial, url, cancel).await;
        }

        debug!(
            "[{}] {} -> {} ({} bytes)",
            serial, url, result.status_code, result.content_length
        );
        result
    }

    // Returns the screenshot ref, empty on any failure.
    async fn screenshot(
        &self,
        renderer: &dyn PageRenderer,
        serial: usize,
        url: &str,
        cancel: &CancellationToken,
    ) -> String {
        let render = async {
            match tokio::time::timeout(self.timeout, renderer.capture(url)).await {
                Ok(res) => res.map_err(|e| SnapError::Render(format!("{:#}", e))),
                Err(_) => Err(SnapError::Timeout(self.timeout.as_secs())),
            }
        };
        let png = match race(cancel, render).await {
            Ok(png) => png,
            Err(e) => {
                warn!("[{}] could not capture screenshot of {}: {}", serial, url, e);
                return String::new();
            }
        };

        let path = self.layout.screenshot_path(serial);
        if persist(&path, &png).await {
            self.layout.screenshot_ref(&path)
        } else {
            String::new()
        }
    }
}

async fn race<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T, SnapError>>,
) -> Result<T, SnapError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SnapError::Cancelled),
        res = step => res,
    }
}

async fn persist(path: &Path, bytes: &[u8]) -> bool {
    match tokio::fs::write(path, bytes).await {
        Ok(_) => true,
        Err(e) => {
            error!("could not save {:?}: {}", path, e);
            false
        }
    }
}
