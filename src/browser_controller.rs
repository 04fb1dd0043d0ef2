use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use headless_chrome::protocol::cdp::Page::{self, CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{browser::default_executable, Browser, LaunchOptions, Tab};
use tokio::{sync::Semaphore, task};

const PAGE_SIZE_SCRIPT: &str = r#"JSON.stringify([
    Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0),
    Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)
])"#;

// Chrome refuses captures much taller than this
pub const MAX_CAPTURE_HEIGHT: f64 = 16384.0;

/// Renders a page and hands back a full-page PNG.
///
/// Slow and fallible; callers attach no retry contract to it.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn capture(&self, url: &str) -> Result<Vec<u8>>;
}

/// Launches one Chrome per capture on a blocking thread.
///
/// A caller may stop waiting on `capture` (deadline, cancellation) while the
/// blocking thread keeps driving Chrome until its own tab timeout fires. The
/// `live` gate is held by that thread, not by the caller, so at most
/// `max_browsers` Chrome processes exist at once even when captures are
/// abandoned.
#[derive(Debug, Clone)]
pub struct BrowserController {
    timeout: Duration,
    window_size: (u32, u32),
    live: Arc<Semaphore>,
}

impl BrowserController {
    pub fn new(timeout: Duration, max_browsers: usize) -> Self {
        BrowserController {
            timeout,
            window_size: (1920, 1080),
            live: Arc::new(Semaphore::new(max_browsers.max(1))),
        }
    }

    fn launch(&self) -> Result<Browser> {
        let is_docker = std::env::var("IN_DOCKER").is_ok();
        let path = default_executable().map_err(|e| anyhow!(e))?;
        let options = LaunchOptions::default_builder()
            .path(Some(path))
            .window_size(Some(self.window_size))
            .idle_browser_timeout(self.timeout)
            // warning only do this if in docker env
            .sandbox(!is_docker)
            .build()
            .map_err(|e| anyhow!("invalid chrome launch options: {}", e))?;
        Browser::new(options).context("browser launching error")
    }

    /// Navigates a fresh incognito tab and screenshots the whole document.
    fn screenshot(&self, url: &str) -> Result<Vec<u8>> {
        let browser = self.launch()?;
        let ctx = browser
            .new_context()
            .context("could not create incognito context")?;
        let tab = ctx.new_tab().context("could not create new tab")?;
        tab.set_default_timeout(self.timeout);

        tab.navigate_to(url)
            .context(format!("could not navigate to {}", url))?
            .wait_until_navigated()
            .context(format!("navigation to {} never settled", url))?;
        tab.wait_for_element("body")
            .context(format!("{} has no body", url))?;

        let clip = measure_page(&tab).and_then(|(w, h)| full_page_clip(w, h));
        debug!("taking screenshot of {} with clip {:?}", url, clip);

        // Tab::capture_screenshot never sets captureBeyondViewport, so
        // everything below the window would come back blank
        let shot = tab
            .call_method(Page::CaptureScreenshot {
                format: Some(CaptureScreenshotFormatOption::Png),
                quality: None,
                clip,
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: None,
            })
            .context(format!("screenshot for {} could not be captured", url))?;
        STANDARD
            .decode(shot.data)
            .context(format!("screenshot for {} is not valid base64", url))
    }

    /// Runs `job` on a blocking thread once a live-browser slot is free.
    ///
    /// The slot travels with the thread and is released only when `job`
    /// returns, whether or not anyone is still awaiting the result.
    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let slot = self
            .live
            .clone()
            .acquire_owned()
            .await
            .context("browser gate closed")?;
        task::spawn_blocking(move || {
            let res = job();
            drop(slot);
            res
        })
        .await
        .context("problem spawning a blocking thread")?
    }
}

fn measure_page(tab: &Tab) -> Option<(f64, f64)> {
    let size = match tab.evaluate(PAGE_SIZE_SCRIPT, false) {
        Ok(obj) => obj.value,
        Err(e) => {
            warn!("could not measure page {}: {}", tab.get_url(), e);
            return None;
        }
    };
    size.as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| serde_json::from_str::<(f64, f64)>(s).ok())
}

/// Clip covering the whole document, capped at [`MAX_CAPTURE_HEIGHT`].
///
/// `None` (plain viewport) when the size is unknown or degenerate.
pub fn full_page_clip(width: f64, height: f64) -> Option<Viewport> {
    if !(width > 0.0 && height > 0.0) {
        return None;
    }
    Some(Viewport {
        x: 0.0,
        y: 0.0,
        width,
        height: height.min(MAX_CAPTURE_HEIGHT),
        scale: 1.0,
    })
}

#[async_trait]
impl PageRenderer for BrowserController {
    async fn capture(&self, url: &str) -> Result<Vec<u8>> {
        let controller = self.clone();
        let u = url.to_string();
        // headless_chrome is blocking, keep it off the runtime threads
        self.run_blocking(move || controller.screenshot(&u)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    #[test]
    fn clip_covers_the_document() {
        let clip = full_page_clip(1280.0, 5000.0).unwrap();
        assert_eq!((clip.x, clip.y), (0.0, 0.0));
        assert_eq!((clip.width, clip.height), (1280.0, 5000.0));
        assert_eq!(clip.scale, 1.0);
    }

    #[test]
    fn clip_height_is_capped() {
        let clip = full_page_clip(1920.0, 250_000.0).unwrap();
        assert_eq!(clip.height, MAX_CAPTURE_HEIGHT);
    }

    #[test]
    fn unknown_size_falls_back_to_viewport() {
        assert!(full_page_clip(0.0, 900.0).is_none());
        assert!(full_page_clip(1920.0, -1.0).is_none());
        assert!(full_page_clip(f64::NAN, 900.0).is_none());
    }

    #[tokio::test]
    async fn abandoned_capture_keeps_its_browser_slot() {
        let controller = BrowserController::new(Duration::from_secs(1), 2);
        let slow = controller.run_blocking(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        // the caller gives up long before the blocking job is done
        assert!(tokio::time::timeout(Duration::from_millis(20), slow)
            .await
            .is_err());
        assert_eq!(controller.live.available_permits(), 1);

        let started = Instant::now();
        while controller.live.available_permits() < 2 {
            assert!(started.elapsed() < Duration::from_secs(5));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn gate_limits_live_browsers() {
        let controller = BrowserController::new(Duration::from_secs(1), 1);
        let first = controller.run_blocking(|| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(1)
        });
        let _ = tokio::time::timeout(Duration::from_millis(20), first).await;

        // the abandoned job still owns the only slot
        let started = Instant::now();
        let second = controller.run_blocking(|| Ok(2)).await.unwrap();
        assert_eq!(second, 2);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    /*
    RUST_LOG=debug cargo test --lib browser_controller -- --ignored
     */
    #[test]
    #[ignore = "needs chrome"]
    fn captures_a_png() {
        let controller = BrowserController::new(Duration::from_secs(45), 1);
        let png = tokio_test::block_on(controller.capture("https://example.com/")).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    #[ignore = "needs chrome"]
    fn bad_target_is_an_error() {
        let controller = BrowserController::new(Duration::from_secs(10), 1);
        assert!(tokio_test::block_on(controller.capture("http://127.0.0.1:9/")).is_err());
    }
}
