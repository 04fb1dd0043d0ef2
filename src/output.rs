use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::utils::{
    relative_ref, response_file_name, screenshot_file_name, REPORT_FILE, RESPONSE_DIR,
    RESULTS_FILE, SCREENSHOT_DIR,
};

/// Where everything for one run is written.
///
/// ```text
/// <root>/report.html
/// <root>/results.json
/// <root>/screenshots/screenshot-<serial>.png
/// <root>/responses/response-<serial>.txt
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputLayout { root: root.into() }
    }

    /// Creates the root and both store directories. Failing here aborts the run.
    pub async fn create(&self) -> anyhow::Result<()> {
        for dir in [self.screenshot_dir(), self.response_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .context(format!("could not create output directory {:?}", dir))?;
        }
        debug!("output directories ready under {:?}", self.root);
        Ok(())
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOT_DIR)
    }

    pub fn response_dir(&self) -> PathBuf {
        self.root.join(RESPONSE_DIR)
    }

    pub fn screenshot_path(&self, serial: usize) -> PathBuf {
        self.screenshot_dir().join(screenshot_file_name(serial))
    }

    pub fn response_path(&self, serial: usize) -> PathBuf {
        self.response_dir().join(response_file_name(serial))
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    pub fn screenshot_ref(&self, stored: &Path) -> String {
        relative_ref(SCREENSHOT_DIR, stored)
    }

    pub fn response_ref(&self, stored: &Path) -> String {
        relative_ref(RESPONSE_DIR, stored)
    }
}
