use std::path::{Path, PathBuf};

use anyhow::Context;
use minijinja::{context, Environment};

use crate::{types::CaptureResult, utils::timestamp};

const REPORT_TEMPLATE: &str = include_str!("../templates/report.html");

/// Turns the finished, ordered result set into an artifact on disk.
///
/// Implementations only read the results. Failing to write is fatal for the run.
pub trait Report {
    fn render(&self, results: &[CaptureResult], out: &Path) -> anyhow::Result<PathBuf>;
}

/// Sortable HTML table linking to the stored screenshots and responses.
pub struct HtmlReport {
    env: Environment<'static>,
}

impl HtmlReport {
    pub fn new() -> anyhow::Result<Self> {
        let mut env = Environment::new();
        // the .html name turns on auto-escaping
        env.add_template("report.html", REPORT_TEMPLATE)
            .context("report template does not parse")?;
        // only http(s) targets become clickable
        env.add_test("weblink", is_weblink);
        Ok(HtmlReport { env })
    }

    pub fn render_to_string(&self, results: &[CaptureResult]) -> anyhow::Result<String> {
        let fetched = results.iter().filter(|r| r.fetched()).count();
        let captured = results.iter().filter(|r| r.captured()).count();
        let html = self.env.get_template("report.html")?.render(context! {
            results => results,
            fetched => fetched,
            captured => captured,
            generated_at => timestamp(),
        })?;
        Ok(html)
    }
}

fn is_weblink(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    url.starts_with("http://") || url.starts_with("https://")
}

impl Report for HtmlReport {
    fn render(&self, results: &[CaptureResult], out: &Path) -> anyhow::Result<PathBuf> {
        let html = self.render_to_string(results)?;
        std::fs::write(out, html).context(format!("could not write report {:?}", out))?;
        info!("html report written to {:?}", out);
        Ok(out.to_path_buf())
    }
}

/// The same rows as JSON, for tooling downstream of the report.
pub struct JsonReport;

impl Report for JsonReport {
    fn render(&self, results: &[CaptureResult], out: &Path) -> anyhow::Result<PathBuf> {
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(out, json).context(format!("could not write results {:?}", out))?;
        debug!("json results written to {:?}", out);
        Ok(out.to_path_buf())
    }
}
