use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::{
    browser_controller::{BrowserController, PageRenderer},
    capture::CaptureWorker,
    dispatcher::Dispatcher,
    fetcher::{Fetcher, HttpFetcher},
    output::OutputLayout,
    reader::read_urls,
    report::{HtmlReport, JsonReport, Report},
    types::CaptureResult,
};

pub struct Runner {
    fetcher: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn PageRenderer>>,
    options: RunnerOptions,
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct RunnerOptions {
    // line-delimited file of target urls
    #[builder(default = "self.default_input()")]
    input: PathBuf,
    // root of the report, screenshots/ and responses/
    #[builder(default = "self.default_output_dir()")]
    output_dir: PathBuf,
    // maximum number of captures in flight
    #[builder(default = "20")]
    concurrency: usize,
    // milliseconds a worker sleeps before giving its slot back
    #[builder(default = "500")]
    pacing_ms: u64,
    // deadline in seconds for the fetch and for the render of a single url
    #[builder(default = "45")]
    timeout: u64,
    // toggle the browser capture step
    #[builder(default = "true")]
    screenshots: bool,
}

impl RunnerOptions {
    pub fn default_builder() -> RunnerOptionsBuilder {
        RunnerOptionsBuilder::default()
    }
}

impl RunnerOptionsBuilder {
    fn default_input(&self) -> PathBuf {
        PathBuf::from("file.txt")
    }
    fn default_output_dir(&self) -> PathBuf {
        PathBuf::from("output")
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<CaptureResult>,
    pub report_path: PathBuf,
    pub json_path: PathBuf,
}

impl RunSummary {
    pub fn fetched(&self) -> usize {
        self.results.iter().filter(|r| r.fetched()).count()
    }

    pub fn captured(&self) -> usize {
        self.results.iter().filter(|r| r.captured()).count()
    }
}

impl Runner {
    /// Runner backed by reqwest and a local Chrome.
    pub fn new(options: RunnerOptions) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(options.timeout);
        let fetcher = HttpFetcher::new(timeout).context("could not build http client")?;
        let renderer: Option<Arc<dyn PageRenderer>> = if options.screenshots {
            Some(Arc::new(BrowserController::new(
                timeout,
                options.concurrency,
            )))
        } else {
            None
        };
        Ok(Self::with_collaborators(
            options,
            Arc::new(fetcher),
            renderer,
        ))
    }

    pub fn with_collaborators(
        options: RunnerOptions,
        fetcher: Arc<dyn Fetcher>,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Self {
        let renderer = if options.screenshots { renderer } else { None };
        Runner {
            fetcher,
            renderer,
            options,
        }
    }

    /// Reads the targets, captures all of them and writes the reports.
    ///
    /// Only an unreadable input, an uncreatable output directory or an
    /// unwritable report fail the run; per-url problems end up in the rows.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
        let urls = read_urls(&self.options.input).await?;

        let layout = OutputLayout::new(&self.options.output_dir);
        layout.create().await?;

        info!(
            "capturing {} urls from {:?} into {:?}",
            urls.len(),
            self.options.input,
            self.options.output_dir
        );

        let worker = Arc::new(CaptureWorker::new(
            self.fetcher.clone(),
            self.renderer.clone(),
            layout.clone(),
            Duration::from_secs(self.options.timeout),
        ));
        let dispatcher = Dispatcher::new(
            self.options.concurrency,
            Duration::from_millis(self.options.pacing_ms),
            cancel,
        );
        let results = dispatcher.dispatch(worker, &urls).join().await.finish();

        let report_path = HtmlReport::new()?.render(&results, &layout.report_path())?;
        let json_path = JsonReport.render(&results, &layout.results_path())?;

        Ok(RunSummary {
            results,
            report_path,
            json_path,
        })
    }
}
