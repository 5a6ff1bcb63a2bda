use crate::{
    config::Config,
    engine::{OcrEngine, OrientationResult, RenderMode, TextLayerOutcome, TextLayerRequest},
    error::EngineError,
    postprocess,
    report::{JobReport, PageReport, PageStatus},
    threads,
    util::ensure_dir,
};
use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Pipeline<E: OcrEngine> {
    cfg: Config,
    engine: E,
}

pub struct JobOutput {
    pub text: String,
    pub report: JobReport,
}

impl<E: OcrEngine> Pipeline<E> {
    /// `cfg` must already have passed [`crate::config::validate`]; nothing
    /// here mutates it again.
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    /// Run one document: every entry in `pages` is a rasterized page image,
    /// in document order.
    ///
    /// The thread budget is decided exactly once here, before the pool
    /// starts, and is read-only for the rest of the run. Workers block
    /// synchronously on their engine calls; a timeout on one page never
    /// cancels or fails a sibling.
    pub fn run_job(&self, pages: &[PathBuf], job_dir: &Path) -> Result<JobOutput> {
        let page_count = pages.len();
        if page_count == 0 {
            return Err(anyhow!("no input pages"));
        }

        let workers = self.worker_count();
        let budget = threads::thread_budget_from_env(workers, page_count)?;
        let mode = RenderMode::from_config(&self.cfg.pipeline.renderer)
            .ok_or_else(|| anyhow!("renderer not resolved: {}", self.cfg.pipeline.renderer))?;

        info!(
            "job: {page_count} page(s), {workers} worker(s), engine thread budget {budget}, \
             renderer {}",
            self.cfg.pipeline.renderer
        );

        let pages_dir = job_dir.join("pages");
        ensure_dir(&pages_dir)?;

        let pool = workers.min(page_count);
        let cursor = AtomicUsize::new(0);
        let results: Mutex<Vec<Option<PageReport>>> = Mutex::new(vec![None; page_count]);

        std::thread::scope(|s| {
            for _ in 0..pool {
                s.spawn(|| {
                    loop {
                        let idx = cursor.fetch_add(1, Ordering::Relaxed);
                        if idx >= page_count {
                            break;
                        }
                        let page = self.process_page(idx, &pages[idx], &pages_dir, mode, budget);
                        results.lock().expect("results lock")[idx] = Some(page);
                    }
                });
            }
        });

        let pages_done: Vec<PageReport> = results
            .into_inner()
            .expect("results lock")
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| PageReport {
                    index: idx,
                    input: pages[idx].display().to_string(),
                    status: PageStatus::Failed,
                    orientation_degrees: 0,
                    orientation_confidence: 0.0,
                    skew_degrees: 0.0,
                    layer: None,
                    text: None,
                    warnings: vec!["page worker did not report a result".to_string()],
                    elapsed_ms: 0,
                })
            })
            .collect();

        let ok = count(&pages_done, PageStatus::Ok);
        let fallback = count(&pages_done, PageStatus::Fallback);
        let failed = count(&pages_done, PageStatus::Failed);
        info!("pages: {ok} ok, {fallback} fallback, {failed} failed");

        let text = self.merge_sidecars(&pages_done)?;

        let report = JobReport {
            engine_version: self.engine.version().to_string(),
            creator_tag: self.engine.creator_tag(mode),
            renderer: self.cfg.pipeline.renderer.clone(),
            workers,
            thread_budget: budget,
            page_count,
            pages: pages_done,
        };

        Ok(JobOutput { text, report })
    }

    fn worker_count(&self) -> usize {
        if self.cfg.pipeline.jobs > 0 {
            self.cfg.pipeline.jobs
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// One page, start to finish. Local problems become a `Failed` page
    /// report rather than an error so the rest of the document is unaffected.
    fn process_page(
        &self,
        idx: usize,
        input: &Path,
        pages_dir: &Path,
        mode: RenderMode,
        budget: u32,
    ) -> PageReport {
        let started = Instant::now();
        let mut warnings = Vec::new();

        let mut orientation = OrientationResult {
            degrees: 0,
            confidence: 0.0,
        };
        if self.cfg.pipeline.detect_orientation {
            match self.engine.detect_orientation(input, budget) {
                Ok(o) if o.confidence >= self.cfg.pipeline.min_orientation_confidence => {
                    orientation = o;
                }
                Ok(o) => {
                    debug!(
                        "page {idx}: ignoring low-confidence orientation {} ({:.2} < {:.2})",
                        o.degrees, o.confidence, self.cfg.pipeline.min_orientation_confidence
                    );
                }
                Err(EngineError::DetectionFailed(msg)) => {
                    debug!("page {idx}: orientation unknown, assuming upright: {msg}");
                }
                Err(other) => {
                    debug!("page {idx}: orientation probe error, assuming upright: {other}");
                }
            }
        }

        let skew_degrees = if self.cfg.pipeline.detect_skew {
            self.engine.detect_skew(input, budget)
        } else {
            0.0
        };

        let output_base = pages_dir.join(format!("{idx:06}"));
        let req = TextLayerRequest {
            image: input,
            output_base: &output_base,
            mode,
            thread_budget: budget,
        };

        let (status, layer, text) = match self.engine.generate_text_layer(&req) {
            Ok(TextLayerOutcome::Completed { layer, text }) => {
                (PageStatus::Ok, Some(layer), Some(text))
            }
            Ok(TextLayerOutcome::TimedOut { layer, text }) => {
                warn!(
                    "page {idx}: OCR timed out; falling back to the original page rendering"
                );
                warnings.push(
                    "OCR timed out; page keeps its pre-OCR rendering".to_string(),
                );
                (PageStatus::Fallback, layer, text)
            }
            Ok(TextLayerOutcome::Failed { exit_code, stderr }) => {
                error!("page {idx}: OCR failed (exit {exit_code:?}): {stderr}");
                warnings.push(format!("OCR failed (exit {exit_code:?}): {stderr}"));
                (PageStatus::Failed, None, None)
            }
            Err(err) => {
                error!("page {idx}: {err:#}");
                warnings.push(format!("{err:#}"));
                (PageStatus::Failed, None, None)
            }
        };

        PageReport {
            index: idx,
            input: input.display().to_string(),
            status,
            orientation_degrees: orientation.degrees,
            orientation_confidence: orientation.confidence,
            skew_degrees,
            layer: layer.map(|p| p.display().to_string()),
            text: text.map(|p| p.display().to_string()),
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Stitch per-page text sidecars into the document sidecar. Pages
    /// without text contribute an empty slot to keep boundaries aligned.
    fn merge_sidecars(&self, pages: &[PageReport]) -> Result<String> {
        let mut parts = Vec::with_capacity(pages.len());
        for page in pages {
            // Lossy: a killed engine can leave a sidecar truncated mid-codepoint.
            let part = match &page.text {
                Some(path) => {
                    let bytes = std::fs::read(path)
                        .with_context(|| format!("reading sidecar {path}"))?;
                    String::from_utf8_lossy(&bytes).into_owned()
                }
                None => String::new(),
            };
            parts.push(part);
        }
        Ok(postprocess::merge_text(&self.cfg, parts))
    }
}

fn count(pages: &[PageReport], status: PageStatus) -> usize {
    pages.iter().filter(|p| p.status == status).count()
}
