//! Pipeline behavior with a substitute engine: timeouts degrade a single
//! page, hard failures are reported without aborting sibling pages.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tessbridge::config::Config;
use tessbridge::engine::{
    OcrEngine, OrientationResult, RenderMode, TextLayerOutcome, TextLayerRequest,
};
use tessbridge::error::EngineError;
use tessbridge::pipeline::Pipeline;
use tessbridge::probe::EngineVersion;
use tessbridge::report::PageStatus;

struct StubEngine {
    version: EngineVersion,
    timeout_pages: Vec<usize>,
    fail_pages: Vec<usize>,
}

impl StubEngine {
    fn new(timeout_pages: Vec<usize>, fail_pages: Vec<usize>) -> Self {
        Self {
            version: EngineVersion::new(5, 3, 0),
            timeout_pages,
            fail_pages,
        }
    }
}

fn page_index(output_base: &Path) -> usize {
    output_base
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.parse().ok())
        .expect("numeric output base")
}

impl OcrEngine for StubEngine {
    fn version(&self) -> &EngineVersion {
        &self.version
    }

    fn creator_tag(&self, _mode: RenderMode) -> String {
        format!("Stub OCR {}", self.version)
    }

    fn languages(&self) -> anyhow::Result<BTreeSet<String>> {
        Ok(["eng".to_string()].into())
    }

    fn detect_orientation(
        &self,
        _image: &Path,
        _thread_budget: u32,
    ) -> Result<OrientationResult, EngineError> {
        Err(EngineError::DetectionFailed("stub has no OSD".into()))
    }

    fn detect_skew(&self, _image: &Path, _thread_budget: u32) -> f32 {
        0.0
    }

    fn generate_text_layer(
        &self,
        req: &TextLayerRequest<'_>,
    ) -> anyhow::Result<TextLayerOutcome> {
        let idx = page_index(req.output_base);
        if self.timeout_pages.contains(&idx) {
            return Ok(TextLayerOutcome::TimedOut {
                layer: None,
                text: None,
            });
        }
        if self.fail_pages.contains(&idx) {
            return Ok(TextLayerOutcome::Failed {
                exit_code: Some(1),
                stderr: "could not load language data".into(),
            });
        }
        let layer = req.output_base.with_extension(req.mode.layer_extension());
        let text = req.output_base.with_extension("txt");
        std::fs::write(&layer, b"%layer%")?;
        std::fs::write(&text, format!("page {idx} text\n"))?;
        Ok(TextLayerOutcome::Completed { layer, text })
    }
}

fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.pipeline.jobs = 2;
    cfg.pipeline.renderer = "sandwich".into();
    cfg
}

fn fake_pages(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("page-{i}.png"))).collect()
}

#[test]
fn one_timed_out_page_does_not_fail_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&test_config(), StubEngine::new(vec![1], vec![]));

    let out = pipeline.run_job(&fake_pages(4), dir.path()).unwrap();

    assert_eq!(out.report.page_count, 4);
    assert_eq!(out.report.pages[1].status, PageStatus::Fallback);
    for idx in [0, 2, 3] {
        assert_eq!(out.report.pages[idx].status, PageStatus::Ok, "page {idx}");
    }
    assert_eq!(out.report.hard_failures(), 0);
    assert!(out.text.contains("page 0 text"));
    assert!(out.text.contains("page 3 text"));
}

#[test]
fn fallback_pages_carry_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&test_config(), StubEngine::new(vec![0], vec![]));

    let out = pipeline.run_job(&fake_pages(2), dir.path()).unwrap();
    assert!(!out.report.pages[0].warnings.is_empty());
    assert!(out.report.pages[1].warnings.is_empty());
}

#[test]
fn hard_failure_is_reported_but_siblings_complete() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&test_config(), StubEngine::new(vec![], vec![2]));

    let out = pipeline.run_job(&fake_pages(5), dir.path()).unwrap();

    assert_eq!(out.report.hard_failures(), 1);
    assert_eq!(out.report.pages[2].status, PageStatus::Failed);
    let ok = out
        .report
        .pages
        .iter()
        .filter(|p| p.status == PageStatus::Ok)
        .count();
    assert_eq!(ok, 4);
}

#[test]
fn orientation_failure_defaults_to_upright() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&test_config(), StubEngine::new(vec![], vec![]));

    let out = pipeline.run_job(&fake_pages(1), dir.path()).unwrap();
    assert_eq!(out.report.pages[0].orientation_degrees, 0);
    assert_eq!(out.report.pages[0].status, PageStatus::Ok);
}

#[test]
fn report_names_engine_and_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config();
    cfg.pipeline.jobs = 4;
    let pipeline = Pipeline::new(&cfg, StubEngine::new(vec![], vec![]));

    // 4 workers over 1 page: the engine may use up to the ceiling. Computed
    // through the same env-aware path the pipeline uses so an inherited
    // OMP_THREAD_LIMIT cannot break the assertion.
    let expected = tessbridge::threads::thread_budget_from_env(4, 1).unwrap();
    let out = pipeline.run_job(&fake_pages(1), dir.path()).unwrap();
    assert_eq!(out.report.engine_version, "5.3.0");
    assert_eq!(out.report.creator_tag, "Stub OCR 5.3.0");
    assert_eq!(out.report.workers, 4);
    assert_eq!(out.report.thread_budget, expected);
}

#[test]
fn empty_document_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(&test_config(), StubEngine::new(vec![], vec![]));
    assert!(pipeline.run_job(&[], dir.path()).is_err());
}
