use crate::probe::CapabilityReport;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

/// Tesseract thresholding methods, as accepted in `engine.thresholding`,
/// paired with the integer the engine expects in `-c thresholding_method=N`.
pub const THRESHOLDING_METHODS: &[(&str, u32)] = &[
    ("auto", 0),
    ("legacy-otsu", 0),
    ("adaptive-otsu", 1),
    ("sauvola", 2),
];

pub fn thresholding_id(name: &str) -> Option<u32> {
    THRESHOLDING_METHODS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: Engine,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub hashing: Hashing,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub postprocess: Postprocess,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// A stable, normalization-friendly string for hashing.
    pub fn normalized_for_hash(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: Default::default(),
            pipeline: Default::default(),
            paths: Default::default(),
            hashing: Default::default(),
            output: Default::default(),
            postprocess: Default::default(),
            logging: Default::default(),
            debug: Default::default(),
        }
    }
}

/// Options forwarded to the external Tesseract binary. Resolved and frozen
/// before the first page is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    pub binary: String,
    /// Language codes in priority order, joined `eng+deu` on the command line.
    pub languages: Vec<String>,
    /// Page segmentation mode (0..=13). None = engine default.
    pub page_seg_mode: Option<u32>,
    /// OCR engine mode: 0 legacy, 1 LSTM, 2 legacy+LSTM, 3 default.
    pub engine_mode: Option<u32>,
    pub thresholding: String,
    /// Per-invocation wall clock budget. 0 disables the deadline.
    pub timeout_seconds: f64,
    pub user_words: String,
    pub user_patterns: String,
    /// Extra Tesseract config files, appended as trailing operands.
    pub config_files: Vec<String>,
}
impl Default for Engine {
    fn default() -> Self {
        Self {
            binary: "tesseract".into(),
            languages: vec!["eng".into()],
            page_seg_mode: None,
            engine_mode: None,
            thresholding: "auto".into(),
            timeout_seconds: 180.0,
            user_words: "".into(),
            user_patterns: "".into(),
            config_files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Page workers. 0 = one per available core.
    pub jobs: usize,
    /// "auto" | "sandwich" | "hocr". "auto" resolves to "sandwich" during
    /// validation.
    pub renderer: String,
    pub detect_orientation: bool,
    /// OSD results below this confidence are treated as "assume upright".
    pub min_orientation_confidence: f32,
    pub detect_skew: bool,
    /// Abort the job after the pool drains when a page hard-fails. Timeouts
    /// never abort regardless of this setting.
    pub fail_on_page_error: bool,
}
impl Default for Pipeline {
    fn default() -> Self {
        Self {
            jobs: 0,
            renderer: "auto".into(),
            detect_orientation: true,
            min_orientation_confidence: 14.0,
            detect_skew: false,
            fail_on_page_error: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub out_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashing {
    pub mode: String,
    pub fast_window_bytes: u64,
}
impl Default for Hashing {
    fn default() -> Self {
        Self {
            mode: "fast_2x16mb".into(),
            fast_window_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub write_text: bool,
    pub write_report_json: bool,
    pub write_page_json: bool,
    pub keep_page_artifacts: bool,
    pub text_filename: String,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            write_text: true,
            write_report_json: true,
            write_page_json: false,
            keep_page_artifacts: true,
            text_filename: "document.txt".into(),
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Postprocess {
    pub normalize_unicode: bool,
    pub normalize_newlines: bool,
    pub trim_trailing_whitespace: bool,
    /// Separate pages with a form feed in the merged sidecar.
    pub page_separator_form_feed: bool,
}
impl Default for Postprocess {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            normalize_newlines: true,
            trim_trailing_whitespace: true,
            page_separator_form_feed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: true,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debug {
    pub keep_engine_stderr: bool,
    pub dump_effective_config: bool,
}
impl Default for Debug {
    fn default() -> Self {
        Self {
            keep_engine_stderr: true,
            dump_effective_config: true,
        }
    }
}

/// One-shot validation pass, run after the probe and before any page work.
///
/// Resolves `renderer = "auto"`, rejects out-of-range values, and emits the
/// advisory warnings the engine contract calls for. After this returns the
/// configuration is treated as immutable for the rest of the run.
pub fn validate(
    cfg: &mut Config,
    report: &CapabilityReport,
    installed_langs: Option<&BTreeSet<String>>,
) -> Result<()> {
    if cfg.engine.languages.is_empty() {
        return Err(anyhow!("engine.languages must name at least one language"));
    }
    if cfg.engine.timeout_seconds < 0.0 || !cfg.engine.timeout_seconds.is_finite() {
        return Err(anyhow!(
            "engine.timeout_seconds must be a non-negative number, got {}",
            cfg.engine.timeout_seconds
        ));
    }
    if let Some(psm) = cfg.engine.page_seg_mode {
        if psm > 13 {
            return Err(anyhow!("engine.page_seg_mode must be in 0..=13, got {psm}"));
        }
        if psm == 0 || psm == 2 {
            warn!(
                "engine.page_seg_mode = {psm} disables text recognition; \
                 pages will produce no text layer"
            );
        }
    }
    if let Some(oem) = cfg.engine.engine_mode {
        if oem > 3 {
            return Err(anyhow!("engine.engine_mode must be in 0..=3, got {oem}"));
        }
    }

    let thresholding = cfg.engine.thresholding.as_str();
    if thresholding_id(thresholding).is_none() {
        return Err(anyhow!(
            "unknown engine.thresholding: {thresholding:?} (expected one of: auto, \
             legacy-otsu, adaptive-otsu, sauvola)"
        ));
    }
    if thresholding != "auto" && !report.has_thresholding {
        warn!(
            "tesseract {} does not support selecting a thresholding method; \
             engine.thresholding = {:?} will be ignored",
            report.version, thresholding
        );
    }

    match cfg.pipeline.renderer.as_str() {
        "auto" => cfg.pipeline.renderer = "sandwich".into(),
        "sandwich" | "hocr" => {}
        other => {
            return Err(anyhow!(
                "unknown pipeline.renderer: {other:?} (expected auto, sandwich or hocr)"
            ));
        }
    }

    if let Some(installed) = installed_langs {
        for lang in &cfg.engine.languages {
            if !installed.contains(lang) {
                warn!(
                    "language {lang:?} is not installed for tesseract {}",
                    report.version
                );
            }
        }
    }

    for file in cfg
        .engine
        .config_files
        .iter()
        .chain([&cfg.engine.user_words, &cfg.engine.user_patterns])
        .filter(|s| !s.is_empty())
    {
        if !Path::new(file).exists() {
            return Err(anyhow!("engine file does not exist: {file}"));
        }
    }

    Ok(())
}
