pub mod tesseract;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::probe::EngineVersion;

/// How the text layer is rendered into the final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// Invisible text overlaid on the original page image.
    Sandwich,
    /// Plain hOCR layer for a downstream renderer.
    Hocr,
}

impl RenderMode {
    pub fn from_config(renderer: &str) -> Option<Self> {
        match renderer {
            "sandwich" => Some(Self::Sandwich),
            "hocr" => Some(Self::Hocr),
            _ => None,
        }
    }

    /// Extension of the layer artifact the engine writes next to the text
    /// sidecar.
    pub fn layer_extension(self) -> &'static str {
        match self {
            Self::Sandwich => "pdf",
            Self::Hocr => "hocr",
        }
    }

    /// The built-in Tesseract output config selecting this mode.
    pub fn output_config(self) -> &'static str {
        match self {
            Self::Sandwich => "pdf",
            Self::Hocr => "hocr",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrientationResult {
    /// One of 0, 90, 180, 270.
    pub degrees: u16,
    pub confidence: f32,
}

/// Inputs for one text-layer generation call. `output_base` is the path the
/// engine derives its artifact names from: `<base>.pdf`/`<base>.hocr` plus
/// `<base>.txt`.
#[derive(Debug)]
pub struct TextLayerRequest<'a> {
    pub image: &'a Path,
    pub output_base: &'a Path,
    pub mode: RenderMode,
    /// Internal threads this invocation may use, from the per-job budget.
    pub thread_budget: u32,
}

/// Result of one text-layer generation call.
///
/// Timeout is an expected outcome, not an error: the page falls back to its
/// pre-OCR rendering and keeps whatever partial artifacts exist. A hard
/// failure means a data or configuration problem and is kept distinct.
#[derive(Debug)]
pub enum TextLayerOutcome {
    Completed {
        layer: PathBuf,
        text: PathBuf,
    },
    TimedOut {
        layer: Option<PathBuf>,
        text: Option<PathBuf>,
    },
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Capability contract for an OCR engine.
///
/// One production implementation exists ([`tesseract::TesseractEngine`]);
/// alternate engines are additional implementations of this trait, and the
/// pipeline is generic over it.
/// Build the production engine from a probed capability report.
///
/// The single integration point a pipeline driver needs; alternate engines
/// plug in by constructing their own [`OcrEngine`] implementation instead.
pub fn create(
    cfg: &crate::config::Config,
    report: crate::probe::CapabilityReport,
) -> tesseract::TesseractEngine {
    tesseract::TesseractEngine::new(&cfg.engine, report, cfg.debug.keep_engine_stderr)
}

pub trait OcrEngine: Send + Sync {
    fn version(&self) -> &EngineVersion;

    /// Identification string embedded in downstream metadata. Descriptive
    /// only; names the engine, version and render mode.
    fn creator_tag(&self, mode: RenderMode) -> String;

    /// Languages the installed engine can recognize.
    fn languages(&self) -> Result<BTreeSet<String>>;

    /// Detect which way the page is rotated. Callers treat a
    /// [`EngineError::DetectionFailed`] as "assume upright".
    fn detect_orientation(
        &self,
        image: &Path,
        thread_budget: u32,
    ) -> Result<OrientationResult, EngineError>;

    /// Best-effort skew estimate in degrees. 0.0 on any failure; this path
    /// never raises.
    fn detect_skew(&self, image: &Path, thread_budget: u32) -> f32;

    /// Produce the text layer and plain-text sidecar for one page.
    fn generate_text_layer(&self, req: &TextLayerRequest<'_>) -> Result<TextLayerOutcome>;
}
