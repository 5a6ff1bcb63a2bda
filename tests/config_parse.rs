use tessbridge::config::{self, Config, thresholding_id};
use tessbridge::probe::{CapabilityReport, EngineVersion};

fn report(has_thresholding: bool) -> CapabilityReport {
    CapabilityReport {
        version: EngineVersion::new(5, 3, 0),
        banner: "tesseract 5.3.0".into(),
        has_thresholding,
    }
}

#[test]
fn parse_example_config() {
    let raw = include_str!("../tessbridge.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.engine.binary, "tesseract");
    assert_eq!(cfg.engine.languages, vec!["eng".to_string()]);
    assert!(cfg.engine.timeout_seconds > 0.0);
    assert!(!cfg.paths.out_dir.is_empty());
}

#[test]
fn defaults_match_example() {
    let raw = include_str!("../tessbridge.example.toml");
    let example: Config = toml::from_str(raw).expect("parse TOML");
    let defaults = Config::default();
    assert_eq!(
        example.normalized_for_hash(),
        defaults.normalized_for_hash()
    );
}

#[test]
fn validate_resolves_auto_renderer() {
    let mut cfg = Config::default();
    assert_eq!(cfg.pipeline.renderer, "auto");
    config::validate(&mut cfg, &report(true), None).unwrap();
    assert_eq!(cfg.pipeline.renderer, "sandwich");
}

#[test]
fn validate_keeps_explicit_renderer() {
    let mut cfg = Config::default();
    cfg.pipeline.renderer = "hocr".into();
    config::validate(&mut cfg, &report(true), None).unwrap();
    assert_eq!(cfg.pipeline.renderer, "hocr");
}

#[test]
fn validate_rejects_bad_values() {
    let mut cfg = Config::default();
    cfg.engine.page_seg_mode = Some(14);
    assert!(config::validate(&mut cfg, &report(true), None).is_err());

    let mut cfg = Config::default();
    cfg.engine.engine_mode = Some(4);
    assert!(config::validate(&mut cfg, &report(true), None).is_err());

    let mut cfg = Config::default();
    cfg.engine.thresholding = "bogus".into();
    assert!(config::validate(&mut cfg, &report(true), None).is_err());

    let mut cfg = Config::default();
    cfg.pipeline.renderer = "latex".into();
    assert!(config::validate(&mut cfg, &report(true), None).is_err());

    let mut cfg = Config::default();
    cfg.engine.languages.clear();
    assert!(config::validate(&mut cfg, &report(true), None).is_err());

    let mut cfg = Config::default();
    cfg.engine.timeout_seconds = -1.0;
    assert!(config::validate(&mut cfg, &report(true), None).is_err());
}

#[test]
fn validate_requires_referenced_files_to_exist() {
    let mut cfg = Config::default();
    cfg.engine.user_words = "/nonexistent/words.txt".into();
    assert!(config::validate(&mut cfg, &report(true), None).is_err());
}

#[test]
fn unsupported_thresholding_does_not_fail_validation() {
    // Warned about and ignored at invocation time, never fatal.
    let mut cfg = Config::default();
    cfg.engine.thresholding = "sauvola".into();
    config::validate(&mut cfg, &report(false), None).unwrap();
}

#[test]
fn thresholding_method_ids() {
    assert_eq!(thresholding_id("auto"), Some(0));
    assert_eq!(thresholding_id("legacy-otsu"), Some(0));
    assert_eq!(thresholding_id("adaptive-otsu"), Some(1));
    assert_eq!(thresholding_id("sauvola"), Some(2));
    assert_eq!(thresholding_id("bogus"), None);
}
