use tessbridge::error::EngineError;
use tessbridge::probe::{EngineVersion, MINIMUM_VERSION, THRESHOLDING_SINCE};

#[test]
fn parses_common_banners() {
    assert_eq!(
        EngineVersion::parse("tesseract 5.3.0").unwrap(),
        EngineVersion::new(5, 3, 0)
    );
    assert_eq!(
        EngineVersion::parse("tesseract v4.1.1").unwrap(),
        EngineVersion::new(4, 1, 1)
    );
    assert_eq!(
        EngineVersion::parse("tesseract 4.0.0-beta.1").unwrap(),
        EngineVersion::new(4, 0, 0)
    );
    // Patch defaults to zero when absent.
    assert_eq!(
        EngineVersion::parse("tesseract 4.1").unwrap(),
        EngineVersion::new(4, 1, 0)
    );
}

#[test]
fn only_first_line_is_considered() {
    let banner = "tesseract 5.3.0\n  leptonica-1.82.0\n  libgif 5.2.1";
    assert_eq!(
        EngineVersion::parse(banner).unwrap(),
        EngineVersion::new(5, 3, 0)
    );
}

#[test]
fn unparseable_banner_is_an_error() {
    let err = EngineVersion::parse("command not found").unwrap_err();
    assert!(matches!(err, EngineError::VersionUnparseable { .. }));
}

#[test]
fn ordering_is_numeric() {
    assert!(EngineVersion::new(4, 1, 1) < EngineVersion::new(5, 0, 0));
    assert!(EngineVersion::new(4, 9, 0) < EngineVersion::new(4, 10, 0));
    assert!(EngineVersion::new(5, 0, 1) > EngineVersion::new(5, 0, 0));
}

#[test]
fn display_round_trips() {
    let v = EngineVersion::new(5, 3, 0);
    assert_eq!(v.to_string(), "5.3.0");
    assert_eq!(EngineVersion::parse(&v.to_string()).unwrap(), v);
}

#[test]
fn capability_thresholds() {
    assert!(MINIMUM_VERSION < THRESHOLDING_SINCE);
    assert!(EngineVersion::new(5, 0, 0) >= THRESHOLDING_SINCE);
    assert!(EngineVersion::new(4, 1, 1) < THRESHOLDING_SINCE);
}
