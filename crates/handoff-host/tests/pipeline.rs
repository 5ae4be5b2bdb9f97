//! The host pipeline against the exporter linked in-process.

use handoff_core::ArrowArray;
use handoff_host::{run, run_with_exporter, ConfigError, HostConfig, HostError, LoadError};

unsafe extern "C" fn export_nothing(_array: *mut ArrowArray) {}

#[test]
fn test_pipeline_with_linked_exporter() {
    let report = run_with_exporter(arrow_exporter::export_int32_data, 5).unwrap();
    assert_eq!(report.length, arrow_exporter::DEFAULT_EXPORT_LEN);
    assert_eq!(report.null_count, 0);
    assert!(report.preview.contains("values"));
    // Header, five rows and borders.
    assert_eq!(report.preview.lines().count(), 5 + 4);
}

#[test]
fn test_unpopulated_descriptor_is_reported() {
    let err = run_with_exporter(export_nothing, 5).unwrap_err();
    assert!(matches!(err, HostError::NothingExported { .. }));
}

#[test]
fn test_run_requires_library() {
    let err = run(&HostConfig::default()).unwrap_err();
    assert!(matches!(err, HostError::Config(ConfigError::MissingLibrary)));
}

#[test]
fn test_run_reports_missing_library() {
    let config = HostConfig {
        library: Some("/nonexistent/libarrow_exporter.so".into()),
        ..HostConfig::default()
    };
    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        HostError::Load(LoadError::LibraryNotFound { .. })
    ));
}

#[test]
#[cfg(target_os = "linux")]
fn test_run_reports_missing_symbol() {
    let config = HostConfig {
        library: Some("libc.so.6".into()),
        symbol: "handoff_missing_symbol".to_string(),
        ..HostConfig::default()
    };
    let err = run(&config).unwrap_err();
    assert!(err.to_string().contains("handoff_missing_symbol"));
}
