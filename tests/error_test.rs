//! Tests for error types

use mlflow_porter::Error;

#[test]
fn test_invalid_input_error() {
    let error = Error::InvalidInput("run id is required".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Invalid input"));
    assert!(error_str.contains("run id is required"));
    assert!(error.is_configuration());
    assert!(!error.is_conflict());
}

#[test]
fn test_not_found_error() {
    let error = Error::not_found("registered model", "sklearn_wine");
    assert_eq!(format!("{error}"), "registered model not found: sklearn_wine");
}

#[test]
fn test_param_conflict_error() {
    let error = Error::ParamConflict {
        run_id: "abc".to_string(),
        key: "alpha".to_string(),
        existing: "0.9".to_string(),
        attempted: "0.5".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("'alpha'"));
    assert!(error_str.contains("existing: '0.9'"));
    assert!(error_str.contains("attempted: '0.5'"));
    assert!(error.is_conflict());
}

#[test]
fn test_already_exists_is_conflict() {
    let error = Error::AlreadyExists("registered model 'wine'".to_string());
    assert_eq!(format!("{error}"), "registered model 'wine' already exists");
    assert!(error.is_conflict());
}

#[test]
fn test_server_error() {
    let error = Error::Server {
        status: 400,
        code: "INVALID_PARAMETER_VALUE".to_string(),
        message: "Changing param values is not allowed".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("HTTP 400"));
    assert!(error_str.contains("INVALID_PARAMETER_VALUE"));
    assert!(!error.is_conflict());
}

#[test]
fn test_version_not_ready_error() {
    let error = Error::VersionNotReady {
        name: "wine".to_string(),
        version: "3".to_string(),
        attempts: 10,
    };
    assert_eq!(
        format!("{error}"),
        "Model version wine/3 not ready after 10 attempts"
    );
}

#[test]
fn test_registration_failed_error() {
    let error = Error::RegistrationFailed {
        name: "wine".to_string(),
        version: "2".to_string(),
        message: "copy failed".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("wine/2"));
    assert!(error_str.contains("copy failed"));
}

#[test]
fn test_unrecognized_source_path_error() {
    let error = Error::UnrecognizedSourcePath {
        source_path: "s3://bucket/model".to_string(),
        run_id: "48cf29167ddb4e098da780f0959fb4cf".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("s3://bucket/model"));
    assert!(error_str.contains("48cf29167ddb4e098da780f0959fb4cf"));
}

#[test]
fn test_reserved_tag_error() {
    let error = Error::ReservedTag("mlflow_export_import.metadata.owner".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("mlflow_export_import.metadata.owner"));
    assert!(error_str.contains("reserved"));
}

#[test]
fn test_mismatch_error_uses_debug_form() {
    let error = Error::mismatch("params", "0.5", "0.7");
    assert_eq!(
        format!("{error}"),
        "Mismatch in params: source=\"0.5\" destination=\"0.7\""
    );
}

#[test]
fn test_unsupported_error() {
    let error = Error::Unsupported("notebook export from http://localhost:5000".to_string());
    assert!(format!("{error}").contains("Unsupported operation"));
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "run.json");
    let error: Error = io.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert!(error_str.contains("run.json"));
}

#[test]
fn test_json_error_conversion() {
    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json.into();
    assert!(format!("{error}").contains("JSON error"));
}

#[test]
fn test_error_debug() {
    let error = Error::Transport("connection reset".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("Transport"));
}
