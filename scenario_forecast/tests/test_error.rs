use scenario_forecast::error::ForecastError;
use sensor_ingest::IngestError;
use std::io;
use ts_math::MathError;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(
        ForecastError::from(io_error),
        ForecastError::IoError(_)
    ));

    let math_error = MathError::CalculationError("Matrix is singular".to_string());
    assert!(matches!(
        ForecastError::from(math_error),
        ForecastError::MathError(_)
    ));

    let ingest_error = IngestError::RoleError("Unknown variable role 'pressure'".to_string());
    assert!(matches!(
        ForecastError::from(ingest_error),
        ForecastError::IngestError(_)
    ));

    let json_error = serde_json::from_str::<Vec<f64>>("[1.0,").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::SerializationError(_)
    ));

    let toml_error = toml::from_str::<toml::Table>("maxlags = ").unwrap_err();
    assert!(matches!(
        ForecastError::from(toml_error),
        ForecastError::ConfigError(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InsufficientData("Need at least 4 rows for lag order 3".to_string());
    let error_string = format!("{}", error);
    assert!(error_string.contains("Insufficient data"));
    assert!(error_string.contains("lag order 3"));

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error_string = format!("{}", ForecastError::from(io_error));
    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));

    let nested = ForecastError::from(MathError::InvalidInput("ragged rows".to_string()));
    assert!(format!("{}", nested).contains("ragged rows"));
}

#[test]
fn test_error_variants_are_distinct() {
    let simulation = ForecastError::SimulationError("Projection diverged".to_string());
    let forecasting = ForecastError::ForecastingError("Series is constant".to_string());
    let parameter = ForecastError::InvalidParameter("maxlags must be at least 1".to_string());

    assert!(matches!(simulation, ForecastError::SimulationError(_)));
    assert!(matches!(forecasting, ForecastError::ForecastingError(_)));
    assert!(matches!(parameter, ForecastError::InvalidParameter(_)));
}
