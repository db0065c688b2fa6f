use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;
use scenario_forecast::models::{ArimaModel, TrendSeasonalModel};
use scenario_forecast::{forecast_column, ForecastError, ForecastModel, TrainedForecastModel};
use sensor_ingest::MultivariateSeries;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn single_column(values: &[Option<f64>]) -> MultivariateSeries {
    MultivariateSeries::new(
        "Savanna",
        (0..values.len() as i64)
            .map(|h| start() + Duration::hours(h))
            .collect(),
        vec![("Savanna_Temp".to_string(), values.to_vec())],
    )
    .unwrap()
}

/// Daily cycle on a slow warming trend, hourly
fn diurnal(days: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(5);
    let noise = Normal::new(0.0, 0.1).unwrap();
    (0..days * 24)
        .map(|t| {
            let phase = (t % 24) as f64 / 24.0 * std::f64::consts::TAU;
            20.0 + 0.01 * t as f64 + 4.0 * phase.cos() + noise.sample(&mut rng)
        })
        .collect()
}

#[test]
fn test_arima_forecast_column_contract() {
    let values: Vec<Option<f64>> = diurnal(5).into_iter().map(Some).collect();
    let series = single_column(&values);

    let forecast = forecast_column(&ArimaModel::default(), &series, "Savanna_Temp", 12).unwrap();

    assert_eq!(forecast.len(), 12);
    assert_eq!(forecast.columns(), &["Savanna_Temp".to_string()]);
    assert_eq!(forecast.model(), "ARIMA(1,1,1)");
    assert_eq!(
        forecast.timestamps()[0],
        series.last_timestamp().unwrap() + Duration::hours(1)
    );
    assert!(forecast.rows().iter().all(|r| r[0].is_finite()));
}

#[test]
fn test_arima_ar1_recovers_coefficient() {
    let mut rng = StdRng::seed_from_u64(9);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let mut data = vec![0.0];
    for t in 1..1500 {
        data.push(0.6 * data[t - 1] + noise.sample(&mut rng));
    }

    let trained = ArimaModel::new(1, 0, 0).train(&data).unwrap();
    assert_relative_eq!(trained.ar_coefficients()[0], 0.6, epsilon = 0.08);
    assert!(trained.ma_coefficients().is_empty());

    // Forecasts decay toward the mean.
    let forecast = trained.forecast(50).unwrap();
    assert!(forecast[49].abs() < 0.5);
}

#[test]
fn test_trend_seasonal_tracks_daily_cycle() {
    let history = diurnal(6);
    let model = TrendSeasonalModel::new(24).unwrap();
    let trained = model.train(&history).unwrap();
    let forecast = trained.forecast(24).unwrap();

    assert!(trained.seasonal().is_some());
    let n = history.len();
    for (h, value) in forecast.iter().enumerate() {
        let t = n + h;
        let phase = (t % 24) as f64 / 24.0 * std::f64::consts::TAU;
        let expected = 20.0 + 0.01 * t as f64 + 4.0 * phase.cos();
        assert_relative_eq!(*value, expected, epsilon = 0.5);
    }
}

#[rstest]
#[case::constant(vec![Some(12.0); 30])]
#[case::all_missing(vec![None; 30])]
#[case::too_short(vec![Some(1.0), Some(2.0), Some(4.0), Some(3.0)])]
fn test_degenerate_columns_fail(#[case] values: Vec<Option<f64>>) {
    let series = single_column(&values);

    let arima = forecast_column(&ArimaModel::default(), &series, "Savanna_Temp", 5);
    let decomposition = forecast_column(
        &TrendSeasonalModel::new(24).unwrap(),
        &series,
        "Savanna_Temp",
        5,
    );

    assert!(matches!(arima, Err(ForecastError::ForecastingError(_))));
    assert!(matches!(
        decomposition,
        Err(ForecastError::ForecastingError(_))
    ));
}

#[test]
fn test_unknown_column_fails() {
    let series = single_column(&[Some(1.0), Some(2.0), Some(3.0), Some(5.0), Some(4.0)]);
    let result = forecast_column(&ArimaModel::default(), &series, "Savanna_Wind", 3);
    assert!(matches!(result, Err(ForecastError::ForecastingError(_))));
}

#[test]
fn test_zero_steps_is_rejected() {
    let values: Vec<Option<f64>> = diurnal(2).into_iter().map(Some).collect();
    let series = single_column(&values);
    let result = forecast_column(&TrendSeasonalModel::new(24).unwrap(), &series, "Savanna_Temp", 0);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}
