use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;
use scenario_forecast::{
    run_scenarios, simulate, train, Adjustment, ForecastError, LagSelection, ScenarioSession,
};
use sensor_ingest::MultivariateSeries;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 2, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Hourly Temp/Wind series from a stable VAR(1) with Gaussian noise
fn weather(len: usize, seed: u64) -> MultivariateSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();

    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(len);
    let mut temp = 25.0;
    let mut wind = 3.0;
    for _ in 0..len {
        let next_temp = 8.0 + 0.7 * temp - 0.2 * wind + noise.sample(&mut rng);
        let next_wind = 1.0 + 0.05 * temp + 0.4 * wind + noise.sample(&mut rng);
        temp = next_temp;
        wind = next_wind;
        rows.push(vec![temp, wind]);
    }

    let timestamps = (0..len as i64).map(|h| start() + Duration::hours(h)).collect();
    MultivariateSeries::from_rows("RainForest", timestamps, &["Temp", "Wind"], &rows).unwrap()
}

#[test]
fn test_temperature_shift_is_traceable_to_own_lag_coefficient() {
    let series = weather(100, 42);
    let model = train(&series, 3).unwrap();

    let baseline = simulate(&series, &model, &Adjustment::new(), 24).unwrap();
    let warmer = simulate(&series, &model, &Adjustment::new().with("Temp", 1.0), 24).unwrap();

    assert_eq!(warmer.len(), 24);
    assert_eq!(warmer.columns(), &["Temp".to_string(), "Wind".to_string()]);

    let own = model.coefficient(1, "Temp", "Temp").unwrap();
    let cross = model.coefficient(1, "Wind", "Temp").unwrap();
    assert_relative_eq!(
        warmer.value(0, "Temp").unwrap() - baseline.value(0, "Temp").unwrap(),
        own,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        warmer.value(0, "Wind").unwrap() - baseline.value(0, "Wind").unwrap(),
        cross,
        epsilon = 1e-9
    );
}

/// Hourly Temp/Wind series whose second lag carries most of the memory
fn second_order_weather(len: usize, seed: u64) -> MultivariateSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();

    let mut rows: Vec<Vec<f64>> = vec![vec![25.0, 3.0], vec![25.0, 3.0]];
    for t in 2..len {
        let (prev, prev2) = (&rows[t - 1], &rows[t - 2]);
        let temp = 5.0 + 0.2 * prev[0] + 0.6 * prev2[0] + noise.sample(&mut rng);
        let wind = 0.5 + 0.05 * prev[0] + 0.3 * prev[1] + 0.4 * prev2[1] + noise.sample(&mut rng);
        rows.push(vec![temp, wind]);
    }
    rows.truncate(len);

    let timestamps = (0..len as i64).map(|h| start() + Duration::hours(h)).collect();
    MultivariateSeries::from_rows("RainForest", timestamps, &["Temp", "Wind"], &rows).unwrap()
}

#[test]
fn test_shift_reaches_only_the_first_lag_on_step_one() {
    let series = second_order_weather(400, 4);
    let model = train(&series, 4).unwrap();
    assert!(model.lag_order() >= 2, "selected {}", model.name());

    let delta = 1.5;
    let baseline = simulate(&series, &model, &Adjustment::new(), 3).unwrap();
    let warmer = simulate(&series, &model, &Adjustment::new().with("Temp", delta), 3).unwrap();
    let diff = |row: usize, column: &str| {
        warmer.value(row, column).unwrap() - baseline.value(row, column).unwrap()
    };
    let a = |lag: usize, target: &str, source: &str| model.coefficient(lag, target, source).unwrap();

    // Step one sees the shifted row only at lag 1; the earlier seed rows are untouched.
    assert_relative_eq!(diff(0, "Temp"), a(1, "Temp", "Temp") * delta, epsilon = 1e-9);
    assert_relative_eq!(diff(0, "Wind"), a(1, "Wind", "Temp") * delta, epsilon = 1e-9);
    assert!((diff(0, "Temp") - (a(1, "Temp", "Temp") + a(2, "Temp", "Temp")) * delta).abs() > 0.1);

    // Step two sees the first projected row at lag 1 and the shifted row at lag 2.
    let expected = a(1, "Temp", "Temp") * diff(0, "Temp")
        + a(1, "Temp", "Wind") * diff(0, "Wind")
        + a(2, "Temp", "Temp") * delta;
    assert_relative_eq!(diff(1, "Temp"), expected, epsilon = 1e-9);
}

#[test]
fn test_large_scenario_batch_completes_in_order() {
    let model = train(&weather(100, 13), 3).unwrap();
    let adjustments: Vec<Adjustment> = (0..50_000)
        .map(|i| Adjustment::new().with("Temp", i as f64 * 1e-3))
        .collect();

    let results = run_scenarios(&model, &adjustments, 2);

    assert_eq!(results.len(), adjustments.len());
    for i in [0, 1, 25_000, 49_999] {
        assert_eq!(
            results[i].as_ref().unwrap(),
            &model.simulate(&adjustments[i], 2).unwrap()
        );
    }
}

#[test]
fn test_forecast_timestamps_continue_at_native_cadence() {
    let series = weather(100, 7);
    let model = train(&series, 3).unwrap();
    let forecast = model.simulate(&Adjustment::new(), 24).unwrap();

    let last = series.last_timestamp().unwrap();
    assert_eq!(forecast.timestamps()[0], last + Duration::hours(1));
    assert!(forecast
        .timestamps()
        .windows(2)
        .all(|w| w[1] - w[0] == Duration::hours(1)));
    assert_eq!(forecast.location(), "RainForest");
    assert_eq!(forecast.model(), model.name());
}

#[test]
fn test_adjustment_touches_only_the_last_seed_row() {
    let series = weather(100, 11);
    let model = train(&series, 3).unwrap();
    let seed_before = model.seed_window().to_vec();

    model
        .simulate(&Adjustment::new().with("Temp", 5.0), 24)
        .unwrap();

    assert_eq!(model.seed_window(), seed_before.as_slice());
    let last_row = series.row(series.len() - 1);
    assert_eq!(
        model.seed_window().last().unwrap(),
        &last_row.into_iter().map(Option::unwrap).collect::<Vec<_>>()
    );
}

#[test]
fn test_unknown_adjustment_names_are_ignored() {
    let series = weather(100, 3);
    let model = train(&series, 3).unwrap();

    let baseline = model.simulate(&Adjustment::new(), 12).unwrap();
    let ignored = model
        .simulate(&Adjustment::new().with("Pressure", 10.0), 12)
        .unwrap();

    assert_eq!(baseline, ignored);
}

#[rstest]
#[case(100, 3)]
#[case(40, 15)]
#[case(10, 15)]
#[case(3, 5)]
#[case(2, 4)]
fn test_lag_order_within_bounds(#[case] len: usize, #[case] maxlags: usize) {
    let series = weather(len, 99);
    let model = train(&series, maxlags).unwrap();

    assert!(model.lag_order() >= 1);
    assert!(model.lag_order() <= maxlags.min(len - 1));
    assert_eq!(model.seed_window().len(), model.lag_order());
}

#[test]
fn test_tiny_series_falls_back_to_first_order() {
    let series = weather(3, 5);
    let model = train(&series, 5).unwrap();

    assert_eq!(model.lag_order(), 1);
    assert!(matches!(model.selection(), LagSelection::Fallback { .. }));
    assert!(model.aic().is_none());
}

#[test]
fn test_selected_order_reports_aic() {
    let model = train(&weather(200, 21), 4).unwrap();
    assert!(matches!(model.selection(), LagSelection::Criterion { .. }));
    assert!(model.aic().unwrap().is_finite());
}

#[rstest]
#[case(0)]
#[case(1)]
fn test_too_short_series_is_insufficient(#[case] len: usize) {
    let series = weather(len, 1);
    assert!(matches!(
        train(&series, 3),
        Err(ForecastError::InsufficientData(_))
    ));
}

#[test]
fn test_training_rejects_gaps() {
    let series = MultivariateSeries::new(
        "Desert",
        (0..4).map(|h| start() + Duration::hours(h)).collect(),
        vec![("Desert_Temp".to_string(), vec![Some(1.0), None, Some(3.0), Some(2.0)])],
    )
    .unwrap();

    assert!(matches!(train(&series, 2), Err(ForecastError::DataError(_))));
}

#[test]
fn test_zero_steps_is_rejected() {
    let model = train(&weather(50, 2), 2).unwrap();
    assert!(matches!(
        model.simulate(&Adjustment::new(), 0),
        Err(ForecastError::InvalidParameter(_))
    ));
}

#[test]
fn test_divergent_projection_is_an_error() {
    let model = train(&weather(50, 2), 2).unwrap();
    let result = model.simulate(&Adjustment::new().with("Temp", f64::INFINITY), 5);
    assert!(matches!(result, Err(ForecastError::SimulationError(_))));
}

#[test]
fn test_simulate_rejects_foreign_series() {
    let series = weather(60, 8);
    let model = train(&series, 2).unwrap();
    let other = weather(80, 8);

    assert!(matches!(
        simulate(&other, &model, &Adjustment::new(), 5),
        Err(ForecastError::SimulationError(_))
    ));
}

#[test]
fn test_parallel_scenarios_match_sequential_runs() {
    let model = train(&weather(100, 13), 3).unwrap();
    let adjustments = vec![
        Adjustment::new(),
        Adjustment::new().with("Temp", 1.0),
        Adjustment::new().with("Wind", -2.0),
        Adjustment::new().with("Temp", -1.0).with("Wind", 0.5),
    ];

    let results = run_scenarios(&model, &adjustments, 24);

    assert_eq!(results.len(), adjustments.len());
    for (result, adjustment) in results.into_iter().zip(&adjustments) {
        assert_eq!(result.unwrap(), model.simulate(adjustment, 24).unwrap());
    }
}

#[test]
fn test_session_reuses_and_discards_model() {
    let mut session = ScenarioSession::new(weather(100, 17), 3).unwrap();
    assert!(!session.is_trained());

    let first = session.run(&Adjustment::new(), 6).unwrap();
    assert!(session.is_trained());
    let again = session.run(&Adjustment::new(), 6).unwrap();
    assert_eq!(first, again);

    let batch = session
        .run_many(&[Adjustment::new(), Adjustment::new().with("Temp", 2.0)], 6)
        .unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].as_ref().unwrap(), &first);

    session.replace_series(weather(120, 17));
    assert!(!session.is_trained());
    let refreshed = session.run(&Adjustment::new(), 6).unwrap();
    assert_eq!(
        refreshed.timestamps()[0],
        start() + Duration::hours(120)
    );
}
