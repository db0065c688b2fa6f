use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use scenario_forecast::{run_scenarios, simulate, train, Adjustment};
use sensor_ingest::MultivariateSeries;

const TEMP: &str = "RainForest_Canopy_Temp";
const WIND: &str = "RainForest_Canopy_Wind";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Ecosim: Basic Scenario Example");
    println!("==============================\n");

    let series = create_sample_station(240)?;
    println!(
        "Sample station created: {} hourly rows, columns {:?}\n",
        series.len(),
        series.column_names()
    );

    // Fit once; every scenario below reuses the same model
    let model = train(&series, 6)?;
    println!("Trained {} ({:?})", model.name(), model.selection());
    println!(
        "Own-lag temperature coefficient: {:.3}\n",
        model.coefficient(1, TEMP, TEMP).unwrap_or(f64::NAN)
    );

    let baseline = simulate(&series, &model, &Adjustment::new(), 12)?;
    let warmer = simulate(&series, &model, &Adjustment::new().with(TEMP, 1.5), 12)?;

    println!("Hour  baseline  +1.5C   difference");
    for (h, ts) in baseline.timestamps().iter().enumerate() {
        let base = baseline.value(h, TEMP).unwrap_or(f64::NAN);
        let warm = warmer.value(h, TEMP).unwrap_or(f64::NAN);
        println!("{}  {:7.2}  {:7.2}  {:+.3}", ts.format("%H:%M"), base, warm, warm - base);
    }

    // A small sweep of wind changes, run in parallel
    let sweep: Vec<Adjustment> = [-2.0, -1.0, 1.0, 2.0]
        .iter()
        .map(|delta| Adjustment::new().with(WIND, *delta))
        .collect();
    println!("\nWind sweep, temperature after 12 hours:");
    for (adjustment, result) in sweep.iter().zip(run_scenarios(&model, &sweep, 12)) {
        let forecast = result?;
        println!(
            "  wind {:+.1}: {:.2}",
            adjustment.get(WIND).unwrap_or(0.0),
            forecast.value(11, TEMP).unwrap_or(f64::NAN)
        );
    }

    println!("\nJSON export of the warmer scenario:\n{}", warmer.to_json()?);
    Ok(())
}

/// Canopy temperature and wind that feed back on each other, with noise
fn create_sample_station(hours: usize) -> Result<MultivariateSeries, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2025, 2, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("invalid start date")?;
    let mut rng = StdRng::seed_from_u64(2025);
    let noise = Normal::new(0.0, 0.4)?;

    let (mut temp, mut wind) = (24.0, 3.0);
    let mut rows = Vec::with_capacity(hours);
    for _ in 0..hours {
        let next_temp = 6.0 + 0.75 * temp - 0.3 * wind + noise.sample(&mut rng);
        let next_wind = 1.5 + 0.02 * temp + 0.4 * wind + noise.sample(&mut rng);
        temp = next_temp;
        wind = next_wind;
        rows.push(vec![temp, wind]);
    }

    let timestamps = (0..hours as i64)
        .map(|h| start + Duration::hours(h))
        .collect();
    Ok(MultivariateSeries::from_rows(
        "RainForest",
        timestamps,
        &[TEMP, WIND],
        &rows,
    )?)
}
