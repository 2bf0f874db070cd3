use std::env;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use estimator::{
    EstimateServices, EstimatorConfig, GeoState, HttpServices, Orchestrator, SignalBoard, Signals,
};
use foundation::{DeviceProfile, GeoPoint, SearchArea};
use runtime::AsyncSignal;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Estimate idle-device offload and impact for one area")]
struct Args {
    /// Center latitude in degrees
    #[arg(long, default_value_t = 33.753746, allow_hyphen_values = true)]
    lat: f64,

    /// Center longitude in degrees
    #[arg(long, default_value_t = -84.386330, allow_hyphen_values = true)]
    lon: f64,

    /// Search radius in meters (clamped to 100..=10000)
    #[arg(long, default_value_t = 800)]
    radius: u32,

    /// Average CPU utilization, 0..1 (must stay below --gpu)
    #[arg(long, default_value_t = 0.35)]
    cpu: f64,

    /// Average GPU utilization, 0..1
    #[arg(long, default_value_t = 0.65)]
    gpu: f64,

    /// Available machines
    #[arg(long, default_value_t = 120)]
    machines: u32,

    /// One-minute load average sent to the wattage model
    #[arg(long)]
    load: Option<f64>,

    /// Proxy server base URL (overrides SUPA_SERVER_URL)
    #[arg(long)]
    server: Option<String>,

    /// Seconds to wait for the report
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Print the signal board as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = EstimatorConfig::from_lookup(|key| match key {
        "SUPA_SERVER_URL" if args.server.is_some() => args.server.clone(),
        _ => env::var(key).ok(),
    });

    let mut profile = DeviceProfile::new(args.cpu, args.gpu, args.machines)?;
    if let Some(load) = args.load {
        profile = profile.with_load_mean(load)?;
    }
    let area = SearchArea::new(GeoPoint::new(args.lat, args.lon), args.radius);
    if area.radius_meters() != args.radius {
        warn!(
            requested = args.radius,
            used = area.radius_meters(),
            "radius clamped"
        );
    }

    let state = GeoState::new(area, profile);
    let services: Arc<dyn EstimateServices> = Arc::new(HttpServices::new(
        reqwest::Client::new(),
        config.endpoints.clone(),
    ));
    let orchestrator = Orchestrator::mount(services, &state, config.delays);
    info!(population = %config.endpoints.population, "estimating");

    let mut signals = orchestrator.signals();
    let board = match tokio::time::timeout(
        Duration::from_secs(args.timeout),
        wait_until_settled(&mut signals),
    )
    .await
    {
        Ok(board) => board,
        Err(_) => {
            warn!(secs = args.timeout, "timed out waiting for the report");
            signals.board()
        }
    };

    if args.json {
        let out = json!({
            "area": area,
            "profile": profile,
            "signals": board,
            "metrics": orchestrator.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_board(&area, &board);
    }

    if board.report.value().is_none() {
        anyhow::bail!("no impact report was produced");
    }
    Ok(())
}

/// Returns once the report has settled, or once nothing is loading and some
/// upstream failed so the report can never be requested.
async fn wait_until_settled(signals: &mut Signals) -> SignalBoard {
    loop {
        let board = signals.board();
        if board.report_settled() || (!board.any_loading() && !board.errors().is_empty()) {
            return board;
        }
        if !signals.changed().await {
            return signals.board();
        }
    }
}

fn describe<T>(signal: &AsyncSignal<T>, show: impl Fn(&T) -> String) -> String {
    match (signal.value(), signal.error()) {
        (_, Some(err)) => format!("error: {err}"),
        (Some(v), None) if signal.is_loading() => format!("{} (refreshing)", show(v)),
        (Some(v), None) => show(v),
        (None, None) if signal.is_loading() => "loading".to_string(),
        (None, None) => "-".to_string(),
    }
}

fn print_board(area: &SearchArea, board: &SignalBoard) {
    let c = area.center();
    println!(
        "Area:              {:.6}, {:.6} (radius {} m)",
        c.latitude,
        c.longitude,
        area.radius_meters()
    );
    println!(
        "Traffic signals:   {}",
        describe(&board.traffic_signals, |n| n.to_string())
    );
    println!(
        "Population:        {}",
        describe(&board.population, |p| format!("{p:.0}"))
    );
    println!(
        "Conditions:        {}",
        describe(&board.conditions, |c| format!(
            "{:.1} C, {:.0}% RH, US AQI {:.0}",
            c.weather.temperature_c, c.weather.relative_humidity_pct, c.air_quality.us_aqi
        ))
    );
    println!(
        "Predicted wattage: {}",
        describe(&board.wattage, |w| format!("{w:.1} W"))
    );
    println!(
        "Allocation:        {}",
        describe(&board.allocation, |a| format!(
            "{:.2} of {:.2} kW placed ({:.1}%), capacity {:.2} kW",
            a.raw_kw_offload,
            a.offload_needed_kw,
            a.percent_offload * 100.0,
            a.max_offload_capacity_kw
        ))
    );
    if let Some(a) = board.allocation.value() {
        for (class, count) in &a.counts_by_device_class {
            let kw = a.offload_per_device_class_kw.get(class).copied().unwrap_or(0.0);
            println!("  {class:<14} {count:>8} devices {kw:>10.3} kW");
        }
    }

    println!("Report:            {}", describe(&board.report, |_| "ready".to_string()));
    if let Some(r) = board.report.value() {
        let cost = &r.cost_saving;
        let env = &r.environmental_impact;
        println!("  fuel saved:          {}", cost.fuel_saved);
        println!("  electricity saved:   {}", cost.electricity_saved);
        println!("  money saved:         {}", cost.money_saved);
        println!("  ROI:                 {}", cost.roi);
        println!("  CO2 reduced:         {}", env.co2_reduced);
        println!("  water saved:         {}", env.water_saved);
        println!("  noise:               {}", env.noise_pollution_reduction);
        println!("  recycling:           {}", env.recycling);
        for (i, insight) in r.ai_insights.iter().enumerate() {
            println!("  {}. {insight}", i + 1);
        }
    }
}
