use anyhow::Result;
use cardia_lib::clean::{clean_intervals, interpolate_gaps};
use cardia_lib::config::{AnomalyConfig, CircadianConfig, CleanConfig, GapConfig, SpectralConfig};
use cardia_lib::detectors::anomaly::{clean_activity, scan_anomalies};
use cardia_lib::io::{activity as activity_io, rr as rr_io};
use cardia_lib::metrics::circadian::{fit_cosinor, trailing_mean};
use cardia_lib::metrics::hrv::{hrv_poincare, hrv_psd, hrv_time};
use cardia_lib::plot::{hr_figure, HrFigure};
use cardia_study::bench::{run_benchmark, write_reports_csv, BenchConfig, ModelKind};
use cardia_study::{assemble_dataset, read_study_config, read_train_table, write_train_table};
use clap::{Parser, Subcommand};
use plotters::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "cardia",
    version,
    about = "Cardia: wearable heart-interval feature pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean ectopic intervals and close repairable gaps in an RR recording
    PreprocessRr {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 0.3)]
        min_ibi_s: f64,
        #[arg(long, default_value_t = 2.0)]
        max_ibi_s: f64,
        #[arg(long, default_value_t = 2.0)]
        min_gap_s: f64,
        #[arg(long, default_value_t = 10.0)]
        max_gap_s: f64,
    },
    /// Drop impossible heart rates and flag unexplained resting spikes
    PreprocessActivity {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 100.0)]
        rest_hr: f64,
        #[arg(long, default_value_t = 50.0)]
        min_hr: f64,
        #[arg(long, default_value_t = 200.0)]
        max_hr: f64,
    },
    /// Full HRV metric block (time, frequency, Poincaré) for one recording
    Hrv {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 7.0)]
        interp_fs: f64,
    },
    /// Cosinor rhythm fit for one recording
    Circadian {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 60)]
        smooth_window: usize,
    },
    /// Assemble the per-subject feature table for a whole study
    Extract {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Leave-one-subject-out benchmark over a feature table
    Bench {
        #[arg(long)]
        train: PathBuf,
        #[arg(long, default_value = "STAI2")]
        target: String,
        #[arg(long, default_value_t = 0.1)]
        selection_threshold: f64,
        #[arg(long, default_value_t = 1.0)]
        ridge_lambda: f64,
        #[arg(long, default_value_t = 5)]
        knn_k: usize,
        /// Also write the per-model summary table here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render the smoothed HR curve with its fitted rhythm to a PNG
    PlotHr {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 60)]
        smooth_window: usize,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::PreprocessRr {
            input,
            output,
            min_ibi_s,
            max_ibi_s,
            min_gap_s,
            max_gap_s,
        } => cmd_preprocess_rr(&input, &output, min_ibi_s, max_ibi_s, min_gap_s, max_gap_s)?,
        Commands::PreprocessActivity {
            input,
            output,
            rest_hr,
            min_hr,
            max_hr,
        } => cmd_preprocess_activity(&input, &output, rest_hr, min_hr, max_hr)?,
        Commands::Hrv { input, interp_fs } => cmd_hrv(&input, interp_fs)?,
        Commands::Circadian {
            input,
            smooth_window,
        } => cmd_circadian(&input, smooth_window)?,
        Commands::Extract { config, output } => cmd_extract(&config, &output)?,
        Commands::Bench {
            train,
            target,
            selection_threshold,
            ridge_lambda,
            knn_k,
            output,
        } => cmd_bench(
            &train,
            &target,
            selection_threshold,
            ridge_lambda,
            knn_k,
            output.as_deref(),
        )?,
        Commands::PlotHr {
            input,
            out,
            smooth_window,
        } => cmd_plot_hr(&input, &out, smooth_window)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct PreprocessSummary {
    total: usize,
    removed: usize,
    gaps_interpolated: usize,
    samples_added: usize,
    final_samples: usize,
}

fn cmd_preprocess_rr(
    input: &Path,
    output: &Path,
    min_ibi_s: f64,
    max_ibi_s: f64,
    min_gap_s: f64,
    max_gap_s: f64,
) -> Result<()> {
    let raw = rr_io::read_rr_csv(input)?;
    let (cleaned, clean_report) = clean_intervals(
        &raw,
        &CleanConfig {
            min_ibi_s,
            max_ibi_s,
        },
    );
    let (repaired, gap_report) = interpolate_gaps(
        &cleaned,
        &GapConfig {
            min_gap_s,
            max_gap_s,
        },
    );
    rr_io::write_rr_csv(output, &repaired)?;
    let summary = PreprocessSummary {
        total: clean_report.total,
        removed: clean_report.removed,
        gaps_interpolated: gap_report.pairs_interpolated,
        samples_added: gap_report.samples_added,
        final_samples: repaired.len(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

#[derive(Serialize)]
struct ActivitySummary {
    total: usize,
    removed: usize,
    candidates: usize,
    n_anomalies: usize,
    anomaly_pct: f64,
}

fn cmd_preprocess_activity(
    input: &Path,
    output: &Path,
    rest_hr: f64,
    min_hr: f64,
    max_hr: f64,
) -> Result<()> {
    let cfg = AnomalyConfig {
        rest_hr_threshold: rest_hr,
        min_hr,
        max_hr,
        ..AnomalyConfig::default()
    };
    let rows = activity_io::read_activity_csv(input)?;
    let (kept, report) = clean_activity(&rows, &cfg);
    let scan = scan_anomalies(&kept, &cfg);
    activity_io::write_activity_csv(output, &kept, &scan.flags)?;
    let summary = ActivitySummary {
        total: report.total,
        removed: report.removed,
        candidates: scan.candidates,
        n_anomalies: scan.n_anomalies,
        anomaly_pct: scan.anomaly_pct,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_hrv(input: &Path, interp_fs: f64) -> Result<()> {
    let series = rr_io::read_rr_csv(input)?;
    let spectral = SpectralConfig {
        fs_hz: interp_fs,
        ..SpectralConfig::default()
    };
    let output = serde_json::json!({
        "time": hrv_time(&series),
        "psd": hrv_psd(&series, &spectral),
        "poincare": hrv_poincare(&series),
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn cmd_circadian(input: &Path, smooth_window: usize) -> Result<()> {
    let series = rr_io::read_rr_csv(input)?;
    let cfg = CircadianConfig {
        smooth_window,
        ..CircadianConfig::default()
    };
    let smoothed = trailing_mean(&series.instantaneous_hr(), cfg.smooth_window);
    let fit = fit_cosinor(&series.elapsed_times(), &smoothed, &cfg)?;
    println!("{}", serde_json::to_string(&fit)?);
    Ok(())
}

fn cmd_extract(config: &Path, output: &Path) -> Result<()> {
    let cfg = read_study_config(config)?;
    let (table, report) = assemble_dataset(&cfg)?;
    write_train_table(output, &table)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_bench(
    train: &Path,
    target: &str,
    selection_threshold: f64,
    ridge_lambda: f64,
    knn_k: usize,
    output: Option<&Path>,
) -> Result<()> {
    let table = read_train_table(train, target)?;
    let cfg = BenchConfig {
        selection_threshold,
        models: vec![
            ModelKind::Linear,
            ModelKind::Ridge {
                lambda: ridge_lambda,
            },
            ModelKind::Knn { k: knn_k },
        ],
    };
    let reports = run_benchmark(&table, &cfg)?;
    if let Some(path) = output {
        write_reports_csv(path, &reports)?;
    }
    println!("{}", serde_json::to_string(&reports)?);
    Ok(())
}

fn cmd_plot_hr(input: &Path, out: &Path, smooth_window: usize) -> Result<()> {
    let series = rr_io::read_rr_csv(input)?;
    let circadian = CircadianConfig {
        smooth_window,
        ..CircadianConfig::default()
    };
    let smoothed = trailing_mean(&series.instantaneous_hr(), smooth_window);
    let fit = fit_cosinor(&series.elapsed_times(), &smoothed, &circadian).ok();
    let title = input.display().to_string();
    let figure = hr_figure(&title, &series, fit.as_ref(), smooth_window, 2048);
    draw_hr_figure(out, &figure)?;
    Ok(())
}

fn draw_hr_figure(path: &Path, figure: &HrFigure) -> Result<()> {
    let backend = BitMapBackend::new(path, (900, 480));
    let root = backend.into_drawing_area();
    root.fill(&WHITE)?;

    let all_points = figure.hr_points.iter().chain(&figure.fit_points);
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in all_points {
        x_min = x_min.min(p[0]);
        x_max = x_max.max(p[0]);
        y_min = y_min.min(p[1]);
        y_max = y_max.max(p[1]);
    }
    if !x_min.is_finite() || x_max <= x_min {
        anyhow::bail!("nothing to plot");
    }
    let pad = ((y_max - y_min) * 0.1).max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(&figure.title, ("sans-serif", 22))
        .x_label_area_size(30)
        .y_label_area_size(45)
        .build_cartesian_2d(x_min..x_max, (y_min - pad)..(y_max + pad))?;
    chart.configure_mesh().draw()?;
    chart.draw_series(LineSeries::new(
        figure.hr_points.iter().map(|p| (p[0], p[1])),
        &RGBColor(0x00, 0x77, 0xAA),
    ))?;
    if !figure.fit_points.is_empty() {
        chart.draw_series(LineSeries::new(
            figure.fit_points.iter().map(|p| (p[0], p[1])),
            &RGBColor(0xDD, 0x33, 0x22),
        ))?;
    }
    root.present()?;
    Ok(())
}
