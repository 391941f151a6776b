use era5_downsample::config::{ChainKind, PipelineConfig};
use era5_downsample::logging;
use era5_downsample::pipeline::{run_chain, run_mean_annual, StageReport};

fn main() {
    let config = match PipelineConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(config.verbosity);

    if let Err(e) = run(&config) {
        eprintln!("Pipeline error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: &PipelineConfig) -> era5_downsample::Result<()> {
    match config.chain {
        ChainKind::HourlyDailyYearly | ChainKind::MonthlyYearly => {
            let plans = config.plan()?;
            let reports = run_chain(&plans);
            print_reports(&reports);
            let failures: usize = reports.iter().map(StageReport::failures).sum();
            if failures > 0 {
                eprintln!("{} period(s) failed", failures);
                std::process::exit(1);
            }
        }
        ChainKind::MeanAnnual => {
            let output = run_mean_annual(&config.mean_annual())?;
            println!("Wrote {}", output.display());
        }
    }
    Ok(())
}

fn print_reports(reports: &[StageReport]) {
    for report in reports {
        let ok = report.outcomes.len() - report.failures();
        println!(
            "Stage {}: {}/{} period(s) complete",
            report.stage,
            ok,
            report.outcomes.len()
        );
        for outcome in &report.outcomes {
            match (&outcome.output, &outcome.error) {
                (Some(path), _) => {
                    println!("  {} -> {}", outcome.period, path.display());
                }
                (None, Some(e)) => {
                    println!("  {} failed while {}: {}", outcome.period, outcome.state, e);
                }
                (None, None) => {}
            }
        }
    }
}
