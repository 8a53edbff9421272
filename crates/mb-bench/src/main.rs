use std::error::Error;
use std::process::ExitCode;

use mb_bench::{BenchConfig, Driver, Report, Result};
use mb_matrix::{ExecutionPlan, GpuContext, TransferPolicy};

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(report) => {
            print!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<Report> {
    let config = BenchConfig::from_env()?;
    log::info!(
        "Benchmarking {n}x{n} matmul with {} warm-up executions",
        config.warmup,
        n = config.size
    );

    let ctx = GpuContext::new()?;
    let mut driver = Driver::new(config);
    let mut operands = driver.init()?;
    let report = driver.run(&mut operands, |a, b| {
        ExecutionPlan::build(&ctx, a, b, TransferPolicy::default())
    })?;
    Ok(report)
}
