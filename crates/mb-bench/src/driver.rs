use std::time::Instant;

use mb_matrix::{
    Matrix, Multiplier, OffloadPlan, Operands, RowTaskMultiplier, SequentialMultiplier, A_FILL,
    B_FILL,
};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::report::{Report, Strategy, Timing};

/// Driver progress, in the order the stages are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Init,
    BuildPlan,
    Warmup,
    TimeOffload,
    TimeConcurrent,
    TimeSequential,
    Report,
    Done,
}

/// Runs the benchmark: initialize operands, build and warm up the offload
/// plan, then time one run of each strategy.
///
/// Strategies run strictly one after another over the same operands, so C
/// is never written by two strategies at once. Any error aborts the run.
#[derive(Debug)]
pub struct Driver {
    config: BenchConfig,
    row_tasks: RowTaskMultiplier,
    sequential: SequentialMultiplier,
    stage: Stage,
}

impl Driver {
    pub fn new(config: BenchConfig) -> Self {
        Driver {
            config,
            row_tasks: RowTaskMultiplier::new(),
            sequential: SequentialMultiplier::new(),
            stage: Stage::Idle,
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// The last stage entered. After a failed run this is the stage that
    /// failed.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("driver stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Allocate the shared operands: A filled with 1.0, B with 2.0, C zeroed.
    pub fn init(&mut self) -> Result<Operands> {
        self.enter(Stage::Init);
        let operands = Operands::constant(self.config.size, A_FILL, B_FILL)?;
        log::info!(
            "Initialized {n}x{n} operands ({} f32 elements each)",
            operands.a.len(),
            n = operands.n()
        );
        Ok(operands)
    }

    /// Run every stage after `Init` over `operands`.
    ///
    /// `build_plan` binds the offload kernel to A and B. The plan is executed
    /// `warmup` times untimed, then once timed, and dropped before the CPU
    /// strategies run.
    pub fn run<'o, P, F>(&mut self, operands: &'o mut Operands, build_plan: F) -> Result<Report>
    where
        P: OffloadPlan,
        F: FnOnce(&'o Matrix, &'o Matrix) -> mb_matrix::Result<P>,
    {
        let Operands { a, b, c } = operands;
        let a: &'o Matrix = a;
        let b: &'o Matrix = b;

        self.enter(Stage::BuildPlan);
        let mut plan = build_plan(a, b)?;

        self.enter(Stage::Warmup);
        for _ in 0..self.config.warmup {
            plan.execute()?;
        }
        log::info!("Offload warm-up done ({} executions)", self.config.warmup);

        self.enter(Stage::TimeOffload);
        let offload = time(Strategy::Offload, || plan.execute())?;
        let plan_executions = plan.executions();
        drop(plan);

        self.enter(Stage::TimeConcurrent);
        let row_tasks = time(Strategy::RowTasks, || self.row_tasks.multiply(a, b, c))?;

        self.enter(Stage::TimeSequential);
        let sequential = time(Strategy::Sequential, || self.sequential.multiply(a, b, c))?;

        self.enter(Stage::Report);
        let report = Report {
            timings: vec![offload, row_tasks, sequential],
            plan_executions,
        };

        self.enter(Stage::Done);
        Ok(report)
    }
}

fn time(strategy: Strategy, run: impl FnOnce() -> mb_matrix::Result<()>) -> Result<Timing> {
    let start = Instant::now();
    run()?;
    let timing = Timing {
        strategy,
        elapsed: start.elapsed(),
    };
    log::info!("{} finished in {:.3} ms", strategy.label(), timing.millis());
    Ok(timing)
}
