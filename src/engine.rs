use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::SolverConfig;
use crate::error::InputViolation;
use crate::gate;
use crate::model::CuttingModel;
use crate::plan;
use crate::solver::Solver;
use crate::types::{CutPlan, MaterialJob, PartRow, SolveStatus, StockSpec};

/// Material code used when the caller cuts a single, unnamed material.
pub const DEFAULT_CODE: &str = "default";

/// Result of one material code within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialOutcome {
    pub code: String,
    pub result: Result<CutPlan, InputViolation>,
}

/// Cuts a single material code with the default configuration.
///
/// Returns each bar's pieces and each bar's leftover, index-aligned.
pub fn solve_cutting_stock(
    stock_length: f64,
    pieces: &[f64],
    kerf: f64,
    edge_trim: f64,
) -> Result<(Vec<Vec<f64>>, Vec<f64>), InputViolation> {
    let job = MaterialJob::new(
        DEFAULT_CODE,
        StockSpec::new(stock_length)
            .with_kerf(kerf)
            .with_edge_trim(edge_trim),
        pieces.to_vec(),
    );
    solve_material(&job, &SolverConfig::default()).map(CutPlan::into_bars_and_leftovers)
}

/// Gate, formulate, solve and extract one material code.
pub fn solve_material(job: &MaterialJob, config: &SolverConfig) -> Result<CutPlan, InputViolation> {
    let _span = tracing::debug_span!("material", code = %job.code, pieces = job.pieces.len())
        .entered();

    gate::check(&job.code, &job.stock, &job.pieces)?;
    let model = CuttingModel::formulate(&job.code, &job.stock, &job.pieces)?;
    let solved = Solver::new(&model, config.time_limit).solve();

    if solved.stats.status == SolveStatus::Feasible {
        tracing::warn!(
            code = %job.code,
            bars = model.objective(&solved.assignment),
            lower_bound = solved.stats.lower_bound,
            elapsed_ms = solved.stats.elapsed_ms,
            "time limit reached before optimality was proven"
        );
    }
    tracing::debug!(
        bars = model.objective(&solved.assignment),
        nodes = solved.stats.nodes,
        elapsed_ms = solved.stats.elapsed_ms,
        "solved"
    );

    Ok(plan::extract(
        &job.code,
        &job.stock,
        &job.pieces,
        &model,
        &solved,
    ))
}

/// Solves every job independently on a worker pool.
///
/// Outcomes keep the order of `jobs`; a failing code does not affect the rest.
pub fn optimize_materials(jobs: Vec<MaterialJob>, config: &SolverConfig) -> Vec<MaterialOutcome> {
    let run = |jobs: Vec<MaterialJob>| -> Vec<MaterialOutcome> {
        jobs.into_par_iter()
            .map(|job| {
                let result = solve_material(&job, config);
                if let Err(err) = &result {
                    tracing::info!(code = %job.code, error = %err, "rejected material");
                }
                MaterialOutcome {
                    code: job.code,
                    result,
                }
            })
            .collect()
    };

    if config.threads == 0 {
        return run(jobs);
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
    {
        Ok(pool) => pool.install(|| run(jobs)),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to the global thread pool");
            run(jobs)
        }
    }
}

/// Groups configurator rows by material code, attaches stock specs and solves.
///
/// Codes without a stock spec are reported as `UnknownMaterial`, codes with
/// too many pieces as `TooManyPieces`. Outcomes are sorted by code.
pub fn optimize_parts(
    rows: &[PartRow],
    stocks: &BTreeMap<String, StockSpec>,
    config: &SolverConfig,
) -> Vec<MaterialOutcome> {
    let mut outcomes = Vec::new();
    let mut jobs = Vec::new();
    for (code, pieces) in gate::group_parts(rows) {
        let err = match (stocks.get(&code), pieces) {
            (Some(stock), Ok(pieces)) => {
                jobs.push(MaterialJob::new(code, *stock, pieces));
                continue;
            }
            (None, _) => InputViolation::UnknownMaterial { code: code.clone() },
            (Some(_), Err(err)) => err,
        };
        tracing::info!(code = %code, error = %err, "rejected material");
        outcomes.push(MaterialOutcome {
            code,
            result: Err(err),
        });
    }

    outcomes.extend(optimize_materials(jobs, config));
    outcomes.sort_by(|a, b| a.code.cmp(&b.code));
    outcomes
}
