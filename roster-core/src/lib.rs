//! # roster-core: residency posting allocation engine
//!
//! This crate assigns a cohort of medical residents to monthly postings
//! across a twelve-month academic year. The residency program's rules are
//! encoded as hard and soft constraints over Boolean block-assignment
//! variables in a CP-SAT model; the solver maximizes a weighted objective
//! over elective preferences, seniority and curriculum progress, and the
//! raw solution is folded back into resident-centric history rows and
//! cohort statistics.
//!
//! The pipeline has three stages:
//!
//! 1. **Progress derivation** ([`progress`]) aggregates each resident's
//!    history into the per-posting counts the constraints consult.
//! 2. **Scheduling** builds the CP model (one Boolean per resident,
//!    posting and month plus selection, run-count and off variables),
//!    applies the hard and soft constraint set and solves.
//! 3. **Post-processing** merges solver values into current-year history
//!    rows and computes per-resident summaries and cohort statistics.
//!
//! ## Quick Example
//!
//! ```no_run
//! use roster_core::{allocate_timetable, models::*};
//!
//! let input = AllocatorInput {
//!     residents: vec![Resident {
//!         mcr: "M001".to_string(),
//!         name: "Alice".to_string(),
//!         resident_year: 1,
//!         career_blocks_completed: 0,
//!     }],
//!     resident_history: vec![],
//!     resident_preferences: vec![],
//!     resident_sr_preferences: vec![],
//!     postings: vec![Posting {
//!         posting_code: "GM (KTPH)".to_string(),
//!         posting_name: "General Medicine".to_string(),
//!         posting_type: PostingType::Core,
//!         max_residents: 2,
//!         required_block_duration: 1,
//!     }],
//!     resident_leaves: vec![],
//!     pinned_assignments: Default::default(),
//!     weightages: Weightages::default(),
//!     max_time_in_minutes: Some(1),
//! };
//!
//! match allocate_timetable(&input) {
//!     Ok(output) => println!("{}", output.display()),
//!     Err(e) => eprintln!("allocation failed: {e}"),
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

pub mod diagnose;
pub mod models;
pub mod progress;

mod postprocess;
mod scheduler;

use models::{AllocatorInput, AllocatorOutput};

/// Errors surfaced by the allocator.
#[derive(Error, Debug, Serialize)]
pub enum AllocatorError {
    /// The input tables are malformed: missing or duplicate identifiers,
    /// out-of-range months, or preferences naming unknown postings.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The hard constraint set admits no assignment. The message carries
    /// the solver's sufficient-assumption set when one is available.
    #[error("model is infeasible: {0}")]
    Infeasible(String),

    /// The solver stopped without a usable solution (unknown status, an
    /// invalid model, or the time limit expired before any feasible
    /// assignment was found).
    #[error("solver failed: {0}")]
    SolverFailed(String),
}

/// Runs the full allocation pipeline on one input snapshot.
///
/// Builds the CP-SAT model, solves it within the configured wall-clock
/// limit (15 minutes by default), and post-processes the best solution
/// into the output document. A solve that hits the time limit with a
/// feasible solution still succeeds with the best assignment found.
///
/// # Errors
///
/// - [`AllocatorError::InvalidInput`] before the solve, for malformed
///   tables.
/// - [`AllocatorError::Infeasible`] when the hard constraints admit no
///   assignment (for example contradictory pins).
/// - [`AllocatorError::SolverFailed`] for any other terminal solver
///   status.
pub fn allocate_timetable(input: &AllocatorInput) -> Result<AllocatorOutput, AllocatorError> {
    log::info!("starting posting allocation service");
    let mut ctx = scheduler::ModelContext::new(input)?;
    scheduler::constraints::add_hard_constraints(&mut ctx);
    scheduler::objective::add_soft_constraints_and_objective(&mut ctx);
    let solution = ctx.solve()?;
    log::info!("solver solution accepted, running post-processing");
    Ok(postprocess::compute_postprocess(input, &solution))
}

/// Validates the input tables without building or solving a model.
///
/// Applies the same shape checks the solve path runs first, so a caller
/// can reject malformed uploads cheaply.
pub fn validate_input(input: &AllocatorInput) -> Result<(), AllocatorError> {
    scheduler::validate_input(input)
}
