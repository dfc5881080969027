//! The constraint-programming scheduler.
//!
//! This module owns the CP-SAT model: decision variables (one Boolean per
//! resident/posting/block plus off-slack, selection flags and run counts),
//! the pre-solve normalization of pins and leaves, and the solve protocol.
//! Hard constraints live in [`constraints`], the soft constraints and the
//! maximized objective in [`objective`], and the DFA primitive both lean on
//! in [`automaton`].

pub mod automaton;
pub mod constraints;
pub mod objective;

use crate::models::{AllocatorInput, HistoryRow, PostingType};
use crate::progress::{self, base_code, stage_from_blocks, PostingProgress};
use crate::AllocatorError;
use cp_sat::builder::{BoolVar, CpModelBuilder, IntVar, LinearExpr};
use cp_sat::proto::{CpSolverStatus, SatParameters};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Number of month blocks in an academic year.
pub(crate) const NUM_BLOCKS: u32 = 12;
/// December is block 6; January is block 7. Runs must not straddle them.
pub(crate) const DEC: u32 = 6;
pub(crate) const JAN: u32 = 7;

/// Default solver wall-clock cap, in minutes.
const DEFAULT_MAX_TIME_MINUTES: u64 = 15;

pub(crate) fn block_range() -> impl Iterator<Item = u32> {
    1..=NUM_BLOCKS
}

pub(crate) fn early_blocks() -> impl Iterator<Item = u32> {
    1..=DEC
}

pub(crate) fn late_blocks() -> impl Iterator<Item = u32> {
    JAN..=NUM_BLOCKS
}

pub(crate) fn bidx(block: u32) -> usize {
    (block - 1) as usize
}

/// Sum of Boolean variables as a linear expression.
pub(crate) fn bool_sum<'v>(vars: impl IntoIterator<Item = &'v BoolVar>) -> LinearExpr {
    let mut expr = LinearExpr::from(0);
    for var in vars {
        expr = expr + LinearExpr::from(var.clone());
    }
    expr
}

/// `coefficient * var` for a Boolean variable.
pub(crate) fn scaled_bool(var: &BoolVar, coefficient: i64) -> LinearExpr {
    vec![(coefficient, var.clone())].into_iter().collect()
}

/// `coefficient * var` for an integer variable, expanded as repeated
/// addition over the builder's expression type.
pub(crate) fn scaled_int(var: &IntVar, coefficient: i64) -> LinearExpr {
    let mut expr = LinearExpr::from(0);
    for _ in 0..coefficient {
        expr = expr + LinearExpr::from(var.clone());
    }
    expr
}

/// Sum of integer variables as a linear expression.
pub(crate) fn int_sum<'v>(vars: impl IntoIterator<Item = &'v IntVar>) -> LinearExpr {
    let mut expr = LinearExpr::from(0);
    for var in vars {
        expr = expr + LinearExpr::from(var.clone());
    }
    expr
}

/// Leave metadata for one (resident, block).
#[derive(Debug, Clone)]
pub(crate) struct LeaveInfo {
    pub leave_type: String,
    pub posting_code: String,
}

/// Career progress derived for one resident: the stage entering the year
/// and the stage at each month, assuming every month advances the counter.
#[derive(Debug, Clone)]
pub(crate) struct CareerProgress {
    pub completed_blocks: i64,
    pub stages_by_block: [u8; NUM_BLOCKS as usize],
}

impl CareerProgress {
    pub fn stage1_blocks(&self) -> Vec<u32> {
        self.blocks_in_stage(1)
    }

    pub fn blocks_in_stage(&self, stage: u8) -> Vec<u32> {
        block_range()
            .filter(|&b| self.stages_by_block[bidx(b)] == stage)
            .collect()
    }

    pub fn stages_present(&self) -> BTreeSet<u8> {
        self.stages_by_block.iter().copied().collect()
    }
}

/// Normalized senior-rotation preferences for one resident.
///
/// SR bases whose variants are not offered are dropped, as are elective SR
/// bases that compete with the resident's own elective preferences; the
/// survivors are re-ranked 1..n.
#[derive(Debug, Clone)]
pub(crate) struct SrContext {
    /// (re-assigned rank, base posting), rank order
    pub updated_sr_prefs: Vec<(u32, String)>,
    /// Bases of the resident's own elective preferences
    pub elective_pref_bases: BTreeSet<String>,
    /// Posting indices of every variant of the surviving bases
    pub sr_variants: Vec<usize>,
}

/// One (resident, block) cell of the raw solver solution.
#[derive(Debug, Clone)]
pub(crate) struct SolutionEntry {
    pub mcr: String,
    pub month_block: u32,
    pub assigned_posting: String,
    pub is_off: bool,
}

/// Everything post-processing needs from a successful solve.
#[derive(Debug, Clone)]
pub(crate) struct SolverSolution {
    pub entries: Vec<SolutionEntry>,
    pub leave_map: HashMap<String, BTreeMap<u32, LeaveInfo>>,
    pub filtered_history: Vec<HistoryRow>,
}

/// The model under construction, with every index the constraint and
/// objective builders consult.
///
/// Residents and postings are mapped to dense indices once; the variable
/// tables are indexed `[resident][posting][block - 1]`.
pub(crate) struct ModelContext<'a> {
    pub model: CpModelBuilder,
    pub input: &'a AllocatorInput,

    pub posting_codes: Vec<String>,
    pub code_to_idx: HashMap<String, usize>,
    pub mcrs: Vec<String>,
    pub mcr_to_idx: HashMap<String, usize>,

    pub core_postings: Vec<usize>,
    pub elective_postings: Vec<usize>,
    pub elective_bases: BTreeSet<String>,
    pub ed_postings: Vec<usize>,
    pub grm_postings: Vec<usize>,
    pub gm_postings: Vec<usize>,

    /// x[r][p][b-1]: resident r assigned to posting p in block b
    pub x: Vec<Vec<Vec<BoolVar>>>,
    /// off[r][b-1]: resident r unassigned in block b
    pub off: Vec<Vec<BoolVar>>,
    /// sel[r][p]: resident r runs posting p at least once this year
    pub sel: Vec<Vec<BoolVar>>,
    /// run_count[r][p]: number of complete runs of posting p
    pub run_count: Vec<Vec<IntVar>>,

    pub filtered_history: Vec<HistoryRow>,
    pub pins: BTreeMap<String, BTreeMap<u32, String>>,
    pub leave_map: HashMap<String, BTreeMap<u32, LeaveInfo>>,
    pub leave_off_blocks: HashSet<(usize, u32)>,
    /// Capacity slots reserved by leaves, per (posting index, block)
    pub leave_quota: HashMap<(usize, u32), i64>,

    pub career: Vec<CareerProgress>,
    pub posting_progress: HashMap<String, HashMap<String, PostingProgress>>,
    /// Elective preferences per resident, rank -> posting code
    pub pref_map: HashMap<String, BTreeMap<u32, String>>,
    /// SR preferences per resident, rank -> base posting
    pub sr_pref_map: HashMap<String, BTreeMap<u32, String>>,
    /// Normalized SR preferences for residents that have any usable ones
    pub sr_context: HashMap<String, SrContext>,

    /// Weighted Boolean terms of the maximized objective
    pub objective_terms: Vec<(i64, BoolVar)>,
    /// Constant offset of the objective
    pub objective_offset: i64,
}

impl<'a> ModelContext<'a> {
    /// Validates the input, normalizes pins and leaves, derives career
    /// progress, and declares the full variable model.
    pub fn new(input: &'a AllocatorInput) -> Result<Self, AllocatorError> {
        validate_input(input)?;

        log::info!(
            "building allocation model: {} residents, {} postings",
            input.residents.len(),
            input.postings.len()
        );

        let mut model = CpModelBuilder::default();

        let posting_codes: Vec<String> = input
            .postings
            .iter()
            .map(|p| p.posting_code.clone())
            .collect();
        let code_to_idx: HashMap<String, usize> = posting_codes
            .iter()
            .enumerate()
            .map(|(idx, code)| (code.clone(), idx))
            .collect();
        let mcrs: Vec<String> = input.residents.iter().map(|r| r.mcr.clone()).collect();
        let mcr_to_idx: HashMap<String, usize> = mcrs
            .iter()
            .enumerate()
            .map(|(idx, mcr)| (mcr.clone(), idx))
            .collect();

        let core_postings: Vec<usize> = input
            .postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.posting_type == PostingType::Core)
            .map(|(idx, _)| idx)
            .collect();
        let elective_postings: Vec<usize> = input
            .postings
            .iter()
            .enumerate()
            .filter(|(_, p)| p.posting_type == PostingType::Elective)
            .map(|(idx, _)| idx)
            .collect();
        let elective_bases: BTreeSet<String> = elective_postings
            .iter()
            .map(|&idx| base_code(&posting_codes[idx]).to_string())
            .collect();
        let postings_with_base = |base: &str| -> Vec<usize> {
            posting_codes
                .iter()
                .enumerate()
                .filter(|(_, code)| base_code(code) == base)
                .map(|(idx, _)| idx)
                .collect()
        };
        let ed_postings = postings_with_base("ED");
        let grm_postings = postings_with_base("GRM");
        let gm_postings = postings_with_base("GM");

        // elective preferences, rank -> code (rows without a code are
        // dropped the way the upstream CSV formatter drops them)
        let mut pref_map: HashMap<String, BTreeMap<u32, String>> = HashMap::new();
        for pref in &input.resident_preferences {
            let code = pref.posting_code.trim();
            if code.is_empty() {
                continue;
            }
            pref_map
                .entry(pref.mcr.clone())
                .or_default()
                .insert(pref.preference_rank, code.to_string());
        }

        // SR preferences, rank -> base
        let mut sr_pref_map: HashMap<String, BTreeMap<u32, String>> = HashMap::new();
        for pref in &input.resident_sr_preferences {
            let base = pref.base_posting.trim();
            if base.is_empty() {
                continue;
            }
            sr_pref_map
                .entry(pref.mcr.clone())
                .or_default()
                .insert(pref.preference_rank, base.to_string());
        }

        // pins: explicit entries first, then current-year history rows
        let mut pins: BTreeMap<String, BTreeMap<u32, String>> = BTreeMap::new();
        let record_pin = |pins: &mut BTreeMap<String, BTreeMap<u32, String>>,
                              mcr: &str,
                              block: u32,
                              code: &str| {
            if mcr.is_empty() || !code_to_idx.contains_key(code) || !(1..=NUM_BLOCKS).contains(&block)
            {
                log::warn!("ignoring invalid pinned assignment ({mcr}, {code}, {block})");
                return;
            }
            pins.entry(mcr.to_string())
                .or_default()
                .insert(block, code.to_string());
        };

        for (mcr, entries) in &input.pinned_assignments {
            for entry in entries {
                let code = entry.posting_code.trim();
                if code.is_empty() {
                    continue;
                }
                record_pin(&mut pins, mcr.trim(), entry.month_block, code);
            }
        }

        // strip current-year rows: assignments become pins, leaves become
        // leave entries, off rows are re-derived by the next solve
        let mut filtered_history: Vec<HistoryRow> = Vec::new();
        let mut derived_leaves: Vec<(String, u32, LeaveInfo)> = Vec::new();
        for row in &input.resident_history {
            if !row.is_current_year {
                filtered_history.push(row.clone());
                continue;
            }
            let mcr = row.mcr.trim();
            if row.is_leave {
                derived_leaves.push((
                    mcr.to_string(),
                    row.month_block,
                    LeaveInfo {
                        leave_type: row.leave_type.trim().to_string(),
                        posting_code: row.posting_code.trim().to_string(),
                    },
                ));
            } else if !row.posting_code.trim().is_empty() {
                record_pin(&mut pins, mcr, row.month_block, row.posting_code.trim());
            }
        }

        // leave map: explicit entries win over leaves derived from history
        let mut leave_map: HashMap<String, BTreeMap<u32, LeaveInfo>> = HashMap::new();
        for leave in &input.resident_leaves {
            let mcr = leave.mcr.trim();
            if mcr.is_empty() || !(1..=NUM_BLOCKS).contains(&leave.month_block) {
                continue;
            }
            leave_map.entry(mcr.to_string()).or_default().insert(
                leave.month_block,
                LeaveInfo {
                    leave_type: leave.leave_type.trim().to_string(),
                    posting_code: leave.posting_code.trim().to_string(),
                },
            );
        }
        for (mcr, block, info) in derived_leaves {
            if mcr.is_empty() || !(1..=NUM_BLOCKS).contains(&block) {
                continue;
            }
            leave_map
                .entry(mcr)
                .or_default()
                .entry(block)
                .or_insert(info);
        }
        // drop leave posting codes that are not in the catalogue
        for (mcr, by_block) in leave_map.iter_mut() {
            for (block, info) in by_block.iter_mut() {
                if !info.posting_code.is_empty() && !code_to_idx.contains_key(&info.posting_code) {
                    log::warn!(
                        "ignoring unknown leave posting_code {} for resident {} block {}",
                        info.posting_code,
                        mcr,
                        block
                    );
                    info.posting_code.clear();
                }
            }
        }

        // capacity slots consumed by leaves that name a posting
        let mut leave_quota: HashMap<(usize, u32), i64> = HashMap::new();
        let mut leave_off_blocks: HashSet<(usize, u32)> = HashSet::new();
        for (mcr, by_block) in &leave_map {
            for (&block, info) in by_block {
                if let Some(&p_idx) = code_to_idx.get(&info.posting_code) {
                    *leave_quota.entry((p_idx, block)).or_insert(0) += 1;
                }
                if let Some(&r_idx) = mcr_to_idx.get(mcr) {
                    leave_off_blocks.insert((r_idx, block));
                }
            }
        }

        // career progress per resident
        let career: Vec<CareerProgress> = input
            .residents
            .iter()
            .map(|resident| {
                let completed_blocks = resident.career_blocks_completed.max(0);
                let mut stages_by_block = [0u8; NUM_BLOCKS as usize];
                for b in block_range() {
                    stages_by_block[bidx(b)] = stage_from_blocks(completed_blocks + b as i64 - 1);
                }
                CareerProgress {
                    completed_blocks,
                    stages_by_block,
                }
            })
            .collect();

        let posting_info: HashMap<String, &crate::models::Posting> = input
            .postings
            .iter()
            .map(|p| (p.posting_code.clone(), p))
            .collect();
        let posting_progress = progress::posting_progress(&filtered_history, &posting_info);

        // normalize SR preferences per resident
        let mut sr_context: HashMap<String, SrContext> = HashMap::new();
        for (mcr, sr_prefs) in &sr_pref_map {
            let elective_prefs = pref_map.get(mcr).cloned().unwrap_or_default();
            let mut elective_pref_bases = BTreeSet::new();
            for code in elective_prefs.values() {
                if let Some(posting) = posting_info.get(code) {
                    if posting.posting_type == PostingType::Elective {
                        elective_pref_bases.insert(base_code(code).to_string());
                    }
                }
            }

            let mut updated_sr_prefs: Vec<(u32, String)> = Vec::new();
            let mut new_rank = 1u32;
            for base in sr_prefs.values() {
                let variants = progress::variants_for_base(base, &posting_codes);
                if variants.is_empty() {
                    continue;
                }
                let is_core_posting = variants.iter().any(|code| {
                    posting_info
                        .get(code)
                        .map(|p| p.posting_type == PostingType::Core)
                        .unwrap_or(false)
                });
                if !elective_prefs.is_empty()
                    && !elective_pref_bases.contains(base.as_str())
                    && !is_core_posting
                {
                    continue;
                }
                updated_sr_prefs.push((new_rank, base.clone()));
                new_rank += 1;
            }
            if updated_sr_prefs.is_empty() {
                continue;
            }

            let mut sr_variants: Vec<usize> = Vec::new();
            for (_, base) in &updated_sr_prefs {
                for code in progress::variants_for_base(base, &posting_codes) {
                    let idx = code_to_idx[&code];
                    if !sr_variants.contains(&idx) {
                        sr_variants.push(idx);
                    }
                }
            }

            sr_context.insert(
                mcr.clone(),
                SrContext {
                    updated_sr_prefs,
                    elective_pref_bases,
                    sr_variants,
                },
            );
        }

        // declare the variable model
        let num_residents = input.residents.len();
        let num_postings = posting_codes.len();

        let x: Vec<Vec<Vec<BoolVar>>> = (0..num_residents)
            .map(|_| {
                (0..num_postings)
                    .map(|_| block_range().map(|_| model.new_bool_var()).collect())
                    .collect()
            })
            .collect();
        let off: Vec<Vec<BoolVar>> = (0..num_residents)
            .map(|_| block_range().map(|_| model.new_bool_var()).collect())
            .collect();
        let sel: Vec<Vec<BoolVar>> = (0..num_residents)
            .map(|_| (0..num_postings).map(|_| model.new_bool_var()).collect())
            .collect();

        let mut run_count: Vec<Vec<IntVar>> = Vec::with_capacity(num_residents);
        for r in 0..num_residents {
            let mut per_posting = Vec::with_capacity(num_postings);
            for (p, posting) in input.postings.iter().enumerate() {
                let duration = posting.required_block_duration;
                let max_runs = NUM_BLOCKS as i64 / duration;
                let count = model.new_int_var(vec![(0, max_runs)]);

                // total assigned blocks are whole runs of the required length
                let total_blocks = bool_sum(x[r][p].iter());
                model.add_eq(total_blocks, scaled_int(&count, duration));

                // sel <=> count >= 1
                model.add_ge(count.clone(), LinearExpr::from(sel[r][p].clone()));
                model.add_le(
                    LinearExpr::from(count.clone()),
                    scaled_bool(&sel[r][p], max_runs),
                );

                per_posting.push(count);
            }
            run_count.push(per_posting);
        }

        let mut ctx = ModelContext {
            model,
            input,
            posting_codes,
            code_to_idx,
            mcrs,
            mcr_to_idx,
            core_postings,
            elective_postings,
            elective_bases,
            ed_postings,
            grm_postings,
            gm_postings,
            x,
            off,
            sel,
            run_count,
            filtered_history,
            pins,
            leave_map,
            leave_off_blocks,
            leave_quota,
            career,
            posting_progress,
            pref_map,
            sr_pref_map,
            sr_context,
            objective_terms: Vec::new(),
            objective_offset: 0,
        };
        ctx.apply_pins();
        Ok(ctx)
    }

    /// Forces `x[r][p][b] = 1` for every normalized pin.
    fn apply_pins(&mut self) {
        if self.pins.is_empty() {
            return;
        }
        log::info!("applying pinned assignments for {} residents", self.pins.len());
        for (mcr, by_block) in &self.pins {
            let Some(&r) = self.mcr_to_idx.get(mcr) else {
                log::warn!("ignoring pins for unknown resident {mcr}");
                continue;
            };
            for (&block, code) in by_block {
                let p = self.code_to_idx[code];
                self.model
                    .add_eq(LinearExpr::from(self.x[r][p][bidx(block)].clone()), LinearExpr::from(1));
            }
        }
    }

    /// Historical blocks completed per core base for one resident.
    pub fn core_blocks_for(&self, mcr: &str) -> BTreeMap<String, i64> {
        let posting_info: HashMap<String, &crate::models::Posting> = self
            .input
            .postings
            .iter()
            .map(|p| (p.posting_code.clone(), p))
            .collect();
        let empty = HashMap::new();
        let resident_progress = self.posting_progress.get(mcr).unwrap_or(&empty);
        progress::core_blocks_completed(resident_progress, &posting_info)
    }

    /// Elective posting codes one resident has completed historically.
    pub fn electives_done_for(&self, mcr: &str) -> HashSet<String> {
        let posting_info: HashMap<String, &crate::models::Posting> = self
            .input
            .postings
            .iter()
            .map(|p| (p.posting_code.clone(), p))
            .collect();
        let empty = HashMap::new();
        let resident_progress = self.posting_progress.get(mcr).unwrap_or(&empty);
        progress::unique_electives_completed(resident_progress, &posting_info)
    }

    /// Runs CP-SAT and extracts the per-block assignment entries.
    pub fn solve(self) -> Result<SolverSolution, AllocatorError> {
        let minutes = self
            .input
            .max_time_in_minutes
            .unwrap_or(DEFAULT_MAX_TIME_MINUTES)
            .max(1);

        let mut params = SatParameters::default();
        params.max_time_in_seconds = Some((minutes * 60) as f64);
        params.cp_model_presolve = Some(true);
        params.log_search_progress = Some(false);
        params.enumerate_all_solutions = Some(false);

        log::info!("starting CP-SAT solve (limit {minutes} min)");
        let response = self.model.solve_with_parameters(&params);
        let status = response.status();
        log::info!(
            "solver returned status {:?} with objective {}",
            status,
            response.objective_value
        );

        match status {
            CpSolverStatus::Optimal | CpSolverStatus::Feasible => {}
            CpSolverStatus::Infeasible => {
                let core = &response.sufficient_assumptions_for_infeasibility;
                let detail = if core.is_empty() {
                    "no feasible assignment satisfies the hard constraints".to_string()
                } else {
                    format!("sufficient assumptions for infeasibility: {core:?}")
                };
                return Err(AllocatorError::Infeasible(detail));
            }
            other => {
                return Err(AllocatorError::SolverFailed(format!(
                    "solver returned status {other:?}"
                )));
            }
        }

        let mut entries = Vec::with_capacity(self.mcrs.len() * NUM_BLOCKS as usize);
        for (r, mcr) in self.mcrs.iter().enumerate() {
            let mut off_blocks = Vec::new();
            for b in block_range() {
                let is_off = self.off[r][bidx(b)].solution_value(&response);
                let mut assigned_posting = String::new();
                if is_off {
                    off_blocks.push(b);
                } else {
                    for (p, code) in self.posting_codes.iter().enumerate() {
                        if self.x[r][p][bidx(b)].solution_value(&response) {
                            assigned_posting = code.clone();
                            break;
                        }
                    }
                }
                entries.push(SolutionEntry {
                    mcr: mcr.clone(),
                    month_block: b,
                    assigned_posting,
                    is_off,
                });
            }
            if !off_blocks.is_empty() {
                log::info!("OFF used for {mcr} at blocks {off_blocks:?}");
            }
        }

        Ok(SolverSolution {
            entries,
            leave_map: self.leave_map,
            filtered_history: self.filtered_history,
        })
    }
}

/// Shape validation run before anything touches the model. Violations are
/// fatal; leniencies (dropped pins, unknown leave postings) are handled
/// later with warnings instead.
pub(crate) fn validate_input(input: &AllocatorInput) -> Result<(), AllocatorError> {
    let mut seen_mcrs = HashSet::new();
    for resident in &input.residents {
        let mcr = resident.mcr.trim();
        if mcr.is_empty() {
            return Err(AllocatorError::InvalidInput(
                "resident with missing MCR".to_string(),
            ));
        }
        if !seen_mcrs.insert(mcr.to_string()) {
            return Err(AllocatorError::InvalidInput(format!(
                "duplicate resident MCR {mcr}"
            )));
        }
    }

    let mut seen_codes = HashSet::new();
    for posting in &input.postings {
        let code = posting.posting_code.trim();
        if code.is_empty() {
            return Err(AllocatorError::InvalidInput(
                "posting with missing posting_code".to_string(),
            ));
        }
        if !seen_codes.insert(code.to_string()) {
            return Err(AllocatorError::InvalidInput(format!(
                "duplicate posting_code {code}"
            )));
        }
        if posting.max_residents < 0 {
            return Err(AllocatorError::InvalidInput(format!(
                "posting {code} has negative max_residents"
            )));
        }
        if !(1..=NUM_BLOCKS as i64).contains(&posting.required_block_duration) {
            return Err(AllocatorError::InvalidInput(format!(
                "posting {code} has invalid required_block_duration {}",
                posting.required_block_duration
            )));
        }
    }

    for row in &input.resident_history {
        if !(1..=NUM_BLOCKS).contains(&row.month_block) {
            return Err(AllocatorError::InvalidInput(format!(
                "history row for {} has month_block {} outside 1..=12",
                row.mcr, row.month_block
            )));
        }
    }

    let mut seen_ranks: HashSet<(String, u32)> = HashSet::new();
    for pref in &input.resident_preferences {
        // blank rows are dropped upstream of the solver
        if pref.posting_code.trim().is_empty() {
            continue;
        }
        if !(1..=5).contains(&pref.preference_rank) {
            return Err(AllocatorError::InvalidInput(format!(
                "preference rank {} for {} outside 1..=5",
                pref.preference_rank, pref.mcr
            )));
        }
        if !seen_codes.contains(pref.posting_code.trim()) {
            return Err(AllocatorError::InvalidInput(format!(
                "preference for {} names unknown posting {}",
                pref.mcr, pref.posting_code
            )));
        }
        if !seen_ranks.insert((pref.mcr.clone(), pref.preference_rank)) {
            return Err(AllocatorError::InvalidInput(format!(
                "duplicate preference rank {} for {}",
                pref.preference_rank, pref.mcr
            )));
        }
    }

    Ok(())
}
