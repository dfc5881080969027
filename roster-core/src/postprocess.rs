//! Post-processing of a raw solver solution.
//!
//! Turns the per-block solver values into current-year history rows, folds
//! them into the prior history, and derives the resident-centric progress
//! records, cohort statistics and OFF-block diagnostics of the output
//! document.

use crate::models::{
    AllocatorInput, AllocatorOutput, BlockUtilisation, CcrStatus, CohortStatistics, Diagnostics,
    HistoryRow, OffExplanation, Posting, PostingType, PostingUtilisation, PreferenceSatisfaction,
    ResidentSummary, Statistics,
};
use crate::progress::{
    base_code, ccr_postings_completed, core_blocks_completed, posting_progress,
    unique_electives_completed,
};
use crate::scheduler::{SolutionEntry, SolverSolution};
use std::collections::{BTreeMap, HashMap, HashSet};

const QUARTER_STARTS: [u32; 4] = [1, 4, 7, 10];

pub(crate) fn compute_postprocess(
    input: &AllocatorInput,
    solution: &SolverSolution,
) -> AllocatorOutput {
    let posting_info: HashMap<String, &Posting> = input
        .postings
        .iter()
        .map(|p| (p.posting_code.clone(), p))
        .collect();

    let mut pref_map: HashMap<String, BTreeMap<u32, String>> = HashMap::new();
    for pref in &input.resident_preferences {
        if pref.posting_code.trim().is_empty() {
            continue;
        }
        pref_map
            .entry(pref.mcr.clone())
            .or_default()
            .insert(pref.preference_rank, pref.posting_code.trim().to_string());
    }

    // prior rows lose their current-year flag; the new year is appended
    let mut output_history: Vec<HistoryRow> = solution
        .filtered_history
        .iter()
        .cloned()
        .map(|mut row| {
            row.is_current_year = false;
            row
        })
        .collect();
    output_history.extend(emit_current_year_rows(input, solution));

    // per-resident summaries over the merged history
    let mut output_residents = Vec::with_capacity(input.residents.len());
    for resident in &input.residents {
        let resident_rows: Vec<HistoryRow> = output_history
            .iter()
            .filter(|row| row.mcr == resident.mcr)
            .cloned()
            .collect();
        let progress = posting_progress(&resident_rows, &posting_info)
            .remove(&resident.mcr)
            .unwrap_or_default();

        let core_blocks = core_blocks_completed(&progress, &posting_info);
        let mut unique_electives: Vec<String> = unique_electives_completed(&progress, &posting_info)
            .into_iter()
            .collect();
        unique_electives.sort();
        let ccr_completed = ccr_postings_completed(&progress, &posting_info);
        let ccr_status = match ccr_completed.first() {
            Some(code) => CcrStatus {
                completed: true,
                posting_code: code.clone(),
            },
            None => CcrStatus {
                completed: false,
                posting_code: "-".to_string(),
            },
        };

        output_residents.push(ResidentSummary {
            mcr: resident.mcr.clone(),
            name: resident.name.clone(),
            resident_year: resident.resident_year,
            core_blocks_completed: core_blocks,
            unique_electives_completed: unique_electives,
            ccr_status,
        });
    }

    let optimisation_scores = compute_optimisation_scores(input, &output_history, &pref_map);
    let max_score = optimisation_scores.iter().copied().max().unwrap_or(0);
    let optimisation_scores_normalised: Vec<f64> = optimisation_scores
        .iter()
        .map(|&score| {
            if max_score > 0 {
                ((score as f64 / max_score as f64) * 100.0 * 100.0).round() / 100.0
            } else {
                0.0
            }
        })
        .collect();

    let posting_util = compute_posting_util(input, &output_history);
    let elective_preference_satisfaction =
        compute_preference_satisfaction(input, &output_history, &pref_map);
    let off_explanations_by_resident =
        compute_off_explanations(input, &output_history, &posting_info, &posting_util);

    AllocatorOutput {
        success: true,
        residents: output_residents,
        resident_history: output_history,
        resident_preferences: input.resident_preferences.clone(),
        resident_sr_preferences: input.resident_sr_preferences.clone(),
        postings: input.postings.clone(),
        resident_leaves: input.resident_leaves.clone(),
        weightages: input.weightages.clone(),
        statistics: Statistics {
            total_residents: input.residents.len(),
            cohort: CohortStatistics {
                optimisation_scores,
                optimisation_scores_normalised,
                posting_util,
                elective_preference_satisfaction,
            },
        },
        diagnostics: Diagnostics {
            off_explanations_by_resident,
        },
    }
}

/// One row per (resident, block). Leave months keep their leave metadata,
/// off months carry an empty posting code; only assigned months advance
/// the career-block counter.
fn emit_current_year_rows(input: &AllocatorInput, solution: &SolverSolution) -> Vec<HistoryRow> {
    let mut entry_map: HashMap<(&str, u32), &SolutionEntry> = HashMap::new();
    for entry in &solution.entries {
        entry_map.insert((entry.mcr.as_str(), entry.month_block), entry);
    }

    let mut rows = Vec::with_capacity(input.residents.len() * 12);
    for resident in &input.residents {
        let leaves = solution.leave_map.get(&resident.mcr);
        let mut career_block = resident.career_blocks_completed.max(0);

        for block in 1..=12u32 {
            if let Some(info) = leaves.and_then(|by_block| by_block.get(&block)) {
                rows.push(HistoryRow {
                    mcr: resident.mcr.clone(),
                    year: resident.resident_year,
                    month_block: block,
                    career_block: None,
                    posting_code: info.posting_code.clone(),
                    is_current_year: true,
                    is_leave: true,
                    leave_type: info.leave_type.clone(),
                });
                continue;
            }

            let assigned = entry_map
                .get(&(resident.mcr.as_str(), block))
                .filter(|entry| !entry.is_off)
                .map(|entry| entry.assigned_posting.clone())
                .unwrap_or_default();

            if assigned.is_empty() {
                rows.push(HistoryRow {
                    mcr: resident.mcr.clone(),
                    year: resident.resident_year,
                    month_block: block,
                    career_block: None,
                    posting_code: String::new(),
                    is_current_year: true,
                    is_leave: false,
                    leave_type: String::new(),
                });
            } else {
                career_block += 1;
                rows.push(HistoryRow {
                    mcr: resident.mcr.clone(),
                    year: resident.resident_year,
                    month_block: block,
                    career_block: Some(career_block),
                    posting_code: assigned,
                    is_current_year: true,
                    is_leave: false,
                    leave_type: String::new(),
                });
            }
        }
    }
    rows
}

/// `preference_points + assigned_count * resident_year * seniority`, per
/// resident in cohort order.
fn compute_optimisation_scores(
    input: &AllocatorInput,
    output_history: &[HistoryRow],
    pref_map: &HashMap<String, BTreeMap<u32, String>>,
) -> Vec<i64> {
    let preference_weight = input.weightages.preference;
    let seniority_weight = input.weightages.seniority;

    let mut scores = Vec::with_capacity(input.residents.len());
    for resident in &input.residents {
        let assigned: Vec<&HistoryRow> = output_history
            .iter()
            .filter(|row| {
                row.mcr == resident.mcr && row.is_current_year && !row.posting_code.is_empty()
            })
            .collect();

        let empty = BTreeMap::new();
        let prefs = pref_map.get(&resident.mcr).unwrap_or(&empty);
        let mut preference_score = 0i64;
        for row in &assigned {
            for rank in 1..=5u32 {
                if prefs.get(&rank) == Some(&row.posting_code) {
                    preference_score += (6 - rank as i64) * preference_weight;
                    break;
                }
            }
        }

        let seniority_bonus =
            assigned.len() as i64 * resident.resident_year as i64 * seniority_weight;
        scores.push(preference_score + seniority_bonus);
    }
    scores
}

fn compute_posting_util(
    input: &AllocatorInput,
    output_history: &[HistoryRow],
) -> Vec<PostingUtilisation> {
    let mut util = Vec::with_capacity(input.postings.len());
    for posting in &input.postings {
        let mut filled = [0u32; 12];
        for row in output_history {
            if row.is_current_year
                && row.posting_code == posting.posting_code
                && (1..=12).contains(&row.month_block)
            {
                filled[(row.month_block - 1) as usize] += 1;
            }
        }
        let util_per_block = (1..=12u32)
            .map(|block| {
                let count = filled[(block - 1) as usize];
                BlockUtilisation {
                    block,
                    filled: count,
                    capacity: posting.max_residents,
                    is_over_capacity: count as i64 > posting.max_residents,
                }
            })
            .collect();
        util.push(PostingUtilisation {
            posting_code: posting.posting_code.clone(),
            util_per_block,
        });
    }
    util
}

/// Buckets every resident by the best preference rank the year satisfied.
fn compute_preference_satisfaction(
    input: &AllocatorInput,
    output_history: &[HistoryRow],
    pref_map: &HashMap<String, BTreeMap<u32, String>>,
) -> PreferenceSatisfaction {
    let mut histogram = PreferenceSatisfaction::default();
    for resident in &input.residents {
        let Some(prefs) = pref_map.get(&resident.mcr).filter(|p| !p.is_empty()) else {
            histogram.no_preference += 1;
            continue;
        };
        let assigned: HashSet<&str> = output_history
            .iter()
            .filter(|row| {
                row.mcr == resident.mcr && row.is_current_year && !row.posting_code.is_empty()
            })
            .map(|row| row.posting_code.as_str())
            .collect();

        let best_rank = (1..=5u32).find(|rank| {
            prefs
                .get(rank)
                .map(|code| assigned.contains(code.as_str()))
                .unwrap_or(false)
        });
        match best_rank {
            Some(1) => histogram.rank_1 += 1,
            Some(2) => histogram.rank_2 += 1,
            Some(3) => histogram.rank_3 += 1,
            Some(4) => histogram.rank_4 += 1,
            Some(5) => histogram.rank_5 += 1,
            _ => histogram.none_met += 1,
        }
    }
    histogram
}

/// Heuristic explanation for every current-year block left unassigned:
/// which postings would still fit there, and why the rest would not.
fn compute_off_explanations(
    input: &AllocatorInput,
    output_history: &[HistoryRow],
    posting_info: &HashMap<String, &Posting>,
    posting_util: &[PostingUtilisation],
) -> BTreeMap<String, Vec<OffExplanation>> {
    let mut cap_fill: HashMap<&str, [u32; 12]> = HashMap::new();
    for util in posting_util {
        let mut filled = [0u32; 12];
        for block_util in &util.util_per_block {
            filled[(block_util.block - 1) as usize] = block_util.filled;
        }
        cap_fill.insert(util.posting_code.as_str(), filled);
    }

    let mut explanations: BTreeMap<String, Vec<OffExplanation>> = BTreeMap::new();
    for resident in &input.residents {
        let resident_rows: Vec<HistoryRow> = output_history
            .iter()
            .filter(|row| row.mcr == resident.mcr)
            .cloned()
            .collect();
        let progress = posting_progress(&resident_rows, posting_info)
            .remove(&resident.mcr)
            .unwrap_or_default();
        let completed_elective_bases: HashSet<String> =
            unique_electives_completed(&progress, posting_info)
                .iter()
                .map(|code| base_code(code).to_string())
                .collect();

        let off_blocks: Vec<u32> = resident_rows
            .iter()
            .filter(|row| row.is_current_year && !row.is_leave && row.posting_code.is_empty())
            .map(|row| row.month_block)
            .collect();

        let mut entries = Vec::new();
        for &block in &off_blocks {
            let mut feasible = Vec::new();
            let mut reasons_by_posting = BTreeMap::new();

            for posting in &input.postings {
                let mut reasons: Vec<String> = Vec::new();
                let filled = cap_fill
                    .get(posting.posting_code.as_str())
                    .copied()
                    .unwrap_or([0; 12]);
                let capacity = posting.max_residents;

                if filled[(block - 1) as usize] as i64 >= capacity {
                    reasons.push("capacity_full".to_string());
                }

                let duration = posting.required_block_duration;
                if duration == 3 && !QUARTER_STARTS.contains(&block) {
                    reasons.push("start_month_disallowed_for_3m".to_string());
                }
                if base_code(&posting.posting_code) == "GRM" && block % 2 == 0 {
                    reasons.push("grm_even_start_disallowed".to_string());
                }
                if duration > 1 {
                    let end_block = block + duration as u32 - 1;
                    if block <= 6 && end_block >= 7 {
                        reasons.push("crosses_dec_jan_boundary".to_string());
                    }
                    for t in block..=end_block.min(12) {
                        if filled[(t - 1) as usize] as i64 >= capacity {
                            reasons.push(format!("capacity_full_at_{t}"));
                        }
                    }
                }

                if posting.posting_type == PostingType::Elective
                    && completed_elective_bases.contains(base_code(&posting.posting_code))
                {
                    reasons.push("elective_base_already_completed".to_string());
                }

                if reasons.is_empty() {
                    feasible.push(posting.posting_code.clone());
                }
                reasons_by_posting.insert(posting.posting_code.clone(), reasons);
            }

            if !feasible.is_empty() || reasons_by_posting.values().any(|r| !r.is_empty()) {
                entries.push(OffExplanation {
                    block,
                    feasible_postings: feasible,
                    reasons_by_posting,
                });
            }
        }

        if !entries.is_empty() {
            explanations.insert(resident.mcr.clone(), entries);
        }
    }
    explanations
}
