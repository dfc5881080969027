//! Data models and types for the roster-core API.
//!
//! This module contains all the public data structures used to describe an
//! allocation problem, tune the solver, and receive results. Every type is
//! serializable (JSON) so the allocator can sit behind a CLI or a web
//! service without any translation layer.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Display labels for the twelve month blocks of an academic year.
///
/// The academic year starts in July, so block 1 is "Jul" and block 12 is
/// "Jun". Labels are for output only; the allocator works on 1-based block
/// indices throughout.
pub const MONTH_LABELS: [&str; 12] = [
    "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar", "Apr", "May", "Jun",
];

/// Returns the display label for a 1-based month block, or "?" when the
/// block is out of range.
pub fn month_label(block: u32) -> &'static str {
    MONTH_LABELS
        .get(block.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

/// Complete input specification for one allocation run.
///
/// This is the root document handed to [`crate::allocate_timetable`]. The
/// required tables are the cohort, the prior history, the elective
/// preferences and the posting catalogue; everything else defaults to
/// empty.
///
/// History rows flagged `is_current_year` are not solved over again: rows
/// with a posting become pinned assignments and rows flagged `is_leave`
/// become leave entries, then the rows are stripped before the solve.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AllocatorInput {
    /// The cohort being scheduled
    pub residents: Vec<Resident>,
    /// Prior (and possibly current-year) assignment history
    pub resident_history: Vec<HistoryRow>,
    /// Ranked elective preferences, rank 1 (best) to 5
    pub resident_preferences: Vec<ElectivePreference>,
    /// Ranked senior-rotation preferences by base posting, rank 1 to 3
    #[serde(default)]
    pub resident_sr_preferences: Vec<SrPreference>,
    /// The posting catalogue for this academic year
    pub postings: Vec<Posting>,
    /// Declared leave months
    #[serde(default)]
    pub resident_leaves: Vec<LeaveEntry>,
    /// Explicitly pinned assignments, keyed by resident MCR
    #[serde(default)]
    pub pinned_assignments: HashMap<String, Vec<PinnedAssignment>>,
    /// Objective weights; unspecified weights default to 0
    #[serde(default)]
    pub weightages: Weightages,
    /// Solver wall-clock cap in minutes (default 15)
    #[serde(default)]
    pub max_time_in_minutes: Option<u64>,
}

/// A resident in the cohort.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Resident {
    /// Unique identifier (medical council registration)
    pub mcr: String,
    /// Display name
    pub name: String,
    /// Nominal residency year (1, 2 or 3)
    pub resident_year: u32,
    /// Total non-leave blocks completed across the whole residency
    #[serde(default)]
    pub career_blocks_completed: i64,
}

/// Whether a posting counts toward the core curriculum or is an elective.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostingType {
    Core,
    Elective,
}

/// A posting slot in the catalogue.
///
/// Posting codes follow the grammar `"<base> (<institution>)"`, e.g.
/// `"GM (TTSH)"`. The base is everything before the first `" ("`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Posting {
    /// Unique posting code, `"<base> (<institution>)"`
    pub posting_code: String,
    /// Human-readable posting name
    pub posting_name: String,
    /// Core or elective
    pub posting_type: PostingType,
    /// Capacity per month block
    pub max_residents: i64,
    /// Run length in consecutive blocks (1, 2 or 3 in the curriculum)
    pub required_block_duration: i64,
}

/// One month of one resident's history.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryRow {
    pub mcr: String,
    /// Residency year the row belongs to
    pub year: u32,
    /// Month block 1..=12 within that year
    pub month_block: u32,
    /// Career block number recorded for this month; absent for leave and
    /// off months, which do not advance the counter
    #[serde(default)]
    pub career_block: Option<i64>,
    /// Posting code, or empty for an off month
    #[serde(default)]
    pub posting_code: String,
    /// True for rows produced by the latest solve (or a manual edit)
    #[serde(default)]
    pub is_current_year: bool,
    /// True when the resident was on leave this month
    #[serde(default)]
    pub is_leave: bool,
    /// Leave type label, empty when not on leave
    #[serde(default)]
    pub leave_type: String,
}

/// A ranked elective preference.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectivePreference {
    pub mcr: String,
    /// 1 (most preferred) to 5
    pub preference_rank: u32,
    pub posting_code: String,
}

/// A ranked senior-rotation preference, expressed at the base-posting
/// level (`"Endo"`, not `"Endo (TTSH)"`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SrPreference {
    pub mcr: String,
    /// 1 (most preferred) to 3
    pub preference_rank: u32,
    pub base_posting: String,
}

/// A declared leave month.
///
/// When `posting_code` is set the resident is on leave *from* that
/// posting's roster, so the month consumes one capacity slot of the
/// posting even though the resident is not assigned.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaveEntry {
    pub mcr: String,
    pub month_block: u32,
    #[serde(default)]
    pub leave_type: String,
    #[serde(default)]
    pub posting_code: String,
}

/// A forced assignment carried over from a prior solve or operator edit.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PinnedAssignment {
    pub month_block: u32,
    pub posting_code: String,
}

/// Named objective weights. All weights are non-negative integers and
/// default to 0 when unspecified, matching the upstream weightages map.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Weightages {
    /// Elective preference bonus multiplier
    #[serde(default)]
    pub preference: i64,
    /// Per-assigned-block seniority bonus multiplier
    #[serde(default)]
    pub seniority: i64,
    /// Penalty per stage-3 resident ending the year short of 5 electives
    #[serde(default)]
    pub elective_shortfall_penalty: i64,
    /// Penalty per core base left short for a stage-3 resident
    #[serde(default)]
    pub core_shortfall_penalty: i64,
    /// Senior-rotation preference bonus multiplier
    #[serde(default)]
    pub sr_preference: i64,
    /// Penalty for a stage-2 resident with SR preferences but no SR run
    #[serde(default)]
    pub sr_y2_not_selected_penalty: i64,
}

/// Per-resident summary computed after the solve, with the new
/// current-year rows folded into the history.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResidentSummary {
    pub mcr: String,
    pub name: String,
    pub resident_year: u32,
    /// Completed blocks per core base, including the new year
    pub core_blocks_completed: BTreeMap<String, i64>,
    /// Elective posting codes completed so far
    pub unique_electives_completed: Vec<String>,
    pub ccr_status: CcrStatus,
}

/// Whether the resident has completed a complex-case-requirement posting.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CcrStatus {
    pub completed: bool,
    /// The completed CCR posting code, or "-" when none
    pub posting_code: String,
}

/// Fill level of one posting in one month block.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlockUtilisation {
    pub block: u32,
    pub filled: u32,
    pub capacity: i64,
    pub is_over_capacity: bool,
}

/// Utilisation of one posting across the twelve blocks.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PostingUtilisation {
    pub posting_code: String,
    pub util_per_block: Vec<BlockUtilisation>,
}

/// Cohort histogram of elective preference satisfaction. Each resident
/// counts once: in the bucket of the best rank they had satisfied, in
/// `none_met` when they had preferences but none were assigned, or in
/// `no_preference`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceSatisfaction {
    pub rank_1: u32,
    pub rank_2: u32,
    pub rank_3: u32,
    pub rank_4: u32,
    pub rank_5: u32,
    pub none_met: u32,
    pub no_preference: u32,
}

/// Cohort-wide statistics.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CohortStatistics {
    /// Raw optimisation score per resident, cohort order
    pub optimisation_scores: Vec<i64>,
    /// Scores normalised to the cohort maximum, rounded to 2 dp
    pub optimisation_scores_normalised: Vec<f64>,
    pub posting_util: Vec<PostingUtilisation>,
    pub elective_preference_satisfaction: PreferenceSatisfaction,
}

/// Output statistics block.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Statistics {
    pub total_residents: usize,
    pub cohort: CohortStatistics,
}

/// Heuristic explanation for one unassigned month of one resident.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OffExplanation {
    pub block: u32,
    /// Postings that looked feasible for this block after the solve
    pub feasible_postings: Vec<String>,
    /// For every posting, the reasons it was not feasible (empty when it was)
    pub reasons_by_posting: BTreeMap<String, Vec<String>>,
}

/// Post-solve diagnostics attached to the output.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Diagnostics {
    pub off_explanations_by_resident: BTreeMap<String, Vec<OffExplanation>>,
}

/// The result of a successful allocation run.
///
/// Echoes the input tables (with the history now containing the new
/// current-year rows) alongside the per-resident summaries, cohort
/// statistics and diagnostics.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AllocatorOutput {
    pub success: bool,
    pub residents: Vec<ResidentSummary>,
    pub resident_history: Vec<HistoryRow>,
    pub resident_preferences: Vec<ElectivePreference>,
    pub resident_sr_preferences: Vec<SrPreference>,
    pub postings: Vec<Posting>,
    pub resident_leaves: Vec<LeaveEntry>,
    pub weightages: Weightages,
    pub statistics: Statistics,
    pub diagnostics: Diagnostics,
}

impl AllocatorOutput {
    /// Formats the current-year timetable as a human-readable table, one
    /// row per resident and one column per month label.
    ///
    /// # Example Output
    ///
    /// ```text
    /// M001 | Jul: GM (KTPH) | Aug: GM (KTPH) | ... | Jun: OFF
    /// M002 | Jul: LEAVE (ML) | Aug: ED (TTSH) | ...
    /// ```
    pub fn display(&self) -> String {
        let mut by_resident: BTreeMap<&str, BTreeMap<u32, &HistoryRow>> = BTreeMap::new();
        for row in &self.resident_history {
            if row.is_current_year {
                by_resident
                    .entry(row.mcr.as_str())
                    .or_default()
                    .insert(row.month_block, row);
            }
        }

        let mut output = String::new();
        for (mcr, rows) in by_resident {
            output.push_str(mcr);
            for block in 1..=12u32 {
                let cell = match rows.get(&block) {
                    Some(row) if row.is_leave => {
                        if row.leave_type.is_empty() {
                            "LEAVE".to_string()
                        } else {
                            format!("LEAVE ({})", row.leave_type)
                        }
                    }
                    Some(row) if !row.posting_code.is_empty() => row.posting_code.clone(),
                    _ => "OFF".to_string(),
                };
                output.push_str(&format!(" | {}: {}", month_label(block), cell));
            }
            output.push('\n');
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_labels_cover_the_academic_year() {
        assert_eq!(month_label(1), "Jul");
        assert_eq!(month_label(6), "Dec");
        assert_eq!(month_label(7), "Jan");
        assert_eq!(month_label(12), "Jun");
        assert_eq!(month_label(0), "?");
        assert_eq!(month_label(13), "?");
    }

    #[test]
    fn input_parses_with_optional_tables_missing() {
        let json = r#"{
            "residents": [
                {"mcr": "M001", "name": "A", "resident_year": 1, "career_blocks_completed": 0}
            ],
            "resident_history": [],
            "resident_preferences": [],
            "postings": [
                {"posting_code": "GM (KTPH)", "posting_name": "General Medicine",
                 "posting_type": "core", "max_residents": 2, "required_block_duration": 1}
            ]
        }"#;
        let input: AllocatorInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.residents.len(), 1);
        assert!(input.resident_leaves.is_empty());
        assert!(input.pinned_assignments.is_empty());
        assert_eq!(input.weightages.preference, 0);
        assert!(input.max_time_in_minutes.is_none());
        assert_eq!(input.postings[0].posting_type, PostingType::Core);
    }

    #[test]
    fn display_renders_leave_off_and_assignments() {
        let mk_row = |block: u32, code: &str, leave: bool| HistoryRow {
            mcr: "M001".into(),
            year: 1,
            month_block: block,
            career_block: None,
            posting_code: code.into(),
            is_current_year: true,
            is_leave: leave,
            leave_type: if leave { "ML".into() } else { String::new() },
        };
        let output = AllocatorOutput {
            success: true,
            residents: vec![],
            resident_history: vec![
                mk_row(1, "GM (KTPH)", false),
                mk_row(2, "", false),
                mk_row(3, "", true),
            ],
            resident_preferences: vec![],
            resident_sr_preferences: vec![],
            postings: vec![],
            resident_leaves: vec![],
            weightages: Weightages::default(),
            statistics: Statistics {
                total_residents: 0,
                cohort: CohortStatistics {
                    optimisation_scores: vec![],
                    optimisation_scores_normalised: vec![],
                    posting_util: vec![],
                    elective_preference_satisfaction: PreferenceSatisfaction::default(),
                },
            },
            diagnostics: Diagnostics::default(),
        };
        let rendered = output.display();
        assert!(rendered.contains("Jul: GM (KTPH)"));
        assert!(rendered.contains("Aug: OFF"));
        assert!(rendered.contains("Sep: LEAVE (ML)"));
    }
}
