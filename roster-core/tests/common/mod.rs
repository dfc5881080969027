//! Shared test utilities for roster-core integration tests.
//!
//! Builders for literal solver inputs and assertion helpers over the
//! output document, used across the scenario test files.

use roster_core::models::{
    AllocatorInput, AllocatorOutput, ElectivePreference, HistoryRow, LeaveEntry, Posting,
    PostingType, Resident, SrPreference, Weightages,
};
use roster_core::progress::base_code;
use std::collections::{BTreeMap, HashMap};

#[allow(dead_code)]
pub fn resident(mcr: &str, year: u32, career_blocks: i64) -> Resident {
    Resident {
        mcr: mcr.to_string(),
        name: format!("Resident {mcr}"),
        resident_year: year,
        career_blocks_completed: career_blocks,
    }
}

#[allow(dead_code)]
pub fn core(code: &str, capacity: i64, duration: i64) -> Posting {
    Posting {
        posting_code: code.to_string(),
        posting_name: code.to_string(),
        posting_type: PostingType::Core,
        max_residents: capacity,
        required_block_duration: duration,
    }
}

#[allow(dead_code)]
pub fn elective(code: &str, capacity: i64, duration: i64) -> Posting {
    Posting {
        posting_code: code.to_string(),
        posting_name: code.to_string(),
        posting_type: PostingType::Elective,
        max_residents: capacity,
        required_block_duration: duration,
    }
}

#[allow(dead_code)]
pub fn history_row(mcr: &str, year: u32, block: u32, career_block: i64, code: &str) -> HistoryRow {
    HistoryRow {
        mcr: mcr.to_string(),
        year,
        month_block: block,
        career_block: Some(career_block),
        posting_code: code.to_string(),
        is_current_year: false,
        is_leave: false,
        leave_type: String::new(),
    }
}

#[allow(dead_code)]
pub fn leave(mcr: &str, block: u32, leave_type: &str) -> LeaveEntry {
    LeaveEntry {
        mcr: mcr.to_string(),
        month_block: block,
        leave_type: leave_type.to_string(),
        posting_code: String::new(),
    }
}

#[allow(dead_code)]
pub fn preference(mcr: &str, rank: u32, code: &str) -> ElectivePreference {
    ElectivePreference {
        mcr: mcr.to_string(),
        preference_rank: rank,
        posting_code: code.to_string(),
    }
}

#[allow(dead_code)]
pub fn sr_preference(mcr: &str, rank: u32, base: &str) -> SrPreference {
    SrPreference {
        mcr: mcr.to_string(),
        preference_rank: rank,
        base_posting: base.to_string(),
    }
}

/// A minimal input with everything optional empty and a one-minute solver
/// cap so tests stay fast.
#[allow(dead_code)]
pub fn base_input(residents: Vec<Resident>, postings: Vec<Posting>) -> AllocatorInput {
    AllocatorInput {
        residents,
        resident_history: vec![],
        resident_preferences: vec![],
        resident_sr_preferences: vec![],
        postings,
        resident_leaves: vec![],
        pinned_assignments: HashMap::new(),
        weightages: Weightages::default(),
        max_time_in_minutes: Some(1),
    }
}

/// The S1-style stage-1 catalogue: every core base a first-year needs.
#[allow(dead_code)]
pub fn stage1_postings() -> Vec<Posting> {
    vec![
        core("GM (KTPH)", 1, 1),
        core("GRM (TTSH)", 1, 2),
        core("ED (TTSH)", 1, 1),
        core("MICU (TTSH)", 1, 1),
        core("RCCM (TTSH)", 1, 1),
    ]
}

/// Current-year rows for one resident, keyed by month block.
#[allow(dead_code)]
pub fn current_year_rows<'a>(
    output: &'a AllocatorOutput,
    mcr: &str,
) -> BTreeMap<u32, &'a HistoryRow> {
    output
        .resident_history
        .iter()
        .filter(|row| row.is_current_year && row.mcr == mcr)
        .map(|row| (row.month_block, row))
        .collect()
}

/// Months in which the resident is assigned to any variant of a base.
#[allow(dead_code)]
pub fn assigned_months_for_base(output: &AllocatorOutput, mcr: &str, base: &str) -> Vec<u32> {
    current_year_rows(output, mcr)
        .values()
        .filter(|row| {
            !row.is_leave && !row.posting_code.is_empty() && base_code(&row.posting_code) == base
        })
        .map(|row| row.month_block)
        .collect()
}

/// Months in which the resident is assigned to one exact posting code.
#[allow(dead_code)]
pub fn assigned_months_for_code(output: &AllocatorOutput, mcr: &str, code: &str) -> Vec<u32> {
    current_year_rows(output, mcr)
        .values()
        .filter(|row| !row.is_leave && row.posting_code == code)
        .map(|row| row.month_block)
        .collect()
}

/// Invariant 1: each resident holds exactly one slot per month, which is
/// an assignment, an off slot, or a leave.
#[allow(dead_code)]
pub fn assert_one_slot_per_month(output: &AllocatorOutput) {
    for resident in &output.residents {
        let rows = current_year_rows(output, &resident.mcr);
        for block in 1..=12u32 {
            let row = rows
                .get(&block)
                .unwrap_or_else(|| panic!("{} has no row for block {}", resident.mcr, block));
            if row.is_leave {
                continue;
            }
            // the row is either an assignment or an explicit off slot
            assert_eq!(row.month_block, block);
        }
        assert_eq!(rows.len(), 12, "{} does not cover all months", resident.mcr);
    }
}

/// Invariant 2: no posting exceeds its capacity in any month.
#[allow(dead_code)]
pub fn assert_capacity_respected(output: &AllocatorOutput) {
    for util in &output.statistics.cohort.posting_util {
        for block_util in &util.util_per_block {
            assert!(
                !block_util.is_over_capacity,
                "posting {} over capacity at block {}: {}/{}",
                util.posting_code,
                block_util.block,
                block_util.filled,
                block_util.capacity
            );
        }
    }
}

/// Invariant 3: multi-month postings form disjoint whole runs.
#[allow(dead_code)]
pub fn assert_runs_contiguous(output: &AllocatorOutput) {
    for resident in &output.residents {
        let rows = current_year_rows(output, &resident.mcr);
        for posting in &output.postings {
            let duration = posting.required_block_duration as u32;
            if duration <= 1 {
                continue;
            }
            let months: Vec<u32> = (1..=12u32)
                .filter(|block| {
                    rows.get(block)
                        .map(|row| !row.is_leave && row.posting_code == posting.posting_code)
                        .unwrap_or(false)
                })
                .collect();
            for streak in streaks(&months) {
                assert_eq!(
                    streak.len() as u32,
                    duration,
                    "{} holds {} for {:?}, not a whole {}-month run",
                    resident.mcr,
                    posting.posting_code,
                    streak,
                    duration
                );
            }
        }
    }
}

/// Invariant 4: no posting held in both December and January.
#[allow(dead_code)]
pub fn assert_no_dec_jan_crossing(output: &AllocatorOutput) {
    for resident in &output.residents {
        let rows = current_year_rows(output, &resident.mcr);
        let code_at = |block: u32| -> Option<&str> {
            rows.get(&block)
                .filter(|row| !row.is_leave && !row.posting_code.is_empty())
                .map(|row| row.posting_code.as_str())
        };
        if let (Some(dec), Some(jan)) = (code_at(6), code_at(7)) {
            assert_ne!(
                dec, jan,
                "{} holds {} across the Dec-Jan boundary",
                resident.mcr, dec
            );
        }
    }
}

/// Invariant 8: GRM runs start on odd months.
#[allow(dead_code)]
pub fn assert_grm_starts_odd(output: &AllocatorOutput) {
    for resident in &output.residents {
        let months = assigned_months_for_base(output, &resident.mcr, "GRM");
        for streak in streaks(&months) {
            assert_eq!(
                streak[0] % 2,
                1,
                "{} starts GRM on even month {}",
                resident.mcr,
                streak[0]
            );
        }
    }
}

/// Splits sorted month numbers into maximal consecutive streaks.
#[allow(dead_code)]
pub fn streaks(months: &[u32]) -> Vec<Vec<u32>> {
    let mut sorted = months.to_vec();
    sorted.sort_unstable();
    let mut result: Vec<Vec<u32>> = Vec::new();
    for month in sorted {
        match result.last_mut() {
            Some(streak) if *streak.last().unwrap() + 1 == month => streak.push(month),
            _ => result.push(vec![month]),
        }
    }
    result
}

#[allow(dead_code)]
pub fn assert_all_invariants(output: &AllocatorOutput) {
    assert_one_slot_per_month(output);
    assert_capacity_respected(output);
    assert_runs_contiguous(output);
    assert_no_dec_jan_crossing(output);
    assert_grm_starts_odd(output);
}
