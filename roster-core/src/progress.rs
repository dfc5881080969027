//! Progress derivation over resident history.
//!
//! Pure functions that aggregate a resident's prior assignments into the
//! quantities the hard and soft constraints consult: per-posting block
//! counts, core progress per base, completed electives, CCR completion and
//! the career-stage math. Leave rows and rows without a posting code never
//! count toward progress.

use crate::models::{HistoryRow, Posting, PostingType};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Blocks required for each core base posting.
pub const CORE_REQUIREMENTS: [(&str, i64); 7] = [
    ("GM", 6),
    ("GRM", 2),
    ("CVM", 3),
    ("RCCM", 3),
    ("MICU", 3),
    ("ED", 1),
    ("NL", 3),
];

/// Complex-case-requirement postings: the GM variants at the tertiary
/// institutions. Exactly one must be completed by stage 3.
pub const CCR_POSTINGS: [&str; 4] = ["GM (NUH)", "GM (SGH)", "GM (CGH)", "GM (SKH)"];

/// Detailed progress of one resident on one posting code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingProgress {
    pub blocks_completed: i64,
    pub blocks_required: Option<i64>,
    pub is_completed: bool,
}

/// The base portion of a posting code: everything before the first `" ("`.
///
/// `"GM (KTPH)"` maps to `"GM"`; a code without an institution suffix is
/// its own base.
pub fn base_code(posting_code: &str) -> &str {
    match posting_code.split_once(" (") {
        Some((base, _)) => base,
        None => posting_code,
    }
}

/// The institution portion of a posting code, without the parentheses.
pub fn institution(posting_code: &str) -> &str {
    match posting_code.split_once(" (") {
        Some((_, rest)) => rest.trim_end_matches(')'),
        None => "",
    }
}

/// Career stage for a total number of completed blocks: 1 below 12 blocks,
/// 2 below 24, 3 from 24 up.
pub fn stage_from_blocks(blocks_completed: i64) -> u8 {
    if blocks_completed < 12 {
        1
    } else if blocks_completed < 24 {
        2
    } else {
        3
    }
}

/// All posting-code variants sharing a base, matched case-insensitively
/// after trimming.
///
/// For base `"GM"` this may return `["GM (NUH)", "GM (SGH)", "GM (CGH)"]`.
pub fn variants_for_base<'a, I>(base: &str, posting_codes: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let cleaned = base.trim();
    if cleaned.is_empty() {
        return Vec::new();
    }
    posting_codes
        .into_iter()
        .filter(|code| base_code(code).trim().eq_ignore_ascii_case(cleaned))
        .cloned()
        .collect()
}

/// Counts blocks completed per posting code for each resident.
///
/// Leave rows and rows with an empty posting code are skipped; every other
/// row counts one block toward its posting code.
pub fn parse_resident_history(
    resident_history: &[HistoryRow],
) -> HashMap<String, HashMap<String, i64>> {
    let mut history_map: HashMap<String, HashMap<String, i64>> = HashMap::new();
    for row in resident_history {
        if row.is_leave || row.posting_code.is_empty() {
            continue;
        }
        *history_map
            .entry(row.mcr.clone())
            .or_default()
            .entry(row.posting_code.clone())
            .or_insert(0) += 1;
    }
    history_map
}

fn is_unique_posting_completed(
    posting_code: &str,
    blocks_completed: i64,
    posting_info: &HashMap<String, &Posting>,
) -> bool {
    match posting_info.get(posting_code) {
        Some(posting) => blocks_completed >= posting.required_block_duration,
        None => false,
    }
}

/// The set of posting codes each resident has fully completed.
pub fn completed_postings(
    resident_history: &[HistoryRow],
    posting_info: &HashMap<String, &Posting>,
) -> HashMap<String, HashSet<String>> {
    let history_map = parse_resident_history(resident_history);

    let mut completed_map = HashMap::new();
    for (mcr, posting_counts) in history_map {
        let mut completed = HashSet::new();
        for (posting_code, &blocks_completed) in &posting_counts {
            if is_unique_posting_completed(posting_code, blocks_completed, posting_info) {
                completed.insert(posting_code.clone());
            }
        }
        completed_map.insert(mcr, completed);
    }
    completed_map
}

/// Detailed per-posting progress for each resident.
pub fn posting_progress(
    resident_history: &[HistoryRow],
    posting_info: &HashMap<String, &Posting>,
) -> HashMap<String, HashMap<String, PostingProgress>> {
    let history_map = parse_resident_history(resident_history);

    let mut progress_map = HashMap::new();
    for (mcr, posting_counts) in history_map {
        let mut resident_progress = HashMap::new();
        for (posting_code, blocks_completed) in posting_counts {
            let blocks_required = posting_info
                .get(&posting_code)
                .map(|p| p.required_block_duration);
            let is_completed = match blocks_required {
                Some(required) => blocks_completed >= required,
                None => false,
            };
            resident_progress.insert(
                posting_code,
                PostingProgress {
                    blocks_completed,
                    blocks_required,
                    is_completed,
                },
            );
        }
        progress_map.insert(mcr, resident_progress);
    }
    progress_map
}

/// Total blocks completed per core base posting, summed over all variants.
///
/// Every base in [`CORE_REQUIREMENTS`] is present in the result, zeroed
/// when the resident has no history for it.
pub fn core_blocks_completed(
    resident_progress: &HashMap<String, PostingProgress>,
    posting_info: &HashMap<String, &Posting>,
) -> BTreeMap<String, i64> {
    let mut core_blocks: BTreeMap<String, i64> = CORE_REQUIREMENTS
        .iter()
        .map(|(base, _)| (base.to_string(), 0))
        .collect();

    for (posting_code, details) in resident_progress {
        let Some(posting) = posting_info.get(posting_code) else {
            continue;
        };
        if posting.posting_type == PostingType::Core {
            *core_blocks
                .entry(base_code(posting_code).to_string())
                .or_insert(0) += details.blocks_completed;
        }
    }
    core_blocks
}

/// The set of elective posting codes the resident has completed.
pub fn unique_electives_completed(
    resident_progress: &HashMap<String, PostingProgress>,
    posting_info: &HashMap<String, &Posting>,
) -> HashSet<String> {
    let mut unique_electives = HashSet::new();
    for (posting_code, details) in resident_progress {
        let Some(posting) = posting_info.get(posting_code) else {
            continue;
        };
        if posting.posting_type == PostingType::Elective
            && is_unique_posting_completed(posting_code, details.blocks_completed, posting_info)
        {
            unique_electives.insert(posting_code.clone());
        }
    }
    unique_electives
}

/// All CCR posting codes the resident has completed, in [`CCR_POSTINGS`]
/// order.
pub fn ccr_postings_completed(
    resident_progress: &HashMap<String, PostingProgress>,
    posting_info: &HashMap<String, &Posting>,
) -> Vec<String> {
    let mut completed = Vec::new();
    for ccr_code in CCR_POSTINGS {
        let blocks_completed = resident_progress
            .get(ccr_code)
            .map(|p| p.blocks_completed)
            .unwrap_or(0);
        let required = posting_info.get(ccr_code).map(|p| p.required_block_duration);

        if Some(blocks_completed) == required {
            completed.push(ccr_code.to_string());
        }
    }
    completed
}
