//! Pre-solve feasibility analysis.
//!
//! A cheap, read-only pass over the solver input that flags the usual
//! sources of infeasibility before a (potentially long) solve is started:
//! residents with more outstanding requirements than the catalogue can
//! supply, and a cohort that simply does not fit the capacity on offer.

use crate::models::{AllocatorInput, Posting, PostingType};
use crate::progress::{
    completed_postings, core_blocks_completed, posting_progress, unique_electives_completed,
    CORE_REQUIREMENTS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Feasibility outlook for one resident.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResidentFeasibility {
    pub mcr: String,
    pub resident_year: u32,
    /// Postings the resident has already completed
    pub completed_postings: usize,
    /// Postings still open to the resident
    pub available_postings: usize,
    pub electives_completed: usize,
    pub electives_available: usize,
    /// Unique electives required by the end of this residency year
    pub electives_required: u32,
    /// True when the elective gap exceeds what the catalogue still offers
    pub elective_supply_short: bool,
    /// Outstanding core blocks per base; populated for year-3 residents
    pub core_gaps: BTreeMap<String, i64>,
}

/// Cohort-level capacity check.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CapacityCheck {
    /// Twelve blocks per resident
    pub blocks_needed: i64,
    /// Total posting capacity across the year
    pub blocks_available: i64,
    pub sufficient: bool,
}

/// The full pre-solve report.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FeasibilityReport {
    pub residents: Vec<ResidentFeasibility>,
    pub capacity: CapacityCheck,
}

/// Analyzes the input without invoking the solver.
pub fn analyze_feasibility(input: &AllocatorInput) -> FeasibilityReport {
    let posting_info: HashMap<String, &Posting> = input
        .postings
        .iter()
        .map(|p| (p.posting_code.clone(), p))
        .collect();

    let completed_map = completed_postings(&input.resident_history, &posting_info);
    let progress_map = posting_progress(&input.resident_history, &posting_info);

    let elective_codes: Vec<&String> = input
        .postings
        .iter()
        .filter(|p| p.posting_type == PostingType::Elective)
        .map(|p| &p.posting_code)
        .collect();

    let mut residents = Vec::with_capacity(input.residents.len());
    for resident in &input.residents {
        let completed = completed_map.get(&resident.mcr).cloned().unwrap_or_default();
        let empty = HashMap::new();
        let progress = progress_map.get(&resident.mcr).unwrap_or(&empty);

        let electives_completed = unique_electives_completed(progress, &posting_info).len();
        let electives_available = elective_codes
            .iter()
            .filter(|code| !completed.contains(code.as_str()))
            .count();
        let electives_required = match resident.resident_year {
            2 => 2,
            3 => 5,
            _ => 0,
        };
        let elective_gap = electives_required as i64 - electives_completed as i64;
        let elective_supply_short = elective_gap > electives_available as i64;

        let mut core_gaps = BTreeMap::new();
        if resident.resident_year == 3 {
            let core_map = core_blocks_completed(progress, &posting_info);
            for (base, required) in CORE_REQUIREMENTS {
                let gap = required - core_map.get(base).copied().unwrap_or(0);
                if gap > 0 {
                    core_gaps.insert(base.to_string(), gap);
                }
            }
        }

        residents.push(ResidentFeasibility {
            mcr: resident.mcr.clone(),
            resident_year: resident.resident_year,
            completed_postings: completed.len(),
            available_postings: input.postings.len() - completed.len(),
            electives_completed,
            electives_available,
            electives_required,
            elective_supply_short,
            core_gaps,
        });
    }

    let blocks_needed = input.residents.len() as i64 * 12;
    let blocks_available: i64 = input.postings.iter().map(|p| p.max_residents * 12).sum();

    FeasibilityReport {
        residents,
        capacity: CapacityCheck {
            blocks_needed,
            blocks_available,
            sufficient: blocks_available >= blocks_needed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryRow, Resident, Weightages};

    fn base_input() -> AllocatorInput {
        AllocatorInput {
            residents: vec![Resident {
                mcr: "M001".into(),
                name: "A".into(),
                resident_year: 3,
                career_blocks_completed: 24,
            }],
            resident_history: vec![],
            resident_preferences: vec![],
            resident_sr_preferences: vec![],
            postings: vec![
                Posting {
                    posting_code: "GM (NUH)".into(),
                    posting_name: "GM".into(),
                    posting_type: PostingType::Core,
                    max_residents: 1,
                    required_block_duration: 1,
                },
                Posting {
                    posting_code: "Endo (KTPH)".into(),
                    posting_name: "Endo".into(),
                    posting_type: PostingType::Elective,
                    max_residents: 1,
                    required_block_duration: 1,
                },
            ],
            resident_leaves: vec![],
            pinned_assignments: Default::default(),
            weightages: Weightages::default(),
            max_time_in_minutes: None,
        }
    }

    #[test]
    fn flags_elective_supply_shortage() {
        let report = analyze_feasibility(&base_input());
        let resident = &report.residents[0];
        assert_eq!(resident.electives_required, 5);
        assert_eq!(resident.electives_available, 1);
        assert!(resident.elective_supply_short);
    }

    #[test]
    fn reports_core_gaps_for_year_three() {
        let mut input = base_input();
        input.resident_history.push(HistoryRow {
            mcr: "M001".into(),
            year: 1,
            month_block: 1,
            career_block: Some(1),
            posting_code: "GM (NUH)".into(),
            is_current_year: false,
            is_leave: false,
            leave_type: String::new(),
        });
        let report = analyze_feasibility(&input);
        let gaps = &report.residents[0].core_gaps;
        assert_eq!(gaps.get("GM").copied(), Some(5));
        assert_eq!(gaps.get("ED").copied(), Some(1));
    }

    #[test]
    fn capacity_check_compares_demand_and_supply() {
        let report = analyze_feasibility(&base_input());
        assert_eq!(report.capacity.blocks_needed, 12);
        assert_eq!(report.capacity.blocks_available, 24);
        assert!(report.capacity.sufficient);
    }
}
