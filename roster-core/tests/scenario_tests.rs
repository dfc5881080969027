//! Scenario tests driving the full allocation pipeline on literal inputs.
//!
//! Each test builds a small cohort, runs the solver, and checks the
//! schedule-level properties the residency rules guarantee.

mod common;

use common::*;
use roster_core::models::PinnedAssignment;
use roster_core::{allocate_timetable, AllocatorError};

/// S1: a single stage-1 resident with ample capacity fills the year with
/// the stage-1 curriculum: three GM blocks, the MICU/RCCM first pack, and
/// one ED plus one GRM run.
#[test]
fn stage1_resident_fills_the_stage1_curriculum() {
    let input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    let output = allocate_timetable(&input).expect("solve should succeed");

    assert_all_invariants(&output);

    assert_eq!(assigned_months_for_code(&output, "M001", "GM (KTPH)").len(), 3);
    assert_eq!(assigned_months_for_base(&output, "M001", "RCCM").len(), 2);
    assert_eq!(assigned_months_for_base(&output, "M001", "MICU").len(), 1);
    assert_eq!(assigned_months_for_base(&output, "M001", "ED").len(), 1);
    assert_eq!(assigned_months_for_base(&output, "M001", "GRM").len(), 2);

    // the MICU/RCCM pack is one contiguous stretch clear of the winter cut
    let mut icu_months = assigned_months_for_base(&output, "M001", "MICU");
    icu_months.extend(assigned_months_for_base(&output, "M001", "RCCM"));
    icu_months.sort_unstable();
    assert_eq!(icu_months.len(), 3);
    assert_eq!(icu_months[2] - icu_months[0], 2, "pack not contiguous: {icu_months:?}");
    assert!(!(icu_months.contains(&6) && icu_months.contains(&7)));
}

/// S2: an even-month GRM pin behind a leave month contradicts the
/// odd-start rule, so the model is infeasible. The same input without the
/// pin solves.
#[test]
fn even_grm_pin_is_infeasible() {
    let mut input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    input.resident_leaves.push(leave("M001", 1, "ML"));

    let control = allocate_timetable(&input).expect("leave-only input should solve");
    assert_all_invariants(&control);

    input.pinned_assignments.insert(
        "M001".to_string(),
        vec![PinnedAssignment {
            month_block: 2,
            posting_code: "GRM (TTSH)".to_string(),
        }],
    );
    match allocate_timetable(&input) {
        Err(AllocatorError::Infeasible(_)) => {}
        other => panic!("expected infeasible model, got {other:?}"),
    }
}

/// S3: an elective base completed historically is never assigned again,
/// at any institution.
#[test]
fn completed_elective_base_is_deduplicated() {
    let mut postings = stage1_postings();
    postings.push(elective("Cardio (TTSH)", 1, 1));
    postings.push(elective("Cardio (KTPH)", 1, 1));
    postings.push(elective("Rehab (TTSH)", 1, 1));

    let mut input = base_input(vec![resident("M001", 1, 0)], postings);
    input
        .resident_history
        .push(history_row("M001", 1, 1, 1, "Cardio (TTSH)"));

    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    assert!(assigned_months_for_base(&output, "M001", "Cardio").is_empty());
    // at most one new run of any other elective base
    assert!(assigned_months_for_base(&output, "M001", "Rehab").len() <= 1);
}

/// S4: a stage-3 resident's senior rotation lands inside absolute career
/// blocks 19..=30; with 24 blocks completed that is months 1..=6 only.
#[test]
fn sr_window_confines_the_senior_rotation() {
    let postings = vec![
        core("GM (TTSH)", 2, 1),
        core("GM (SGH)", 2, 1),
        core("GRM (TTSH)", 2, 2),
        core("CVM (TTSH)", 2, 3),
        core("RCCM (TTSH)", 2, 1),
        core("MICU (TTSH)", 2, 1),
        core("ED (TTSH)", 2, 1),
        core("NL (TTSH)", 2, 3),
        elective("Endo (TTSH)", 1, 1),
        elective("Rehab (TTSH)", 1, 1),
        elective("Gastro (TTSH)", 1, 1),
        elective("Onco (TTSH)", 1, 1),
        elective("Neph (TTSH)", 1, 1),
    ];

    let mut input = base_input(vec![resident("M001", 3, 24)], postings);
    input.weightages.preference = 1;
    input.weightages.elective_shortfall_penalty = 50;
    input.resident_sr_preferences.push(sr_preference("M001", 1, "Endo"));

    // history: every core quota met (one CCR among the GM blocks) and
    // three electives done, 24 blocks in total
    let mut career_block: i64 = 0;
    let mut push = |input: &mut roster_core::models::AllocatorInput, code: &str| {
        career_block += 1;
        let year = ((career_block - 1) / 12 + 1) as u32;
        let block = ((career_block - 1) % 12 + 1) as u32;
        input
            .resident_history
            .push(history_row("M001", year, block, career_block, code));
    };
    for _ in 0..5 {
        push(&mut input, "GM (TTSH)");
    }
    push(&mut input, "GM (SGH)");
    push(&mut input, "GRM (TTSH)");
    push(&mut input, "GRM (TTSH)");
    for _ in 0..3 {
        push(&mut input, "CVM (TTSH)");
    }
    for _ in 0..3 {
        push(&mut input, "RCCM (TTSH)");
    }
    for _ in 0..3 {
        push(&mut input, "MICU (TTSH)");
    }
    push(&mut input, "ED (TTSH)");
    for _ in 0..3 {
        push(&mut input, "NL (TTSH)");
    }
    push(&mut input, "Gastro (TTSH)");
    push(&mut input, "Onco (TTSH)");
    push(&mut input, "Neph (TTSH)");
    assert_eq!(career_block, 24);

    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    // the shortfall flag drives the year to exactly five unique electives
    let summary = &output.residents[0];
    assert_eq!(summary.unique_electives_completed.len(), 5);
    assert!(summary.ccr_status.completed);

    // Endo is the SR base: allowed in months 1..=6, banned in 7..=12
    let endo_months = assigned_months_for_base(&output, "M001", "Endo");
    assert_eq!(endo_months.len(), 1);
    assert!(endo_months[0] <= 6, "SR scheduled at month {}", endo_months[0]);

    // no core base may be assigned past its quota
    for base in ["GM", "GRM", "CVM", "RCCM", "MICU", "ED", "NL"] {
        assert!(
            assigned_months_for_base(&output, "M001", base).is_empty(),
            "{base} already at quota but got new blocks"
        );
    }
}

/// S5: with twelve residents all eligible for one elective, the per-block
/// fill stays within a spread of 4 inside each half of the year.
#[test]
fn half_year_balance_bounds_the_spread() {
    let postings = vec![
        core("GM (KTPH)", 12, 1),
        core("GRM (TTSH)", 12, 2),
        core("ED (TTSH)", 12, 1),
        core("MICU (TTSH)", 12, 1),
        core("RCCM (TTSH)", 12, 1),
        elective("Rehab (TTSH)", 6, 1),
    ];
    let residents = (1..=12)
        .map(|i| resident(&format!("M{i:03}"), 1, 0))
        .collect();
    let input = base_input(residents, postings);

    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    for util in &output.statistics.cohort.posting_util {
        if matches!(util.posting_code.as_str(), "GM (KTPH)" | "ED (TTSH)") {
            continue;
        }
        for half in [1..=6u32, 7..=12u32] {
            let fills: Vec<u32> = util
                .util_per_block
                .iter()
                .filter(|b| half.contains(&b.block))
                .map(|b| b.filled)
                .collect();
            let max = fills.iter().copied().max().unwrap();
            let min = fills.iter().copied().min().unwrap();
            assert!(
                max - min <= 4,
                "posting {} spread {} in half {:?}",
                util.posting_code,
                max - min,
                half
            );
        }
    }
}

/// S6a: the bundle bonus keeps ED, GRM and GM inside a single half of the
/// year when that is possible.
#[test]
fn bundle_stays_within_one_half_year() {
    let input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    let mut bundle_months = assigned_months_for_base(&output, "M001", "ED");
    bundle_months.extend(assigned_months_for_base(&output, "M001", "GRM"));
    bundle_months.extend(assigned_months_for_base(&output, "M001", "GM"));
    assert_eq!(bundle_months.len(), 6);

    let all_early = bundle_months.iter().all(|&b| b <= 6);
    let all_late = bundle_months.iter().all(|&b| b >= 7);
    assert!(
        all_early || all_late,
        "bundle crosses the winter cut: {bundle_months:?}"
    );
}

/// S6b: pinning the same posting into both December and January is
/// infeasible.
#[test]
fn december_january_pin_is_infeasible() {
    let mut input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    input.pinned_assignments.insert(
        "M001".to_string(),
        vec![
            PinnedAssignment {
                month_block: 6,
                posting_code: "GM (KTPH)".to_string(),
            },
            PinnedAssignment {
                month_block: 7,
                posting_code: "GM (KTPH)".to_string(),
            },
        ],
    );
    match allocate_timetable(&input) {
        Err(AllocatorError::Infeasible(_)) => {}
        other => panic!("expected infeasible model, got {other:?}"),
    }
}

/// Declared leaves surface as leave rows and never count as off slots.
#[test]
fn leave_months_are_preserved_in_the_output() {
    let mut input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    input.resident_leaves.push(leave("M001", 12, "NS"));

    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    let rows = current_year_rows(&output, "M001");
    let december = rows.get(&12).unwrap();
    assert!(december.is_leave);
    assert_eq!(december.leave_type, "NS");
    assert_eq!(december.career_block, None);
}

/// A preference naming an unknown posting is rejected before the solve.
#[test]
fn unknown_preference_posting_is_fatal() {
    let mut input = base_input(vec![resident("M001", 1, 0)], stage1_postings());
    input
        .resident_preferences
        .push(preference("M001", 1, "Derm (XXX)"));

    match allocate_timetable(&input) {
        Err(AllocatorError::InvalidInput(message)) => {
            assert!(message.contains("Derm (XXX)"));
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
}

/// Elective preferences steer the choice between otherwise symmetric
/// electives and show up in the satisfaction histogram.
#[test]
fn elective_preference_steers_the_assignment() {
    let mut postings = stage1_postings();
    postings.push(elective("Endo (TTSH)", 1, 1));
    postings.push(elective("Rehab (TTSH)", 1, 1));

    let mut input = base_input(vec![resident("M001", 1, 0)], postings);
    input.weightages.preference = 10;
    input
        .resident_preferences
        .push(preference("M001", 1, "Endo (TTSH)"));

    let output = allocate_timetable(&input).expect("solve should succeed");
    assert_all_invariants(&output);

    // nine curriculum months leave room for electives; the ranked one wins
    assert_eq!(assigned_months_for_base(&output, "M001", "Endo").len(), 1);

    let histogram = &output.statistics.cohort.elective_preference_satisfaction;
    assert_eq!(histogram.rank_1, 1);
    assert_eq!(histogram.no_preference, 0);
}
