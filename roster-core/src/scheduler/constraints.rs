//! Hard constraints of the allocation model.
//!
//! Everything here must hold in any returned solution. The numbering in
//! the section comments follows the order the constraints are added;
//! pinned assignments are applied while the context is built.

use super::automaton::{add_automaton, Dfa};
use super::{
    bidx, block_range, bool_sum, early_blocks, int_sum, late_blocks, scaled_bool, ModelContext,
    DEC, JAN,
};
use crate::progress::{base_code, institution, CCR_POSTINGS, CORE_REQUIREMENTS};
use cp_sat::builder::{BoolVar, LinearExpr};

pub(crate) fn add_hard_constraints(ctx: &mut ModelContext) {
    add_one_slot_per_block(ctx);
    add_leave_blocks(ctx);
    add_capacity(ctx);
    add_contiguous_runs(ctx);
    add_ccr_rule(ctx);
    add_core_over_assignment(ctx);
    add_elective_non_repetition(ctx);
    add_micu_rccm_same_institution(ctx);
    add_micu_rccm_contiguity(ctx);
    add_no_december_crossing(ctx);
    add_grm_odd_start(ctx);
    add_quarter_starts(ctx);
    add_stage1_gm_cap(ctx);
    add_ed_grm_contiguity(ctx);
    add_ed_grm_gm_contiguity(ctx);
    add_ed_grm_required(ctx);
    add_micu_rccm_stage_packs(ctx);
    add_sr_timing(ctx);
    add_half_year_balance(ctx);
}

/// Constraint 1: each resident holds exactly one slot per block, where the
/// off variable is the explicit empty slot.
fn add_one_slot_per_block(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for b in block_range() {
            let mut slots = bool_sum(ctx.x[r].iter().map(|per_block| &per_block[bidx(b)]));
            slots = slots + LinearExpr::from(ctx.off[r][bidx(b)].clone());
            ctx.model.add_eq(slots, LinearExpr::from(1));
        }
    }
}

/// Constraint 2: declared leave blocks force the off slot.
fn add_leave_blocks(ctx: &mut ModelContext) {
    let forced: Vec<(usize, u32)> = ctx.leave_off_blocks.iter().copied().collect();
    for (r, b) in forced {
        ctx.model.add_eq(
            LinearExpr::from(ctx.off[r][bidx(b)].clone()),
            LinearExpr::from(1),
        );
    }
}

/// Constraint 3: per-block posting capacity, with slots reserved by leaves
/// that name the posting taken off the top.
fn add_capacity(ctx: &mut ModelContext) {
    for (p, posting) in ctx.input.postings.iter().enumerate() {
        for b in block_range() {
            let reserved = ctx.leave_quota.get(&(p, b)).copied().unwrap_or(0);
            let mut available = posting.max_residents - reserved;
            if available < 0 {
                log::warn!(
                    "leave reservations ({}) exceed capacity for posting {} at block {}; capping available slots at 0",
                    reserved,
                    posting.posting_code,
                    b
                );
                available = 0;
            }
            let assigned = bool_sum(ctx.x.iter().map(|per_resident| &per_resident[p][bidx(b)]));
            ctx.model.add_le(assigned, LinearExpr::from(available));
        }
    }
}

/// Constraint 4: multi-block postings are taken in whole consecutive runs
/// of exactly the required duration.
fn add_contiguous_runs(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for (p, posting) in ctx.input.postings.iter().enumerate() {
            let duration = posting.required_block_duration;
            if duration > 1 {
                let sequence: Vec<BoolVar> = ctx.x[r][p].clone();
                add_automaton(ctx, &sequence, &Dfa::run_length(duration));
            }
        }
    }
}

/// Constraint 5: the complex-case requirement. Stage-1 months never take a
/// CCR posting; a resident who has completed one historically takes no
/// more; everyone else with stage-2+ months schedules exactly one CCR run.
fn add_ccr_rule(ctx: &mut ModelContext) {
    let offered: Vec<usize> = CCR_POSTINGS
        .iter()
        .filter_map(|code| ctx.code_to_idx.get(*code).copied())
        .collect();

    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let done_ccr = CCR_POSTINGS.iter().any(|code| {
            ctx.posting_progress
                .get(&mcr)
                .and_then(|progress| progress.get(*code))
                .map(|p| p.is_completed)
                .unwrap_or(false)
        });
        let stage1_blocks = ctx.career[r].stage1_blocks();
        let has_stage2_plus = block_range().any(|b| ctx.career[r].stages_by_block[bidx(b)] >= 2);

        for &b in &stage1_blocks {
            for &p in &offered {
                ctx.model.add_eq(
                    LinearExpr::from(ctx.x[r][p][bidx(b)].clone()),
                    LinearExpr::from(0),
                );
            }
        }

        if done_ccr || !has_stage2_plus {
            for &p in &offered {
                ctx.model.add_eq(
                    LinearExpr::from(ctx.run_count[r][p].clone()),
                    LinearExpr::from(0),
                );
            }
        } else {
            let total_runs = int_sum(offered.iter().map(|&p| &ctx.run_count[r][p]));
            ctx.model.add_eq(total_runs, LinearExpr::from(1));
        }
    }
}

/// Constraint 6: core bases are never assigned past their block quota.
fn add_core_over_assignment(ctx: &mut ModelContext) {
    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let core_map = ctx.core_blocks_for(&mcr);
        for (base, required) in CORE_REQUIREMENTS {
            let completed = core_map.get(base).copied().unwrap_or(0);
            let variant_indices: Vec<usize> = ctx
                .posting_codes
                .iter()
                .enumerate()
                .filter(|(_, code)| base_code(code) == base)
                .map(|(idx, _)| idx)
                .collect();
            if variant_indices.is_empty() {
                continue;
            }
            let assigned = bool_sum(
                variant_indices
                    .iter()
                    .flat_map(|&p| ctx.x[r][p].iter()),
            );
            if completed >= required {
                ctx.model.add_eq(assigned, LinearExpr::from(0));
            } else {
                ctx.model.add_le(assigned, LinearExpr::from(required - completed));
            }
        }
    }
}

/// Constraint 7: an elective base is taken at most once across all
/// institutions, and never again once completed historically.
fn add_elective_non_repetition(ctx: &mut ModelContext) {
    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let bases_done: std::collections::HashSet<String> = ctx
            .electives_done_for(&mcr)
            .into_iter()
            .map(|code| base_code(&code).to_string())
            .collect();

        for base in ctx.elective_bases.clone() {
            let variants: Vec<usize> = ctx
                .elective_postings
                .iter()
                .copied()
                .filter(|&p| base_code(&ctx.posting_codes[p]) == base)
                .collect();
            if variants.is_empty() {
                continue;
            }
            if bases_done.contains(&base) {
                for &p in &variants {
                    ctx.model.add_eq(
                        LinearExpr::from(ctx.run_count[r][p].clone()),
                        LinearExpr::from(0),
                    );
                }
            } else {
                let total_runs = int_sum(variants.iter().map(|&p| &ctx.run_count[r][p]));
                ctx.model.add_le(total_runs, LinearExpr::from(1));
            }
        }
    }
}

fn micu_rccm_postings(ctx: &ModelContext) -> Vec<usize> {
    ctx.posting_codes
        .iter()
        .enumerate()
        .filter(|(_, code)| matches!(base_code(code), "MICU" | "RCCM"))
        .map(|(idx, _)| idx)
        .collect()
}

/// Constraint 8: MICU and RCCM selections must come from one institution.
fn add_micu_rccm_same_institution(ctx: &mut ModelContext) {
    let postings = micu_rccm_postings(ctx);
    for r in 0..ctx.mcrs.len() {
        for (i, &p1) in postings.iter().enumerate() {
            for &p2 in postings.iter().skip(i + 1) {
                if institution(&ctx.posting_codes[p1]) != institution(&ctx.posting_codes[p2]) {
                    let both = bool_sum([&ctx.sel[r][p1], &ctx.sel[r][p2]]);
                    ctx.model.add_le(both, LinearExpr::from(1));
                }
            }
        }
    }
}

/// Builds one indicator Boolean per block marking whether the resident
/// occupies any of the given postings there.
fn block_indicators(ctx: &mut ModelContext, r: usize, postings: &[usize]) -> Vec<BoolVar> {
    let mut indicators = Vec::with_capacity(block_range().count());
    for b in block_range() {
        let occupied = bool_sum(postings.iter().map(|&p| &ctx.x[r][p][bidx(b)]));
        let indicator = ctx.model.new_bool_var();
        ctx.model
            .add_eq(occupied, LinearExpr::from(indicator.clone()));
        indicators.push(indicator);
    }
    indicators
}

/// Constraint 9: the MICU/RCCM months form one contiguous stretch, and the
/// stretch does not straddle December and January.
fn add_micu_rccm_contiguity(ctx: &mut ModelContext) {
    let postings = micu_rccm_postings(ctx);
    for r in 0..ctx.mcrs.len() {
        let indicators = block_indicators(ctx, r, &postings);
        let winter = bool_sum([&indicators[bidx(DEC)], &indicators[bidx(JAN)]]);
        ctx.model.add_le(winter, LinearExpr::from(1));
        add_automaton(ctx, &indicators, &Dfa::no_reentry());
    }
}

/// Constraint 10: no posting is held in both December and January.
fn add_no_december_crossing(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for p in 0..ctx.posting_codes.len() {
            let winter = bool_sum([&ctx.x[r][p][bidx(DEC)], &ctx.x[r][p][bidx(JAN)]]);
            ctx.model.add_le(winter, LinearExpr::from(1));
        }
    }
}

/// Constraint 11: GRM runs start on odd blocks; an even-block GRM month
/// must continue the previous one.
fn add_grm_odd_start(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for &p in &ctx.grm_postings.clone() {
            for b in block_range() {
                if b > 1 && b % 2 == 0 {
                    ctx.model.add_le(
                        LinearExpr::from(ctx.x[r][p][bidx(b)].clone()),
                        LinearExpr::from(ctx.x[r][p][bidx(b - 1)].clone()),
                    );
                }
            }
        }
    }
}

/// Constraint 12: three-month runs start on quarter boundaries (1, 4, 7,
/// 10); anywhere else the month must continue the previous one.
fn add_quarter_starts(ctx: &mut ModelContext) {
    let quarter_starts = [1u32, 4, 7, 10];
    for r in 0..ctx.mcrs.len() {
        for (p, posting) in ctx.input.postings.iter().enumerate() {
            if posting.required_block_duration != 3 {
                continue;
            }
            for b in block_range() {
                if b > 1 && !quarter_starts.contains(&b) {
                    ctx.model.add_le(
                        LinearExpr::from(ctx.x[r][p][bidx(b)].clone()),
                        LinearExpr::from(ctx.x[r][p][bidx(b - 1)].clone()),
                    );
                }
            }
        }
    }
}

/// Constraint 13: at most three GM blocks within stage-1 months.
fn add_stage1_gm_cap(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        let stage1_blocks = ctx.career[r].stage1_blocks();
        if stage1_blocks.is_empty() {
            continue;
        }
        let mut gm_blocks = LinearExpr::from(0);
        for &p in &ctx.gm_postings {
            for &b in &stage1_blocks {
                gm_blocks = gm_blocks + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
            }
        }
        ctx.model.add_le(gm_blocks, LinearExpr::from(3));
    }
}

/// Constraint 14: ED and GRM months form one contiguous stretch.
fn add_ed_grm_contiguity(ctx: &mut ModelContext) {
    let mut postings = ctx.ed_postings.clone();
    postings.extend(ctx.grm_postings.iter().copied());
    for r in 0..ctx.mcrs.len() {
        let indicators = block_indicators(ctx, r, &postings);
        add_automaton(ctx, &indicators, &Dfa::no_reentry());
    }
}

/// Constraint 15: the ED/GRM/GM bundle forms one contiguous stretch.
fn add_ed_grm_gm_contiguity(ctx: &mut ModelContext) {
    let mut postings = ctx.ed_postings.clone();
    postings.extend(ctx.grm_postings.iter().copied());
    postings.extend(ctx.gm_postings.iter().copied());
    for r in 0..ctx.mcrs.len() {
        let indicators = block_indicators(ctx, r, &postings);
        add_automaton(ctx, &indicators, &Dfa::no_reentry());
    }
}

/// Constraint 16: residents who have finished neither ED nor GRM select
/// exactly one of each this year.
fn add_ed_grm_required(ctx: &mut ModelContext) {
    let ed_required = CORE_REQUIREMENTS
        .iter()
        .find(|(base, _)| *base == "ED")
        .map(|(_, q)| *q)
        .unwrap_or(0);
    let grm_required = CORE_REQUIREMENTS
        .iter()
        .find(|(base, _)| *base == "GRM")
        .map(|(_, q)| *q)
        .unwrap_or(0);

    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let core_map = ctx.core_blocks_for(&mcr);
        let done_ed = core_map.get("ED").copied().unwrap_or(0) >= ed_required;
        let done_grm = core_map.get("GRM").copied().unwrap_or(0) >= grm_required;
        if done_ed || done_grm {
            continue;
        }
        let ed_selected = bool_sum(ctx.ed_postings.iter().map(|&p| &ctx.sel[r][p]));
        ctx.model.add_eq(ed_selected, LinearExpr::from(1));
        let grm_selected = bool_sum(ctx.grm_postings.iter().map(|&p| &ctx.sel[r][p]));
        ctx.model.add_eq(grm_selected, LinearExpr::from(1));
    }
}

/// Constraint 17: MICU/RCCM minimums by career stage. Stage 1 may take the
/// first pack (1 MICU + 2 RCCM) or nothing; stage 2 must complete the
/// first pack if it is still outstanding, and may otherwise take the
/// second pack (2 MICU + 1 RCCM) or nothing; stage 3 fills both bases to
/// their quota exactly.
fn add_micu_rccm_stage_packs(ctx: &mut ModelContext) {
    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let stages_present = ctx.career[r].stages_present();
        let stage_blocks = |stage: u8| ctx.career[r].blocks_in_stage(stage);

        let blocks_in = |ctx: &ModelContext, base: &str, blocks: &[u32]| -> LinearExpr {
            let mut expr = LinearExpr::from(0);
            for (p, code) in ctx.posting_codes.iter().enumerate() {
                if base_code(code) != base {
                    continue;
                }
                for &b in blocks {
                    expr = expr + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
                }
            }
            expr
        };

        let stage1 = stage_blocks(1);
        let stage2 = stage_blocks(2);
        let all_blocks: Vec<u32> = block_range().collect();

        let core_map = ctx.core_blocks_for(&mcr);
        let hist_micu = core_map.get("MICU").copied().unwrap_or(0);
        let hist_rccm = core_map.get("RCCM").copied().unwrap_or(0);

        if stages_present.contains(&1) && !stage1.is_empty() {
            let flag = ctx.model.new_bool_var();
            let micu_s1 = blocks_in(ctx, "MICU", &stage1);
            let rccm_s1 = blocks_in(ctx, "RCCM", &stage1);
            ctx.model.add_eq(micu_s1, scaled_bool(&flag, 1));
            ctx.model.add_eq(rccm_s1, scaled_bool(&flag, 2));
        }
        if stages_present.contains(&2) {
            let first_pack_done = hist_micu == 1 && hist_rccm == 2;
            if !first_pack_done {
                let micu_s12 = blocks_in(ctx, "MICU", &stage1) + blocks_in(ctx, "MICU", &stage2);
                let rccm_s12 = blocks_in(ctx, "RCCM", &stage1) + blocks_in(ctx, "RCCM", &stage2);
                ctx.model.add_eq(micu_s12, LinearExpr::from(1));
                ctx.model.add_eq(rccm_s12, LinearExpr::from(2));
            } else if !stage2.is_empty() {
                let flag = ctx.model.new_bool_var();
                let micu_s2 = blocks_in(ctx, "MICU", &stage2);
                let rccm_s2 = blocks_in(ctx, "RCCM", &stage2);
                ctx.model.add_eq(micu_s2, scaled_bool(&flag, 2));
                ctx.model.add_eq(rccm_s2, scaled_bool(&flag, 1));
            }
        }
        if stages_present.contains(&3) {
            let micu_needed = (3 - hist_micu).max(0);
            let rccm_needed = (3 - hist_rccm).max(0);
            let micu_all = blocks_in(ctx, "MICU", &all_blocks);
            let rccm_all = blocks_in(ctx, "RCCM", &all_blocks);
            ctx.model.add_eq(micu_all, LinearExpr::from(micu_needed));
            ctx.model.add_eq(rccm_all, LinearExpr::from(rccm_needed));
        }
    }
}

/// Constraint 18: senior-rotation timing. SR variants are banned outside
/// absolute career blocks 19..=30 (which also keeps them out of stage-1
/// months), and at most one SR run is scheduled.
fn add_sr_timing(ctx: &mut ModelContext) {
    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let Some(context) = ctx.sr_context.get(&mcr).cloned() else {
            continue;
        };
        if context.sr_variants.is_empty() {
            continue;
        }

        let sr_selected = bool_sum(context.sr_variants.iter().map(|&p| &ctx.sel[r][p]));
        ctx.model.add_le(sr_selected, LinearExpr::from(1));

        let completed_blocks = ctx.career[r].completed_blocks;
        for b in block_range() {
            let absolute_block = completed_blocks + b as i64;
            if !(19..=30).contains(&absolute_block) {
                let occupied = bool_sum(
                    context
                        .sr_variants
                        .iter()
                        .map(|&p| &ctx.x[r][p][bidx(b)]),
                );
                ctx.model.add_eq(occupied, LinearExpr::from(0));
            }
        }
    }
}

/// Constraint 19: outside GM and ED, the per-block fill of a posting stays
/// within a spread of 4 across each half of the year.
fn add_half_year_balance(ctx: &mut ModelContext) {
    let num_residents = ctx.mcrs.len() as i64;
    for (p, code) in ctx.posting_codes.clone().into_iter().enumerate() {
        if matches!(base_code(&code), "GM" | "ED") {
            continue;
        }

        let mut assigned_per_block = Vec::with_capacity(block_range().count());
        for b in block_range() {
            let assigned = bool_sum(ctx.x.iter().map(|per_resident| &per_resident[p][bidx(b)]));
            let count = ctx.model.new_int_var(vec![(0, num_residents)]);
            ctx.model.add_eq(count.clone(), assigned);
            assigned_per_block.push(count);
        }

        for half in [
            early_blocks().collect::<Vec<u32>>(),
            late_blocks().collect::<Vec<u32>>(),
        ] {
            for (i, &b1) in half.iter().enumerate() {
                for &b2 in half.iter().skip(i + 1) {
                    let n1 = LinearExpr::from(assigned_per_block[bidx(b1)].clone());
                    let n2 = LinearExpr::from(assigned_per_block[bidx(b2)].clone());
                    ctx.model.add_le(
                        n1.clone() - n2.clone(),
                        LinearExpr::from(4),
                    );
                    ctx.model.add_le(n2 - n1, LinearExpr::from(4));
                }
            }
        }
    }
}
