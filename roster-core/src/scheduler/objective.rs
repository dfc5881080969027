//! Soft constraints, bonuses, penalties and the maximized objective.
//!
//! Soft constraints attach indicator Booleans to the hard inequalities and
//! the objective pays for positive slack. Bonus flags only carry the
//! implication toward their conditions; maximization makes them tight.
//! Shortfall flags carry both directions so "exactly fills the
//! requirement or falls short" is preserved.

use super::{
    bidx, block_range, bool_sum, early_blocks, late_blocks, scaled_bool, ModelContext,
};
use crate::progress::{base_code, variants_for_base, CORE_REQUIREMENTS};
use cp_sat::builder::{BoolVar, LinearExpr};

const CORE_BONUS_WEIGHT: i64 = 5;
const THREE_GM_BONUS_WEIGHT: i64 = 1;
const EARLY_BUNDLE_BONUS_WEIGHT: i64 = 5;
const GM_KTPH_BONUS_WEIGHT: i64 = 1;
const S2_ELECTIVE_BONUS_WEIGHT: i64 = 1;
const OFF_PENALTY_WEIGHT: i64 = 999;

pub(crate) fn add_soft_constraints_and_objective(ctx: &mut ModelContext) {
    add_elective_minimums(ctx);
    add_core_shortfalls(ctx);
    add_sr_preference_terms(ctx);
    add_preference_bonus(ctx);
    add_seniority_bonus(ctx);
    add_core_bonus(ctx);
    add_gm_ktph_bonus(ctx);
    add_three_gm_bonus(ctx);
    add_early_bundle_bonus(ctx);
    add_off_penalty(ctx);

    let terms = std::mem::take(&mut ctx.objective_terms);
    let offset = ctx.objective_offset;
    let objective = LinearExpr::from(offset) + terms.into_iter().collect::<LinearExpr>();
    ctx.model.maximize(objective);
}

fn elective_selection_count(ctx: &ModelContext, r: usize) -> LinearExpr {
    bool_sum(ctx.elective_postings.iter().map(|&p| &ctx.sel[r][p]))
}

/// Elective minimums. A resident whose year touches stage 2 must have at
/// least one elective accumulated (hard), with a small bonus for reaching
/// two when they expressed preferences. A resident whose year touches
/// stage 3 must end the year at exactly five unique electives, or pay the
/// shortfall penalty.
fn add_elective_minimums(ctx: &mut ModelContext) {
    let penalty_weight = ctx.input.weightages.elective_shortfall_penalty;

    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let stages_present = ctx.career[r].stages_present();
        let hist_count = ctx.electives_done_for(&mcr).len() as i64;

        if stages_present.contains(&2) {
            let selection_count = elective_selection_count(ctx, r);
            ctx.model.add_ge(
                selection_count + LinearExpr::from(hist_count),
                LinearExpr::from(1),
            );

            let has_prefs = ctx
                .pref_map
                .get(&mcr)
                .map(|prefs| !prefs.is_empty())
                .unwrap_or(false);
            if has_prefs {
                let flag = ctx.model.new_bool_var();
                let selection_count = elective_selection_count(ctx, r);
                ctx.model.add_ge(
                    selection_count + LinearExpr::from(hist_count),
                    scaled_bool(&flag, 2),
                );
                ctx.objective_terms.push((S2_ELECTIVE_BONUS_WEIGHT, flag));
            }
        }

        if stages_present.contains(&3) && hist_count < 5 {
            let target = 5 - hist_count;
            let unmet = ctx.model.new_bool_var();

            let selection_count = elective_selection_count(ctx, r);
            ctx.model.add_le(
                selection_count + LinearExpr::from(unmet.clone()),
                LinearExpr::from(target),
            );
            let selection_count = elective_selection_count(ctx, r);
            ctx.model.add_ge(
                selection_count + scaled_bool(&unmet, target),
                LinearExpr::from(target),
            );

            if penalty_weight != 0 {
                ctx.objective_terms.push((-penalty_weight, unmet));
            }
        }
    }
}

/// Core shortfall flags for residents whose year touches stage 3: per
/// base still below quota, the year either fills the quota exactly or the
/// unmet flag is paid for.
fn add_core_shortfalls(ctx: &mut ModelContext) {
    let penalty_weight = ctx.input.weightages.core_shortfall_penalty;

    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        if !ctx.career[r].stages_present().contains(&3) {
            continue;
        }
        let core_map = ctx.core_blocks_for(&mcr);

        for (base, required) in CORE_REQUIREMENTS {
            let hist_done = core_map.get(base).copied().unwrap_or(0);
            if hist_done >= required {
                continue;
            }
            let need = required - hist_done;

            let mut assigned = LinearExpr::from(0);
            for (p, code) in ctx.posting_codes.iter().enumerate() {
                if base_code(code) != base {
                    continue;
                }
                for b in block_range() {
                    assigned = assigned + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
                }
            }

            let unmet = ctx.model.new_bool_var();
            ctx.model.add_le(
                assigned.clone() + LinearExpr::from(unmet.clone()),
                LinearExpr::from(need),
            );
            ctx.model
                .add_ge(assigned + scaled_bool(&unmet, need), LinearExpr::from(need));

            if penalty_weight != 0 {
                ctx.objective_terms.push((-penalty_weight, unmet));
            }
        }
    }
}

/// Senior-rotation preference bonus and the stage-2 no-SR penalty.
///
/// A base earns its rank-weighted bonus when any eligible variant is
/// selected; elective variants are eligible only for residents without
/// elective preferences of their own. A resident whose year touches stage
/// 2 and who kept usable SR preferences pays the configured penalty when
/// no SR run is selected at all.
fn add_sr_preference_terms(ctx: &mut ModelContext) {
    let preference_weight = ctx.input.weightages.preference;
    let no_sr_penalty = ctx.input.weightages.sr_y2_not_selected_penalty;

    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let Some(context) = ctx.sr_context.get(&mcr).cloned() else {
            continue;
        };
        if context.updated_sr_prefs.is_empty() {
            continue;
        }

        if preference_weight != 0 {
            let max_rank = context.updated_sr_prefs.len() as i64;
            for (rank, base) in &context.updated_sr_prefs {
                let variants = variants_for_base(base, &ctx.posting_codes);
                if variants.is_empty() {
                    continue;
                }

                let mut eligible: Vec<usize> = Vec::new();
                for code in &variants {
                    let p = ctx.code_to_idx[code];
                    let is_core = ctx.input.postings[p].posting_type
                        == crate::models::PostingType::Core;
                    if is_core || context.elective_pref_bases.is_empty() {
                        eligible.push(p);
                    }
                }
                if eligible.is_empty() {
                    continue;
                }

                let base_flag = ctx.model.new_bool_var();
                let selected = bool_sum(eligible.iter().map(|&p| &ctx.sel[r][p]));
                ctx.model
                    .add_eq(selected, LinearExpr::from(base_flag.clone()));

                let bonus_multiplier = max_rank + 1 - *rank as i64;
                ctx.objective_terms
                    .push((preference_weight * bonus_multiplier, base_flag));
            }
        }

        if no_sr_penalty != 0
            && ctx.career[r].stages_present().contains(&2)
            && !context.sr_variants.is_empty()
        {
            let has_sr = ctx.model.new_bool_var();
            let selected = bool_sum(context.sr_variants.iter().map(|&p| &ctx.sel[r][p]));
            ctx.model.add_eq(selected, LinearExpr::from(has_sr.clone()));
            // penalty * (1 - has_sr)
            ctx.objective_terms.push((no_sr_penalty, has_sr));
            ctx.objective_offset -= no_sr_penalty;
        }
    }
}

/// Elective preference bonus: rank k earns `preference * (6 - k)` when
/// the preferred posting is selected.
fn add_preference_bonus(ctx: &mut ModelContext) {
    let preference_weight = ctx.input.weightages.preference;
    for (r, mcr) in ctx.mcrs.clone().into_iter().enumerate() {
        let Some(prefs) = ctx.pref_map.get(&mcr).cloned() else {
            continue;
        };
        for (rank, code) in prefs {
            let p = ctx.code_to_idx[&code];
            let weight = preference_weight * (6 - rank as i64);
            ctx.objective_terms.push((weight, ctx.sel[r][p].clone()));
        }
    }
}

/// Seniority bonus: every assigned block earns `stage * seniority`.
fn add_seniority_bonus(ctx: &mut ModelContext) {
    let seniority_weight = ctx.input.weightages.seniority;
    if seniority_weight == 0 {
        return;
    }
    for r in 0..ctx.mcrs.len() {
        for p in 0..ctx.posting_codes.len() {
            for b in block_range() {
                let stage = ctx.career[r].stages_by_block[bidx(b)] as i64;
                ctx.objective_terms
                    .push((stage * seniority_weight, ctx.x[r][p][bidx(b)].clone()));
            }
        }
    }
}

/// Flat bonus for every selected core posting, prioritising curriculum
/// work over electives at equal preference value.
fn add_core_bonus(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for &p in &ctx.core_postings {
            ctx.objective_terms
                .push((CORE_BONUS_WEIGHT, ctx.sel[r][p].clone()));
        }
    }
}

/// Flat bonus for stage-1 blocks spent at the KTPH GM variant.
fn add_gm_ktph_bonus(ctx: &mut ModelContext) {
    let Some(&p) = ctx.code_to_idx.get("GM (KTPH)") else {
        return;
    };
    for r in 0..ctx.mcrs.len() {
        for b in ctx.career[r].stage1_blocks() {
            ctx.objective_terms
                .push((GM_KTPH_BONUS_WEIGHT, ctx.x[r][p][bidx(b)].clone()));
        }
    }
}

/// Boolean that may only be 1 when the resident selects at least one of
/// the given postings.
fn presence_flag(ctx: &mut ModelContext, r: usize, postings: &[usize]) -> BoolVar {
    let flag = ctx.model.new_bool_var();
    let selected = bool_sum(postings.iter().map(|&p| &ctx.sel[r][p]));
    ctx.model.add_ge(selected, LinearExpr::from(flag.clone()));
    flag
}

/// Bonus for the "three GM blocks alongside ED and GRM" pattern.
fn add_three_gm_bonus(ctx: &mut ModelContext) {
    let ed_postings = ctx.ed_postings.clone();
    let grm_postings = ctx.grm_postings.clone();
    let gm_postings = ctx.gm_postings.clone();

    for r in 0..ctx.mcrs.len() {
        let flag = ctx.model.new_bool_var();
        let has_ed = presence_flag(ctx, r, &ed_postings);
        let has_grm = presence_flag(ctx, r, &grm_postings);

        ctx.model.add_le(
            LinearExpr::from(flag.clone()),
            LinearExpr::from(has_ed.clone()),
        );
        ctx.model.add_le(
            LinearExpr::from(flag.clone()),
            LinearExpr::from(has_grm.clone()),
        );

        let mut total_gm = LinearExpr::from(0);
        for &p in &gm_postings {
            for b in block_range() {
                total_gm = total_gm + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
            }
        }
        // flag forces exactly three GM blocks (the GM quota bounds the
        // year at six)
        ctx.model.add_ge(total_gm.clone(), scaled_bool(&flag, 3));
        ctx.model
            .add_le(total_gm + scaled_bool(&flag, 3), LinearExpr::from(6));

        ctx.objective_terms.push((THREE_GM_BONUS_WEIGHT, flag));
    }
}

/// Bonus for keeping the ED/GRM/GM bundle inside a single half of the
/// year, so it cannot straddle the December-January cut.
fn add_early_bundle_bonus(ctx: &mut ModelContext) {
    let mut bundle = ctx.ed_postings.clone();
    bundle.extend(ctx.grm_postings.iter().copied());
    bundle.extend(ctx.gm_postings.iter().copied());
    let ed_postings = ctx.ed_postings.clone();
    let grm_postings = ctx.grm_postings.clone();
    let gm_postings = ctx.gm_postings.clone();

    for r in 0..ctx.mcrs.len() {
        let flag = ctx.model.new_bool_var();
        let has_ed = presence_flag(ctx, r, &ed_postings);
        let has_grm = presence_flag(ctx, r, &grm_postings);
        let has_gm = presence_flag(ctx, r, &gm_postings);
        for presence in [&has_ed, &has_grm, &has_gm] {
            ctx.model.add_le(
                LinearExpr::from(flag.clone()),
                LinearExpr::from(presence.clone()),
            );
        }

        let mut pre_blocks = LinearExpr::from(0);
        let mut post_blocks = LinearExpr::from(0);
        for &p in &bundle {
            for b in early_blocks() {
                pre_blocks = pre_blocks + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
            }
            for b in late_blocks() {
                post_blocks = post_blocks + LinearExpr::from(ctx.x[r][p][bidx(b)].clone());
            }
        }

        // half-year presence markers; forced to 1 by any block there
        let pre_positive = ctx.model.new_bool_var();
        ctx.model.add_le(pre_blocks, scaled_bool(&pre_positive, 6));
        let post_positive = ctx.model.new_bool_var();
        ctx.model.add_le(post_blocks, scaled_bool(&post_positive, 6));

        // flag excludes occupying both halves
        let crossing = bool_sum([&pre_positive, &post_positive, &flag]);
        ctx.model.add_le(crossing, LinearExpr::from(2));

        ctx.objective_terms.push((EARLY_BUNDLE_BONUS_WEIGHT, flag));
    }
}

/// Extreme discouragement of empty blocks that are not declared leave.
fn add_off_penalty(ctx: &mut ModelContext) {
    for r in 0..ctx.mcrs.len() {
        for b in block_range() {
            if ctx.leave_off_blocks.contains(&(r, b)) {
                continue;
            }
            ctx.objective_terms
                .push((-OFF_PENALTY_WEIGHT, ctx.off[r][bidx(b)].clone()));
        }
    }
}
