//! Property-Based Tests for the adaptation fold and analytics
//!
//! Invariants:
//! - Floors only raise: font size / line height never drop below the base
//! - Adding a category never lowers font size or line height
//! - Numeric fields are independent of tag order
//! - Extra time is the sum of the applied rules
//! - Ranked recommendations are sorted and bounded by the limit

use proptest::prelude::*;

use adaptive_algo::adaptation::disability_rule;
use adaptive_algo::progress::SubjectProgress;
use adaptive_algo::{
    classify_trend, compute_for_categories, rank_recommendations, DifficultyLevel,
    DisabilityCategory, InterfaceSettings, LearningStyle, ScaffoldingLevel, Subject, Trend,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_category() -> impl Strategy<Value = DisabilityCategory> {
    (0usize..DisabilityCategory::ALL.len()).prop_map(|i| DisabilityCategory::ALL[i])
}

fn arb_style() -> impl Strategy<Value = Option<LearningStyle>> {
    proptest::option::of(prop_oneof![
        Just(LearningStyle::Visual),
        Just(LearningStyle::Auditory),
        Just(LearningStyle::Kinesthetic),
        Just(LearningStyle::Reading),
    ])
}

fn arb_scaffolding() -> impl Strategy<Value = Option<ScaffoldingLevel>> {
    proptest::option::of((1u8..=5).prop_map(|v| ScaffoldingLevel::from_value(v).unwrap()))
}

fn arb_settings() -> impl Strategy<Value = InterfaceSettings> {
    (10u32..=40, (10u32..=30).prop_map(|v| v as f64 / 10.0), any::<bool>()).prop_map(
        |(font_size, line_height, audio_enabled)| InterfaceSettings {
            font_size,
            line_height,
            audio_enabled,
            ..InterfaceSettings::default()
        },
    )
}

fn arb_subject_progress() -> impl Strategy<Value = SubjectProgress> {
    (
        (0usize..Subject::ALL.len()),
        0usize..5,
        (0u32..=100).prop_map(f64::from),
        (1u8..=5),
        proptest::collection::vec("[a-z]{3,8}", 0..4),
        proptest::collection::vec("[a-z]{3,8}", 0..3),
    )
        .prop_map(|(subject, completed, average, level, weak, strong)| SubjectProgress {
            subject: Subject::ALL[subject],
            total_tasks: completed + 1,
            completed_tasks: completed,
            average_score: average,
            current_difficulty: DifficultyLevel::from_value(level).unwrap(),
            topics_covered: weak.iter().chain(&strong).cloned().collect(),
            weak_topics: weak,
            strong_topics: strong,
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn floors_only_raise(
        categories in proptest::collection::vec(arb_category(), 0..6),
        style in arb_style(),
        scaffolding in arb_scaffolding(),
        base in arb_settings(),
    ) {
        let plan = compute_for_categories(&categories, style, scaffolding, Some(&base));

        prop_assert!(plan.font_size >= base.font_size);
        prop_assert!(plan.line_height >= base.line_height);
        for rule in categories.iter().filter_map(|c| disability_rule(*c)) {
            if let Some(floor) = rule.font_size_floor {
                prop_assert!(plan.font_size >= floor);
            }
            if let Some(floor) = rule.line_height_floor {
                prop_assert!(plan.line_height >= floor);
            }
        }
    }

    #[test]
    fn extra_category_never_lowers_floors(
        categories in proptest::collection::vec(arb_category(), 1..8),
        style in arb_style(),
        scaffolding in arb_scaffolding(),
        base in proptest::option::of(arb_settings()),
    ) {
        for n in 0..categories.len() {
            let before = compute_for_categories(&categories[..n], style, scaffolding, base.as_ref());
            let after = compute_for_categories(&categories[..=n], style, scaffolding, base.as_ref());

            prop_assert!(after.font_size >= before.font_size);
            prop_assert!(after.line_height >= before.line_height);
        }
    }

    #[test]
    fn numeric_fields_ignore_tag_order(
        categories in proptest::collection::vec(arb_category(), 0..6),
        style in arb_style(),
    ) {
        let mut reversed = categories.clone();
        reversed.reverse();

        let forward = compute_for_categories(&categories, style, None, None);
        let backward = compute_for_categories(&reversed, style, None, None);

        prop_assert_eq!(forward.font_size, backward.font_size);
        prop_assert!((forward.line_height - backward.line_height).abs() < 1e-12);
        prop_assert_eq!(forward.extra_time, backward.extra_time);
        prop_assert_eq!(forward.recommendation_count(), backward.recommendation_count());
    }

    #[test]
    fn extra_time_is_additive(categories in proptest::collection::vec(arb_category(), 0..8)) {
        let expected: u32 = categories
            .iter()
            .filter_map(|c| disability_rule(*c))
            .map(|rule| rule.extra_time)
            .sum();
        let plan = compute_for_categories(&categories, None, None, None);
        prop_assert_eq!(plan.extra_time, expected);
    }

    #[test]
    fn ranking_is_sorted_and_bounded(
        progress in proptest::collection::vec(arb_subject_progress(), 0..6),
        limit in 1usize..=20,
    ) {
        let ranked = rank_recommendations(&progress, limit).unwrap();
        prop_assert!(ranked.len() <= limit);
        for pair in ranked.windows(2) {
            prop_assert!(pair[0].priority >= pair[1].priority);
        }
    }

    #[test]
    fn uniform_active_week_reads_as_declining(per_day in 1usize..50) {
        // three days against four: 3n < 4n * 0.8
        prop_assert_eq!(classify_trend(&[per_day; 7]), Trend::Declining);
    }
}
