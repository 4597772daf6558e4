//! Adaptation engine
//!
//! Merges the accommodations required by a student's disability profile,
//! learning style and scaffolding level into one [`AdaptationPlan`].
//!
//! Every category maps to one [`AdaptationRule`] (plain data). A single
//! [`AdaptationPlan::apply`] step merges a rule into the plan, and the plan
//! is built by folding the rules over the initial settings:
//!
//! - numeric floors only raise (`max(current, floor)`)
//! - extra time accumulates
//! - single-valued overrides: the last applied rule wins
//! - list additions are appended in application order

use serde::{Deserialize, Serialize};

use crate::types::{
    DisabilityCategory, InterfaceSettings, LearningStyle, ScaffoldingLevel, DEFAULT_COLOR_SCHEME,
    DEFAULT_FONT_SIZE, DEFAULT_LINE_HEIGHT, HIGH_CONTRAST_SCHEME,
};

const NONE: &[&str] = &[];

/// Fixed accommodation rule for one category, style or scaffolding level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationRule {
    pub font_size_floor: Option<u32>,
    pub line_height_floor: Option<f64>,
    pub audio_enabled: Option<bool>,
    pub color_scheme: Option<&'static str>,
    pub simplified_text: Option<bool>,
    /// Percentage points added to the baseline time
    pub extra_time: u32,
    pub visual_supports: &'static [&'static str],
    pub audio_supports: &'static [&'static str],
    pub interaction_modifications: &'static [&'static str],
    pub content_modifications: &'static [&'static str],
}

impl AdaptationRule {
    pub const EMPTY: AdaptationRule = AdaptationRule {
        font_size_floor: None,
        line_height_floor: None,
        audio_enabled: None,
        color_scheme: None,
        simplified_text: None,
        extra_time: 0,
        visual_supports: NONE,
        audio_supports: NONE,
        interaction_modifications: NONE,
        content_modifications: NONE,
    };
}

// ==================== Disability rules ====================

pub const DYSLEXIA: AdaptationRule = AdaptationRule {
    font_size_floor: Some(18),
    line_height_floor: Some(1.8),
    audio_enabled: Some(true),
    extra_time: 30,
    content_modifications: &[
        "Use short, simple sentences",
        "Avoid hard-to-read letter combinations",
        "Split text into paragraphs of 2-3 sentences",
    ],
    audio_supports: &["Read the whole task aloud"],
    ..AdaptationRule::EMPTY
};

pub const DYSCALCULIA: AdaptationRule = AdaptationRule {
    extra_time: 50,
    visual_supports: &[
        "Number line",
        "Represent numbers with objects",
        "Step-by-step breakdown of calculations",
    ],
    content_modifications: &[
        "Break the problem into small steps",
        "Use concrete visual examples",
        "Avoid abstract numbers",
    ],
    ..AdaptationRule::EMPTY
};

pub const DYSGRAPHIA: AdaptationRule = AdaptationRule {
    interaction_modifications: &[
        "Prefer choosing from options",
        "Minimize written input",
        "Offer voice input",
    ],
    content_modifications: &["Replace open questions with multiple choice"],
    ..AdaptationRule::EMPTY
};

pub const ADHD: AdaptationRule = AdaptationRule {
    visual_supports: &[
        "Visual timer",
        "Completion progress bar",
        "Bright accents on key elements",
    ],
    interaction_modifications: &[
        "Split into short stages",
        "Immediate feedback",
        "Interactive elements",
    ],
    content_modifications: &["Short tasks of 5-7 minutes"],
    ..AdaptationRule::EMPTY
};

pub const AUTISM_SPECTRUM: AdaptationRule = AdaptationRule {
    visual_supports: &[
        "Clear visual structure",
        "Step-by-step instructions with pictures",
        "Predictable order of elements",
    ],
    content_modifications: &[
        "Avoid metaphors and idioms",
        "Concrete, unambiguous wording",
        "Announce transitions in advance",
    ],
    ..AdaptationRule::EMPTY
};

pub const HEARING_IMPAIRED: AdaptationRule = AdaptationRule {
    audio_enabled: Some(false),
    visual_supports: &[
        "Captions for all audio",
        "Visual instructions",
        "Animations instead of audio",
    ],
    content_modifications: &["Replace audio with visual elements"],
    ..AdaptationRule::EMPTY
};

pub const VISUAL_IMPAIRED: AdaptationRule = AdaptationRule {
    font_size_floor: Some(24),
    line_height_floor: Some(2.0),
    color_scheme: Some(HIGH_CONTRAST_SCHEME),
    audio_enabled: Some(true),
    audio_supports: &["Full audio description", "Screen reader compatibility"],
    content_modifications: &["Describe every visual element in text"],
    ..AdaptationRule::EMPTY
};

pub const INTELLECTUAL: AdaptationRule = AdaptationRule {
    simplified_text: Some(true),
    font_size_floor: Some(20),
    extra_time: 100,
    content_modifications: &[
        "Plainest possible language",
        "Plenty of repetition",
        "Everyday real-life examples",
        "Smallest possible steps",
    ],
    visual_supports: &["A picture for every step"],
    ..AdaptationRule::EMPTY
};

pub const MOTOR: AdaptationRule = AdaptationRule {
    extra_time: 30,
    interaction_modifications: &[
        "Large clickable targets",
        "Keyboard navigation",
        "Voice control",
    ],
    ..AdaptationRule::EMPTY
};

/// Rule for a category; speech disorder carries no interface rule.
pub fn disability_rule(category: DisabilityCategory) -> Option<&'static AdaptationRule> {
    match category {
        DisabilityCategory::Dyslexia => Some(&DYSLEXIA),
        DisabilityCategory::Dyscalculia => Some(&DYSCALCULIA),
        DisabilityCategory::Dysgraphia => Some(&DYSGRAPHIA),
        DisabilityCategory::Adhd => Some(&ADHD),
        DisabilityCategory::AutismSpectrum => Some(&AUTISM_SPECTRUM),
        DisabilityCategory::HearingImpaired => Some(&HEARING_IMPAIRED),
        DisabilityCategory::VisualImpaired => Some(&VISUAL_IMPAIRED),
        DisabilityCategory::Intellectual => Some(&INTELLECTUAL),
        DisabilityCategory::Motor => Some(&MOTOR),
        DisabilityCategory::SpeechDisorder => None,
    }
}

// ==================== Learning style overlays ====================

const VISUAL_STYLE: AdaptationRule = AdaptationRule {
    visual_supports: &["Diagrams and charts", "Color coding", "Infographics"],
    ..AdaptationRule::EMPTY
};

const AUDITORY_STYLE: AdaptationRule = AdaptationRule {
    audio_enabled: Some(true),
    audio_supports: &["Text read aloud", "Audio instructions", "Background music"],
    ..AdaptationRule::EMPTY
};

const KINESTHETIC_STYLE: AdaptationRule = AdaptationRule {
    interaction_modifications: &[
        "Drag-and-drop elements",
        "Interactive manipulation",
        "Hands-on activities",
    ],
    ..AdaptationRule::EMPTY
};

const READING_STYLE: AdaptationRule = AdaptationRule {
    content_modifications: &[
        "Detailed written instructions",
        "Option to write answers down",
    ],
    ..AdaptationRule::EMPTY
};

pub fn learning_style_rule(style: LearningStyle) -> &'static AdaptationRule {
    match style {
        LearningStyle::Visual => &VISUAL_STYLE,
        LearningStyle::Auditory => &AUDITORY_STYLE,
        LearningStyle::Kinesthetic => &KINESTHETIC_STYLE,
        LearningStyle::Reading => &READING_STYLE,
    }
}

// ==================== Scaffolding overlays ====================

const FULL_SUPPORT: AdaptationRule = AdaptationRule {
    content_modifications: &[
        "Step-by-step instructions for every action",
        "Automatic hints",
        "Demonstrate the correct answer",
    ],
    ..AdaptationRule::EMPTY
};

const HIGH_SUPPORT: AdaptationRule = AdaptationRule {
    content_modifications: &["Detailed hints on request", "Partial answer hint"],
    ..AdaptationRule::EMPTY
};

const MEDIUM_SUPPORT: AdaptationRule = AdaptationRule {
    content_modifications: &["Basic hints available"],
    ..AdaptationRule::EMPTY
};

const LOW_SUPPORT: AdaptationRule = AdaptationRule {
    content_modifications: &["Minimal hints, only after mistakes"],
    ..AdaptationRule::EMPTY
};

pub fn scaffolding_rule(level: ScaffoldingLevel) -> &'static AdaptationRule {
    match level {
        ScaffoldingLevel::FullSupport => &FULL_SUPPORT,
        ScaffoldingLevel::HighSupport => &HIGH_SUPPORT,
        ScaffoldingLevel::MediumSupport => &MEDIUM_SUPPORT,
        ScaffoldingLevel::LowSupport => &LOW_SUPPORT,
        ScaffoldingLevel::Independent => &AdaptationRule::EMPTY,
    }
}

// ==================== Plan ====================

/// Merged interface and content accommodations for one student context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationPlan {
    pub font_size: u32,
    pub line_height: f64,
    pub color_scheme: String,
    pub simplified_text: bool,
    pub audio_enabled: bool,
    pub extra_time: u32,
    pub scaffolding_level: u8,
    pub visual_supports: Vec<String>,
    pub audio_supports: Vec<String>,
    pub interaction_modifications: Vec<String>,
    pub content_modifications: Vec<String>,
}

impl Default for AdaptationPlan {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            line_height: DEFAULT_LINE_HEIGHT,
            color_scheme: DEFAULT_COLOR_SCHEME.to_string(),
            simplified_text: false,
            audio_enabled: false,
            extra_time: 0,
            scaffolding_level: ScaffoldingLevel::MediumSupport.value(),
            visual_supports: Vec::new(),
            audio_supports: Vec::new(),
            interaction_modifications: Vec::new(),
            content_modifications: Vec::new(),
        }
    }
}

impl AdaptationPlan {
    /// Starting point seeded from stored interface settings.
    pub fn from_settings(settings: &InterfaceSettings) -> Self {
        Self {
            font_size: settings.font_size,
            line_height: settings.line_height,
            color_scheme: settings.color_scheme.clone(),
            audio_enabled: settings.audio_enabled,
            ..Self::default()
        }
    }

    /// Merge one rule into the plan.
    pub fn apply(mut self, rule: &AdaptationRule) -> Self {
        if let Some(floor) = rule.font_size_floor {
            self.font_size = self.font_size.max(floor);
        }
        if let Some(floor) = rule.line_height_floor {
            self.line_height = self.line_height.max(floor);
        }
        if let Some(audio) = rule.audio_enabled {
            self.audio_enabled = audio;
        }
        if let Some(scheme) = rule.color_scheme {
            self.color_scheme = scheme.to_string();
        }
        if let Some(simplified) = rule.simplified_text {
            self.simplified_text = simplified;
        }
        self.extra_time = self.extra_time.saturating_add(rule.extra_time);

        extend(&mut self.visual_supports, rule.visual_supports);
        extend(&mut self.audio_supports, rule.audio_supports);
        extend(&mut self.interaction_modifications, rule.interaction_modifications);
        extend(&mut self.content_modifications, rule.content_modifications);
        self
    }

    pub fn with_scaffolding(self, level: ScaffoldingLevel) -> Self {
        let mut plan = self.apply(scaffolding_rule(level));
        plan.scaffolding_level = level.value();
        plan
    }

    /// Total number of free-text recommendations across the four lists.
    pub fn recommendation_count(&self) -> usize {
        self.visual_supports.len()
            + self.audio_supports.len()
            + self.interaction_modifications.len()
            + self.content_modifications.len()
    }
}

fn extend(target: &mut Vec<String>, items: &[&str]) {
    target.extend(items.iter().map(|item| (*item).to_string()));
}

/// Compute the adaptation plan for a student context.
///
/// `disability_tags` are applied in caller order; unknown tags are skipped.
/// The function never fails and has no side effects.
pub fn compute_adaptations<S: AsRef<str>>(
    disability_tags: &[S],
    learning_style: Option<LearningStyle>,
    scaffolding_level: Option<ScaffoldingLevel>,
    base_settings: Option<&InterfaceSettings>,
) -> AdaptationPlan {
    let categories: Vec<DisabilityCategory> = disability_tags
        .iter()
        .filter_map(|tag| DisabilityCategory::parse(tag.as_ref()))
        .collect();

    compute_for_categories(&categories, learning_style, scaffolding_level, base_settings)
}

/// Typed variant of [`compute_adaptations`].
pub fn compute_for_categories(
    categories: &[DisabilityCategory],
    learning_style: Option<LearningStyle>,
    scaffolding_level: Option<ScaffoldingLevel>,
    base_settings: Option<&InterfaceSettings>,
) -> AdaptationPlan {
    let initial = base_settings
        .map(AdaptationPlan::from_settings)
        .unwrap_or_default();

    let plan = categories
        .iter()
        .filter_map(|category| disability_rule(*category))
        .fold(initial, |plan, rule| plan.apply(rule));

    let plan = match learning_style {
        Some(style) => plan.apply(learning_style_rule(style)),
        None => plan,
    };

    match scaffolding_level {
        Some(level) => plan.with_scaffolding(level),
        None => plan,
    }
}
