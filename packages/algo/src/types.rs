//! Common Types and Constants
//!
//! Closed-set tags and ordinal levels shared by the adaptation engine and
//! the progress analytics.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Default interface font size (px)
pub const DEFAULT_FONT_SIZE: u32 = 16;

/// Default interface line height
pub const DEFAULT_LINE_HEIGHT: f64 = 1.5;

/// Default color scheme name
pub const DEFAULT_COLOR_SCHEME: &str = "default";

/// Color scheme forced by visual impairment
pub const HIGH_CONTRAST_SCHEME: &str = "high_contrast";

// ==================== Disability categories ====================

/// Learning difference requiring content or interface accommodations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisabilityCategory {
    #[serde(rename = "dyslexia")]
    Dyslexia,
    #[serde(rename = "dyscalculia")]
    Dyscalculia,
    #[serde(rename = "dysgraphia")]
    Dysgraphia,
    #[serde(rename = "adhd")]
    Adhd,
    #[serde(rename = "asd")]
    AutismSpectrum,
    #[serde(rename = "hearing")]
    HearingImpaired,
    #[serde(rename = "visual")]
    VisualImpaired,
    #[serde(rename = "speech")]
    SpeechDisorder,
    #[serde(rename = "intellectual")]
    Intellectual,
    #[serde(rename = "motor")]
    Motor,
}

impl DisabilityCategory {
    pub const ALL: [DisabilityCategory; 10] = [
        Self::Dyslexia,
        Self::Dyscalculia,
        Self::Dysgraphia,
        Self::Adhd,
        Self::AutismSpectrum,
        Self::HearingImpaired,
        Self::VisualImpaired,
        Self::SpeechDisorder,
        Self::Intellectual,
        Self::Motor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dyslexia => "dyslexia",
            Self::Dyscalculia => "dyscalculia",
            Self::Dysgraphia => "dysgraphia",
            Self::Adhd => "adhd",
            Self::AutismSpectrum => "asd",
            Self::HearingImpaired => "hearing",
            Self::VisualImpaired => "visual",
            Self::SpeechDisorder => "speech",
            Self::Intellectual => "intellectual",
            Self::Motor => "motor",
        }
    }

    /// Tags come from free-text profile columns; anything unknown maps to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        let tag = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == tag)
    }
}

// ==================== Learning style ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    #[default]
    Visual,
    Auditory,
    Kinesthetic,
    Reading,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::Kinesthetic => "kinesthetic",
            Self::Reading => "reading",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "visual" => Some(Self::Visual),
            "auditory" => Some(Self::Auditory),
            "kinesthetic" => Some(Self::Kinesthetic),
            "reading" => Some(Self::Reading),
            _ => None,
        }
    }
}

// ==================== Scaffolding ====================

/// Ordinal support level, 1 = full support ... 5 = independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScaffoldingLevel {
    FullSupport = 1,
    HighSupport = 2,
    #[default]
    MediumSupport = 3,
    LowSupport = 4,
    Independent = 5,
}

impl ScaffoldingLevel {
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::FullSupport),
            2 => Some(Self::HighSupport),
            3 => Some(Self::MediumSupport),
            4 => Some(Self::LowSupport),
            5 => Some(Self::Independent),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FullSupport => "full support",
            Self::HighSupport => "high support",
            Self::MediumSupport => "medium support",
            Self::LowSupport => "low support",
            Self::Independent => "independent",
        }
    }
}

impl TryFrom<u8> for ScaffoldingLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| format!("scaffolding level out of range: {value}"))
    }
}

impl From<ScaffoldingLevel> for u8 {
    fn from(level: ScaffoldingLevel) -> Self {
        level.value()
    }
}

// ==================== Difficulty ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum DifficultyLevel {
    VeryEasy = 1,
    Easy = 2,
    #[default]
    Medium = 3,
    Hard = 4,
    VeryHard = 5,
}

impl DifficultyLevel {
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::VeryEasy),
            2 => Some(Self::Easy),
            3 => Some(Self::Medium),
            4 => Some(Self::Hard),
            5 => Some(Self::VeryHard),
            _ => None,
        }
    }

    /// One tier up, saturating at `VeryHard`.
    pub fn harder(&self) -> Self {
        Self::from_value((self.value() + 1).min(5)).unwrap_or(Self::VeryHard)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryEasy => "very easy",
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
            Self::VeryHard => "very hard",
        }
    }
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or_else(|| format!("difficulty out of range: {value}"))
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(level: DifficultyLevel) -> Self {
        level.value()
    }
}

// ==================== Subjects ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Russian,
    Math,
    Reading,
    NaturalScience,
    English,
    Other,
}

impl Subject {
    /// Canonical iteration order for per-subject analytics.
    pub const ALL: [Subject; 6] = [
        Self::Russian,
        Self::Math,
        Self::Reading,
        Self::NaturalScience,
        Self::English,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Russian => "russian",
            Self::Math => "math",
            Self::Reading => "reading",
            Self::NaturalScience => "natural_science",
            Self::English => "english",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let tag = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|subject| subject.as_str() == tag)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Russian => "Russian language",
            Self::Math => "Mathematics",
            Self::Reading => "Reading and literature",
            Self::NaturalScience => "Natural science",
            Self::English => "English language",
            Self::Other => "Other",
        }
    }
}

// ==================== Statuses ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Draft,
    #[default]
    Active,
    Completed,
    Archived,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IepStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

impl IepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Achieved,
    NotAchieved,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Achieved => "achieved",
            Self::NotAchieved => "not_achieved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "in_progress" => Some(Self::InProgress),
            "achieved" => Some(Self::Achieved),
            "not_achieved" => Some(Self::NotAchieved),
            _ => None,
        }
    }
}

// ==================== Interface settings ====================

/// Per-student interface preferences stored on the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSettings {
    pub font_size: u32,
    pub line_height: f64,
    pub color_scheme: String,
    pub audio_enabled: bool,
    #[serde(default = "default_true")]
    pub animations_enabled: bool,
    /// Seconds per task
    #[serde(default)]
    pub preferred_pace: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            line_height: DEFAULT_LINE_HEIGHT,
            color_scheme: DEFAULT_COLOR_SCHEME.to_string(),
            audio_enabled: false,
            animations_enabled: true,
            preferred_pace: None,
        }
    }
}
