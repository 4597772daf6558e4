//! Adaptive task generation on top of a [`TextGenerator`].
//!
//! The generator never touches storage: routes load the student context and
//! task rows, this module turns them into prompts and merges the model's
//! answer with the computed adaptation plan.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use adaptive_algo::{
    compute_adaptations, AdaptationPlan, DifficultyLevel, InterfaceSettings, LearningStyle,
    ScaffoldingLevel, Subject,
};

use crate::services::llm_provider::{LLMError, StructuredOutput, TextGenerator};
use crate::services::prompts::{
    disability_context, explain_recommendation_prompt, feedback_prompt, generate_task_prompt,
    FeedbackPromptFields, TaskPromptFields, SYSTEM_PROMPT_TASK_GENERATOR,
};

const TASK_TEMPERATURE: f32 = 0.7;
const EXPLAIN_TEMPERATURE: f32 = 0.5;
const FEEDBACK_TEMPERATURE: f32 = 0.7;

const DEFAULT_CONTENT_TYPE: &str = "multiple_choice";
const NO_DISABILITIES: &str = "none";

/// Everything about a student the generator needs, loaded by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentContext {
    pub student_id: i64,
    pub grade: i32,
    pub disabilities: Vec<String>,
    pub learning_style: Option<LearningStyle>,
    pub scaffolding: Option<ScaffoldingLevel>,
    pub current_difficulty: DifficultyLevel,
    pub settings: InterfaceSettings,
}

impl StudentContext {
    pub fn adaptation_plan(&self) -> AdaptationPlan {
        compute_adaptations(
            &self.disabilities,
            self.learning_style,
            self.scaffolding,
            Some(&self.settings),
        )
    }

    fn disabilities_text(&self) -> String {
        if self.disabilities.is_empty() {
            NO_DISABILITIES.to_string()
        } else {
            self.disabilities.join(", ")
        }
    }

    fn scaffolding_or_default(&self) -> ScaffoldingLevel {
        self.scaffolding.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
    pub options: Option<Vec<String>>,
    pub correct_answer: Option<Value>,
    pub hints: Vec<String>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAdaptations {
    pub font_size: u32,
    pub line_height: f64,
    pub simplified_text: bool,
    pub audio_enabled: bool,
    pub extra_time: u32,
    pub scaffolding_level: u8,
}

impl From<&AdaptationPlan> for TaskAdaptations {
    fn from(plan: &AdaptationPlan) -> Self {
        Self {
            font_size: plan.font_size,
            line_height: plan.line_height,
            simplified_text: plan.simplified_text,
            audio_enabled: plan.audio_enabled,
            extra_time: plan.extra_time,
            scaffolding_level: plan.scaffolding_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedTask {
    pub title: String,
    pub subject: Subject,
    pub topic: String,
    pub difficulty: DifficultyLevel,
    pub content: TaskContent,
    pub adaptations: TaskAdaptations,
    pub generation_metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptedTask {
    pub original_task_id: i64,
    pub student_id: i64,
    pub adaptations: AdaptationPlan,
    pub adapted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationExplanation {
    pub reasoning: String,
    pub factors: Vec<String>,
    pub student_profile_considered: Value,
    pub alternative_suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskFeedback {
    pub message: String,
    pub detailed: String,
    pub encouragement: String,
    pub tip: String,
    pub is_correct: bool,
}

/// Task fields the explanation prompt describes.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub title: String,
    pub subject: Subject,
    pub topic: String,
    pub difficulty: DifficultyLevel,
}

pub struct FeedbackRequest<'a> {
    pub task_title: &'a str,
    pub correct_answer: &'a str,
    pub student_answer: &'a str,
    pub hints_used: i32,
    pub time_spent: Option<i32>,
}

/// Adaptation snapshot for an existing task; no model call involved.
pub fn adapt_existing_task(task_id: i64, ctx: &StudentContext) -> AdaptedTask {
    AdaptedTask {
        original_task_id: task_id,
        student_id: ctx.student_id,
        adaptations: ctx.adaptation_plan(),
        adapted_at: Utc::now(),
    }
}

/// Text of a stored correct answer as the student would type it.
pub fn answer_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Case-insensitive comparison after trimming.
pub fn answers_match(student_answer: &str, correct_answer: &str) -> bool {
    student_answer.trim().to_lowercase() == correct_answer.trim().to_lowercase()
}

#[derive(Clone)]
pub struct TaskGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl TaskGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    fn ensure_available(&self) -> Result<(), LLMError> {
        if self.llm.is_available() {
            Ok(())
        } else {
            Err(LLMError::NotConfigured("LLM_API_KEY"))
        }
    }

    pub async fn generate_task(
        &self,
        ctx: &StudentContext,
        subject: Subject,
        topic: &str,
        difficulty: Option<DifficultyLevel>,
    ) -> Result<GeneratedTask, LLMError> {
        self.ensure_available()?;
        let difficulty = difficulty.unwrap_or(ctx.current_difficulty);
        let disabilities = ctx.disabilities_text();

        let prompt = generate_task_prompt(&TaskPromptFields {
            grade: ctx.grade,
            disabilities: &disabilities,
            learning_style: ctx.learning_style.map(|s| s.as_str()).unwrap_or("not specified"),
            current_difficulty: ctx.current_difficulty.label(),
            scaffolding_level: ctx.scaffolding_or_default().label(),
            subject: subject.display_name(),
            topic,
            difficulty: difficulty.label(),
        });
        let system = format!(
            "{SYSTEM_PROMPT_TASK_GENERATOR}\n\n{}",
            disability_context(&ctx.disabilities)
        );

        let response = self
            .llm
            .generate_structured(&prompt, Some(&system), TASK_TEMPERATURE)
            .await?;
        if !response.is_parsed() {
            tracing::warn!(student_id = ctx.student_id, "task generation returned unparseable output");
        }

        let plan = ctx.adaptation_plan();
        let content = TaskContent {
            kind: response.str_or("type", DEFAULT_CONTENT_TYPE),
            question: response.str_or("question", ""),
            options: response.field("options").map(|_| response.string_list("options")),
            correct_answer: response.field("correct_answer").cloned(),
            hints: response.string_list("hints"),
            explanation: response.field("explanation").and_then(Value::as_str).map(str::to_string),
        };

        let generation_metadata = json!({
            "model": self.llm.model(),
            "generated_at": Utc::now(),
            "reasoning": response.str_or("reasoning", ""),
            "student_profile": {
                "grade": ctx.grade,
                "disabilities": ctx.disabilities,
                "learning_style": ctx.learning_style,
                "scaffolding_level": ctx.scaffolding_or_default(),
            },
            "adaptations_applied": plan,
        });

        Ok(GeneratedTask {
            title: response.str_or("title", &format!("Task on topic: {topic}")),
            subject,
            topic: topic.to_string(),
            difficulty,
            content,
            adaptations: TaskAdaptations::from(&plan),
            generation_metadata,
        })
    }

    pub async fn explain_recommendation(
        &self,
        ctx: &StudentContext,
        task: &TaskInfo,
        progress_history: &Value,
    ) -> Result<GenerationExplanation, LLMError> {
        self.ensure_available()?;
        let profile = json!({
            "grade": ctx.grade,
            "disabilities": ctx.disabilities,
            "learning_style": ctx.learning_style,
            "current_difficulty": ctx.current_difficulty,
            "scaffolding_level": ctx.scaffolding_or_default(),
        });

        let prompt = explain_recommendation_prompt(
            &pretty(&profile),
            &pretty(&serde_json::to_value(task)?),
            &pretty(progress_history),
        );
        let response = self
            .llm
            .generate_structured(&prompt, Some(SYSTEM_PROMPT_TASK_GENERATOR), EXPLAIN_TEMPERATURE)
            .await?;

        Ok(GenerationExplanation {
            reasoning: response.str_or("reasoning", "Explanation unavailable"),
            factors: response.string_list("factors"),
            student_profile_considered: json!({
                "grade": ctx.grade,
                "disabilities": ctx.disabilities,
                "learning_style": ctx.learning_style,
            }),
            alternative_suggestions: response.string_list("next_steps"),
        })
    }

    pub async fn generate_feedback(
        &self,
        ctx: &StudentContext,
        request: &FeedbackRequest<'_>,
    ) -> Result<TaskFeedback, LLMError> {
        self.ensure_available()?;
        let is_correct = answers_match(request.student_answer, request.correct_answer);
        let disabilities = ctx.disabilities_text();

        let prompt = feedback_prompt(&FeedbackPromptFields {
            task_title: request.task_title,
            correct_answer: request.correct_answer,
            student_answer: request.student_answer,
            hints_used: request.hints_used,
            time_spent: request.time_spent,
            disabilities: &disabilities,
            current_level: ctx.current_difficulty.label(),
        });
        let response: StructuredOutput = self
            .llm
            .generate_structured(&prompt, Some(SYSTEM_PROMPT_TASK_GENERATOR), FEEDBACK_TEMPERATURE)
            .await?;

        let fallback = if is_correct { "Good job!" } else { "Try again!" };
        Ok(TaskFeedback {
            message: response.str_or("message", fallback),
            detailed: response.str_or("detailed", ""),
            encouragement: response.str_or("encouragement", "Keep it up!"),
            tip: response.str_or("tip", ""),
            is_correct,
        })
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Mutex;

    /// Replays a fixed reply and records the last call.
    struct ScriptedGenerator {
        reply: String,
        available: bool,
        calls: Mutex<Vec<(String, Option<String>, f32)>>,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                available: true,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn model(&self) -> &str {
            "scripted-model"
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn generate<'a>(
            &'a self,
            prompt: &'a str,
            system: Option<&'a str>,
            temperature: f32,
        ) -> BoxFuture<'a, Result<String, LLMError>> {
            self.calls.lock().unwrap().push((
                prompt.to_string(),
                system.map(str::to_string),
                temperature,
            ));
            Box::pin(async move { Ok(self.reply.clone()) })
        }
    }

    fn context(disabilities: &[&str]) -> StudentContext {
        StudentContext {
            student_id: 7,
            grade: 4,
            disabilities: disabilities.iter().map(|s| s.to_string()).collect(),
            learning_style: Some(LearningStyle::Visual),
            scaffolding: Some(ScaffoldingLevel::HighSupport),
            current_difficulty: DifficultyLevel::Easy,
            settings: InterfaceSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_generate_task_merges_reply_and_plan() {
        let llm = ScriptedGenerator::new(
            r#"```json
            {"title": "Adding fractions", "question": "1/4 + 2/4 = ?",
             "options": ["3/4", "3/8"], "correct_answer": "3/4",
             "hints": ["Same denominators"], "reasoning": "short and visual"}
            ```"#,
        );
        let generator = TaskGenerator::new(llm.clone());
        let ctx = context(&["dyslexia"]);

        let task = generator
            .generate_task(&ctx, Subject::Math, "fractions", None)
            .await
            .unwrap();

        assert_eq!(task.title, "Adding fractions");
        assert_eq!(task.difficulty, DifficultyLevel::Easy);
        assert_eq!(task.content.kind, "multiple_choice");
        assert_eq!(task.content.options.as_deref(), Some(&["3/4".to_string(), "3/8".to_string()][..]));
        assert_eq!(task.content.correct_answer, Some(Value::String("3/4".into())));
        assert_eq!(task.adaptations.font_size, 18);
        assert_eq!(task.adaptations.extra_time, 30);
        assert_eq!(task.adaptations.scaffolding_level, 2);
        assert_eq!(task.generation_metadata["model"], "scripted-model");
        assert_eq!(task.generation_metadata["reasoning"], "short and visual");
        assert_eq!(task.generation_metadata["student_profile"]["scaffolding_level"], 2);

        let calls = llm.calls.lock().unwrap();
        let (prompt, system, temperature) = &calls[0];
        assert!(prompt.contains("Grade: 4"));
        assert!(prompt.contains("Subject: Mathematics"));
        assert!(prompt.contains("Special educational needs: dyslexia"));
        let system = system.as_deref().unwrap();
        assert!(system.contains("Dyslexia:"));
        assert!(system.ends_with("Answer only with valid JSON, no markdown."));
        assert!((temperature - 0.7).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_generate_task_defaults_on_garbage() {
        let llm = ScriptedGenerator::new("I cannot help with that.");
        let generator = TaskGenerator::new(llm.clone());
        let ctx = context(&[]);

        let task = generator
            .generate_task(&ctx, Subject::Reading, "poems", Some(DifficultyLevel::Hard))
            .await
            .unwrap();

        assert_eq!(task.title, "Task on topic: poems");
        assert_eq!(task.difficulty, DifficultyLevel::Hard);
        assert_eq!(task.content.kind, "multiple_choice");
        assert!(task.content.options.is_none());
        assert!(task.content.hints.is_empty());

        let calls = llm.calls.lock().unwrap();
        let system = calls[0].1.as_deref().unwrap();
        assert!(system.contains("No special requirements"));
        assert!(calls[0].0.contains("Special educational needs: none"));
    }

    #[tokio::test]
    async fn test_unavailable_generator_fails_fast() {
        let llm = Arc::new(ScriptedGenerator {
            reply: String::new(),
            available: false,
            calls: Mutex::new(Vec::new()),
        });
        let generator = TaskGenerator::new(llm.clone());
        let result = generator.generate_task(&context(&[]), Subject::Math, "x", None).await;
        assert!(matches!(result, Err(LLMError::NotConfigured(_))));
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explanation_uses_next_steps() {
        let llm = ScriptedGenerator::new(
            r#"{"reasoning": "weak topic", "factors": ["dyslexia"], "next_steps": ["review"]}"#,
        );
        let generator = TaskGenerator::new(llm.clone());
        let task = TaskInfo {
            title: "Fractions".into(),
            subject: Subject::Math,
            topic: "fractions".into(),
            difficulty: DifficultyLevel::Easy,
        };

        let explanation = generator
            .explain_recommendation(&context(&["dyslexia"]), &task, &json!([]))
            .await
            .unwrap();

        assert_eq!(explanation.reasoning, "weak topic");
        assert_eq!(explanation.factors, vec!["dyslexia"]);
        assert_eq!(explanation.alternative_suggestions, vec!["review"]);
        assert_eq!(explanation.student_profile_considered["learning_style"], "visual");
        assert!((llm.calls.lock().unwrap()[0].2 - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_explanation_default_reasoning() {
        let generator = TaskGenerator::new(ScriptedGenerator::new("not json"));
        let task = TaskInfo {
            title: "t".into(),
            subject: Subject::Other,
            topic: "t".into(),
            difficulty: DifficultyLevel::Medium,
        };
        let explanation = generator
            .explain_recommendation(&context(&[]), &task, &json!([]))
            .await
            .unwrap();
        assert_eq!(explanation.reasoning, "Explanation unavailable");
        assert!(explanation.factors.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_correctness_and_defaults() {
        let generator = TaskGenerator::new(ScriptedGenerator::new("{}"));
        let ctx = context(&[]);

        let correct = generator
            .generate_feedback(
                &ctx,
                &FeedbackRequest {
                    task_title: "Capitals",
                    correct_answer: "Paris",
                    student_answer: "  paris ",
                    hints_used: 0,
                    time_spent: Some(40),
                },
            )
            .await
            .unwrap();
        assert!(correct.is_correct);
        assert_eq!(correct.message, "Good job!");
        assert_eq!(correct.encouragement, "Keep it up!");

        let wrong = generator
            .generate_feedback(
                &ctx,
                &FeedbackRequest {
                    task_title: "Capitals",
                    correct_answer: "Paris",
                    student_answer: "Rome",
                    hints_used: 2,
                    time_spent: None,
                },
            )
            .await
            .unwrap();
        assert!(!wrong.is_correct);
        assert_eq!(wrong.message, "Try again!");
    }

    #[test]
    fn test_adapt_existing_task() {
        let adapted = adapt_existing_task(11, &context(&["dyslexia", "adhd", "visual"]));
        assert_eq!(adapted.original_task_id, 11);
        assert_eq!(adapted.student_id, 7);
        assert!(adapted.adaptations.font_size >= 24);
        assert_eq!(adapted.adaptations.color_scheme, "high_contrast");
    }

    #[test]
    fn test_answer_text() {
        assert_eq!(answer_text(&json!("3/4")), "3/4");
        assert_eq!(answer_text(&json!(12)), "12");
        assert_eq!(answer_text(&Value::Null), "");
    }
}
