//! Prompt text for task generation, explanations and feedback.

use adaptive_algo::DisabilityCategory;

pub const SYSTEM_PROMPT_TASK_GENERATOR: &str = "You are an experienced special-education teacher \
who writes learning tasks for school students with special educational needs. \
Tasks must match the student's grade, be clear and unambiguous, use short sentences, \
and follow the accommodations listed below. Never include content that is unsafe for children.";

pub const NO_SPECIAL_REQUIREMENTS: &str = "No special requirements";

pub fn disability_prompt(category: DisabilityCategory) -> &'static str {
    match category {
        DisabilityCategory::Dyslexia => "Dyslexia: use short sentences and simple words, avoid \
            dense paragraphs, highlight key words, do not rely on spelling accuracy.",
        DisabilityCategory::Dyscalculia => "Dyscalculia: use small numbers, give concrete visual \
            examples, break calculations into explicit steps.",
        DisabilityCategory::Dysgraphia => "Dysgraphia: prefer answer choices over long written \
            answers, keep required writing minimal.",
        DisabilityCategory::Adhd => "ADHD: keep the task short and focused, one instruction per \
            sentence, add engaging elements.",
        DisabilityCategory::AutismSpectrum => "Autism spectrum: use literal, concrete language, \
            avoid idioms and ambiguity, keep a predictable structure.",
        DisabilityCategory::HearingImpaired => "Hearing impairment: rely on text and visuals, never \
            require listening to audio.",
        DisabilityCategory::VisualImpaired => "Visual impairment: the task must work with a screen \
            reader, describe any images in words.",
        DisabilityCategory::SpeechDisorder => "Speech disorder: never require a spoken answer.",
        DisabilityCategory::Intellectual => "Intellectual disability: use the simplest wording, one \
            step at a time, with many examples and hints.",
        DisabilityCategory::Motor => "Motor impairment: minimise precise pointer actions and \
            typing, prefer large single-choice answers.",
    }
}

/// One line per known disability tag, or the no-requirements marker.
pub fn disability_context<S: AsRef<str>>(tags: &[S]) -> String {
    let lines: Vec<&str> = tags
        .iter()
        .filter_map(|tag| DisabilityCategory::parse(tag.as_ref()))
        .map(disability_prompt)
        .collect();
    if lines.is_empty() {
        NO_SPECIAL_REQUIREMENTS.to_string()
    } else {
        lines.join("\n")
    }
}

pub struct TaskPromptFields<'a> {
    pub grade: i32,
    pub disabilities: &'a str,
    pub learning_style: &'a str,
    pub current_difficulty: &'a str,
    pub scaffolding_level: &'a str,
    pub subject: &'a str,
    pub topic: &'a str,
    pub difficulty: &'a str,
}

pub fn generate_task_prompt(f: &TaskPromptFields<'_>) -> String {
    format!(
        "Create one learning task for a student.\n\n\
         Student:\n\
         - Grade: {grade}\n\
         - Special educational needs: {disabilities}\n\
         - Learning style: {learning_style}\n\
         - Current difficulty level: {current_difficulty}\n\
         - Scaffolding: {scaffolding}\n\n\
         Task:\n\
         - Subject: {subject}\n\
         - Topic: {topic}\n\
         - Difficulty: {difficulty}\n\n\
         Return a JSON object with the fields: \"title\", \"type\" (multiple_choice, fill_blank, \
         matching or open), \"question\", \"options\" (list, for multiple_choice), \
         \"correct_answer\", \"hints\" (list of 1-3 progressive hints), \"explanation\" and \
         \"reasoning\" (why this task suits the student).",
        grade = f.grade,
        disabilities = f.disabilities,
        learning_style = f.learning_style,
        current_difficulty = f.current_difficulty,
        scaffolding = f.scaffolding_level,
        subject = f.subject,
        topic = f.topic,
        difficulty = f.difficulty,
    )
}

pub fn explain_recommendation_prompt(student_profile: &str, task_info: &str, progress_history: &str) -> String {
    format!(
        "Explain to a teacher why the following task was recommended for the student.\n\n\
         Student profile:\n{student_profile}\n\n\
         Task:\n{task_info}\n\n\
         Recent progress:\n{progress_history}\n\n\
         Return a JSON object with the fields: \"reasoning\" (short paragraph), \"factors\" \
         (list of the profile factors that mattered) and \"next_steps\" (list of alternative \
         or follow-up suggestions)."
    )
}

pub struct FeedbackPromptFields<'a> {
    pub task_title: &'a str,
    pub correct_answer: &'a str,
    pub student_answer: &'a str,
    pub hints_used: i32,
    pub time_spent: Option<i32>,
    pub disabilities: &'a str,
    pub current_level: &'a str,
}

pub fn feedback_prompt(f: &FeedbackPromptFields<'_>) -> String {
    let time_spent = match f.time_spent {
        Some(seconds) if seconds > 0 => format!("{seconds} s"),
        _ => "not recorded".to_string(),
    };
    format!(
        "Write short, kind feedback for a student who answered a task.\n\n\
         - Task: {title}\n\
         - Correct answer: {correct}\n\
         - Student answer: {answer}\n\
         - Hints used: {hints}\n\
         - Time spent: {time_spent}\n\
         - Special educational needs: {disabilities}\n\
         - Current level: {level}\n\n\
         Return a JSON object with the fields: \"message\" (one sentence), \"detailed\" \
         (what was right or wrong), \"encouragement\" and \"tip\" (one concrete tip).",
        title = f.task_title,
        correct = f.correct_answer,
        answer = f.student_answer,
        hints = f.hints_used,
        disabilities = f.disabilities,
        level = f.current_level,
    )
}
