//! Prompt assembly for every reasoning engine call the pipeline makes.

use crate::models::Conversation;

/// System prompt for the first-pass extraction, which also establishes
/// the canonical category labels for the rest of the run.
pub const FIRST_PASS_SYSTEM: &str = "\
You are an expert educational diagnostician. Analyze a student's chat conversation to identify:
1. Topics/concepts the student UNDERSTOOD well
2. Topics/concepts the student STRUGGLED with
3. Topics/concepts the student ASKED ABOUT

Create SPECIFIC, CANONICAL labels that can be reused for other students.";

pub const OVERVIEW_SYSTEM: &str =
    "You are an educational analyst. Create a concise overview report for the professor.";

pub const QUERY_SYSTEM: &str = "\
You are an educational data analyst. Answer the professor's question based on the student \
performance data provided.";

/// Render alternating turns as a transcript: student turns sit at even
/// indexes, assistant turns at odd ones.
pub fn format_transcript(conversation: &Conversation) -> String {
    let mut formatted = String::new();
    for (i, turn) in conversation.turns.iter().enumerate() {
        let role = if i % 2 == 0 { "Student" } else { "Assistant" };
        formatted.push_str(role);
        formatted.push_str(": ");
        formatted.push_str(turn);
        formatted.push('\n');
    }
    formatted
}

pub fn first_pass_prompt(exam_content: &str, transcript: &str) -> String {
    format!(
        r#"Exam Content:
{exam_content}

Student Conversation:
{transcript}

Analyze and output a JSON object:
{{
  "student_label": "student_1",
  "understood_well": [
    {{"category": "specific topic", "evidence": "quote or summary"}}
  ],
  "struggled_with": [
    {{"category": "specific topic", "evidence": "quote", "severity": "low|medium|high"}}
  ],
  "asked_about": [
    {{"category": "specific topic", "resolution": "resolved|unresolved"}}
  ],
  "total_questions": number,
  "engagement_level": "low|medium|high"
}}

Output ONLY valid JSON."#
    )
}

/// System prompt for aligned passes. Lists only the canonical category
/// names; the engine is told to reuse them verbatim and invent new labels
/// only for genuinely distinct concepts.
pub fn aligned_system(canonical_names: &[&str]) -> String {
    let listed = canonical_names
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert educational diagnostician. Map this student's understanding to \
EXISTING CANONICAL CATEGORIES.\n\nCANONICAL CATEGORIES:\n{listed}\n\n\
Use EXACT category names when applicable. Only create NEW categories if genuinely different."
    )
}

pub fn aligned_prompt(exam_content: &str, transcript: &str, student_num: usize) -> String {
    format!(
        "Exam Content:\n{exam_content}\n\nStudent Conversation:\n{transcript}\n\n\
Analyze and output a JSON object (same format as before) for student_{student_num}.\n\
Use canonical categories where applicable. Output ONLY valid JSON."
    )
}

pub fn overview_prompt(analyses_json: &str, statistics: &str) -> String {
    format!(
        "Student Analyses:\n{analyses_json}\n\nStatistics:\n{statistics}\n\n\
Create a brief overview report highlighting:\n\
1. Overall performance patterns\n\
2. Common struggles\n\
3. Well-understood concepts\n\
4. Recommendations for the professor\n\n\
Keep it concise and actionable."
    )
}

pub fn query_prompt(report_json: &str, question: &str) -> String {
    format!(
        "Analysis Data:\n{report_json}\n\nProfessor's Question: {question}\n\n\
Provide a clear, data-driven answer to the professor's question."
    )
}
