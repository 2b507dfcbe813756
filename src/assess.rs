//! Per-student extraction: first pass, canonicalization, and the
//! canonical-aligned passes for every remaining student.

use tracing::info;

use crate::error::DiagnosticsError;
use crate::llm::{ReasoningEngine, ANALYSIS_MAX_TOKENS};
use crate::models::{CanonicalCategory, CategoryKind, Conversation, StudentAssessment};
use crate::prompts;

/// Output of the first phase: the first student's assessment and the
/// canonical category set derived from it. Phase 2 cannot be built
/// without this value, which makes the ordering dependency explicit.
#[derive(Debug, Clone)]
pub struct Phase1 {
    pub assessment: StudentAssessment,
    pub canonical: Vec<CanonicalCategory>,
}

/// Drop any code-fence markup the engine wrapped around its JSON.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Defensive decode of untrusted engine text into an assessment.
pub fn parse_assessment(raw: &str, student: &str) -> Result<StudentAssessment, DiagnosticsError> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|source| DiagnosticsError::malformed(student, source))
}

/// Derive the canonical category set from the first assessment: every
/// understood category, then every struggled category, source order kept,
/// duplicates kept.
pub fn canonical_categories(first: &StudentAssessment) -> Vec<CanonicalCategory> {
    let mut categories = Vec::new();

    for topic in &first.understood_well {
        categories.push(CanonicalCategory {
            category: topic.category.clone(),
            kind: CategoryKind::Understood,
        });
    }

    for topic in &first.struggled_with {
        categories.push(CanonicalCategory {
            category: topic.category.clone(),
            kind: CategoryKind::Struggled,
        });
    }

    categories
}

/// Analyze the first student and establish the canonical category set.
pub async fn run_phase1(
    engine: &dyn ReasoningEngine,
    conversation: &Conversation,
    exam_content: &str,
) -> Result<Phase1, DiagnosticsError> {
    let transcript = prompts::format_transcript(conversation);
    let prompt = prompts::first_pass_prompt(exam_content, &transcript);

    let raw = engine
        .generate(&prompt, prompts::FIRST_PASS_SYSTEM, ANALYSIS_MAX_TOKENS)
        .await?;
    let assessment = parse_assessment(&raw, "student_1")?;
    let canonical = canonical_categories(&assessment);

    info!(
        canonical_count = canonical.len(),
        "established canonical categories from first student"
    );

    Ok(Phase1 {
        assessment,
        canonical,
    })
}

/// Analyze students 2..N against the canonical set, in order. Any decode
/// failure aborts the remainder of the run.
pub async fn run_phase2(
    engine: &dyn ReasoningEngine,
    conversations: &[Conversation],
    exam_content: &str,
    phase1: &Phase1,
) -> Result<Vec<StudentAssessment>, DiagnosticsError> {
    let names: Vec<&str> = phase1
        .canonical
        .iter()
        .map(|c| c.category.as_str())
        .collect();
    let system = prompts::aligned_system(&names);

    let mut assessments = Vec::with_capacity(conversations.len());
    for (offset, conversation) in conversations.iter().enumerate() {
        let student_num = offset + 2;
        let transcript = prompts::format_transcript(conversation);
        let prompt = prompts::aligned_prompt(exam_content, &transcript, student_num);

        let raw = engine.generate(&prompt, &system, ANALYSIS_MAX_TOKENS).await?;
        let assessment = parse_assessment(&raw, &format!("student_{student_num}"))?;
        assessments.push(assessment);
    }

    Ok(assessments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Severity, StruggleTopic, UnderstoodTopic};

    fn assessment_json(label: &str) -> String {
        format!(
            r#"{{
                "student_label": "{label}",
                "understood_well": [
                    {{"category": "Limits", "evidence": "solved two limit problems"}}
                ],
                "struggled_with": [
                    {{"category": "Chain Rule", "evidence": "confused inner function", "severity": "high"}}
                ],
                "asked_about": [
                    {{"category": "Chain Rule", "resolution": "unresolved"}}
                ],
                "total_questions": 5,
                "engagement_level": "high"
            }}"#
        )
    }

    #[test]
    fn strips_json_fences_before_decoding() {
        let fenced = format!("```json\n{}\n```", assessment_json("student_1"));
        let assessment = parse_assessment(&fenced, "student_1").unwrap();
        assert_eq!(assessment.student_label, "student_1");
        assert_eq!(assessment.struggled_with[0].severity, Severity::High);
    }

    #[test]
    fn strips_bare_fences() {
        let fenced = format!("```\n{}\n```", assessment_json("student_1"));
        assert!(parse_assessment(&fenced, "student_1").is_ok());
    }

    #[test]
    fn malformed_text_is_a_typed_error() {
        let err = parse_assessment("I could not produce JSON, sorry.", "student_1").unwrap_err();
        match err {
            DiagnosticsError::MalformedAnalysis { student, .. } => {
                assert_eq!(student, "student_1");
            }
            other => panic!("expected MalformedAnalysis, got {other:?}"),
        }
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let sparse = r#"{"student_label": "student_1", "engagement_level": "low"}"#;
        let assessment = parse_assessment(sparse, "student_1").unwrap();
        assert!(assessment.understood_well.is_empty());
        assert!(assessment.struggled_with.is_empty());
        assert_eq!(assessment.total_questions, 0);
    }

    fn topic(category: &str) -> UnderstoodTopic {
        UnderstoodTopic {
            category: category.to_string(),
            evidence: String::new(),
        }
    }

    fn struggle(category: &str) -> StruggleTopic {
        StruggleTopic {
            category: category.to_string(),
            evidence: String::new(),
            severity: Severity::Medium,
        }
    }

    #[test]
    fn canonical_set_preserves_order_and_duplicates() {
        let first = StudentAssessment {
            student_label: "student_1".to_string(),
            understood_well: vec![topic("Limits"), topic("Derivatives")],
            struggled_with: vec![struggle("Chain Rule"), struggle("Limits")],
            asked_about: vec![],
            total_questions: 3,
            engagement_level: Default::default(),
        };

        let canonical = canonical_categories(&first);
        let names: Vec<&str> = canonical.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Limits", "Derivatives", "Chain Rule", "Limits"]);
        assert_eq!(canonical[0].kind, CategoryKind::Understood);
        assert_eq!(canonical[2].kind, CategoryKind::Struggled);
        assert_eq!(canonical[3].kind, CategoryKind::Struggled);
    }
}
