use serde::{Deserialize, Serialize};

/// One student's full exchange for an assignment: alternating turns,
/// student first at even indexes. Produced by the conversation store and
/// read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Resolved,
    Unresolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderstoodTopic {
    pub category: String,
    #[serde(default)]
    pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StruggleTopic {
    pub category: String,
    #[serde(default)]
    pub evidence: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTopic {
    pub category: String,
    pub resolution: Resolution,
}

/// Structured result of analyzing one conversation, decoded from the
/// reasoning engine's text output. The field set is the wire contract
/// the extraction prompts request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAssessment {
    pub student_label: String,
    #[serde(default)]
    pub understood_well: Vec<UnderstoodTopic>,
    #[serde(default)]
    pub struggled_with: Vec<StruggleTopic>,
    #[serde(default)]
    pub asked_about: Vec<QuestionTopic>,
    #[serde(default)]
    pub total_questions: u32,
    #[serde(default)]
    pub engagement_level: EngagementLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Understood,
    Struggled,
}

/// One entry of the canonical category set established from the first
/// analyzed student. Duplicates are possible and preserved; the set is
/// used only as label hints for later extraction passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalCategory {
    pub category: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
}

/// Cached result of one full analysis run for an assignment. Overwritten
/// wholesale by a re-run; lives only for the process lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentReport {
    pub assignment_id: String,
    pub student_analyses: Vec<StudentAssessment>,
    pub canonical_categories: Vec<CanonicalCategory>,
    pub statistics: String,
    pub exam_content: String,
}

/// The payload handed back to callers after a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPayload {
    pub assignment_id: String,
    pub total_students: usize,
    pub overview: String,
    pub statistics: String,
    pub student_analyses: Vec<StudentAssessment>,
}

/// What `analyze` returns: a full report, or an explicit empty-corpus
/// payload when the store has no histories for the assignment.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnalysisOutcome {
    Report(AnalysisPayload),
    EmptyCorpus { assignment_id: String, error: String },
}

impl AnalysisOutcome {
    pub fn empty_corpus(assignment_id: &str) -> Self {
        AnalysisOutcome::EmptyCorpus {
            assignment_id: assignment_id.to_string(),
            error: "no chat histories found".to_string(),
        }
    }
}
