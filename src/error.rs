use thiserror::Error;

/// Failure taxonomy for the diagnostics pipeline. Every variant carries a
/// distinct, actionable message; nothing is recovered silently.
#[derive(Debug, Error)]
pub enum DiagnosticsError {
    /// The reasoning engine's output did not decode into a
    /// `StudentAssessment`. Fatal to the whole run; nothing is cached.
    #[error("{student}: could not decode reasoning engine output as an assessment: {source}")]
    MalformedAnalysis {
        student: String,
        #[source]
        source: serde_json::Error,
    },

    /// A query was issued before any successful analysis for the assignment.
    #[error("assignment '{assignment_id}' has no cached report; analysis must run before querying")]
    NotAnalyzed { assignment_id: String },

    /// Provider, transport, or store failures, propagated unchanged.
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

impl DiagnosticsError {
    pub fn malformed(student: &str, source: serde_json::Error) -> Self {
        DiagnosticsError::MalformedAnalysis {
            student: student.to_string(),
            source,
        }
    }

    pub fn not_analyzed(assignment_id: &str) -> Self {
        DiagnosticsError::NotAnalyzed {
            assignment_id: assignment_id.to_string(),
        }
    }
}
