//! Flat-file conversation store: per-assignment chat histories as JSON
//! files plus a metadata file carrying exam content.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Conversation;

const METADATA_FILE: &str = "metadata.json";
const CHAT_DIR: &str = "chat_histories";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub student_id: String,
    pub assignment_id: String,
    pub session_id: Uuid,
    pub conversation: Vec<ChatMessage>,
    pub saved_at: DateTime<Utc>,
    pub total_messages: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentMetadata {
    pub created_at: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub professor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exam_content: String,
}

pub struct ConversationStore {
    root: PathBuf,
}

impl ConversationStore {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(root.join(CHAT_DIR))
            .with_context(|| format!("failed to create data directory {}", root.display()))?;

        let store = Self {
            root: root.to_path_buf(),
        };
        if !store.metadata_path().exists() {
            store.write_metadata(&BTreeMap::new())?;
        }
        Ok(store)
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    fn assignment_dir(&self, assignment_id: &str) -> PathBuf {
        self.root.join(CHAT_DIR).join(assignment_id)
    }

    fn read_metadata(&self) -> anyhow::Result<BTreeMap<String, AssignmentMetadata>> {
        let raw = fs::read_to_string(self.metadata_path())
            .with_context(|| format!("failed to read {}", self.metadata_path().display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("corrupt metadata file {}", self.metadata_path().display()))
    }

    fn write_metadata(
        &self,
        metadata: &BTreeMap<String, AssignmentMetadata>,
    ) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(metadata).context("serializing metadata")?;
        fs::write(self.metadata_path(), raw)
            .with_context(|| format!("failed to write {}", self.metadata_path().display()))
    }

    pub fn save_metadata(
        &self,
        assignment_id: &str,
        metadata: AssignmentMetadata,
    ) -> anyhow::Result<()> {
        let mut all = self.read_metadata()?;
        all.insert(assignment_id.to_string(), metadata);
        self.write_metadata(&all)
    }

    pub fn save_history(&self, history: &ChatHistory) -> anyhow::Result<()> {
        let dir = self.assignment_dir(&history.assignment_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(format!("{}.json", history.student_id));
        let raw = serde_json::to_string_pretty(history).context("serializing chat history")?;
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))
    }

    /// All stored histories for an assignment, ordered by student file
    /// name. A missing assignment directory is an empty list, not an error.
    pub fn load_histories(&self, assignment_id: &str) -> anyhow::Result<Vec<ChatHistory>> {
        let dir = self.assignment_dir(assignment_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut histories = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let history: ChatHistory = serde_json::from_str(&raw)
                .with_context(|| format!("corrupt chat history {}", path.display()))?;
            histories.push(history);
        }

        Ok(histories)
    }

    pub fn list_students(&self, assignment_id: &str) -> anyhow::Result<Vec<String>> {
        let histories = self.load_histories(assignment_id)?;
        Ok(histories.into_iter().map(|h| h.student_id).collect())
    }

    /// Conversations shaped for the diagnostics pipeline: message texts
    /// only, plus the assignment's exam content (empty string when none is
    /// recorded).
    pub fn load_conversations(
        &self,
        assignment_id: &str,
    ) -> anyhow::Result<(Vec<Conversation>, String)> {
        let histories = self.load_histories(assignment_id)?;
        let conversations = histories
            .into_iter()
            .map(|history| Conversation {
                turns: history
                    .conversation
                    .into_iter()
                    .map(|message| message.content)
                    .collect(),
            })
            .collect();

        let exam_content = self
            .read_metadata()?
            .get(assignment_id)
            .map(|m| m.exam_content.clone())
            .unwrap_or_default();

        Ok((conversations, exam_content))
    }

    /// Write a demo assignment with a few chat histories so the pipeline
    /// can be exercised end to end. Returns the assignment id.
    pub fn seed(&self) -> anyhow::Result<String> {
        let assignment_id = "calc101-midterm";

        self.save_metadata(
            assignment_id,
            AssignmentMetadata {
                created_at: Utc::now().to_rfc3339(),
                course: "Calculus 101".to_string(),
                professor: "Dr. Okafor".to_string(),
                description: "Midterm review assignment".to_string(),
                exam_content: "Midterm topics: limits, derivatives, the chain rule, \
                               and applications of differentiation."
                    .to_string(),
            },
        )?;

        let transcripts: [(&str, &[&str]); 3] = [
            (
                "student_adams",
                &[
                    "I don't get the chain rule at all. Why do we multiply derivatives?",
                    "Think of it as rates stacking: if y changes with u and u changes with x, \
                     the effects multiply. Can you identify the inner function in sin(x^2)?",
                    "Is it x^2? So I differentiate sin first and then multiply by 2x?",
                    "Exactly. Outer derivative evaluated at the inner function, times the \
                     inner derivative.",
                ],
            ),
            (
                "student_bianchi",
                &[
                    "Can you check my reasoning for the limit of (x^2-1)/(x-1) as x goes to 1?",
                    "Walk me through it. What happens if you factor the numerator?",
                    "Oh, it becomes x+1, so the limit is 2. What about limits at infinity?",
                    "Compare growth rates of numerator and denominator. What dominates in \
                     (3x^2+1)/(x^2-5)?",
                ],
            ),
            (
                "student_chen",
                &[
                    "What does the derivative actually mean? I can compute but not explain.",
                    "It is the instantaneous rate of change, the slope of the tangent line. \
                     Where does a parabola have slope zero?",
                    "At the vertex! And the chain rule is for nested functions, right?",
                    "Right. Try differentiating (2x+1)^3 and tell me your steps.",
                ],
            ),
        ];

        for (student_id, turns) in transcripts {
            let conversation: Vec<ChatMessage> = turns
                .iter()
                .enumerate()
                .map(|(i, content)| ChatMessage {
                    role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                    content: content.to_string(),
                })
                .collect();

            let total_messages = conversation.len();
            self.save_history(&ChatHistory {
                student_id: student_id.to_string(),
                assignment_id: assignment_id.to_string(),
                session_id: Uuid::new_v4(),
                conversation,
                saved_at: Utc::now(),
                total_messages,
            })?;
        }

        Ok(assignment_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(student_id: &str, assignment_id: &str, turns: &[&str]) -> ChatHistory {
        let conversation: Vec<ChatMessage> = turns
            .iter()
            .enumerate()
            .map(|(i, content)| ChatMessage {
                role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                content: content.to_string(),
            })
            .collect();
        let total_messages = conversation.len();
        ChatHistory {
            student_id: student_id.to_string(),
            assignment_id: assignment_id.to_string(),
            session_id: Uuid::new_v4(),
            conversation,
            saved_at: Utc::now(),
            total_messages,
        }
    }

    #[test]
    fn missing_assignment_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();

        let (conversations, exam_content) =
            store.load_conversations("no_such_assignment").unwrap();
        assert!(conversations.is_empty());
        assert!(exam_content.is_empty());
    }

    #[test]
    fn round_trips_histories_and_exam_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();

        store
            .save_metadata(
                "bio101",
                AssignmentMetadata {
                    created_at: Utc::now().to_rfc3339(),
                    exam_content: "Photosynthesis and respiration.".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        store
            .save_history(&history("student_a", "bio101", &["Q1", "A1"]))
            .unwrap();
        store
            .save_history(&history("student_b", "bio101", &["Q2", "A2", "Q3", "A3"]))
            .unwrap();

        let (conversations, exam_content) = store.load_conversations("bio101").unwrap();
        assert_eq!(conversations.len(), 2);
        assert_eq!(conversations[0].turns, vec!["Q1", "A1"]);
        assert_eq!(conversations[1].turns.len(), 4);
        assert_eq!(exam_content, "Photosynthesis and respiration.");
    }

    #[test]
    fn students_are_listed_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();

        store
            .save_history(&history("student_b", "bio101", &["Q", "A"]))
            .unwrap();
        store
            .save_history(&history("student_a", "bio101", &["Q", "A"]))
            .unwrap();

        let students = store.list_students("bio101").unwrap();
        assert_eq!(students, vec!["student_a", "student_b"]);
    }

    #[test]
    fn seed_produces_an_analyzable_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();

        let assignment_id = store.seed().unwrap();
        let (conversations, exam_content) = store.load_conversations(&assignment_id).unwrap();
        assert_eq!(conversations.len(), 3);
        assert!(exam_content.contains("chain rule"));
        // Alternating-turn invariant: matched student/assistant pairs.
        for conversation in &conversations {
            assert_eq!(conversation.turns.len() % 2, 0);
        }
    }
}
