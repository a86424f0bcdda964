//! Structured artifacts stored inside [`SessionState`](crate::SessionState).

use serde::{Deserialize, Serialize};

/// Lesson-outline view of a research report, produced by structured extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutline {
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    pub introduction: Introduction,
    pub content: OutlineContent,
    pub conclusion: Conclusion,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introduction {
    pub background: String,
    pub objective: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineContent {
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conclusion {
    pub summary: String,
    #[serde(default)]
    pub next_steps: Option<String>,
}

/// Step-by-step study guide for a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyGuide {
    pub topic: String,
    #[serde(default)]
    pub learning_path: Vec<String>,
    pub concepts: Vec<String>,
    pub practice_items: Vec<String>,
}
