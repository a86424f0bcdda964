use crate::schema::{ResearchOutline, StudyGuide};
use chrono::{DateTime, Utc};
use elevare_core::{ElevareError, ElevareResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Namespaces
// ---------------------------------------------------------------------------

/// Entry-pipeline results: what the session is about and whether it is ready.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub topic: Option<String>,
    #[serde(default)]
    pub is_validated: bool,
    pub confirmation_message: Option<String>,
}

/// Deep-research results for the current research topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: Option<String>,
    pub report: Option<String>,
    pub summary: Option<String>,
    pub context: Option<String>,
    pub sources: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub parsed_data: Option<ResearchOutline>,
}

/// Lesson-planning results for the current lesson topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonsState {
    pub topic: Option<String>,
    pub plan: Option<String>,
    pub walkthrough: Option<String>,
    pub study_guide: Option<StudyGuide>,
}

/// The whole state tree owned by one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub session: SessionInfo,
    #[serde(default)]
    pub research: ResearchState,
    #[serde(default)]
    pub lessons: LessonsState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Typed paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Session,
    Research,
    Lessons,
}

/// Every addressable leaf of [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    SessionTopic,
    SessionValidated,
    ConfirmationMessage,
    ResearchTopic,
    ResearchReport,
    ResearchSummary,
    ResearchContext,
    ResearchSources,
    ResearchImages,
    ResearchOutline,
    LessonsTopic,
    LessonPlan,
    LessonWalkthrough,
    StudyGuide,
}

impl StateKey {
    pub const ALL: [StateKey; 14] = [
        StateKey::SessionTopic,
        StateKey::SessionValidated,
        StateKey::ConfirmationMessage,
        StateKey::ResearchTopic,
        StateKey::ResearchReport,
        StateKey::ResearchSummary,
        StateKey::ResearchContext,
        StateKey::ResearchSources,
        StateKey::ResearchImages,
        StateKey::ResearchOutline,
        StateKey::LessonsTopic,
        StateKey::LessonPlan,
        StateKey::LessonWalkthrough,
        StateKey::StudyGuide,
    ];

    /// Dotted path of this key, e.g. `research.report`.
    pub fn path(&self) -> &'static str {
        match self {
            StateKey::SessionTopic => "session.topic",
            StateKey::SessionValidated => "session.is_validated",
            StateKey::ConfirmationMessage => "session.confirmation_message",
            StateKey::ResearchTopic => "research.topic",
            StateKey::ResearchReport => "research.report",
            StateKey::ResearchSummary => "research.summary",
            StateKey::ResearchContext => "research.context",
            StateKey::ResearchSources => "research.sources",
            StateKey::ResearchImages => "research.images",
            StateKey::ResearchOutline => "research.parsed_data",
            StateKey::LessonsTopic => "lessons.topic",
            StateKey::LessonPlan => "lessons.plan",
            StateKey::LessonWalkthrough => "lessons.walkthrough",
            StateKey::StudyGuide => "lessons.study_guide",
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            StateKey::SessionTopic | StateKey::SessionValidated | StateKey::ConfirmationMessage => {
                Namespace::Session
            }
            StateKey::ResearchTopic
            | StateKey::ResearchReport
            | StateKey::ResearchSummary
            | StateKey::ResearchContext
            | StateKey::ResearchSources
            | StateKey::ResearchImages
            | StateKey::ResearchOutline => Namespace::Research,
            StateKey::LessonsTopic
            | StateKey::LessonPlan
            | StateKey::LessonWalkthrough
            | StateKey::StudyGuide => Namespace::Lessons,
        }
    }

    /// Resolves a dotted path back to its key.
    pub fn from_path(path: &str) -> Option<StateKey> {
        Self::ALL.into_iter().find(|k| k.path() == path)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Cache-hit rule: a value counts as populated when it is not null, not a
/// blank string, not an empty array or object, and not `false`.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn encode<T: Serialize>(value: &Option<T>) -> Option<Value> {
    value.as_ref().and_then(|v| serde_json::to_value(v).ok())
}

fn decode<T: DeserializeOwned>(key: StateKey, value: Value) -> ElevareResult<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ElevareError::Validation(format!("{key}: {e}")))
}

impl SessionState {
    pub fn new(topic: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session: SessionInfo {
                topic: topic.filter(|t| !t.trim().is_empty()),
                ..SessionInfo::default()
            },
            research: ResearchState::default(),
            lessons: LessonsState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reads the value at `key`, or `None` when it was never set.
    pub fn get(&self, key: StateKey) -> Option<Value> {
        match key {
            StateKey::SessionTopic => encode(&self.session.topic),
            StateKey::SessionValidated => Some(Value::Bool(self.session.is_validated)),
            StateKey::ConfirmationMessage => encode(&self.session.confirmation_message),
            StateKey::ResearchTopic => encode(&self.research.topic),
            StateKey::ResearchReport => encode(&self.research.report),
            StateKey::ResearchSummary => encode(&self.research.summary),
            StateKey::ResearchContext => encode(&self.research.context),
            StateKey::ResearchSources => encode(&self.research.sources),
            StateKey::ResearchImages => encode(&self.research.images),
            StateKey::ResearchOutline => encode(&self.research.parsed_data),
            StateKey::LessonsTopic => encode(&self.lessons.topic),
            StateKey::LessonPlan => encode(&self.lessons.plan),
            StateKey::LessonWalkthrough => encode(&self.lessons.walkthrough),
            StateKey::StudyGuide => encode(&self.lessons.study_guide),
        }
    }

    /// Writes `value` at `key` after checking it against the field's type.
    ///
    /// A JSON `null` clears the key. On a type mismatch the state is left
    /// untouched and a `Validation` error is returned.
    pub fn set(&mut self, key: StateKey, value: Value) -> ElevareResult<()> {
        match key {
            StateKey::SessionTopic => self.session.topic = decode(key, value)?,
            StateKey::SessionValidated => {
                self.session.is_validated = decode::<bool>(key, value)?.unwrap_or(false)
            }
            StateKey::ConfirmationMessage => self.session.confirmation_message = decode(key, value)?,
            StateKey::ResearchTopic => self.research.topic = decode(key, value)?,
            StateKey::ResearchReport => self.research.report = decode(key, value)?,
            StateKey::ResearchSummary => self.research.summary = decode(key, value)?,
            StateKey::ResearchContext => self.research.context = decode(key, value)?,
            StateKey::ResearchSources => self.research.sources = decode(key, value)?,
            StateKey::ResearchImages => self.research.images = decode(key, value)?,
            StateKey::ResearchOutline => self.research.parsed_data = decode(key, value)?,
            StateKey::LessonsTopic => self.lessons.topic = decode(key, value)?,
            StateKey::LessonPlan => self.lessons.plan = decode(key, value)?,
            StateKey::LessonWalkthrough => self.lessons.walkthrough = decode(key, value)?,
            StateKey::StudyGuide => self.lessons.study_guide = decode(key, value)?,
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Checks `value` against the type at `key` without writing it.
    pub fn validate(key: StateKey, value: &Value) -> ElevareResult<()> {
        let mut scratch = SessionState::new(None);
        scratch.set(key, value.clone())
    }

    pub fn clear(&mut self, key: StateKey) {
        // Null always decodes for Option fields and resets the flag.
        let _ = self.set(key, Value::Null);
    }

    pub fn clear_namespace(&mut self, namespace: Namespace) {
        match namespace {
            Namespace::Session => self.session = SessionInfo::default(),
            Namespace::Research => self.research = ResearchState::default(),
            Namespace::Lessons => self.lessons = LessonsState::default(),
        }
        self.updated_at = Utc::now();
    }

    pub fn is_populated(&self, key: StateKey) -> bool {
        self.get(key).is_some_and(|v| is_populated(&v))
    }

    pub fn is_validated(&self) -> bool {
        self.session.is_validated
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_key_round_trips_its_path() {
        for key in StateKey::ALL {
            assert_eq!(StateKey::from_path(key.path()), Some(key));
        }
        assert_eq!(StateKey::from_path("research.reprot"), None);
    }

    #[test]
    fn set_then_get() {
        let mut state = SessionState::new(Some("Photosynthesis".into()));
        state
            .set(StateKey::ResearchSources, json!(["https://a.example", "https://b.example"]))
            .unwrap();
        assert_eq!(
            state.get(StateKey::ResearchSources),
            Some(json!(["https://a.example", "https://b.example"]))
        );
        assert_eq!(state.get(StateKey::SessionTopic), Some(json!("Photosynthesis")));
    }

    #[test]
    fn set_rejects_wrong_type_and_keeps_old_value() {
        let mut state = SessionState::default();
        state.set(StateKey::ResearchReport, json!("# Report")).unwrap();
        let err = state.set(StateKey::ResearchReport, json!({"not": "a string"}));
        assert!(matches!(err, Err(ElevareError::Validation(_))));
        assert_eq!(state.get(StateKey::ResearchReport), Some(json!("# Report")));
    }

    #[test]
    fn study_guide_requires_fields() {
        let mut state = SessionState::default();
        let missing = json!({"topic": "Cells", "concepts": ["membrane"]});
        assert!(state.set(StateKey::StudyGuide, missing).is_err());

        let full = json!({
            "topic": "Cells",
            "concepts": ["membrane"],
            "practice_items": ["Draw a cell"]
        });
        state.set(StateKey::StudyGuide, full).unwrap();
        let guide = state.lessons.study_guide.as_ref().unwrap();
        assert!(guide.learning_path.is_empty());
    }

    #[test]
    fn populated_rule() {
        assert!(!is_populated(&Value::Null));
        assert!(!is_populated(&json!("")));
        assert!(!is_populated(&json!("   ")));
        assert!(!is_populated(&json!([])));
        assert!(!is_populated(&json!({})));
        assert!(!is_populated(&json!(false)));
        assert!(is_populated(&json!("x")));
        assert!(is_populated(&json!(0)));
        assert!(is_populated(&json!(["a"])));
    }

    #[test]
    fn empty_string_counts_as_cache_miss() {
        let mut state = SessionState::default();
        state.set(StateKey::ResearchSummary, json!("")).unwrap();
        assert!(state.get(StateKey::ResearchSummary).is_some());
        assert!(!state.is_populated(StateKey::ResearchSummary));
    }

    #[test]
    fn clear_and_clear_namespace() {
        let mut state = SessionState::new(Some("Rust".into()));
        state.set(StateKey::ResearchReport, json!("r")).unwrap();
        state.set(StateKey::ResearchSummary, json!("s")).unwrap();
        state.set(StateKey::SessionValidated, json!(true)).unwrap();

        state.clear(StateKey::ResearchReport);
        assert!(!state.is_populated(StateKey::ResearchReport));
        assert!(state.is_populated(StateKey::ResearchSummary));

        state.clear_namespace(Namespace::Research);
        assert_eq!(state.research, ResearchState::default());
        assert!(state.is_validated());

        state.clear(StateKey::SessionValidated);
        assert!(!state.is_validated());
    }

    #[test]
    fn blank_topic_is_not_stored() {
        let state = SessionState::new(Some("  ".into()));
        assert!(state.session.topic.is_none());
    }

    #[test]
    fn outline_uses_abstract_on_the_wire() {
        let mut state = SessionState::default();
        let outline = json!({
            "title": "T",
            "abstract": "A",
            "introduction": {"background": "B", "objective": "O"},
            "content": {"key_points": ["k"], "steps": ["s"]},
            "conclusion": {"summary": "S"},
            "references": []
        });
        state.set(StateKey::ResearchOutline, outline).unwrap();
        let back = state.get(StateKey::ResearchOutline).unwrap();
        assert_eq!(back["abstract"], "A");
        assert_eq!(back["conclusion"]["next_steps"], Value::Null);
    }
}
