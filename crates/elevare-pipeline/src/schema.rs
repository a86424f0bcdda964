//! JSON Schemas handed to the structured extractor.

use elevare_capabilities::ExtractionSchema;
use serde_json::json;

fn strings(description: &str) -> serde_json::Value {
    json!({"type": "array", "items": {"type": "string"}, "description": description})
}

pub fn research_outline() -> ExtractionSchema {
    ExtractionSchema::new(
        "ResearchOutline",
        "Lesson outline of a research report, following its section structure.",
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Report title"},
                "abstract": {"type": "string", "description": "Brief summary"},
                "introduction": {
                    "type": "object",
                    "properties": {
                        "background": {"type": "string"},
                        "objective": {"type": "string"}
                    },
                    "required": ["background", "objective"]
                },
                "content": {
                    "type": "object",
                    "properties": {
                        "key_points": strings("Key points"),
                        "steps": strings("Details or steps, in order")
                    },
                    "required": ["key_points", "steps"]
                },
                "conclusion": {
                    "type": "object",
                    "properties": {
                        "summary": {"type": "string"},
                        "next_steps": {"type": "string"}
                    },
                    "required": ["summary"]
                },
                "references": strings("Reference URLs or citations")
            },
            "required": ["title", "abstract", "introduction", "content", "conclusion", "references"]
        }),
    )
}

pub fn study_guide() -> ExtractionSchema {
    ExtractionSchema::new(
        "StudyGuide",
        "A step-by-step study guide that simplifies the topic.",
        json!({
            "type": "object",
            "properties": {
                "topic": {"type": "string", "description": "The topic being studied"},
                "learning_path": strings("Ordered steps to learn the topic"),
                "concepts": strings("Core concepts, each in simple language"),
                "practice_items": strings("Exercises that reinforce the concepts")
            },
            "required": ["topic", "learning_path", "concepts", "practice_items"]
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use elevare_session::{ResearchOutline, StudyGuide};

    #[test]
    fn study_guide_schema_requires_guide_fields() {
        let required = study_guide().required_fields().join(",");
        assert_eq!(required, "topic,learning_path,concepts,practice_items");
    }

    #[test]
    fn schemas_describe_session_types() {
        let guide = json!({
            "topic": "t", "learning_path": [], "concepts": ["c"], "practice_items": ["p"]
        });
        assert!(study_guide().check(&guide).is_ok());
        serde_json::from_value::<StudyGuide>(guide).unwrap();

        let outline = json!({
            "title": "T", "abstract": "A",
            "introduction": {"background": "b", "objective": "o"},
            "content": {"key_points": ["k"], "steps": ["s"]},
            "conclusion": {"summary": "s"},
            "references": []
        });
        assert!(research_outline().check(&outline).is_ok());
        serde_json::from_value::<ResearchOutline>(outline).unwrap();
    }
}
