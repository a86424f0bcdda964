//! Whiteboard layout for a research outline.
//!
//! Pure and stateless: the same outline always renders the same items.

use elevare_session::ResearchOutline;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Note {
    Sticky { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WhiteboardItem {
    Header {
        text: String,
        position: Position,
        size: Size,
    },
    Textbox {
        text: String,
        position: Position,
        size: Size,
    },
    #[serde(rename = "box")]
    Frame {
        title: String,
        contents: Vec<Note>,
        position: Position,
        size: Size,
    },
}

fn sticky(text: impl Into<String>) -> Note {
    Note::Sticky { text: text.into() }
}

fn frame(title: &str, contents: Vec<Note>, (x, y): (u32, u32), (width, height): (u32, u32)) -> WhiteboardItem {
    WhiteboardItem::Frame {
        title: title.to_string(),
        contents,
        position: Position { x, y },
        size: Size { width, height },
    }
}

pub fn render_outline(outline: &ResearchOutline) -> Vec<WhiteboardItem> {
    let mut content = vec![sticky("Key Points:")];
    content.extend(outline.content.key_points.iter().map(sticky));
    content.push(sticky("Steps:"));
    content.extend(outline.content.steps.iter().map(sticky));

    let mut conclusion = format!("Summary: {}", outline.conclusion.summary);
    if let Some(next) = outline.conclusion.next_steps.as_deref().filter(|s| !s.is_empty()) {
        conclusion.push_str(&format!("\nNext Steps: {next}"));
    }

    vec![
        WhiteboardItem::Header {
            text: outline.title.clone(),
            position: Position { x: 50, y: 50 },
            size: Size { width: 400, height: 60 },
        },
        WhiteboardItem::Textbox {
            text: outline.summary.clone(),
            position: Position { x: 50, y: 120 },
            size: Size { width: 400, height: 80 },
        },
        frame(
            "Introduction",
            vec![
                sticky(format!("Background: {}", outline.introduction.background)),
                sticky(format!("Objective: {}", outline.introduction.objective)),
            ],
            (500, 50),
            (350, 120),
        ),
        frame("Content", content, (50, 220), (400, 200)),
        frame("Conclusion", vec![sticky(conclusion)], (500, 220), (350, 120)),
        frame(
            "References",
            vec![sticky(outline.references.join("\n"))],
            (900, 50),
            (250, 300),
        ),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use elevare_session::{Conclusion, Introduction, OutlineContent};
    use serde_json::json;

    fn outline(next_steps: Option<&str>) -> ResearchOutline {
        ResearchOutline {
            title: "Tides".into(),
            summary: "Water moves".into(),
            introduction: Introduction {
                background: "Oceans".into(),
                objective: "Explain tides".into(),
            },
            content: OutlineContent {
                key_points: vec!["Moon".into(), "Sun".into()],
                steps: vec!["Observe".into()],
            },
            conclusion: Conclusion {
                summary: "Gravity".into(),
                next_steps: next_steps.map(str::to_string),
            },
            references: vec!["a".into(), "b".into()],
        }
    }

    #[test]
    fn layout_has_fixed_sections() {
        let items = render_outline(&outline(None));
        assert_eq!(items.len(), 6);
        let wire = serde_json::to_value(&items).unwrap();
        assert_eq!(
            wire[0],
            json!({"type": "header", "text": "Tides",
                   "position": {"x": 50, "y": 50}, "size": {"width": 400, "height": 60}})
        );
        assert_eq!(wire[1]["type"], "textbox");
        assert_eq!(wire[3]["type"], "box");
        assert_eq!(wire[3]["title"], "Content");
        assert_eq!(wire[3]["contents"].as_array().unwrap().len(), 5);
        assert_eq!(wire[5]["contents"][0], json!({"type": "sticky", "text": "a\nb"}));
    }

    #[test]
    fn next_steps_are_appended_to_conclusion() {
        let wire = serde_json::to_value(render_outline(&outline(Some("Visit a beach")))).unwrap();
        assert_eq!(
            wire[4]["contents"][0]["text"],
            "Summary: Gravity\nNext Steps: Visit a beach"
        );
    }
}
