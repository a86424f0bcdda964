//! Prompt templates for the generation stages.

/// Longest slice of a prior artifact embedded in a follow-up prompt.
const MAX_EMBED_CHARS: usize = 12_000;

fn clip(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

pub fn confirmation(topic: Option<&str>) -> String {
    let subject = match topic {
        Some(topic) => format!("The learner wants to study: {topic}."),
        None => "The learner has not picked a topic yet.".to_string(),
    };
    format!(
        "You are an enthusiastic professor who loves sharing knowledge.\n\
         {subject}\n\
         Reply with a warm, upbeat confirmation that you are excited to prepare \
         a course for them. Keep it to two to four sentences, friendly but professional, \
         and reassure them the lessons will be engaging."
    )
}

pub fn report_summary(topic: &str, report: &str) -> String {
    format!(
        "Summarize the research report on {topic} below in about 100 words. \
         Write it to be read aloud to a student.\n\nReport:\n{}",
        clip(report)
    )
}

pub fn lesson_plan(topic: &str, report: Option<&str>) -> String {
    let mut prompt = format!(
        "Design a lesson plan on {topic} using the Feynman technique.\n\
         Break the topic into its fundamental ideas, explain each in simple language, \
         use everyday analogies, anticipate common misconceptions and build from basic \
         to advanced concepts. Include a title, description, learning objectives, an \
         introduction with a hook, main topics with subtopics, and real-world applications.\n\
         Format the plan as markdown."
    );
    if let Some(report) = report {
        prompt.push_str("\n\nBase the plan on this research report:\n");
        prompt.push_str(clip(report));
    }
    prompt
}

pub fn lesson_walkthrough(topic: &str, plan: &str) -> String {
    format!(
        "Write a friendly message walking the student through the study plan on {topic} below. \
         It will be read aloud, so avoid markdown.\n\nStudy plan:\n{}",
        clip(plan)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_mentions_topic_when_known() {
        assert!(confirmation(Some("Rainbows")).contains("Rainbows"));
        assert!(confirmation(None).contains("not picked a topic"));
    }

    #[test]
    fn lesson_plan_embeds_report_only_when_given() {
        assert!(!lesson_plan("Ants", None).contains("research report:"));
        assert!(lesson_plan("Ants", Some("# Ants")).contains("# Ants"));
    }

    #[test]
    fn clip_respects_char_boundaries() {
        let long = "é".repeat(MAX_EMBED_CHARS + 10);
        assert_eq!(clip(&long).chars().count(), MAX_EMBED_CHARS);
    }
}
