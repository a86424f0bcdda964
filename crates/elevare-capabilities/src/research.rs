use crate::backends::http_client;
use crate::capability::{ResearchBundle, Researcher};
use crate::config::ResearchConfig;
use async_trait::async_trait;
use elevare_core::CapabilityError;
use serde_json::json;
use tracing::{debug, info};

const REPORT_TEMPLATE: &str = "\
# [Title]

## Abstract
[Brief summary]

## Introduction
- **Background:** [Context]
- **Objective:** [Goal]

## Content
- **Key Points:**
- [Point 1]
- [Point 2]
- **Details/Steps:**
1. [Step 1]
2. [Step 2]

## Conclusion
- **Summary:** [Key takeaways]
- **Next Steps:** [Future directions]

## References
- [Reference 1]
- [Reference 2]
";

/// The research query for `topic`: a lesson outline in the report template.
pub fn build_query(topic: &str) -> String {
    format!(
        "Curate a lesson outline for teaching the following topic: {topic}.\n\n\
         Format the report with this template:\n{REPORT_TEMPLATE}"
    )
}

/// Client for a deep-research service exposing `POST /research`.
pub struct HttpResearcher {
    config: ResearchConfig,
    api_key: String,
    http: reqwest::Client,
}

impl HttpResearcher {
    pub fn new(config: ResearchConfig) -> Result<Self, CapabilityError> {
        let http = http_client(config.timeout_secs)
            .map_err(|e| CapabilityError::Research(e.to_string()))?;
        Ok(Self {
            api_key: config.resolved_api_key(),
            config,
            http,
        })
    }
}

#[async_trait]
impl Researcher for HttpResearcher {
    async fn research(&self, topic: &str) -> Result<ResearchBundle, CapabilityError> {
        let url = format!("{}/research", self.config.api_base_url.trim_end_matches('/'));
        info!(topic, report_type = %self.config.report_type, "Starting research");

        let mut request = self.http.post(&url).json(&json!({
            "query": build_query(topic),
            "report_type": self.config.report_type,
            "max_subtopics": self.config.max_subtopics,
        }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| CapabilityError::Research(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::Research(format!(
                "research service error {status}: {body}"
            )));
        }

        let bundle: ResearchBundle = resp
            .json()
            .await
            .map_err(|e| CapabilityError::Research(format!("malformed research reply: {e}")))?;
        if bundle.report.trim().is_empty() {
            return Err(CapabilityError::Research("research produced an empty report".into()));
        }
        debug!(
            sources = bundle.sources.len(),
            images = bundle.images.len(),
            "Research finished"
        );
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_embeds_topic_and_template() {
        let query = build_query("Black holes");
        assert!(query.contains("Black holes"));
        assert!(query.contains("## Abstract"));
        assert!(query.contains("## References"));
    }
}
