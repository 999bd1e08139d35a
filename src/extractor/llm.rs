use super::{Extractor, Outcome};
use crate::{config::LlmConfig, convocatoria::SchemaDescription, utils};
use lazy_regex::regex;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

const E: &str = "Invalid selector";
lazy_static! {
    static ref BODY: Selector = Selector::parse("body").expect(E);
}

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Visible text of an HTML document, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&BODY)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut text = String::new();
    for node in root.descendants() {
        let Some(t) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map_or(false, |el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(t);
            text.push(' ');
        }
    }
    utils::collapse_whitespace(&text)
}

/// Fetches the page over HTTP and asks an OpenAI compatible chat model for the records.
pub struct LlmExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
    word_count_threshold: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LlmExtractor {
    pub fn new(api_key: String, llm: &LlmConfig, word_count_threshold: usize) -> Self {
        LlmExtractor {
            client: reqwest::Client::new(),
            api_key,
            model: llm.model.clone(),
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            temperature: llm.temperature,
            word_count_threshold,
        }
    }

    async fn fetch_text(&self, url: &str) -> Result<String, String> {
        debug!("Visit {}", url);
        let html = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| format!("cannot fetch page: {}", e))?
            .text()
            .await
            .map_err(|e| format!("cannot read page: {}", e))?;

        let text = html_to_text(&html);
        let words = utils::word_count(&text);
        if words < self.word_count_threshold {
            return Err(format!(
                "page has {} words, below the threshold of {}",
                words, self.word_count_threshold
            ));
        }
        Ok(text)
    }

    fn user_prompt(url: &str, content: &str, schema: &SchemaDescription) -> String {
        format!(
            r#"Here is the content from the URL:
<url>{url}</url>

<url_content>
{content}
</url_content>

Extract every item that matches this JSON schema:
<schema_block>
{schema}
</schema_block>

Answer with a JSON array of objects that follow the schema and nothing else.
Use null for any value that is not present. If nothing matches, answer [].
"#,
            url = url,
            content = content,
            schema = schema.to_json_schema(),
        )
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("cannot reach model: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("model API returned {}: {}", status, body.trim()));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("unexpected model response: {}", e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "model returned no content".to_string())
    }

    async fn try_extract(
        &self,
        url: &str,
        instruction: &str,
        schema: &SchemaDescription,
    ) -> Result<String, String> {
        let content = self.fetch_text(url).await?;
        let answer = self
            .complete(instruction, Self::user_prompt(url, &content, schema))
            .await?;
        Ok(strip_code_fence(&answer).to_string())
    }
}

fn strip_code_fence(s: &str) -> &str {
    regex!(r"(?s)^\s*```[a-zA-Z]*\s*(.*?)\s*```\s*$")
        .captures(s)
        .and_then(|c| c.get(1))
        .map_or_else(|| s.trim(), |m| m.as_str())
}

#[async_trait::async_trait]
impl Extractor for LlmExtractor {
    async fn extract(
        &self,
        url: &str,
        instruction: &str,
        schema: &SchemaDescription,
    ) -> Outcome {
        match self.try_extract(url, instruction, schema).await {
            Ok(payload) => Outcome::Success(payload),
            Err(message) => Outcome::Failure(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convocatoria::schema;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html>
        <head><title>Ayudas</title><style>body { color: red; }</style></head>
        <body>
            <h1>Convocatoria Beca X</h1>
            <script>var tracking = "ignore me";</script>
            <p>Abierta desde el 1 de mayo de 2025 para estudiantes.</p>
            <noscript>Activa JavaScript</noscript>
            <template><p>Plantilla oculta</p></template>
        </body>
    </html>"#;

    fn extractor(server: &MockServer, threshold: usize) -> LlmExtractor {
        let llm = LlmConfig {
            base_url: format!("{}/v1/", server.uri()),
            temperature: Some(0.0),
            ..Default::default()
        };
        LlmExtractor::new("test-key".to_string(), &llm, threshold)
    }

    async fn mount_page(server: &MockServer, status: u16) {
        Mock::given(method("GET"))
            .and(path("/ayudas"))
            .respond_with(ResponseTemplate::new(status).set_body_string(PAGE))
            .mount(server)
            .await;
    }

    fn chat_reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": content } }
            ]
        }))
    }

    #[test]
    fn text_skips_scripts_and_styles() {
        assert_eq!(
            html_to_text(PAGE),
            "Convocatoria Beca X Abierta desde el 1 de mayo de 2025 para estudiantes."
        );
    }

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n[{\"a\": 1}]\n```"), "[{\"a\": 1}]");
        assert_eq!(strip_code_fence("```\n[]\n```\n"), "[]");
        assert_eq!(strip_code_fence("  [] \n"), "[]");
    }

    #[tokio::test]
    async fn success_returns_model_payload() {
        let server = MockServer::start().await;
        mount_page(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(chat_reply(
                "```json\n[{\"nombre_de_la_convocatoria\": \"Beca X\"}]\n```",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/ayudas", server.uri());
        let outcome = extractor(&server, 5)
            .extract(&url, "Extrae convocatorias", &schema())
            .await;
        assert_eq!(
            outcome,
            Outcome::Success("[{\"nombre_de_la_convocatoria\": \"Beca X\"}]".to_string())
        );

        let requests = server.received_requests().await.unwrap();
        let chat = requests
            .iter()
            .find(|r| r.url.path() == "/v1/chat/completions")
            .unwrap();
        let body: Value = serde_json::from_slice(&chat.body).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Extrae convocatorias");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Convocatoria Beca X"));
        assert!(user.contains("fecha_de_apertura"));
        assert!(!user.contains("ignore me"));
        assert!(!user.contains("Plantilla oculta"));
    }

    #[tokio::test]
    async fn missing_page_is_failure() {
        let server = MockServer::start().await;
        mount_page(&server, 404).await;

        let url = format!("{}/ayudas", server.uri());
        let outcome = extractor(&server, 5)
            .extract(&url, "Extrae convocatorias", &schema())
            .await;
        assert!(matches!(outcome, Outcome::Failure(m) if m.contains("404")));
    }

    #[tokio::test]
    async fn short_page_is_not_sent_to_model() {
        let server = MockServer::start().await;
        mount_page(&server, 200).await;
        Mock::given(method("POST"))
            .respond_with(chat_reply("[]"))
            .expect(0)
            .mount(&server)
            .await;

        let url = format!("{}/ayudas", server.uri());
        let outcome = extractor(&server, 100)
            .extract(&url, "Extrae convocatorias", &schema())
            .await;
        assert!(matches!(outcome, Outcome::Failure(m) if m.contains("threshold")));
    }

    #[tokio::test]
    async fn api_error_is_failure() {
        let server = MockServer::start().await;
        mount_page(&server, 200).await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let url = format!("{}/ayudas", server.uri());
        let outcome = extractor(&server, 5)
            .extract(&url, "Extrae convocatorias", &schema())
            .await;
        assert!(
            matches!(&outcome, Outcome::Failure(m) if m.contains("401") && m.contains("invalid api key")),
            "{:?}",
            outcome
        );
    }
}
