//! Describer, executor, and navigator against a scripted page and a mock model.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use explorer_runtime::config::{ModelSettings, RuntimeConfig};
use explorer_runtime::model::ModelClient;
use explorer_runtime::prompts::PromptRepository;
use explorer_runtime::renderer::{NavigationResult, RenderContext};
use explorer_runtime::session::BrowserSession;
use explorer_runtime::titles::read_records;
use explorer_runtime::{BrowserNavigator, LlmDescriber, LlmExecutor, RunContext};
use web_explorer::{Action, Describer, Executor, ExplorerError, Navigator, Operation};

const PNG: &[u8] = b"\x89PNG fake";
const HEAD_MARK: &str = " data-explorer-invisible=\"true\"";

/// A page whose DOM changes every time an operation applies.
///
/// Operations on `#missing` time out, like an element that never appears.
/// Operations on `#noop` apply without changing anything. Extracting the
/// HTML marks the live `<head>` the way the in-page cleaner tags elements.
#[derive(Default)]
struct PageState {
    url: String,
    html: String,
    history: Vec<String>,
    operations: Vec<String>,
    closed: bool,
}

#[derive(Clone)]
struct FakePage(Arc<Mutex<PageState>>);

impl FakePage {
    fn new(url: &str, html: &str) -> Self {
        Self(Arc::new(Mutex::new(PageState {
            url: url.into(),
            html: html.into(),
            ..PageState::default()
        })))
    }

    fn operations(&self) -> Vec<String> {
        self.0.lock().unwrap().operations.clone()
    }

    fn url(&self) -> String {
        self.0.lock().unwrap().url.clone()
    }
}

#[async_trait]
impl RenderContext for FakePage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        let mut page = self.0.lock().unwrap();
        let previous = std::mem::replace(&mut page.url, url.to_string());
        page.history.push(previous);
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn go_back(&mut self, _timeout_ms: u64) -> Result<()> {
        let mut page = self.0.lock().unwrap();
        if let Some(url) = page.history.pop() {
            page.url = url;
        }
        Ok(())
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let mut page = self.0.lock().unwrap();
        if script.contains("data-explorer-invisible") {
            if !page.html.contains(HEAD_MARK) {
                page.html = page.html.replacen("<head>", &format!("<head{HEAD_MARK}>"), 1);
            }
            return Ok(Value::String(page.html.replace(HEAD_MARK, "")));
        }
        if script.contains("scrollIntoView") {
            page.operations.push(script.to_string());
            if script.contains("'#missing'") {
                return Ok(json!({ "ok": false, "timeout": true }));
            }
            if script.contains("'#noop'") {
                return Ok(json!({ "ok": true }));
            }
            let n = page.operations.len();
            page.html.push_str(&format!("<p>changed {n}</p>"));
            return Ok(json!({ "ok": true }));
        }
        Ok(Value::Null)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.url())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(PNG.to_vec())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.0.lock().unwrap().closed = true;
        Ok(())
    }
}

fn quick_config() -> RuntimeConfig {
    RuntimeConfig {
        action_sleep: Duration::ZERO,
        ensure_loaded_sleep: Duration::ZERO,
        browser_timeout_ms: 100,
        ..RuntimeConfig::default()
    }
}

fn context(page: &FakePage, server: &MockServer, config: RuntimeConfig) -> RunContext {
    let session = BrowserSession::new(Box::new(page.clone()), 1_000);
    let model = ModelClient::new(ModelSettings::new(server.uri(), "test-key")).unwrap();
    RunContext::new(session, model, PromptRepository::builtin().unwrap(), config)
}

fn tool_reply(name: &str, arguments: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": format!("call_{name}"),
                    "type": "function",
                    "function": { "name": name, "arguments": arguments.to_string() }
                }]
            }
        }]
    }))
}

fn text_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    }))
}

async fn chat_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/chat/completions")
        .map(|r| r.body_json().unwrap())
        .collect()
}

/// First round asks for `first`, and once a tool result is in the
/// conversation the model gives `verdict`.
async fn mount_execution(server: &MockServer, first: ResponseTemplate, verdict: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""role":"tool""#))
        .respond_with(text_reply(verdict))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(first)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_executor_records_applied_operations() {
    let server = MockServer::start().await;
    mount_execution(&server, tool_reply("click_element", json!({"selector": "#buy"})), "success").await;
    let page = FakePage::new("http://shop.test/item", "<button id=\"buy\">Buy</button>");
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    let execution = executor.execute(&Action::new("Buy the item", 0, 5)).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.operations, vec![Operation::click("#buy")]);

    let bodies = chat_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    let messages = bodies[1]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "user");
    assert!(messages[0]["content"].as_str().unwrap().contains("Buy the item"));
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[2], json!({"role": "tool", "content": "OK", "tool_call_id": "call_click_element"}));
    assert!(messages[3]["content"].as_str().unwrap().contains("answer \"success\""));
}

#[tokio::test]
async fn test_executor_reports_timeouts_to_model_and_fails() {
    let server = MockServer::start().await;
    mount_execution(&server, tool_reply("click_element", json!({"selector": "#missing"})), "failure").await;
    let page = FakePage::new("http://shop.test/", "<a id=\"home\">Home</a>");
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    let execution = executor.execute(&Action::new("Open the missing menu", 0, 5)).await.unwrap();

    assert!(!execution.success);
    assert!(execution.operations.is_empty());
    let bodies = chat_bodies(&server).await;
    assert_eq!(bodies[1]["messages"][2]["content"], "Timeout error");
}

#[tokio::test]
async fn test_executor_ignores_cleaner_marks_on_unchanged_page() {
    let server = MockServer::start().await;
    mount_execution(&server, tool_reply("click_element", json!({"selector": "#noop"})), "success").await;
    let page = FakePage::new(
        "http://shop.test/",
        "<html><head></head><body><button id=\"noop\">Refresh</button></body></html>",
    );
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    let execution = executor.execute(&Action::new("Refresh the page", 0, 5)).await.unwrap();

    assert!(!execution.success);
    assert_eq!(page.operations().len(), 1);
    assert!(page.0.lock().unwrap().html.contains(HEAD_MARK));
}

#[tokio::test]
async fn test_executor_rounds_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(tool_reply("click_element", json!({"selector": "#more"})))
        .mount(&server)
        .await;
    let page = FakePage::new("http://shop.test/", "<button id=\"more\">More</button>");
    let config = RuntimeConfig {
        action_max_tries: 3,
        ..quick_config()
    };
    let mut executor = LlmExecutor::new(context(&page, &server, config));

    let execution = executor.execute(&Action::new("Load more", 0, 5)).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.operations.len(), 3);
    assert_eq!(chat_bodies(&server).await.len(), 3);
}

#[tokio::test]
async fn test_executor_unknown_part_fails_without_model() {
    let server = MockServer::start().await;
    let page = FakePage::new("http://shop.test/", "<a id=\"x\">X</a>");
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    let execution = executor.execute(&Action::new("Somewhere", 4, 5)).await.unwrap();

    assert!(!execution.success);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_applies_operations_in_order() {
    let server = MockServer::start().await;
    let page = FakePage::new("http://shop.test/", "<form></form>");
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    executor
        .replay(&[Operation::fill("#q", "shoes"), Operation::click("#search")])
        .await
        .unwrap();

    let ops = page.operations();
    assert_eq!(ops.len(), 2);
    assert!(ops[0].contains("'#q'") && ops[0].contains("el.value = 'shoes'"));
    assert!(ops[1].contains("'#search'"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_stops_at_first_failed_operation() {
    let server = MockServer::start().await;
    let page = FakePage::new("http://shop.test/", "<form></form>");
    let mut executor = LlmExecutor::new(context(&page, &server, quick_config()));

    let err = executor
        .replay(&[Operation::click("#missing"), Operation::click("#never")])
        .await
        .unwrap_err();

    assert!(matches!(err, ExplorerError::Replay(_)));
    assert_eq!(page.operations().len(), 1);
}

async fn mount_description(server: &MockServer, loading: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Is the page still loading"))
        .respond_with(text_reply(loading))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""name":"set_title""#))
        .respond_with(tool_reply("set_title", json!({"title": "Product page"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""name":"describe_page""#))
        .respond_with(tool_reply(
            "describe_page",
            json!({"summary": "A product", "sections": ["details"], "interactive_elements": []}),
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""name":"suggest_actions""#))
        .respond_with(tool_reply(
            "suggest_actions",
            json!({"actions": [
                {"description": "Add to cart", "part": 0, "priority": 12},
                {"description": "Open reviews", "part": 0, "priority": 3}
            ]}),
        ))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.6, 0.8] }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_describer_produces_state_values_and_logs_titles() {
    let server = MockServer::start().await;
    mount_description(&server, "no").await;
    let dir = tempfile::tempdir().unwrap();
    let page = FakePage::new("http://shop.test/item/1", "<h1>Red shoe</h1>");
    let config = RuntimeConfig {
        data_dir: dir.path().to_path_buf(),
        store_titles: true,
        additional_info: Some("Only browse shoes".into()),
        ..quick_config()
    };
    let mut describer = LlmDescriber::new(context(&page, &server, config)).unwrap();

    let title = describer.title().await.unwrap();
    assert_eq!(title, "Product page");
    assert_eq!(describer.embedding(&title).await.unwrap(), vec![0.6, 0.8]);

    let description = describer.description().await.unwrap();
    assert_eq!(description.len(), 1);
    assert_eq!(description[0]["summary"], "A product");

    let actions = describer.actions(&title, &description).await.unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].description, "Add to cart");
    assert_eq!(actions[0].priority, 12);
    assert!(actions.iter().all(Action::is_unattempted));

    let records = read_records(&dir.path().join("titles.jsonl")).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].url, "http://shop.test/item/1");
    assert_eq!(records[0].html, "<h1>Red shoe</h1>");
    assert_eq!(records[0].title, "Product page");

    let bodies = chat_bodies(&server).await;
    let suggest = bodies
        .iter()
        .find(|b| b.to_string().contains(r#""name":"suggest_actions""#))
        .unwrap();
    let text = suggest["messages"][0]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("----- PART 0 -----:"));
    assert!(text.contains("summary: A product"));
    assert!(text.contains("http://shop.test/item/1"));
    assert!(text.contains("Only browse shoes"));
}

#[tokio::test]
async fn test_describer_waits_a_bounded_time_for_loading_pages() {
    let server = MockServer::start().await;
    mount_description(&server, "Yes, a spinner is visible").await;
    let page = FakePage::new("http://shop.test/", "<div>loading</div>");
    let mut describer = LlmDescriber::new(context(&page, &server, quick_config())).unwrap();

    assert_eq!(describer.title().await.unwrap(), "Product page");
    let checks = chat_bodies(&server)
        .await
        .iter()
        .filter(|b| b.to_string().contains("Is the page still loading"))
        .count();
    assert_eq!(checks, 3);
}

#[tokio::test]
async fn test_describer_rejects_missing_tool_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Is the page still loading"))
        .respond_with(text_reply("no"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""name":"set_title""#))
        .respond_with(text_reply("The title is Home"))
        .mount(&server)
        .await;
    let page = FakePage::new("http://shop.test/", "<h1>Home</h1>");
    let mut describer = LlmDescriber::new(context(&page, &server, quick_config())).unwrap();

    let err = describer.title().await.unwrap_err();
    assert!(matches!(err, ExplorerError::MalformedModelOutput(_)));
}

#[tokio::test]
async fn test_describer_blank_page_is_not_loaded() {
    let server = MockServer::start().await;
    let page = FakePage::new("about:blank", "");
    let mut describer = LlmDescriber::new(context(&page, &server, quick_config())).unwrap();

    let err = describer.description().await.unwrap_err();
    assert!(matches!(err, ExplorerError::PageNotLoaded(_)));
}

#[tokio::test]
async fn test_navigator_accepts_cookie_banner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("cookie consent banner or dialog"))
        .respond_with(text_reply("yes"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(r#""name":"accept_cookies""#))
        .respond_with(tool_reply("accept_cookies", json!({"selector": "#accept"})))
        .mount(&server)
        .await;
    let page = FakePage::new("about:blank", "<div id=\"banner\"><button id=\"accept\">OK</button></div>");
    let config = RuntimeConfig {
        accept_cookies: true,
        ..quick_config()
    };
    let mut navigator = BrowserNavigator::new(context(&page, &server, config));

    navigator.navigate("http://shop.test").await.unwrap();

    assert_eq!(navigator.current_url().await.unwrap(), "http://shop.test");
    let ops = page.operations();
    assert_eq!(ops.len(), 1);
    assert!(ops[0].contains("'#accept'"));
}

#[tokio::test]
async fn test_navigator_goes_back() {
    let server = MockServer::start().await;
    let page = FakePage::new("about:blank", "<p>x</p>");
    let mut navigator = BrowserNavigator::new(context(&page, &server, quick_config()));

    navigator.navigate("http://shop.test").await.unwrap();
    navigator.navigate("http://shop.test/cart").await.unwrap();
    navigator.go_back().await.unwrap();

    assert_eq!(navigator.current_url().await.unwrap(), "http://shop.test");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_closes_tab_with_last_handle() {
    let page = FakePage::new("http://shop.test/", "<p>Home</p>");
    let session = BrowserSession::new(Box::new(page.clone()), 1_000);
    let shared = session.clone();

    shared.close().await.unwrap();
    assert!(!page.0.lock().unwrap().closed);

    assert!(session.age() < Duration::from_secs(60));
    session.close().await.unwrap();
    assert!(page.0.lock().unwrap().closed);
}
