use anyhow::Result;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parley::agent::{Agent, AgentConfig, StreamEvent};
use parley::models::message::Message;
use parley::models::role::Role;
use parley::models::tool::ToolCallRequest;
use parley::providers::errors::ProviderError;
use parley::providers::mock::MockProvider;
use parley::tools::catalog::CatalogTools;
use parley::tools::weather::DemoTools;
use parley::tools::{ToolRegistry, ToolSource};

fn store_registry() -> Result<Arc<ToolRegistry>> {
    let catalog = CatalogTools::builtin();
    let sources: [&dyn ToolSource; 2] = [&DemoTools, &catalog];
    Ok(Arc::new(ToolRegistry::load(&sources)?))
}

fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

#[tokio::test]
async fn test_weather_question_runs_the_weather_tool() -> Result<()> {
    let provider = MockProvider::new(vec![
        Message::assistant().with_tool_call(tool_call(
            "call_1",
            "get_current_weather",
            r#"{"location": "Taipei"}"#,
        )),
        Message::assistant().with_text("It is 28°C and sunny in Taipei."),
    ]);
    let log = provider.call_log();
    let agent = Agent::new(Box::new(provider), store_registry()?);

    let answer = agent.chat("You are a shop assistant.", "How is the weather in Taipei?", &[]).await;
    assert_eq!(answer, "It is 28°C and sunny in Taipei.");

    let calls = log.lock().unwrap();
    assert_eq!(calls.len(), 2);
    let offered = calls[0].tools.clone().unwrap_or_default();
    assert!(offered.contains(&"get_current_weather".to_string()));
    assert!(offered.contains(&"search_products_by_keyword".to_string()));

    let result = &calls[1].messages[3];
    assert_eq!(result.role, Role::Tool);
    assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(result.text(), "It is currently 28 degrees in Taipei (unit: celsius)");
    Ok(())
}

#[tokio::test]
async fn test_stream_without_tools_yields_single_characters() -> Result<()> {
    let provider = MockProvider::new(vec![Message::assistant().with_text("OK")]);
    let agent = Agent::new(Box::new(provider), store_registry()?)
        .with_config(AgentConfig::default().with_fragments(1, Duration::ZERO));

    let events: Vec<StreamEvent> = agent.chat_stream("sys", "Say OK", &[]).collect().await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Fragment("O".into()),
            StreamEvent::Fragment("K".into()),
            StreamEvent::Done,
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_transport_failure_is_reported_once() -> Result<()> {
    let error = ProviderError::Network("connection refused".to_string());
    let agent = Agent::new(Box::new(MockProvider::failing(error.clone())), store_registry()?);

    let answer = agent.chat("sys", "hello", &[]).await;
    assert_eq!(answer, format!("[Error during chat]: {}", error));

    let events: Vec<StreamEvent> = agent.chat_stream("sys", "hello", &[]).collect().await;
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        StreamEvent::Error(format!("[Error during streaming]: {}", error))
    );
    assert_eq!(events[1], StreamEvent::Done);
    Ok(())
}

#[tokio::test]
async fn test_tool_rounds_are_appended_in_order() -> Result<()> {
    // three tool turns; the second asks for two tools at once
    let provider = MockProvider::new(vec![
        Message::assistant().with_tool_call(tool_call(
            "t1",
            "confirm_category",
            r#"{"category": "Apparel"}"#,
        )),
        Message::assistant()
            .with_tool_call(tool_call("t2", "get_product", r#"{"category": "Apparel"}"#))
            .with_tool_call(tool_call(
                "t3",
                "search_products_by_keyword",
                r#"{"keyword": "hat"}"#,
            )),
        Message::assistant().with_tool_call(tool_call("t4", "get_stock", "{}")),
        Message::assistant().with_text("We have caps and beanies."),
    ]);
    let log = provider.call_log();
    let agent = Agent::new(Box::new(provider), store_registry()?);

    let answer = agent.reply("sys", "Any hats?", &[]).await?;
    assert_eq!(answer, "We have caps and beanies.");

    let calls = log.lock().unwrap();
    assert_eq!(calls.len(), 4);
    let messages = &calls[3].messages;

    let requests: Vec<&Message> = messages.iter().filter(|m| m.has_tool_calls()).collect();
    assert_eq!(requests.len(), 3);

    let tool_messages: Vec<&Message> = messages.iter().filter(|m| m.role == Role::Tool).collect();
    let ids: Vec<&str> = tool_messages
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3", "t4"]);
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());

    // every result follows the request that asked for it
    for (index, message) in messages.iter().enumerate() {
        if let Some(id) = message.tool_call_id.as_deref() {
            let requested_at = messages
                .iter()
                .position(|m| m.tool_calls.iter().any(|c| c.id == id))
                .unwrap();
            assert!(requested_at < index);
        }
    }

    assert!(tool_messages[1].text().contains("Embroidered Baseball Cap"));
    assert!(tool_messages[2].text().starts_with("<p>Products related to 'hat'"));
    assert_eq!(tool_messages[3].text(), "[No implementation for get_stock]");
    Ok(())
}

#[tokio::test]
async fn test_malformed_arguments_never_reach_the_caller() -> Result<()> {
    let provider = MockProvider::new(vec![
        Message::assistant()
            .with_tool_call(tool_call("a", "get_current_weather", "{\"location\": "))
            .with_tool_call(tool_call("b", "get_product", "{}"))
            .with_tool_call(tool_call(
                "c",
                "get_current_weather",
                r#"{"location": "Tainan", "unit": "kelvin"}"#,
            )),
        Message::assistant().with_text("Sorry, please try again."),
    ]);
    let log = provider.call_log();
    let agent = Agent::new(Box::new(provider), store_registry()?);

    assert_eq!(agent.reply("sys", "weather?", &[]).await?, "Sorry, please try again.");

    let calls = log.lock().unwrap();
    let results: Vec<&str> = calls[1].messages[3..].iter().map(|m| m.text()).collect();
    assert!(results[0].starts_with("[Invalid arguments for get_current_weather"));
    assert!(results[1].starts_with("[Tool get_product failed"));
    assert!(results[2].contains("must be one of [celsius, fahrenheit]"));
    Ok(())
}

#[tokio::test]
async fn test_history_is_passed_through() -> Result<()> {
    let provider = MockProvider::new(vec![Message::assistant().with_text("You asked about mugs.")]);
    let log = provider.call_log();
    let agent = Agent::new(Box::new(provider), store_registry()?);

    let history = vec![
        Message::user().with_text("Do you sell mugs?"),
        Message::assistant().with_text("Yes, ceramic ones."),
    ];
    agent.reply("sys", "What did I ask?", &history).await?;

    let calls = log.lock().unwrap();
    let texts: Vec<&str> = calls[0].messages.iter().map(|m| m.text()).collect();
    assert_eq!(
        texts,
        vec!["sys", "Do you sell mugs?", "Yes, ceramic ones.", "What did I ask?"]
    );
    Ok(())
}
