use docfollow_llm::{ChatOptions, ChatRequest, Content, Message, ResponseFormat};

#[test]
fn test_chat_request_creation() {
    let messages = vec![Message::human("Hello")];
    let request = ChatRequest::new("gpt-4o", messages);

    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.options.response_format, ResponseFormat::Text);
}

#[test]
fn test_chat_request_with_options() {
    let options = ChatOptions::new().temperature(0.7).max_tokens(100).json();
    let request = ChatRequest::new("gpt-4o", vec![Message::human("Hello")]).with_options(options);

    assert_eq!(request.options.temperature, Some(0.7));
    assert_eq!(request.options.max_tokens, Some(100));
    assert_eq!(request.options.response_format, ResponseFormat::JsonObject);
}

#[test]
fn test_message_roles_serialize_as_openai_roles() {
    let value = serde_json::to_value(Message::ai("done")).unwrap();
    assert_eq!(value["role"], "assistant");

    let value = serde_json::to_value(Message::human("hi")).unwrap();
    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "hi");
}

#[test]
fn test_multipart_content_flattens() {
    let content: Content = serde_json::from_str(
        r#"[{"type":"text","text":"line one"},{"type":"text","text":"line two"}]"#,
    )
    .unwrap();

    assert_eq!(content.to_text(), "line one\nline two");
}
