use crate::model::ExportPayload;

/// Renders an export as one Markdown document.
pub fn format_export_markdown(payload: &ExportPayload, generated_at: &str) -> String {
    let mut output = String::new();
    output.push_str(&format!("<!-- gemini-export: generated-at={generated_at} -->\n"));
    output.push_str(&format!(
        "<!-- gemini-export: source-url={} -->\n\n",
        payload.source_url
    ));

    for message in &payload.messages {
        let label = message.role.label();
        match message.timestamp.as_deref() {
            Some(timestamp) if !timestamp.is_empty() => {
                output.push_str(&format!("## {label} ({timestamp})\n\n"));
            }
            _ => output.push_str(&format!("## {label}\n\n")),
        }

        let body = if message.markdown.is_empty() {
            message.text.trim()
        } else {
            message.markdown.trim()
        };
        if !body.is_empty() {
            output.push_str(body);
            output.push_str("\n\n");
        }
    }

    let mut document = output.trim_end().to_string();
    document.push('\n');
    document
}
