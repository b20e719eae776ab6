use inference_providers::ChatMessage;

use crate::search::SearchResponse;

/// Assistant turn placed between the query and the prompt
pub const ACKNOWLEDGEMENT: &str =
    "I found some relevant information. Let me analyze it and create a comprehensive report.";

/// Header the model must reproduce literally at the end of its report
pub const SOURCES_TABLE_HEADER: &str = "| Number | Source | Description |";

const INSTRUCTIONS: &str = "Instructions:
- Write a detailed, well-structured report in Markdown that thoroughly answers the query.
- Cite the sources you rely on by their number, for example [1] or [2].
- Point out possible bias in the sources and note where sources conflict with each other.
- Do not state facts that none of the sources support.";

/// Build the report prompt from the query and its search results.
pub fn compose_prompt(query: &str, search: &SearchResponse) -> String {
    let mut blocks = vec![format!(
        "Please write a detailed research report that answers the following query, \
         using the search results below as your sources.\n\nQuery: \"{query}\""
    )];

    if let Some(answer) = search.answer.as_deref().filter(|a| !a.is_empty()) {
        blocks.push(format!("Direct answer from the search provider:\n{answer}"));
    }

    let sources: Vec<String> = search
        .results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[{}] {}\n{}\nURL: {}",
                i + 1,
                result.title,
                result.content,
                result.url
            )
        })
        .collect();
    blocks.push(format!("Search results:\n\n{}", sources.join("\n\n")));

    blocks.push(INSTRUCTIONS.to_string());
    blocks.push(format!(
        "End the report with a sources table. Reproduce this exact column layout:\n\n\
         {SOURCES_TABLE_HEADER}\n\
         |--------|--------|-------------|\n\
         | [1] | [Source title](URL) | One line on what the source contributes |"
    ));

    blocks.join("\n\n")
}

/// Completion request messages, in the order the provider must receive them:
/// the query, the acknowledgement, then the prompt.
pub fn build_messages(query: &str, prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(query),
        ChatMessage::assistant(ACKNOWLEDGEMENT),
        ChatMessage::user(prompt),
    ]
}
