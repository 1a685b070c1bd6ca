use docchat_core::{Message, TextChunk};

const SOURCES_HEADER: &str = "Top relevant reference texts from your uploaded documents:";

/// Formats one message for the terminal, reference texts indented below bot answers.
pub fn render_message(message: &Message) -> String {
    let speaker = if message.is_user() { "You" } else { "Bot" };
    let mut out = format!("{speaker}: {}\n", message.content().trim_end());

    if let Some(chunks) = message.source_chunks().filter(|chunks| !chunks.is_empty()) {
        out.push_str(&format!("\n{SOURCES_HEADER}\n"));
        for (rank, chunk) in chunks.iter().enumerate() {
            out.push_str(&render_source(rank + 1, chunk));
        }
        out.push('\n');
    }

    out
}

fn render_source(rank: usize, chunk: &TextChunk) -> String {
    let origin = chunk.document.as_deref().unwrap_or("uploaded documents");
    let mut out = format!("  [{rank}] {origin}\n");
    for line in chunk.text.lines().filter(|line| !line.trim().is_empty()) {
        out.push_str(&format!("      {}\n", line.trim_end()));
    }
    out
}
