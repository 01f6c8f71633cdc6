use std::fmt::Write;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use crate::api::types::SearchHit;
use crate::chat::store::{Answer, ConversationEntry, Feedback, Snapshot};
use crate::chat::viewer::{document_title, ViewerState};
use crate::dashboard::{feedback_shares, top_topics, DashboardData};

const SEARCH_PREVIEW_CHARS: usize = 200;
const TOP_TOPICS: usize = 10;

/// Indices in `next` that are new or differ from `prev`. A new generation
/// means a fresh conversation, so everything in it counts as changed.
pub fn changed_entries(prev: &Snapshot, next: &Snapshot) -> Vec<usize> {
    if prev.generation != next.generation {
        return (0..next.len()).collect();
    }
    next.entries
        .iter()
        .enumerate()
        .filter(|(i, entry)| prev.entries.get(*i) != Some(*entry))
        .map(|(i, _)| i)
        .collect()
}

pub fn render_entry(entry: &ConversationEntry) -> String {
    match entry {
        ConversationEntry::User { text } => format!("You: {}", text),
        ConversationEntry::Error { text } => format!("Assistant: {}", text),
        ConversationEntry::Answer(answer) => render_answer(answer),
    }
}

fn render_answer(answer: &Answer) -> String {
    let mut out = format!("Assistant [#{}]: {}", answer.id, answer.text);

    match answer.feedback {
        Feedback::None => {}
        Feedback::Positive => out.push_str("\n  (you rated this helpful)"),
        Feedback::Negative => out.push_str("\n  (you rated this unhelpful)"),
    }

    let has_details = !answer.file_references.is_empty() || answer.metrics.is_some();
    if !answer.disclosure_open {
        if has_details {
            let _ = write!(
                out,
                "\n  (/details {} for sources and metrics)",
                answer.id
            );
        }
        return out;
    }

    if let Some(metrics) = &answer.metrics {
        out.push_str("\n  Retrieval metrics:");
        for (key, value) in metrics {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let _ = write!(out, "\n    {}: {}", key, value);
        }
    }

    if answer.file_references.is_empty() {
        out.push_str("\n  Sources: none");
    } else {
        out.push_str("\n  Sources:");
        for (i, path) in answer.file_references.iter().enumerate() {
            let _ = write!(out, "\n    [{}] {} ({})", i + 1, document_title(path), path);
        }
    }
    out
}

pub fn render_viewer(title: &str, state: &ViewerState) -> String {
    match state {
        ViewerState::Closed => String::new(),
        ViewerState::Loading => format!("Loading {}...", title),
        ViewerState::Loaded(markdown) => format!(
            "===== {} =====\n{}\n===== /close to dismiss =====",
            title,
            markdown_to_text(markdown)
        ),
        ViewerState::Failed(message) => message.clone(),
    }
}

/// Flatten markdown into plain terminal text: headings are underlined, list
/// items get bullets or numbers, code blocks are indented, table cells are
/// separated by `|`, and inline markup is dropped.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    // One entry per open list; `Some(n)` is the next number of an ordered list.
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut heading_start = 0;
    let mut in_code = false;

    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                start_block(&mut out);
                heading_start = out.len();
            }
            Event::End(TagEnd::Heading(level)) => {
                let width = out[heading_start..].chars().count();
                let rule = if level == HeadingLevel::H1 { '=' } else { '-' };
                out.push('\n');
                out.extend(std::iter::repeat(rule).take(width));
                out.push('\n');
            }
            Event::Start(Tag::Paragraph) if lists.is_empty() => start_block(&mut out),
            Event::Start(Tag::CodeBlock(_)) => {
                start_block(&mut out);
                in_code = true;
            }
            Event::End(TagEnd::CodeBlock) => in_code = false,
            Event::Start(Tag::List(first)) => {
                if lists.is_empty() {
                    start_block(&mut out);
                }
                lists.push(first);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                end_line(&mut out);
                let depth = lists.len().saturating_sub(1);
                out.push_str(&"  ".repeat(depth));
                match lists.last_mut() {
                    Some(Some(n)) => {
                        let _ = write!(out, "{}. ", n);
                        *n += 1;
                    }
                    _ => out.push_str("- "),
                }
            }
            Event::Start(Tag::Table(_)) => start_block(&mut out),
            Event::End(TagEnd::TableCell) => out.push_str(" | "),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                if out.ends_with(" | ") {
                    out.truncate(out.len() - 3);
                }
                out.push('\n');
            }
            Event::Rule => {
                start_block(&mut out);
                out.push_str("----\n");
            }
            Event::Text(text) if in_code => {
                for line in text.lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak => out.push(' '),
            Event::HardBreak => out.push('\n'),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

fn end_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Separate a new block from whatever came before by one blank line.
fn start_block(out: &mut String) {
    if out.is_empty() {
        return;
    }
    end_line(out);
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}

pub fn render_dashboard(data: &DashboardData) -> String {
    let mut out = String::from("Dashboard\n");

    let (pos, neg) = feedback_shares(&data.feedback);
    let _ = writeln!(
        out,
        "  User feedback: positive {} ({:.0}%), negative {} ({:.0}%)",
        data.feedback.positive_feedback, pos, data.feedback.negative_feedback, neg
    );
    let _ = writeln!(
        out,
        "  System usage: {} total queries, {} in the last week",
        data.usage.total_queries, data.usage.queries_last_week
    );
    let _ = writeln!(
        out,
        "  Response time: min {:.2}s, avg {:.2}s, max {:.2}s",
        data.response_time.min_response_time,
        data.response_time.average_response_time,
        data.response_time.max_response_time
    );

    out.push_str("  Query topics:");
    let topics = top_topics(&data.query_topics, TOP_TOPICS);
    if topics.is_empty() {
        out.push_str(" none");
    }
    for (name, count) in topics {
        let _ = write!(out, "\n    {:<16} {}", name, count);
    }
    out.push('\n');

    if data.answer_metrics.average_tokens > 0.0 {
        let _ = write!(
            out,
            "  Average tokens per answer: {:.1}",
            data.answer_metrics.average_tokens
        );
    } else {
        out.push_str("  No token data available");
    }
    out
}

pub fn render_search(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results for '{}'.", query);
    }
    let mut out = format!("Results for '{}':", query);
    for hit in hits {
        let preview: String = hit.content.chars().take(SEARCH_PREVIEW_CHARS).collect();
        let _ = write!(out, "\n- {}\n  {}...", hit.title, preview);
    }
    out
}
