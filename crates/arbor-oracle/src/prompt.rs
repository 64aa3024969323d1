//! Prompt rendering for each oracle task.
//!
//! The wording is deliberately plain; each prompt names the JSON keys
//! its response parser requires.

use crate::request::OracleTask;
use std::fmt::Write as _;

/// Render the natural-language prompt for a task
#[must_use]
pub fn render_prompt(task: &OracleTask) -> String {
    match task {
        OracleTask::ClassifyTopLevel { candidates } => {
            let mut listing = String::new();
            for c in candidates {
                let _ = writeln!(listing, "{}. {} | {}", c.index, c.title, c.preview);
            }
            format!(
                "The following numbered blocks come from one document, in reading order.\n\
                 <Blocks>\n{listing}</Blocks>\n\
                 Identify the blocks that are headings at the topmost level of this list; \
                 every other block belongs under the nearest preceding top-level heading. \
                 If no block is a heading, return an empty list.\n\
                 Return JSON with a single key \"top_headers\": a list of block numbers."
            )
        }
        OracleTask::SummarizeParagraph {
            title,
            content,
            context,
        } => {
            let mut prompt = String::new();
            if let Some(context) = context {
                let _ = write!(prompt, "<Abstract>\n{context}\n</Abstract>\n");
            }
            let _ = write!(
                prompt,
                "Summarize the paragraph{}.\n<Paragraph>\n{content}\n</Paragraph>\n\
                 Return JSON with key \"points\": a list of 2 to 7 objects with key \"point\" \
                 (a complete sentence stating one important fact, 70 words in total at most) \
                 and optional key \"evidence\" (a short quote supporting it), and key \
                 \"keypoint\": a caption of at most 10 words.",
                title_suffix(title)
            );
            prompt
        }
        OracleTask::SummarizeSection {
            title,
            children,
            context,
        } => {
            let mut contents = String::new();
            for child in children {
                let caption = if child.caption.is_empty() {
                    "Subsection"
                } else {
                    child.caption.as_str()
                };
                let _ = write!(contents, "# {caption}\n{}\n---\n", child.summary);
            }
            let mut prompt = String::new();
            if let Some(context) = context {
                let _ = write!(prompt, "<Abstract>\n{context}\n</Abstract>\n");
            }
            let _ = write!(
                prompt,
                "Summarize the section{}.\n<Contents>\n{contents}</Contents>\n\
                 Return JSON with key \"points\": a list of 2 to 7 objects with key \"point\" \
                 (a complete sentence, 70 words in total at most), and key \"keypoint\": \
                 a one-sentence summary of at most 20 words.",
                title_suffix(title)
            );
            prompt
        }
        OracleTask::TitleParagraph { content } => format!(
            "<Paragraph>\n{content}\n</Paragraph>\n\
             Write a title for this paragraph: one complete sentence of at most 20 words.\n\
             Return JSON with a single key \"title\"."
        ),
    }
}

fn title_suffix(title: &str) -> String {
    if title.is_empty() {
        String::new()
    } else {
        format!(" titled \"{title}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CandidateView, SectionDigest};

    #[test]
    fn classify_prompt_lists_indices_in_order() {
        let prompt = render_prompt(&OracleTask::ClassifyTopLevel {
            candidates: vec![
                CandidateView {
                    index: 0,
                    title: "A".into(),
                    preview: "a".into(),
                },
                CandidateView {
                    index: 1,
                    title: "B".into(),
                    preview: "b".into(),
                },
            ],
        });
        let a = prompt.find("0. A").unwrap();
        let b = prompt.find("1. B").unwrap();
        assert!(a < b);
        assert!(prompt.contains("top_headers"));
    }

    #[test]
    fn section_prompt_falls_back_to_generic_caption() {
        let prompt = render_prompt(&OracleTask::SummarizeSection {
            title: String::new(),
            children: vec![SectionDigest {
                caption: String::new(),
                summary: "- fact".into(),
            }],
            context: Some("abstract".into()),
        });
        assert!(prompt.contains("# Subsection"));
        assert!(prompt.contains("<Abstract>"));
        assert!(!prompt.contains("titled"));
    }
}
