//! Builds chat fine-tuning records from uploaded files or from hand-written
//! message groups, and serialises them as JSONL.

use crate::format_check::{check_format, FormatErrors};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

pub const FILE_NAME_PLACEHOLDER: &str = "${fileName}";

// One output message, serialised as {"role": .., "content": ..}
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

// One JSONL line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRecord {
    pub messages: Vec<ChatMessage>,
}

pub fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Length of the quote-escaped text in UTF-16 code units.
pub fn char_count(content: &str) -> usize {
    escape_quotes(content).encode_utf16().count()
}

pub fn is_exceeding_limit(count: usize, limit: usize) -> bool {
    count > limit
}

/// Drop a trailing `.ext` segment; `README` and `notes.` stay as they are.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() && !name[idx + 1..].contains('/') => &name[..idx],
        _ => name,
    }
}

pub fn render_user_prompt(template: &str, file_name: &str) -> String {
    template.replace(FILE_NAME_PLACEHOLDER, strip_extension(file_name))
}

pub fn to_jsonl(records: &[ChatRecord]) -> Result<String> {
    let lines = records
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()
        .context("Cannot serialise record")?;
    Ok(lines.join("\n"))
}

/// Check `jsonl` and write it to `out_file` only when no defect was found.
/// The returned counts are empty exactly when the file was written.
pub fn write_if_clean(out_file: &Path, jsonl: &str) -> Result<FormatErrors> {
    let errors = check_format(jsonl).context("Converted JSONL does not decode")?;
    if !errors.is_empty() {
        return Ok(errors);
    }
    if let Some(parent) = out_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    fs::write(out_file, jsonl).with_context(|| format!("Cannot write {:?}", out_file))?;
    Ok(errors)
}

// multi-file mode

// One uploaded file and the prompts it is paired with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub name: String,
    pub content: String,
    pub system: String,
    pub user: String,
}

impl ProcessedFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>, common_system: &str, common_user: &str) -> Self {
        let name = name.into();
        let user = render_user_prompt(common_user, &name);
        Self { name, content: content.into(), system: common_system.to_owned(), user }
    }

    pub fn to_record(&self) -> ChatRecord {
        ChatRecord {
            messages: vec![
                ChatMessage::new("system", escape_quotes(&self.system)),
                ChatMessage::new("user", escape_quotes(&self.user)),
                ChatMessage::new("assistant", escape_quotes(&self.content.replace('\n', " "))),
            ],
        }
    }

    /// Size of the assistant message as it is counted against the limit.
    pub fn assistant_chars(&self) -> usize {
        char_count(&self.content.replace('\n', " "))
    }
}

// Per-row replacement of the common prompts, matched by file name
#[derive(Debug, Clone, Deserialize)]
pub struct RowOverride {
    pub name: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// Apply overrides by file name; returns the override names that matched no row.
pub fn apply_overrides(files: &mut [ProcessedFile], overrides: &[RowOverride]) -> Vec<String> {
    let by_name: HashMap<&str, &RowOverride> =
        overrides.iter().map(|o| (o.name.as_str(), o)).collect();

    let mut used = Vec::new();
    for file in files.iter_mut() {
        let Some(o) = by_name.get(file.name.as_str()) else {
            continue;
        };
        if let Some(system) = &o.system {
            file.system = system.clone();
        }
        if let Some(user) = &o.user {
            file.user = user.clone();
        }
        used.push(file.name.clone());
    }

    overrides
        .iter()
        .filter(|o| !used.contains(&o.name))
        .map(|o| o.name.clone())
        .collect()
}

/// Expand directories (non-recursively, sorted by file name) and keep plain
/// files in the order given.
pub fn collect_input_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("Cannot read input directory {:?}", input))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            out.extend(entries);
        } else {
            out.push(input.clone());
        }
    }
    Ok(out)
}

/// Read a file as text; invalid UTF-8 is replaced rather than rejected.
pub fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Cannot read {:?}", path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// manual mode

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Text,
    Svg,
}

// One hand-written message; `id` and other UI leftovers are ignored
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMessage {
    pub role: String,
    #[serde(rename = "type", default)]
    pub kind: ContentKind,
    #[serde(default)]
    pub content: String,
}

impl GroupMessage {
    pub fn to_message(&self) -> ChatMessage {
        let content = match self.kind {
            ContentKind::Text => self.content.clone(),
            ContentKind::Svg => escape_quotes(&self.content.replace('\n', "")),
        };
        ChatMessage::new(self.role.clone(), content)
    }
}

pub fn group_record(group: &[GroupMessage]) -> ChatRecord {
    ChatRecord { messages: group.iter().map(GroupMessage::to_message).collect() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_quotes(r#"say "hi""#), r#"say \"hi\""#);
        assert_eq!(escape_quotes("plain"), "plain");
    }

    #[test]
    fn test_char_count_uses_utf16_units() {
        assert_eq!(char_count("ab\"c"), 5);
        assert_eq!(char_count("日本"), 2);
        assert_eq!(char_count("😀"), 2);
    }

    #[test]
    fn test_limit_is_strict() {
        assert!(!is_exceeding_limit(10, 10));
        assert!(is_exceeding_limit(11, 10));
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("report.txt"), "report");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("README"), "README");
        assert_eq!(strip_extension("notes."), "notes.");
        assert_eq!(strip_extension(".env"), "");
    }

    #[test]
    fn test_render_user_prompt_replaces_every_placeholder() {
        let user = render_user_prompt("Draw ${fileName}. Only ${fileName}!", "cat.svg");
        assert_eq!(user, "Draw cat. Only cat!");
    }

    #[test]
    fn test_file_record_layout() {
        let file = ProcessedFile::new("a.txt", "line1\nline \"2\"", "sys", "about ${fileName}");
        let line = serde_json::to_string(&file.to_record()).unwrap();
        assert_eq!(
            line,
            r#"{"messages":[{"role":"system","content":"sys"},{"role":"user","content":"about a"},{"role":"assistant","content":"line1 line \\\"2\\\""}]}"#
        );
    }

    #[test]
    fn test_svg_content_is_flattened() {
        let msg: GroupMessage =
            serde_json::from_str(r#"{"id": 3, "role": "assistant", "type": "svg", "content": "<svg a=\"1\">\n</svg>"}"#).unwrap();
        assert_eq!(msg.to_message().content, r#"<svg a=\"1\"></svg>"#);

        let text: GroupMessage = serde_json::from_str(r#"{"role": "user", "content": "a\n\"b\""}"#).unwrap();
        assert_eq!(text.kind, ContentKind::Text);
        assert_eq!(text.to_message().content, "a\n\"b\"");
    }

    #[test]
    fn test_overrides_report_unmatched_names() {
        let mut files = vec![
            ProcessedFile::new("a.txt", "A", "s", "u"),
            ProcessedFile::new("b.txt", "B", "s", "u"),
        ];
        let overrides = vec![
            RowOverride { name: "b.txt".into(), system: None, user: Some("custom".into()) },
            RowOverride { name: "zzz.txt".into(), system: Some("x".into()), user: None },
        ];
        let unmatched = apply_overrides(&mut files, &overrides);
        assert_eq!(unmatched, vec!["zzz.txt".to_string()]);
        assert_eq!(files[0].user, "u");
        assert_eq!(files[1].user, "custom");
        assert_eq!(files[1].system, "s");
    }

    #[test]
    fn test_to_jsonl_joins_without_trailing_newline() {
        let records = vec![
            group_record(&[GroupMessage { role: "assistant".into(), kind: ContentKind::Text, content: "x".into() }]),
            group_record(&[GroupMessage { role: "assistant".into(), kind: ContentKind::Text, content: "y".into() }]),
        ];
        let jsonl = to_jsonl(&records).unwrap();
        assert_eq!(jsonl.lines().count(), 2);
        assert!(!jsonl.ends_with('\n'));
        assert!(to_jsonl(&[]).unwrap().is_empty());
    }
}
