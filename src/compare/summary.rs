//! JSON summary export of a finished comparison

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use serde::Serialize;

use super::operation::CompareResult;
use super::types::ChangeSide;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEntry<'a> {
    name: &'a str,
    total_words: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TotalsEntry {
    added: usize,
    removed: usize,
    unchanged: usize,
    duration_ms: f64,
}

#[derive(Debug, Serialize)]
struct ChangeEntry<'a> {
    base: Option<&'a ChangeSide>,
    comparison: Option<&'a ChangeSide>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    generated_at: String,
    base: DocumentEntry<'a>,
    comparison: DocumentEntry<'a>,
    totals: TotalsEntry,
    changes: Vec<ChangeEntry<'a>>,
    warnings: &'a [String],
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Pretty-printed summary document
pub fn summary_json(result: &CompareResult, generated_at: DateTime<Utc>) -> Result<String> {
    let summary = Summary {
        generated_at: timestamp(generated_at),
        base: DocumentEntry {
            name: &result.base.name,
            total_words: result.base.word_count,
        },
        comparison: DocumentEntry {
            name: &result.comparison.name,
            total_words: result.comparison.word_count,
        },
        totals: TotalsEntry {
            added: result.totals.added,
            removed: result.totals.removed,
            unchanged: result.totals.unchanged,
            duration_ms: result.totals.duration_ms,
        },
        changes: result
            .changes
            .iter()
            .map(|change| ChangeEntry {
                base: change.base.as_ref(),
                comparison: change.comparison.as_ref(),
            })
            .collect(),
        warnings: &result.warnings,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

/// `compare-summary-<timestamp>.json`, safe on every filesystem
#[must_use]
pub fn summary_file_name(generated_at: DateTime<Utc>) -> String {
    let stamp = timestamp(generated_at).replace([':', '.'], "-");
    format!("compare-summary-{stamp}.json")
}

/// Write the summary into `dir` and return the file path.
///
/// The file is stamped with the comparison's processing time, so writing
/// the same result twice yields the same file.
pub fn write_summary(result: &CompareResult, dir: &Path) -> Result<PathBuf> {
    let processed_at = result.totals.processed_at;
    let json = summary_json(result, processed_at)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(summary_file_name(processed_at));
    fs::write(&path, json)?;
    info!("Wrote comparison summary to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::operation::assemble_result;
    use crate::compare::request::WorkerStats;
    use crate::compare::types::{DiffToken, ExtractedContent, TokenMetadata};
    use chrono::TimeZone;

    fn content(words: &[&str]) -> ExtractedContent {
        ExtractedContent {
            tokens: words.iter().map(|w| (*w).to_string()).collect(),
            metadata: words
                .iter()
                .map(|_| TokenMetadata {
                    page: 1,
                    paragraph: 1,
                    bbox: None,
                })
                .collect(),
            ..ExtractedContent::default()
        }
    }

    fn sample() -> CompareResult {
        let tokens = vec![
            DiffToken::unchanged("The"),
            DiffToken::removed("cat"),
            DiffToken::added("dog"),
            DiffToken::unchanged("sat"),
        ];
        assemble_result(
            ("old.pdf", content(&["The", "cat", "sat"])),
            ("new.pdf", content(&["The", "dog", "sat"])),
            &tokens,
            WorkerStats {
                base_word_count: 3,
                comparison_word_count: 3,
                duration_ms: 1.5,
            },
            vec!["large".to_string()],
        )
    }

    #[test]
    fn file_name_has_no_separators() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            summary_file_name(at),
            "compare-summary-2024-03-09T14-05-07-000Z.json"
        );
    }

    #[test]
    fn summary_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let json = summary_json(&sample(), at).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["generatedAt"], "2024-03-09T14:05:07.000Z");
        assert_eq!(value["base"]["name"], "old.pdf");
        assert_eq!(value["comparison"]["totalWords"], 3);
        assert_eq!(value["totals"]["added"], 1);
        assert_eq!(value["totals"]["durationMs"], 1.5);
        assert_eq!(value["changes"][0]["base"]["text"], "cat");
        assert_eq!(value["changes"][0]["comparison"]["text"], "dog");
        assert_eq!(value["warnings"][0], "large");
        assert!(json.contains('\n'));
    }

    #[test]
    fn write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_summary(&sample(), &dir.path().join("out")).unwrap();
        assert!(path.exists());
        assert!(
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("compare-summary-"))
        );
    }

    #[test]
    fn rewriting_a_result_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = sample();
        result.totals.processed_at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let first = write_summary(&result, dir.path()).unwrap();
        let body = fs::read_to_string(&first).unwrap();
        let second = write_summary(&result, dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&second).unwrap(), body);
        assert!(body.contains("\"generatedAt\": \"2024-03-09T14:05:07.000Z\""));
    }
}
