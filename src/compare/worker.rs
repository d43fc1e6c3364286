//! Diff worker - runs on its own thread

use std::time::Instant;

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::chunked::{ChunkOptions, RuntimeStop, chunked_edits, sampled_similarity};
use super::lcs::{Edit, Interner};
use super::request::{ComparePayload, DiffConfig, DiffRequest, DiffResponse, RequestId, WorkerStats};
use super::types::{DiffToken, is_sentinel};
use crate::error::ErrorCode;

pub const DEFAULT_EMPTY_TEXT_MESSAGE: &str = "One or both texts are empty.";
pub const DEFAULT_TOO_LARGE_MESSAGE: &str = "Documents are too large to compare.";
pub const DEFAULT_TOO_DISSIMILAR_MESSAGE: &str =
    "These documents appear highly dissimilar. Comparison was stopped to save time.";

/// Worker loop: serves compare requests until `Shutdown` or the request
/// channel closes
pub fn diff_worker(requests: Receiver<DiffRequest>, responses: Sender<DiffResponse>, defaults: DiffConfig) {
    for request in requests {
        match request {
            DiffRequest::Compare { id, payload } => {
                let mut disconnected = false;
                run_compare(id, &payload, &defaults, |response| {
                    if !disconnected && responses.send(response).is_err() {
                        disconnected = true;
                    }
                });
                if disconnected {
                    debug!("Diff worker: response channel closed, exiting");
                    break;
                }
            }

            DiffRequest::Shutdown => break,
        }
    }
}

/// Run one comparison, reporting every message through `send`.
///
/// Always ends with exactly one `Success` or `Error`.
pub fn run_compare(
    id: RequestId,
    payload: &ComparePayload,
    defaults: &DiffConfig,
    mut send: impl FnMut(DiffResponse),
) {
    let config = payload
        .settings
        .as_ref()
        .map_or(*defaults, |s| s.resolve(defaults));
    let warnings = &payload.warnings;

    let base_words: Vec<&str> = visible(&payload.base_tokens);
    let comparison_words: Vec<&str> = visible(&payload.comparison_tokens);

    if base_words.is_empty() || comparison_words.is_empty() {
        send(DiffResponse::Error {
            id,
            message: warnings
                .empty_text_message
                .clone()
                .unwrap_or_else(|| DEFAULT_EMPTY_TEXT_MESSAGE.to_string()),
            code: Some(ErrorCode::EmptyText),
        });
        return;
    }

    let (base_count, comparison_count) = (base_words.len(), comparison_words.len());

    if base_count > config.max_word_threshold || comparison_count > config.max_word_threshold {
        warn!("Diff {id}: {base_count}/{comparison_count} words exceed the size threshold");
        send(DiffResponse::Warning {
            id,
            message: warnings
                .too_large_message
                .clone()
                .unwrap_or_else(|| DEFAULT_TOO_LARGE_MESSAGE.to_string()),
        });
    }

    if base_count > config.complex_threshold || comparison_count > config.complex_threshold {
        if let Some(message) = &warnings.complex_message {
            send(DiffResponse::Warning {
                id,
                message: message.clone(),
            });
        }
    }

    let too_dissimilar = || DiffResponse::Error {
        id,
        message: warnings
            .too_dissimilar_message
            .clone()
            .unwrap_or_else(|| DEFAULT_TOO_DISSIMILAR_MESSAGE.to_string()),
        code: Some(ErrorCode::TooDissimilar),
    };

    if config.early_stop_enabled && base_count.min(comparison_count) >= config.min_tokens_for_early_stop {
        let (unigram, bigram) = sampled_similarity(&base_words, &comparison_words, config.sample_limit);
        debug!("Diff {id}: sampled similarity unigram={unigram:.4} bigram={bigram:.4}");
        if unigram < config.min_jaccard_unigram && bigram < config.min_jaccard_bigram {
            info!("Diff {id}: stopped early, documents too dissimilar");
            send(too_dissimilar());
            return;
        }
    }

    let start = Instant::now();
    let mut interner = Interner::new();
    let base_ids = interner.intern_all(&payload.base_tokens);
    let comparison_ids = interner.intern_all(&payload.comparison_tokens);

    let options = ChunkOptions {
        batch_size: config.batch_size,
        runtime_stop: config.early_stop_enabled.then_some(RuntimeStop {
            max_processed_tokens: config.runtime_max_processed_tokens,
            min_unchanged_ratio: config.runtime_min_unchanged_ratio,
        }),
    };

    let result = chunked_edits(&base_ids, &comparison_ids, &options, |edits| {
        let tokens: Vec<DiffToken> = edits
            .iter()
            .map(|edit| match *edit {
                Edit::Keep { base, .. } | Edit::Delete { base } => {
                    DiffToken::new(edit.kind(), payload.base_tokens[base].as_str())
                }
                Edit::Insert { comparison } => {
                    DiffToken::added(payload.comparison_tokens[comparison].as_str())
                }
            })
            .collect();
        send(DiffResponse::Chunk { id, tokens });
    });

    if let Err(stop) = result {
        info!("Diff {id}: runtime early stop ({stop})");
        send(too_dissimilar());
        return;
    }

    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("Diff {id}: {base_count} vs {comparison_count} words in {duration_ms:.1} ms");
    send(DiffResponse::Success {
        id,
        stats: WorkerStats {
            base_word_count: base_count,
            comparison_word_count: comparison_count,
            duration_ms,
        },
    });
}

fn visible(tokens: &[String]) -> Vec<&str> {
    tokens
        .iter()
        .map(String::as_str)
        .filter(|t| !is_sentinel(t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::request::{DiffSettings, WorkerWarnings};
    use crate::compare::types::{DiffKind, PARAGRAPH_SENTINEL};

    fn payload(base: &[&str], comparison: &[&str]) -> ComparePayload {
        ComparePayload {
            base_tokens: base.iter().map(|s| (*s).to_string()).collect(),
            comparison_tokens: comparison.iter().map(|s| (*s).to_string()).collect(),
            warnings: WorkerWarnings::default(),
            settings: None,
        }
    }

    fn run(payload: &ComparePayload) -> Vec<DiffResponse> {
        let mut out = Vec::new();
        run_compare(RequestId::new(1), payload, &DiffConfig::default(), |r| out.push(r));
        out
    }

    #[test]
    fn simple_replacement() {
        let responses = run(&payload(&["The", "cat", "sat"], &["The", "dog", "sat"]));
        assert_eq!(responses.len(), 2);
        let DiffResponse::Chunk { tokens, .. } = &responses[0] else {
            panic!("expected chunk, got {:?}", responses[0]);
        };
        assert_eq!(tokens[1], DiffToken::removed("cat"));
        assert_eq!(tokens[2], DiffToken::added("dog"));
        match &responses[1] {
            DiffResponse::Success { stats, .. } => {
                assert_eq!(stats.base_word_count, 3);
                assert_eq!(stats.comparison_word_count, 3);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn empty_side_is_an_error() {
        let responses = run(&payload(&[PARAGRAPH_SENTINEL], &["word"]));
        assert_eq!(
            responses,
            vec![DiffResponse::Error {
                id: RequestId::new(1),
                message: DEFAULT_EMPTY_TEXT_MESSAGE.to_string(),
                code: Some(ErrorCode::EmptyText),
            }]
        );
    }

    #[test]
    fn sentinels_do_not_count_as_words() {
        let responses = run(&payload(
            &["a", PARAGRAPH_SENTINEL, "b"],
            &["a", PARAGRAPH_SENTINEL, "b"],
        ));
        let Some(DiffResponse::Success { stats, .. }) = responses.last() else {
            panic!("expected success");
        };
        assert_eq!(stats.base_word_count, 2);
    }

    #[test]
    fn size_warnings_precede_chunks() {
        let mut p = payload(&["a", "b", "c"], &["a", "b"]);
        p.warnings.complex_message = Some("complex".into());
        p.settings = Some(DiffSettings {
            complex_threshold: Some(2),
            max_word_threshold: Some(2),
            ..DiffSettings::default()
        });
        let responses = run(&p);
        assert_eq!(
            responses[0],
            DiffResponse::Warning {
                id: RequestId::new(1),
                message: DEFAULT_TOO_LARGE_MESSAGE.to_string(),
            }
        );
        assert_eq!(
            responses[1],
            DiffResponse::Warning {
                id: RequestId::new(1),
                message: "complex".into(),
            }
        );
        assert!(responses.last().is_some_and(DiffResponse::is_terminal));
    }

    #[test]
    fn prefilter_stops_dissimilar_documents() {
        let base: Vec<String> = (0..50).map(|i| format!("a{i}")).collect();
        let comparison: Vec<String> = (0..50).map(|i| format!("b{i}")).collect();
        let p = ComparePayload {
            base_tokens: base,
            comparison_tokens: comparison,
            warnings: WorkerWarnings::default(),
            settings: Some(DiffSettings {
                min_tokens_for_early_stop: Some(10),
                ..DiffSettings::default()
            }),
        };
        let responses = run(&p);
        assert_eq!(responses.len(), 1);
        assert!(matches!(
            responses[0],
            DiffResponse::Error {
                code: Some(ErrorCode::TooDissimilar),
                ..
            }
        ));
    }

    #[test]
    fn chunks_cover_both_inputs_in_order() {
        let base: Vec<String> = (0..300).map(|i| format!("w{}", i % 37)).collect();
        let mut comparison = base.clone();
        comparison.insert(120, "inserted".to_string());
        comparison.remove(250);
        let p = ComparePayload {
            base_tokens: base.clone(),
            comparison_tokens: comparison.clone(),
            warnings: WorkerWarnings::default(),
            settings: Some(DiffSettings {
                batch_size: Some(16),
                ..DiffSettings::default()
            }),
        };
        let mut rebuilt_base = Vec::new();
        let mut rebuilt_comparison = Vec::new();
        for response in run(&p) {
            if let DiffResponse::Chunk { tokens, .. } = response {
                for token in tokens {
                    if token.kind != DiffKind::Added {
                        rebuilt_base.push(token.text.clone());
                    }
                    if token.kind != DiffKind::Removed {
                        rebuilt_comparison.push(token.text);
                    }
                }
            }
        }
        assert_eq!(rebuilt_base, base);
        assert_eq!(rebuilt_comparison, comparison);
    }

    #[test]
    fn worker_loop_answers_and_shuts_down() {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let handle = std::thread::spawn(move || diff_worker(request_rx, response_tx, DiffConfig::default()));

        request_tx
            .send(DiffRequest::Compare {
                id: RequestId::new(9),
                payload: payload(&["x"], &["x"]),
            })
            .unwrap();
        request_tx.send(DiffRequest::Shutdown).unwrap();
        handle.join().unwrap();

        let responses: Vec<DiffResponse> = response_rx.try_iter().collect();
        assert!(responses.iter().all(|r| r.id() == RequestId::new(9)));
        assert!(responses.last().is_some_and(DiffResponse::is_terminal));
    }
}
