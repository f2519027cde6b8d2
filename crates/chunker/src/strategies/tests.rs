//! Tests for the chunking strategies.

use std::sync::Arc;

use async_trait::async_trait;

use chunklab_core::{
    ConfigError, DocumentChunk, Element, ExtractedDocument, PositionUnit, StrategyConfig,
    StrategyKind, TokenizerMode,
};

use super::ChunkingStrategy;
use crate::embedding::{Embedder, EmbeddingError};
use crate::error::ChunkError;
use crate::tokenizer::TokenCounter;

fn make_doc(text: &str) -> ExtractedDocument {
    let mut doc = ExtractedDocument::new("doc_1", text);
    doc.preprocessing_method = "pypdf".into();
    doc
}

fn make_element_doc(types: &[&str]) -> ExtractedDocument {
    let mut doc = make_doc("");
    doc.elements = types
        .iter()
        .enumerate()
        .map(|(i, t)| Element::new(t, &format!("Element number {i}.")).on_page(1 + i as u32 / 4))
        .collect();
    doc
}

fn strategy(config: StrategyConfig) -> ChunkingStrategy {
    ChunkingStrategy::from_config(&config, Some(Arc::new(TopicEmbedder)))
        .expect("valid strategy config")
}

async fn run(config: StrategyConfig, doc: &ExtractedDocument) -> Vec<DocumentChunk> {
    strategy(config).segment(doc).await.expect("segmentation succeeds")
}

/// "the" followed by 1,099 " cat": 1,100 cl100k tokens, one per word.
fn cat_text() -> String {
    let mut text = String::from("the");
    for _ in 0..1099 {
        text.push_str(" cat");
    }
    text
}

/// Maps a sentence to a one-hot topic vector by its first word.
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.starts_with("alpha") {
                    vec![1.0, 0.0, 0.0]
                } else if lower.starts_with("beta") {
                    vec![0.0, 1.0, 0.0]
                } else if lower.starts_with("gamma") {
                    vec![0.0, 0.0, 1.0]
                } else {
                    vec![1.0, 1.0, 1.0]
                }
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        3
    }
}

const TOPIC_SENTENCES: [&str; 10] = [
    "Alpha one is here.",
    "Alpha two is here.",
    "Alpha three is here.",
    "Alpha four is here.",
    "Beta five is here.",
    "Beta six is here.",
    "Beta seven is here.",
    "Gamma eight is here.",
    "Gamma nine is here.",
    "Gamma ten is here.",
];

fn semantic_config(min: usize, max: usize) -> StrategyConfig {
    StrategyConfig::new(StrategyKind::Semantic)
        .with_param("similarity_threshold", 0.5)
        .with_param("min_chunk_size", min)
        .with_param("max_chunk_size", max)
}

fn sentence_counts(chunks: &[DocumentChunk]) -> Vec<usize> {
    chunks
        .iter()
        .map(|c| TOPIC_SENTENCES.iter().filter(|s| c.content.contains(*s)).count())
        .collect()
}

// ── Fixed size ──────────────────────────────────────────────────────

#[tokio::test]
async fn fixed_size_exact_window_sizes() {
    let config = StrategyConfig::new(StrategyKind::FixedSize).with_param("chunk_size", 512);
    let chunks = run(config, &make_doc(&cat_text())).await;

    let counts: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
    assert_eq!(counts, vec![512, 512, 76]);
    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_position, c.end_position)).collect();
    assert_eq!(spans, vec![(0, 512), (512, 1024), (1024, 1100)]);

    let counter = TokenCounter::exact("cl100k_base").unwrap();
    for chunk in &chunks {
        counter
            .verify_round_trip(&chunk.content, chunk.token_count)
            .expect("no round-trip drift");
        assert_eq!(chunk.metadata.position_unit, PositionUnit::Tokens);
        assert_eq!(chunk.metadata.tokenizer, Some(TokenizerMode::Exact));
        assert_eq!(chunk.metadata.total_chunks, Some(3));
    }
    assert_eq!(chunks[2].chunk_id, "doc_1_fixed_size_002");
}

#[tokio::test]
async fn fixed_size_overlap_repeats_trailing_tokens() {
    let config = StrategyConfig::new(StrategyKind::FixedSize)
        .with_param("chunk_size", 100)
        .with_param("chunk_overlap", 20);
    let chunks = run(config, &make_doc(&cat_text())).await;

    assert!(chunks.len() > 2);
    for pair in chunks.windows(2) {
        assert_eq!(pair[1].start_position, pair[0].end_position - 20);
        let prev: Vec<&str> = pair[0].content.split_whitespace().collect();
        let next: Vec<&str> = pair[1].content.split_whitespace().collect();
        assert_eq!(&prev[prev.len() - 20..], &next[..20]);
    }
    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.token_count, 100);
    }
    assert_eq!(chunks.last().unwrap().end_position, 1100);
}

#[tokio::test]
async fn fixed_size_short_and_empty_text() {
    let config = StrategyConfig::new(StrategyKind::FixedSize);
    assert!(run(config.clone(), &make_doc("")).await.is_empty());

    let chunks = run(config, &make_doc("A single short sentence.")).await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, "A single short sentence.");
}

#[tokio::test]
async fn fixed_size_falls_back_to_approximate_counting() {
    let config = StrategyConfig::new(StrategyKind::FixedSize)
        .with_param("chunk_size", 10)
        .with_param("encoding_name", "no_such_encoding");
    let text = "x".repeat(100);
    let chunks = run(config, &make_doc(&text)).await;

    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert_eq!(chunk.metadata.tokenizer, Some(TokenizerMode::Approximate));
        assert_eq!(chunk.metadata.position_unit, PositionUnit::Chars);
    }
    assert_eq!(chunks[0].token_count, 10);
    assert_eq!(chunks[2].content.len(), 20);
    assert_eq!(chunks[2].token_count, 5);
}

#[test]
fn fixed_size_rejects_overlap_not_below_size() {
    let config = StrategyConfig::new(StrategyKind::FixedSize)
        .with_param("chunk_size", 64)
        .with_param("chunk_overlap", 64);
    let err = ChunkingStrategy::from_config(&config, None).err().unwrap();
    assert!(matches!(
        err,
        ChunkError::Config(ConfigError::InvalidParameter { ref parameter, .. }) if parameter == "chunk_overlap"
    ));
}

// ── Hierarchical ────────────────────────────────────────────────────

fn long_text() -> String {
    (0..12)
        .map(|p| {
            (0..6)
                .map(|s| format!("Sentence {} of paragraph {p} covers topic {}.", p * 6 + s, s % 4))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn fixed_size_windows_round_trip_on_paragraph_text() {
    let text = long_text();
    let config = StrategyConfig::new(StrategyKind::FixedSize).with_param("chunk_size", 50);
    let chunks = run(config, &make_doc(&text)).await;

    let counter = TokenCounter::exact("cl100k_base").unwrap();
    assert_eq!(chunks.len(), counter.count(&text).div_ceil(50));
    for chunk in &chunks[..chunks.len() - 1] {
        assert_eq!(chunk.token_count, 50);
    }
    for chunk in &chunks {
        counter
            .verify_round_trip(&chunk.content, chunk.token_count)
            .expect("no round-trip drift");
    }
    let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(rebuilt, text);
}

#[tokio::test]
async fn hierarchical_covers_source_without_loss() {
    let text = long_text();
    let config = StrategyConfig::new(StrategyKind::Hierarchical)
        .with_param("chunk_size", 200)
        .with_param("chunk_overlap", 40);
    let chunks = run(config, &make_doc(&text)).await;

    assert!(chunks.len() > 5);
    let mut covered = vec![false; text.len()];
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
        assert!(chunk.content.chars().count() <= 200);
        assert_eq!(&text[chunk.start_position..chunk.end_position], chunk.content);
        covered[chunk.start_position..chunk.end_position].fill(true);
    }
    for (i, ch) in text.char_indices() {
        assert!(ch.is_whitespace() || covered[i], "char {i} ({ch:?}) not covered");
    }
    for pair in chunks.windows(2) {
        assert!(pair[0].start_position < pair[1].start_position);
    }
}

// ── Element based ───────────────────────────────────────────────────

#[tokio::test]
async fn element_windows_overlap_by_count() {
    let doc = make_element_doc(&["NarrativeText"; 10]);
    let config = StrategyConfig::new(StrategyKind::ElementBased)
        .with_param("max_elements_per_chunk", 4)
        .with_param("overlap_percentage", 0.25);
    let chunks = run(config, &doc).await;

    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_position, c.end_position)).collect();
    assert_eq!(spans, vec![(0, 4), (3, 7), (6, 10)]);
    assert!(chunks[1].content.starts_with("Element number 3."));
    assert_eq!(chunks[1].content.matches("\n\n").count(), 3);
    assert_eq!(chunks[0].metadata.source_elements.len(), 4);
    assert_eq!(chunks[0].metadata.page_numbers, vec![1]);
    assert_eq!(chunks[1].metadata.page_numbers, vec![1, 2]);
    assert_eq!(chunks[0].metadata.position_unit, PositionUnit::Elements);
}

#[tokio::test]
async fn element_windows_anchor_on_priority_elements() {
    let doc = make_element_doc(&[
        "Title", "ListItem", "Header", "ListItem", "ListItem", "ListItem", "ListItem",
    ]);
    let config = StrategyConfig::new(StrategyKind::ElementBased)
        .with_param("max_elements_per_chunk", 4)
        .with_param("overlap_percentage", 0.25);
    let chunks = run(config, &doc).await;

    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_position, c.end_position)).collect();
    assert_eq!(spans, vec![(0, 4), (2, 6), (5, 7)]);
    assert_eq!(chunks[1].metadata.source_elements[0], "Header");
}

#[tokio::test]
async fn element_windows_with_only_blank_text_are_dropped() {
    let mut doc = make_element_doc(&["NarrativeText"; 10]);
    for element in &mut doc.elements[..4] {
        element.text = "  \n ".into();
    }
    let config = StrategyConfig::new(StrategyKind::ElementBased)
        .with_param("max_elements_per_chunk", 4)
        .with_param("overlap_percentage", 0.25);
    let chunks = run(config, &doc).await;

    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start_position, c.end_position)).collect();
    assert_eq!(spans, vec![(3, 7), (6, 10)]);
    assert!(chunks[0].content.starts_with("Element number 4."));
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[1].metadata.total_chunks, Some(2));
}

#[tokio::test]
async fn element_strategy_without_elements_falls_back() {
    let doc = make_doc(&long_text());
    let chunks = run(StrategyConfig::new(StrategyKind::ElementBased), &doc).await;

    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk.strategy_name, "sliding_unstructured");
        assert_eq!(chunk.metadata.extra["fallback"], "sliding_langchain");
        assert_eq!(chunk.metadata.position_unit, PositionUnit::Chars);
    }
}

#[test]
fn element_strategy_rejects_full_overlap() {
    let config = StrategyConfig::new(StrategyKind::ElementBased).with_param("overlap_percentage", 1.0);
    assert!(ChunkingStrategy::from_config(&config, None).is_err());
}

// ── Semantic ────────────────────────────────────────────────────────

#[tokio::test]
async fn semantic_breaks_where_similarity_drops() {
    let text = TOPIC_SENTENCES.join(" ");
    let chunks = run(semantic_config(1, 10_000), &make_doc(&text)).await;

    assert_eq!(sentence_counts(&chunks), vec![4, 3, 3]);
    assert_eq!(chunks[0].metadata.semantic_score, Some(0.0));
    assert_eq!(chunks[1].metadata.semantic_score, Some(0.0));
    assert_eq!(chunks[2].metadata.semantic_score, None);

    let rebuilt = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
    assert_eq!(rebuilt, text);
    for chunk in &chunks {
        assert_eq!(&text[chunk.start_position..chunk.end_position], chunk.content);
    }
}

#[tokio::test]
async fn semantic_merges_groups_below_minimum() {
    let text = TOPIC_SENTENCES.join(" ");
    // alpha group is 78 chars, beta 56, gamma 59
    let chunks = run(semantic_config(57, 10_000), &make_doc(&text)).await;
    assert_eq!(sentence_counts(&chunks), vec![7, 3]);
}

#[tokio::test]
async fn semantic_splits_groups_above_maximum() {
    let text = (0..10)
        .map(|i| format!("Alpha sentence number {i}."))
        .collect::<Vec<_>>()
        .join(" ");
    let chunks = run(semantic_config(1, 60), &make_doc(&text)).await;

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 60, "{:?}", chunk.content);
    }
    let rebuilt = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
    assert_eq!(rebuilt, text);
}

#[tokio::test]
async fn semantic_percentile_mode() {
    let text = TOPIC_SENTENCES.join(" ");
    let config = semantic_config(1, 10_000).with_param("breakpoint_mode", "percentile");
    let chunks = run(config, &make_doc(&text)).await;
    assert_eq!(sentence_counts(&chunks), vec![4, 3, 3]);
}

#[tokio::test]
async fn semantic_single_sentence_needs_no_embeddings() {
    let chunks = run(semantic_config(1, 100), &make_doc("Only one sentence here")).await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].metadata.semantic_score, None);
}

#[test]
fn semantic_requires_embedder() {
    let err = ChunkingStrategy::from_config(&StrategyConfig::new(StrategyKind::Semantic), None)
        .err()
        .unwrap();
    assert!(matches!(err, ChunkError::Config(ConfigError::MissingParameter { .. })));
}

#[test]
fn semantic_rejects_min_not_below_max() {
    let config = semantic_config(500, 500);
    assert!(ChunkingStrategy::from_config(&config, Some(Arc::new(TopicEmbedder))).is_err());
}

// ── Shared behaviour ────────────────────────────────────────────────

#[tokio::test]
async fn every_strategy_is_idempotent() {
    let mut doc = make_element_doc(&["Title", "NarrativeText", "Table", "NarrativeText", "Header"]);
    doc.full_text = format!("{} {}", TOPIC_SENTENCES.join(" "), long_text());

    for kind in StrategyKind::ALL {
        let config = match kind {
            StrategyKind::Semantic => semantic_config(20, 400),
            _ => StrategyConfig::new(kind),
        };
        let first = run(config.clone(), &doc).await;
        let second = run(config, &doc).await;
        assert!(!first.is_empty(), "{kind} produced no chunks");
        assert_eq!(first, second, "{kind} is not deterministic");
    }
}

#[tokio::test]
async fn missing_document_id_is_a_chunking_failure() {
    let mut doc = make_doc("Some text.");
    doc.document_id = String::new();
    let err = strategy(StrategyConfig::new(StrategyKind::Hierarchical))
        .segment(&doc)
        .await
        .unwrap_err();
    assert!(matches!(err, ChunkError::ChunkingFailure { .. }));
}

#[test]
fn local_segmentation_is_unavailable_for_semantic() {
    let doc = make_doc(&TOPIC_SENTENCES.join(" "));
    assert!(strategy(semantic_config(1, 100)).segment_local(&doc).is_none());
    assert!(strategy(StrategyConfig::new(StrategyKind::FixedSize)).segment_local(&doc).is_some());
}
