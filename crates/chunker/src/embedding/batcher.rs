use super::traits::{Embedder, EmbeddingError};

/// Embed `texts` in order, `batch_size` texts per backend call.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_batch(batch).await?;
        if embedded.len() != batch.len() {
            return Err(EmbeddingError::CountMismatch {
                sent: batch.len(),
                received: embedded.len(),
            });
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dimensions()) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: embedder.dimensions(),
                actual: bad.len(),
            });
        }
        vectors.extend(embedded);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEmbedder {
        call_count: AtomicUsize,
        dims: usize,
        drop_last: bool,
    }

    impl FakeEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                dims,
                drop_last: false,
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let keep = if self.drop_last { texts.len() - 1 } else { texts.len() };
            Ok(texts[..keep].iter().map(|t| vec![t.len() as f32; self.dims]).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    #[tokio::test]
    async fn splits_into_batches_and_keeps_order() {
        let embedder = FakeEmbedder::new(3);
        let texts = ["a", "bb", "ccc", "dddd", "eeeee"];

        let vectors = embed_in_batches(&embedder, &texts, 2).await.unwrap();

        assert_eq!(embedder.call_count.load(Ordering::SeqCst), 3);
        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let embedder = FakeEmbedder::new(3);
        let vectors = embed_in_batches(&embedder, &[], 8).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(embedder.call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_response_is_an_error() {
        let mut embedder = FakeEmbedder::new(3);
        embedder.drop_last = true;
        let err = embed_in_batches(&embedder, &["a", "b"], 8).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::CountMismatch { sent: 2, received: 1 }));
    }
}
