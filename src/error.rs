use thiserror::Error;

/// Failures that stay local to one document or one retrieval signal.
///
/// None of these fail an overall sync or query: document-level errors are
/// recorded per document in the sync report, signal-level errors degrade the
/// query to the remaining signals.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to extract text from {doc_id}: {reason}")]
    Extraction { doc_id: String, reason: String },

    #[error("index write failed for {doc_id}")]
    IndexWrite {
        doc_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{signal} signal timed out after {timeout_ms}ms")]
    SignalTimeout {
        signal: &'static str,
        timeout_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_signal() {
        let err = EngineError::SignalTimeout {
            signal: "lexical",
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "lexical signal timed out after 5000ms");
    }

    #[test]
    fn test_index_write_message_names_document() {
        let err = EngineError::IndexWrite {
            doc_id: "lease.pdf".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.to_string(), "index write failed for lease.pdf");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_extraction_message_names_document() {
        let err = EngineError::Extraction {
            doc_id: "scan.pdf".to_string(),
            reason: "encrypted".to_string(),
        };
        assert!(err.to_string().contains("scan.pdf"));
    }
}
