use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexWriter, ReloadPolicy};

use crate::models::Chunk;

/// BM25 lexical index over chunks, built on tantivy.
pub struct LexicalIndex {
    index: Index,
    f_doc_id: Field,
    f_chunk_id: Field,
    f_seq: Field,
    f_page: Field,
    f_text: Field,
}

#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub doc_id: String,
    pub seq: usize,
    pub page: usize,
    pub text: String,
    pub score: f32,
}

impl LexicalIndex {
    /// Create or open the lexical index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let mut schema_builder = Schema::builder();
        let f_doc_id = schema_builder.add_text_field("doc_id", STRING | STORED);
        let f_chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
        let f_seq = schema_builder.add_u64_field("seq", NumericOptions::default() | STORED);
        let f_page = schema_builder.add_u64_field("page", NumericOptions::default() | STORED);
        let f_text = schema_builder.add_text_field("text", TEXT | STORED);
        let schema = schema_builder.build();

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, schema).context("Failed to create tantivy index")?
        };

        Ok(Self {
            index,
            f_doc_id,
            f_chunk_id,
            f_seq,
            f_page,
            f_text,
        })
    }

    /// Index a batch of chunks for one document.
    pub fn index_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        for chunk in chunks {
            writer.add_document(doc!(
                self.f_doc_id => chunk.doc_id.clone(),
                self.f_chunk_id => chunk.id(),
                self.f_seq => chunk.seq as u64,
                self.f_page => chunk.page as u64,
                self.f_text => chunk.text.clone(),
            ))?;
        }

        writer.commit().context("Failed to commit index")?;
        Ok(())
    }

    /// Delete all entries owned by a document.
    pub fn delete_document(&self, doc_id: &str) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        let term = tantivy::Term::from_field_text(self.f_doc_id, doc_id);
        writer.delete_term(term);
        writer.commit().context("Failed to commit delete")?;
        Ok(())
    }

    /// Search by lexical relevance. Query syntax errors are tolerated:
    /// natural-language questions are parsed leniently.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create reader")?;

        let searcher = reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.f_text]);
        let (query, _errors) = query_parser.parse_query_lenient(query_str);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Lexical search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let get_str = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let get_u64 =
                |field: Field| doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0) as usize;

            hits.push(LexicalHit {
                chunk_id: get_str(self.f_chunk_id),
                doc_id: get_str(self.f_doc_id),
                seq: get_u64(self.f_seq),
                page: get_u64(self.f_page),
                text: get_str(self.f_text),
                score,
            });
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(doc_id: &str, seq: usize, text: &str) -> Chunk {
        Chunk {
            doc_id: doc_id.to_string(),
            seq,
            text: text.to_string(),
            page: 1,
        }
    }

    #[test]
    fn test_index_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[
                chunk("lease.pdf", 0, "The security deposit equals two months of rent."),
                chunk("lease.pdf", 1, "The tenant shall insure the premises."),
            ])
            .unwrap();

        let hits = index.search("security deposit", 10).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].chunk_id, "lease.pdf#c0");
        assert_eq!(hits[0].doc_id, "lease.pdf");
    }

    #[test]
    fn test_delete_document_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();

        index
            .index_chunks(&[chunk("old.pdf", 0, "arbitration clause governs disputes")])
            .unwrap();
        index
            .index_chunks(&[chunk("new.pdf", 0, "arbitration venue is Tel Aviv")])
            .unwrap();

        index.delete_document("old.pdf").unwrap();

        let hits = index.search("arbitration", 10).unwrap();
        assert!(hits.iter().all(|h| h.doc_id == "new.pdf"));
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_natural_language_query_does_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        index
            .index_chunks(&[chunk("a.pdf", 0, "notice must be given in writing")])
            .unwrap();

        // Question marks and colons are query-syntax characters in tantivy;
        // lenient parsing must swallow them.
        let hits = index.search("when must notice: be given?", 10).unwrap();
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_empty_index_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::open_or_create(dir.path()).unwrap();
        assert!(index.search("anything", 10).unwrap().is_empty());
    }
}
