use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use indexmap::IndexMap;
use tantivy::collector::TopDocs;
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, JsonObjectOptions, OwnedValue, Schema, TextFieldIndexing, Value,
    FAST, STORED, STRING,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use super::{EngineHit, TextEngine};
use crate::error::{Result, SiftError};
use crate::types::{Document, FieldValue};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Tantivy-backed [`TextEngine`], one instance per shard directory.
///
/// Documents are schemaless at this layer, so the tantivy schema is fixed:
/// `_id` (raw string, stored, fast) for routing key lookups, `_source`
/// (indexed JSON object) so `field:term` query expressions resolve as paths
/// into the document, and `_raw` (stored-only JSON string) for exact
/// stored-field hydration.
pub struct TantivyEngine {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    source_field: Field,
    raw_field: Field,
}

impl TantivyEngine {
    /// Open the engine at `path`, creating a fresh index if none exists.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            std::fs::create_dir_all(path)?;
            Index::create_in_dir(path, Self::schema())?
        };

        let schema = index.schema();
        let id_field = schema.get_field("_id")?;
        let source_field = schema.get_field("_source")?;
        let raw_field = schema.get_field("_raw")?;

        // Manual reload: visibility is driven by put_batch, not a background
        // reload thread, so a refresh is a deterministic barrier.
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;

        Ok(TantivyEngine {
            index,
            reader,
            writer: Mutex::new(writer),
            id_field,
            source_field,
            raw_field,
        })
    }

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("_id", STRING | STORED | FAST);

        let source_indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let source_opts = JsonObjectOptions::default().set_indexing_options(source_indexing);
        builder.add_json_field("_source", source_opts);

        builder.add_text_field("_raw", STORED);
        builder.build()
    }
}

fn json_to_object(value: &serde_json::Value) -> Result<BTreeMap<String, OwnedValue>> {
    match value {
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), OwnedValue::from(v.clone())))
            .collect()),
        _ => Err(SiftError::InvalidDocument(
            "expected a JSON object".to_string(),
        )),
    }
}

impl TextEngine for TantivyEngine {
    fn put_batch(&self, docs: &[Document]) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        for doc in docs {
            // Upsert: an existing document with the same id is replaced.
            writer.delete_term(Term::from_field_text(self.id_field, &doc.id));

            let source = doc.to_json();
            let mut tdoc = TantivyDocument::new();
            tdoc.add_text(self.id_field, &doc.id);
            tdoc.add_object(self.source_field, json_to_object(&source)?);
            tdoc.add_text(self.raw_field, serde_json::to_string(&source)?);
            writer.add_document(tdoc)?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.reader.searcher().num_docs())
    }

    fn query(&self, expr: &str, limit: usize) -> Result<Vec<EngineHit>> {
        if limit == 0 || expr.trim().is_empty() {
            return Ok(Vec::new());
        }

        // `title:a` resolves as the path `title` inside the default json
        // field, which gives the Elasticsearch-style field:term syntax
        // without a schema.
        let parser = QueryParser::for_index(&self.index, vec![self.source_field]);
        let query = parser.parse_query(expr)?;

        let searcher = self.reader.searcher();
        let top = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else {
                continue;
            };
            hits.push(EngineHit {
                id: id.to_string(),
                score,
            });
        }
        Ok(hits)
    }

    fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(
            Term::from_field_text(self.id_field, id),
            IndexRecordOption::Basic,
        );
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;

        let Some((_score, addr)) = top.into_iter().next() else {
            return Ok(None);
        };
        let doc: TantivyDocument = searcher.doc(addr)?;
        let Some(raw) = doc.get_first(self.raw_field).and_then(|v| v.as_str()) else {
            return Ok(None);
        };

        let fields: IndexMap<String, FieldValue> = serde_json::from_str(raw)?;
        Ok(Some(Document {
            id: id.to_string(),
            fields,
        }))
    }
}
