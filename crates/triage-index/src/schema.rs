//! Arrow schema for the chunk table and conversion helpers.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use arrow_array::{
    BooleanArray, FixedSizeListArray, Int32Array, RecordBatch, StringArray,
};
use arrow_schema::{DataType, Field, Schema};

use triage_core::types::{Chunk, DocMeta};

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, true),
        Field::new("section", DataType::Utf8, true),
        Field::new("page", DataType::Int32, true),
        Field::new("extra_json", DataType::Utf8, true),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("start_char", DataType::Int32, false),
        Field::new("end_char", DataType::Int32, false),
        Field::new("is_chunked", DataType::Boolean, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            true,
        ),
    ]))
}

/// Dimension of the vector column in an existing table, if present.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size as usize),
        _ => None,
    }
}

pub fn chunks_to_record_batch(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dim: i32,
) -> Result<RecordBatch> {
    let schema = build_chunk_schema(dim);
    let mut ids = Vec::new();
    let mut sources = Vec::new();
    let mut titles: Vec<Option<String>> = Vec::new();
    let mut sections: Vec<Option<String>> = Vec::new();
    let mut pages: Vec<Option<i32>> = Vec::new();
    let mut extras: Vec<Option<String>> = Vec::new();
    let mut contents = Vec::new();
    let mut chunk_indices = Vec::new();
    let mut start_chars = Vec::new();
    let mut end_chars = Vec::new();
    let mut is_chunked = Vec::new();
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();

    for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
        ids.push(chunk.id.clone());
        sources.push(chunk.meta.source.clone());
        titles.push(chunk.meta.title.clone());
        sections.push(chunk.meta.section.clone());
        pages.push(chunk.meta.page);
        extras.push(if chunk.meta.extra.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&chunk.meta.extra)?)
        });
        contents.push(chunk.text.clone());
        chunk_indices.push(chunk.chunk_index as i32);
        start_chars.push(chunk.start_char as i32);
        end_chars.push(chunk.end_char as i32);
        is_chunked.push(chunk.is_chunked);
        vectors.push(Some(embedding.iter().map(|&x| Some(x)).collect()));
    }

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(sections)),
            Arc::new(Int32Array::from(pages)),
            Arc::new(StringArray::from(extras)),
            Arc::new(StringArray::from(contents)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(start_chars)),
            Arc::new(Int32Array::from(end_chars)),
            Arc::new(BooleanArray::from(is_chunked)),
            Arc::new(
                FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(
                    vectors.into_iter(),
                    dim,
                ),
            ),
        ],
    )?;
    Ok(batch)
}

/// Rebuild a `DocMeta` from the row columns.
pub fn meta_from_row(
    source: &str,
    title: Option<&str>,
    section: Option<&str>,
    page: Option<i32>,
    extra_json: Option<&str>,
) -> DocMeta {
    let extra: HashMap<String, String> = extra_json
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default();
    DocMeta {
        source: source.to_string(),
        title: title.map(str::to_string),
        section: section.map(str::to_string),
        page,
        extra,
    }
}
