//! Ordered, heterogeneous block sequences.
//!
//! A [`Stream`] is the body of a page: blocks in render order. Every edit
//! either succeeds completely or leaves the stream untouched.
//!
//! ## Wire Format
//!
//! Streams serialize to a JSON array of tagged blocks:
//!
//! ```json
//! [
//!   {"type": "title_and_text", "value": {"title": "Hi", "text": "..."}},
//!   {"type": "simple_richtext", "value": "<p><b>bold</b></p>"}
//! ]
//! ```
//!
//! Decoding is done element by element so that a corrupt document reports
//! the index of the first block that could not be read.

use crate::blocks::{BlockKind, BlockRegistry, ContentBlock, SchemaError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream block {index} could not be decoded: {reason}")]
    Decode { index: usize, reason: String },
    #[error("Stream is not a JSON array of blocks: {0}")]
    NotAnArray(String),
    #[error("Block index {index} out of range for stream of {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Invalid block order {order:?} for stream of {len}")]
    InvalidPermutation { order: Vec<usize>, len: usize },
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ordered sequence of content blocks owned by one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stream {
    blocks: Vec<ContentBlock>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ContentBlock> {
        self.blocks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks.iter()
    }

    pub fn append(&mut self, block: ContentBlock) {
        self.blocks.push(block);
    }

    /// Insert a block before `index`; `index == len` appends.
    pub fn insert(&mut self, index: usize, block: ContentBlock) -> Result<(), StreamError> {
        if index > self.blocks.len() {
            return Err(StreamError::IndexOutOfRange {
                index,
                len: self.blocks.len(),
            });
        }
        self.blocks.insert(index, block);
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<ContentBlock, StreamError> {
        if index >= self.blocks.len() {
            return Err(StreamError::IndexOutOfRange {
                index,
                len: self.blocks.len(),
            });
        }
        Ok(self.blocks.remove(index))
    }

    /// Rearrange blocks so that position `i` holds the block previously at
    /// `new_order[i]`. `new_order` must be a permutation of `0..len`.
    pub fn reorder(&mut self, new_order: &[usize]) -> Result<(), StreamError> {
        if !is_permutation(new_order, self.blocks.len()) {
            return Err(StreamError::InvalidPermutation {
                order: new_order.to_vec(),
                len: self.blocks.len(),
            });
        }
        let mut slots: Vec<Option<ContentBlock>> = self.blocks.drain(..).map(Some).collect();
        self.blocks = new_order
            .iter()
            .filter_map(|&from| slots[from].take())
            .collect();
        Ok(())
    }

    pub fn serialize(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(&self.blocks)?)
    }

    pub fn deserialize(data: &str) -> Result<Stream, StreamError> {
        let raw: serde_json::Value = serde_json::from_str(data)?;
        let serde_json::Value::Array(items) = raw else {
            return Err(StreamError::NotAnArray(json_kind(&raw).to_string()));
        };
        let mut blocks = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            blocks.push(decode_block(index, item)?);
        }
        Ok(Stream { blocks })
    }

    /// Check every block's tag against `registry`, then every block's fields.
    ///
    /// Field paths are reported as `{field}[{index}].{path}`.
    pub fn validate_against(
        &self,
        registry: &BlockRegistry,
        field: &str,
    ) -> Result<(), StreamError> {
        self.check_tags(registry)?;
        let mut issues = Vec::new();
        for (i, block) in self.blocks.iter().enumerate() {
            issues.extend(registry.validate_at(block, &format!("{field}[{i}]"))?);
        }
        ValidationError::check(issues)?;
        Ok(())
    }

    /// Fail on the first block whose tag the registry does not accept.
    pub fn check_tags(&self, registry: &BlockRegistry) -> Result<(), SchemaError> {
        for block in &self.blocks {
            registry.schema(block.tag())?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Stream {
    type Item = &'a ContentBlock;
    type IntoIter = std::slice::Iter<'a, ContentBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

fn decode_block(index: usize, item: serde_json::Value) -> Result<ContentBlock, StreamError> {
    let tag = match item.get("type") {
        Some(serde_json::Value::String(tag)) => tag.clone(),
        Some(other) => {
            return Err(StreamError::Decode {
                index,
                reason: format!("block type must be a string, got {}", json_kind(other)),
            });
        }
        None => {
            return Err(StreamError::Decode {
                index,
                reason: "missing block type".to_string(),
            });
        }
    };
    if BlockKind::from_tag(&tag).is_none() {
        return Err(StreamError::Decode {
            index,
            reason: SchemaError::UnknownBlockType(tag).to_string(),
        });
    }
    serde_json::from_value(item).map_err(|e| StreamError::Decode {
        index,
        reason: e.to_string(),
    })
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// `order` contains every index in `0..len` exactly once.
pub fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &i in order {
        if i >= len || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}
