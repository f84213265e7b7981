use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Only nbformat 4 documents are accepted.
pub const NBFORMAT_MAJOR: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notebook {
    pub nbformat: u32,
    pub nbformat_minor: u32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default)]
    pub source: MultilineString,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<Value>>,
    /// `Some(None)` is an explicit `null`, which code cells must carry.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub execution_count: Option<Option<u64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// nbformat stores text either as one string or as a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultilineString {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineString {
    fn default() -> Self {
        MultilineString::Single(String::new())
    }
}

impl MultilineString {
    pub fn is_blank(&self) -> bool {
        match self {
            MultilineString::Single(text) => text.trim().is_empty(),
            MultilineString::Lines(lines) => lines.iter().all(|line| line.trim().is_empty()),
        }
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

impl Cell {
    pub fn code(source: &str) -> Self {
        Self {
            cell_type: CellType::Code,
            source: MultilineString::Single(source.to_string()),
            metadata: Map::new(),
            outputs: Some(Vec::new()),
            execution_count: Some(None),
            extra: Map::new(),
        }
    }

    pub fn markdown(source: &str) -> Self {
        Self {
            cell_type: CellType::Markdown,
            source: MultilineString::Single(source.to_string()),
            metadata: Map::new(),
            outputs: None,
            execution_count: None,
            extra: Map::new(),
        }
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }

    pub fn execution_count(&self) -> Option<u64> {
        self.execution_count.flatten()
    }

    pub fn outputs(&self) -> &[Value] {
        self.outputs.as_deref().unwrap_or_default()
    }
}

impl Notebook {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self {
            nbformat: NBFORMAT_MAJOR,
            nbformat_minor: 5,
            metadata: Map::new(),
            cells,
            extra: Map::new(),
        }
    }

    /// Parse an on-disk notebook, rejecting anything that is not nbformat 4.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(bytes).context("notebook is not valid JSON")?;
        let major = raw
            .get("nbformat")
            .and_then(Value::as_u64)
            .ok_or_else(|| anyhow!("notebook has no nbformat version"))?;
        if major != u64::from(NBFORMAT_MAJOR) {
            return Err(anyhow!(
                "unsupported nbformat version {major}, expected {NBFORMAT_MAJOR}"
            ));
        }

        serde_json::from_value(raw).context("notebook does not match the nbformat 4 layout")
    }

    /// Serialize the way nbformat writes files: sorted keys, one-space indent, trailing newline.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        // Going through `Value` sorts every object's keys.
        let value = serde_json::to_value(self).context("failed to encode notebook")?;
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value
            .serialize(&mut serializer)
            .context("failed to encode notebook")?;
        buf.push(b'\n');
        Ok(buf)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn code_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_code())
    }

    pub fn code_cell_count(&self) -> usize {
        self.code_cells().count()
    }

    pub fn output_count(&self) -> usize {
        self.code_cells().map(|cell| cell.outputs().len()).sum()
    }

    /// True once every non-blank code cell carries an execution count.
    pub fn is_executed(&self) -> bool {
        self.code_cells()
            .filter(|cell| !cell.source.is_blank())
            .all(|cell| cell.execution_count().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "nbformat": 4,
            "nbformat_minor": 5,
            "metadata": {"kernelspec": {"name": "python3", "display_name": "Python 3"}},
            "cells": [
                {"cell_type": "markdown", "id": "a1", "metadata": {}, "source": ["# Title\n", "text"]},
                {"cell_type": "code", "id": "b2", "metadata": {}, "execution_count": null, "outputs": [], "source": "print(1)"},
                {"cell_type": "code", "id": "c3", "metadata": {}, "execution_count": null, "outputs": [], "source": ""}
            ]
        })
    }

    #[test]
    fn parses_nbformat_4_and_keeps_unknown_keys() {
        let bytes = serde_json::to_vec(&sample()).unwrap();
        let notebook = Notebook::from_slice(&bytes).unwrap();

        assert_eq!(notebook.cell_count(), 3);
        assert_eq!(notebook.code_cell_count(), 2);
        assert_eq!(
            notebook.cells[0].source,
            MultilineString::Lines(vec!["# Title\n".to_string(), "text".to_string()])
        );
        assert_eq!(notebook.cells[1].extra.get("id"), Some(&json!("b2")));
        assert_eq!(notebook.cells[1].execution_count, Some(None));
        assert!(notebook.metadata.contains_key("kernelspec"));
    }

    #[test]
    fn rejects_other_major_versions() {
        let mut raw = sample();
        raw["nbformat"] = json!(3);
        let err = Notebook::from_slice(&serde_json::to_vec(&raw).unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported nbformat version 3"));

        assert!(Notebook::from_slice(b"{not json").is_err());
        assert!(Notebook::from_slice(br#"{"cells": []}"#).is_err());
    }

    #[test]
    fn writes_sorted_keys_with_single_space_indent() {
        let bytes = serde_json::to_vec(&sample()).unwrap();
        let notebook = Notebook::from_slice(&bytes).unwrap();
        let written = String::from_utf8(notebook.to_vec().unwrap()).unwrap();

        assert!(written.starts_with("{\n \"cells\": ["));
        assert!(written.ends_with("}\n"));
        assert!(written.contains("\"execution_count\": null"));
        assert!(!written.contains("\"outputs\": null"));

        let cells_at = written.find("\"cells\"").unwrap();
        let metadata_at = written.find("\"metadata\": {\n  \"kernelspec\"").unwrap();
        let nbformat_at = written.find("\"nbformat\"").unwrap();
        assert!(cells_at < metadata_at && metadata_at < nbformat_at);

        assert_eq!(Notebook::from_slice(written.as_bytes()).unwrap(), notebook);
    }

    #[test]
    fn execution_state_ignores_blank_cells() {
        let mut notebook = Notebook::new(vec![
            Cell::markdown("notes"),
            Cell::code("x = 1"),
            Cell::code("   "),
        ]);
        assert!(!notebook.is_executed());

        notebook.cells[1].execution_count = Some(Some(1));
        notebook.cells[1].outputs = Some(vec![json!({"output_type": "stream"})]);
        assert!(notebook.is_executed());
        assert_eq!(notebook.output_count(), 1);

        notebook.cells[2].source = MultilineString::Lines(vec!["y = 2\n".to_string()]);
        assert!(!notebook.is_executed());
    }
}
