// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class label resolution for detection models
//!
//! Labels come from (in order): an explicit labels file, the `names`
//! entry that YOLO exporters write into ONNX metadata, or generated
//! `class{i}` placeholders.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Load class names from a text file, one name per line
///
/// Blank lines are skipped; the line order defines the class index.
pub fn load_labels_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels file {}", path.display()))?;

    let labels: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        anyhow::bail!("Labels file {} contains no class names", path.display());
    }

    Ok(labels)
}

/// Parse the `names` metadata string written by YOLO exporters
///
/// Accepts a Python dict literal (`{0: 'person', 1: 'car'}`) or a list
/// literal (`['person', 'car']`). Gaps in dict indices are filled with
/// placeholder names.
pub fn parse_names_metadata(raw: &str) -> Option<Vec<String>> {
    let dict_entry = Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).ok()?;

    let mut indexed = BTreeMap::new();
    for caps in dict_entry.captures_iter(raw) {
        let index: usize = caps.get(1)?.as_str().parse().ok()?;
        let name = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
        indexed.insert(index, name);
    }

    let max_index = indexed.keys().next_back().copied();
    if let Some(max_index) = max_index {
        return Some(
            (0..=max_index)
                .map(|i| indexed.remove(&i).unwrap_or_else(|| placeholder(i)))
                .collect(),
        );
    }

    let list_entry = Regex::new(r#"'([^']*)'|"([^"]*)""#).ok()?;
    let names: Vec<String> = list_entry
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect();

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Placeholder labels for models that ship without names
pub fn placeholder_labels(num_classes: usize) -> Vec<String> {
    (0..num_classes).map(placeholder).collect()
}

fn placeholder(index: usize) -> String {
    format!("class{}", index)
}
