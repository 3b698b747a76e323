// file: src/parser/normalizer.rs
// description: header normalization so every column name is a unique storage key
// reference: SQLite column naming rules

use crate::database::schema::ID_COLUMN;
use std::collections::{HashMap, HashSet};

pub struct HeaderNormalizer;

impl HeaderNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Deduplicates column names left to right.
    ///
    /// The first occurrence of a name is kept; the n-th repeat becomes
    /// `name_n`. SQLite compares column names case-insensitively, so a
    /// candidate that clashes with an already emitted name (ignoring ASCII
    /// case) keeps counting up until it is free. The row id column is
    /// reserved from the start, so an extracted `id` becomes `id_1`.
    pub fn normalize<S: AsRef<str>>(&self, raw_headers: &[S]) -> Vec<String> {
        let mut repeats: HashMap<&str, usize> = HashMap::new();
        let mut taken: HashSet<String> = HashSet::from([ID_COLUMN.to_string()]);
        let mut unique = Vec::with_capacity(raw_headers.len());

        for raw in raw_headers {
            let name = raw.as_ref();
            let count = repeats.entry(name).or_insert(0);

            let mut candidate = if *count == 0 {
                name.to_string()
            } else {
                format!("{}_{}", name, count)
            };

            while taken.contains(&candidate.to_ascii_lowercase()) {
                *count += 1;
                candidate = format!("{}_{}", name, count);
            }

            *count += 1;
            taken.insert(candidate.to_ascii_lowercase());
            unique.push(candidate);
        }

        unique
    }

    /// Trims each cell and gives blank cells a positional `Column<n>` label.
    pub fn label_blanks<S: AsRef<str>>(&self, raw_headers: &[S]) -> Vec<String> {
        raw_headers
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    format!("Column{}", idx + 1)
                } else {
                    trimmed.to_string()
                }
            })
            .collect()
    }

    /// Full header pipeline used by every extractor.
    pub fn header_from_cells<S: AsRef<str>>(&self, cells: &[S]) -> Vec<String> {
        self.normalize(self.label_blanks(cells).as_slice())
    }
}

impl Default for HeaderNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
