// A score: ordered parts plus header metadata.
//
// Parts are added once, in generation order, and never reordered; a part's
// index is its identity for the read-before-write rule in the generator.

use crate::part::Part;
use serde::Deserialize;

/// Header metadata carried into exported documents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreHeader {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub composer: String,
    #[serde(default)]
    pub rights: String,
}

#[derive(Debug, Clone, Default)]
pub struct Score {
    header: ScoreHeader,
    parts: Vec<Part>,
}

impl Score {
    pub fn new(header: ScoreHeader) -> Self {
        Score {
            header,
            parts: Vec::new(),
        }
    }

    pub fn header(&self) -> &ScoreHeader {
        &self.header
    }

    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Part] {
        &mut self.parts
    }
}
