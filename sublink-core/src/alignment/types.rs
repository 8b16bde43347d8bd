//! Alignment data types

use serde::{Deserialize, Serialize};

use super::indexer::Window;

/// Opaque line identifier. The server sends integers today; strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineId {
    Num(i64),
    Text(String),
}

/// One subtitle line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub content: String,
}

/// A source/target pair of subtitle lines at a global position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    pub index: u64,
    #[serde(default)]
    pub source_lines: Vec<Line>,
    #[serde(default)]
    pub target_lines: Vec<Line>,
}

impl Alignment {
    /// Source lines joined for display
    pub fn source_text(&self) -> String {
        join_lines(&self.source_lines)
    }

    /// Target lines joined for display
    pub fn target_text(&self) -> String {
        join_lines(&self.target_lines)
    }
}

fn join_lines(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|l| l.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A contiguous run of alignments as returned by one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    window: Window,
    alignments: Vec<Alignment>,
}

impl Batch {
    /// Build a batch, checking the indices run contiguously from `start`
    pub fn new(start: u64, alignments: Vec<Alignment>) -> Result<Self, String> {
        for (offset, alignment) in alignments.iter().enumerate() {
            let expected = start + offset as u64;
            if alignment.index != expected {
                return Err(format!(
                    "alignment at offset {} has index {}, expected {}",
                    offset, alignment.index, expected
                ));
            }
        }

        let window = Window::new(start, start + alignments.len() as u64);
        Ok(Self { window, alignments })
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }

    /// Alignment at a global index, if this batch holds it
    pub fn get(&self, index: u64) -> Option<&Alignment> {
        let offset = self.window.offset_of(index)?;
        self.alignments.get(offset)
    }

    pub fn alignments(&self) -> &[Alignment] {
        &self.alignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alignment(index: u64) -> Alignment {
        Alignment {
            index,
            source_lines: vec![Line {
                id: LineId::Num(index as i64),
                content: format!("source {}", index),
            }],
            target_lines: vec![],
        }
    }

    #[test]
    fn test_batch_requires_contiguous_indices() {
        let batch = Batch::new(10, vec![alignment(10), alignment(11), alignment(12)]).unwrap();
        assert_eq!(batch.window(), Window::new(10, 13));
        assert_eq!(batch.get(11).map(|a| a.index), Some(11));
        assert!(batch.get(13).is_none());

        assert!(Batch::new(10, vec![alignment(10), alignment(12)]).is_err());
        assert!(Batch::new(10, vec![alignment(9)]).is_err());
    }

    #[test]
    fn test_line_id_accepts_numbers_and_strings() {
        let json = r#"{"index": 3, "source_lines": [{"id": 17, "content": "Hola"}],
                       "target_lines": [{"id": "t-17", "content": "Hello"}]}"#;
        let alignment: Alignment = serde_json::from_str(json).unwrap();
        assert_eq!(alignment.source_lines[0].id, LineId::Num(17));
        assert_eq!(alignment.target_lines[0].id, LineId::Text("t-17".to_string()));
        assert_eq!(alignment.source_text(), "Hola");
        assert_eq!(alignment.target_text(), "Hello");
    }
}
