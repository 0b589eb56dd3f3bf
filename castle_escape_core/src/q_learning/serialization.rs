//! Saving and loading trained Q-tables.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    config::TrainingConfig,
    q_learning::{q_table::QTable, trainer::TrainingReport},
};

/// How a saved table was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub config: TrainingConfig,
    pub report: TrainingReport,
}

/// A Q-table as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQTable {
    pub version: u32,
    pub metadata: TrainingMetadata,
    pub table: QTable,
}

impl SavedQTable {
    pub const VERSION: u32 = 1;

    pub fn new(table: QTable, metadata: TrainingMetadata) -> Self {
        Self {
            version: Self::VERSION,
            metadata,
            table,
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|source| Error::io(format!("create {}", path.display()), source))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer
            .flush()
            .map_err(|source| Error::io(format!("write {}", path.display()), source))?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|source| Error::io(format!("open {}", path.display()), source))?;
        let saved: Self = serde_json::from_reader(BufReader::new(file))?;
        if saved.version != Self::VERSION {
            return Err(Error::UnsupportedFormatVersion {
                found: saved.version,
                expected: Self::VERSION,
            });
        }
        Ok(saved)
    }

    pub fn into_table(self) -> QTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{environment::Action, hashing::StateHash};

    #[test]
    fn unknown_versions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");

        let mut saved = SavedQTable::new(QTable::new(), TrainingMetadata::default());
        saved.version = 7;
        saved.save_to_file(&path).unwrap();

        let err = SavedQTable::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedFormatVersion {
                found: 7,
                expected: 1
            }
        ));
    }

    #[test]
    fn state_keys_are_written_as_json_object_keys() {
        let mut table = QTable::new();
        let state = StateHash::from_value(119).unwrap();
        table.set(state, Action::Fight, -12.5);

        let saved = SavedQTable::new(table, TrainingMetadata::default());
        let json = serde_json::to_value(saved).unwrap();
        assert_eq!(json["table"]["entries"]["119"]["values"][4], -12.5);
    }

    #[test]
    fn off_grid_state_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");

        let mut table = QTable::new();
        table.set(StateHash::from_value(119).unwrap(), Action::Hide, 3.0);
        let json = serde_json::to_string(&SavedQTable::new(table, TrainingMetadata::default()))
            .unwrap()
            .replace("\"119\"", "\"9999\"");
        std::fs::write(&path, json).unwrap();

        assert!(matches!(
            SavedQTable::load_from_file(&path),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn garbage_files_surface_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SavedQTable::load_from_file(&path),
            Err(Error::Serialization(_))
        ));
    }
}
