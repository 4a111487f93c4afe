//! Workpiece template sources

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use tracing::debug;
use workpiece::WorkpieceTemplate;

use crate::CellError;

/// Provides the templates for one run.
pub trait TemplateStore: Send {
    fn load_templates(&self) -> Result<Vec<WorkpieceTemplate>, CellError>;
}

/// Templates held in memory.
impl TemplateStore for Vec<WorkpieceTemplate> {
    fn load_templates(&self) -> Result<Vec<WorkpieceTemplate>, CellError> {
        Ok(self.clone())
    }
}

/// Templates stored as a JSON array, re-read on every run.
#[derive(Debug, Clone)]
pub struct JsonTemplateStore {
    path: PathBuf,
}

impl JsonTemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemplateStore for JsonTemplateStore {
    fn load_templates(&self) -> Result<Vec<WorkpieceTemplate>, CellError> {
        let read = || -> Result<Vec<WorkpieceTemplate>, Box<dyn std::error::Error>> {
            let reader = BufReader::new(File::open(&self.path)?);
            Ok(serde_json::from_reader(reader)?)
        };
        let templates = read().map_err(|e| {
            CellError::Validation(format!(
                "cannot load templates from {}: {e}",
                self.path.display()
            ))
        })?;
        for t in &templates {
            t.validate()?;
        }
        debug!("Loaded {} template(s) from {}", templates.len(), self.path.display());
        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use shared::contour::Contour;
    use std::io::Write;

    fn make_template(id: u32) -> WorkpieceTemplate {
        let outline = Contour::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(40.0, 0.0),
            Point2::new(40.0, 20.0),
            Point2::new(0.0, 20.0),
        ]);
        WorkpieceTemplate::new(id, 5.0, outline)
    }

    #[test]
    fn test_json_store_round_trip() {
        let templates = vec![make_template(1), make_template(2)];
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&templates).unwrap().as_bytes())
            .unwrap();

        let loaded = JsonTemplateStore::new(file.path()).load_templates().unwrap();
        assert_eq!(loaded, templates);
    }

    #[test]
    fn test_missing_file_is_validation_error() {
        let store = JsonTemplateStore::new("/nonexistent/templates.json");
        assert!(matches!(
            store.load_templates(),
            Err(CellError::Validation(_))
        ));
    }
}
