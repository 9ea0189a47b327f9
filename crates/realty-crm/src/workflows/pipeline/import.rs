use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::domain::{LeadSource, LeadSubmission};
use super::stages::StageId;

#[derive(Debug)]
pub enum LeadImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for LeadImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadImportError::Io(err) => write!(f, "failed to read lead export: {}", err),
            LeadImportError::Csv(err) => write!(f, "invalid lead CSV data: {}", err),
        }
    }
}

impl std::error::Error for LeadImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LeadImportError::Io(err) => Some(err),
            LeadImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LeadImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for LeadImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads portal lead exports (`Name, Email, Phone, Property, Message, Stage, Source`).
///
/// Rows are only parsed here; field validation happens when the pipeline imports them.
pub struct LeadCsvImporter;

impl LeadCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<LeadSubmission>, LeadImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<LeadSubmission>, LeadImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut submissions = Vec::new();
        for record in csv_reader.deserialize::<LeadRow>() {
            submissions.push(record?.into_submission());
        }
        Ok(submissions)
    }
}

#[derive(Debug, Deserialize)]
struct LeadRow {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Phone", default, deserialize_with = "empty_string_as_none")]
    phone: Option<String>,
    #[serde(
        rename = "Property",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    property: Option<String>,
    #[serde(rename = "Message", default, deserialize_with = "empty_string_as_none")]
    message: Option<String>,
    #[serde(rename = "Stage", default, deserialize_with = "empty_string_as_none")]
    stage: Option<String>,
    #[serde(rename = "Source", default, deserialize_with = "empty_string_as_none")]
    source: Option<String>,
}

impl LeadRow {
    fn into_submission(self) -> LeadSubmission {
        LeadSubmission {
            full_name: self.name,
            email: self.email,
            phone: self.phone,
            property_id: self.property,
            message: self.message,
            stage: self.stage.map(StageId),
            source: self
                .source
                .as_deref()
                .and_then(LeadSource::parse)
                .unwrap_or(LeadSource::Portal),
        }
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_defaults_source_to_portal() {
        let csv = "Name,Email,Phone,Property,Message,Stage,Source\n\
Ana Souza,ana@x.com,+55 11 99999-8888,AP-301,Wants a visit,qualification,website\n\
Bruno Lima,bruno@x.com,,,,,\n";

        let rows = LeadCsvImporter::from_reader(csv.as_bytes()).expect("csv parses");
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].full_name, "Ana Souza");
        assert_eq!(rows[0].stage, Some(StageId::from("qualification")));
        assert_eq!(rows[0].source, LeadSource::Website);
        assert_eq!(rows[0].property_id.as_deref(), Some("AP-301"));

        assert_eq!(rows[1].phone, None);
        assert_eq!(rows[1].stage, None);
        assert_eq!(rows[1].source, LeadSource::Portal);
    }

    #[test]
    fn missing_optional_columns_are_tolerated() {
        let csv = "Name,Email\nCarla Dias,carla@x.com\n";
        let rows = LeadCsvImporter::from_reader(csv.as_bytes()).expect("csv parses");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, None);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let result = LeadCsvImporter::from_path("/nonexistent/leads.csv");
        assert!(matches!(result, Err(LeadImportError::Io(_))));
    }
}
