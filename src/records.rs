//! Record ingestion.
//!
//! Two source shapes are accepted: one JSON document with a `rows` array, or a
//! line-per-row stream. Rows that do not fit the expected shape are dropped and
//! counted; only an unreadable source (or an unparseable document when the
//! document shape is forced) stops the run.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use clap::ValueEnum;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::RecordSourceError;

/// One geotagged text.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub coordinates: (f64, f64),
    pub text: String,
}

impl Record {
    pub fn new(x: f64, y: f64, text: impl Into<String>) -> Self {
        Self {
            coordinates: (x, y),
            text: text.into(),
        }
    }
}

/// How the record source is laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum RecordFormat {
    /// Try a single document first, fall back to one row per line.
    #[default]
    Auto,
    /// `{"rows": [row, ...]}`
    Document,
    /// One row object per line; a trailing comma is tolerated.
    Lines,
}

/// Records accepted from a source plus the number of rows skipped as malformed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ingested {
    pub records: Vec<Record>,
    pub skipped: usize,
}

impl Ingested {
    fn accept(&mut self, row: Result<RawRow, serde_json::Error>, origin: usize) {
        match row {
            Ok(row) => self.records.push(row.into_record()),
            Err(e) => {
                debug!("skipping malformed record {origin}: {e}");
                self.skipped += 1;
            }
        }
    }
}

#[derive(Deserialize)]
struct RawRow {
    value: RawValue,
}

#[derive(Deserialize)]
struct RawValue {
    geometry: RawGeometry,
    properties: RawProperties,
}

#[derive(Deserialize)]
struct RawGeometry {
    coordinates: [f64; 2],
}

#[derive(Deserialize)]
struct RawProperties {
    text: String,
}

impl RawRow {
    fn into_record(self) -> Record {
        let [x, y] = self.value.geometry.coordinates;
        Record::new(x, y, self.value.properties.text)
    }
}

#[derive(Deserialize)]
struct RawDocument {
    rows: Vec<Json>,
}

/// Loads records from `path` in the given layout.
pub fn load_records<P: AsRef<Path>>(
    path: P,
    format: RecordFormat,
) -> Result<Ingested, RecordSourceError> {
    let path = path.as_ref();
    let io_err = |source| RecordSourceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let ingested = match format {
        RecordFormat::Lines => {
            let file = File::open(path).map_err(io_err)?;
            parse_lines(BufReader::new(file))?
        }
        RecordFormat::Document => parse_document(fs::read(path).map_err(io_err)?)?,
        RecordFormat::Auto => {
            let raw = fs::read(path).map_err(io_err)?;
            match parse_document(&raw) {
                Ok(ingested) => ingested,
                Err(e) => {
                    debug!(
                        "{} is not a single document ({e}); reading it line by line",
                        path.display()
                    );
                    parse_lines(raw.as_slice())?
                }
            }
        }
    };
    info!(
        "ingested {} records from {} ({} malformed rows skipped)",
        ingested.records.len(),
        path.display(),
        ingested.skipped
    );
    Ok(ingested)
}

/// Parses a whole `{"rows": [...]}` document. Rows of the wrong shape are skipped.
pub fn parse_document<B: AsRef<[u8]>>(raw: B) -> Result<Ingested, RecordSourceError> {
    let doc: RawDocument =
        serde_json::from_slice(raw.as_ref()).map_err(RecordSourceError::Parse)?;
    let mut ingested = Ingested::default();
    for (index, row) in doc.rows.into_iter().enumerate() {
        ingested.accept(serde_json::from_value(row), index);
    }
    Ok(ingested)
}

/// Parses one row per line. Lines that fail to parse, including lines that are
/// not valid UTF-8, are skipped; blank lines are ignored.
pub fn parse_lines<R: BufRead>(reader: R) -> Result<Ingested, RecordSourceError> {
    let mut ingested = Ingested::default();
    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(RecordSourceError::Stream)?;
        let line = line.trim_ascii();
        let line = line.strip_suffix(b",").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        ingested.accept(serde_json::from_slice(line), index + 1);
    }
    Ok(ingested)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW_A: &str = r#"{"id":"1","value":{"geometry":{"coordinates":[144.9,-37.8]},"properties":{"text":"Lovely day"}}}"#;
    const ROW_B: &str = r#"{"id":"2","value":{"geometry":{"coordinates":[145.1,-37.9]},"properties":{"text":"awful traffic"}}}"#;

    #[test]
    fn line_stream_skips_malformed_lines() {
        let stream = format!("{ROW_A},\n{{\"value\": broken\n{ROW_B}\n");
        let ingested = parse_lines(stream.as_bytes()).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.skipped, 1);
        assert_eq!(ingested.records[0], Record::new(144.9, -37.8, "Lovely day"));
    }

    #[test]
    fn line_stream_tolerates_array_dump_framing() {
        let stream = format!("{{\"total_rows\":2,\"offset\":0,\"rows\":[\n{ROW_A},\n{ROW_B}\n]}}\n");
        let ingested = parse_lines(stream.as_bytes()).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.skipped, 2);
    }

    #[test]
    fn document_skips_rows_of_wrong_shape() {
        let doc = format!(
            r#"{{"rows": [{ROW_A}, {{"value": {{"geometry": null, "properties": {{"text": "x"}}}}}}, {ROW_B}]}}"#
        );
        let ingested = parse_document(&doc).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.skipped, 1);
        assert_eq!(ingested.records[1].text, "awful traffic");
    }

    #[test]
    fn invalid_utf8_line_is_skipped_not_fatal() {
        let mut stream = format!("{ROW_A}\n").into_bytes();
        stream.extend_from_slice(b"{\"value\": \"\xff\xfe\"}\n");
        stream.extend_from_slice(format!("{ROW_B}\n").as_bytes());

        let ingested = parse_lines(stream.as_slice()).unwrap();
        assert_eq!(ingested.records.len(), 2);
        assert_eq!(ingested.skipped, 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        fs::write(&path, &stream).unwrap();
        for format in [RecordFormat::Auto, RecordFormat::Lines] {
            let loaded = load_records(&path, format).unwrap();
            assert_eq!(loaded, ingested, "{format:?}");
        }
    }

    #[test]
    fn broken_document_is_fatal() {
        assert!(matches!(
            parse_document("{\"rows\": [").unwrap_err(),
            RecordSourceError::Parse(_)
        ));
    }
}
