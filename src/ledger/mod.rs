//! Flat CSV ledger of issued certificates.
//!
//! The whole table is rewritten on every append: records are written to a
//! temporary file next to the ledger and renamed over it, so readers see
//! either the old or the new table. Appends within the process are
//! serialized by a mutex.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

use crate::error::CertError;
use crate::storage::{ensure_parent_dir, generate_certificate_id};

pub const HEADER: [&str; 4] = ["Certificate ID", "Recipient", "Course", "Date"];
pub const DATE_FORMAT: &str = "%d-%m-%Y";

const MINT_ATTEMPTS: usize = 16;

/// One issued certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    #[serde(rename = "Certificate ID")]
    pub id: String,
    #[serde(rename = "Recipient")]
    pub recipient: String,
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "Date", with = "ledger_date")]
    pub issued_on: NaiveDate,
}

mod ledger_date {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map_err(|e| de::Error::custom(format!("date {raw:?} is not DD-MM-YYYY: {e}")))
    }
}

pub struct Ledger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// The file is created on the first append.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order; empty when no ledger file exists yet.
    pub fn load_all(&self) -> Result<Vec<CertificateRecord>, CertError> {
        match std::fs::read(&self.path) {
            Ok(contents) => parse_records(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Looks up a record by identifier, ignoring case.
    pub fn find(&self, id: &str) -> Result<Option<CertificateRecord>, CertError> {
        let id = id.trim();
        Ok(self
            .load_all()?
            .into_iter()
            .find(|r| r.id.eq_ignore_ascii_case(id)))
    }

    /// A fresh identifier not yet present in the ledger.
    pub fn mint_identifier(&self) -> Result<String, CertError> {
        let existing = self.load_all()?;
        for _ in 0..MINT_ATTEMPTS {
            let id = generate_certificate_id();
            if !existing.iter().any(|r| r.id == id) {
                return Ok(id);
            }
            tracing::warn!("Certificate ID collision on {}, retrying", id);
        }
        Err(CertError::DuplicateIdentifier(format!(
            "no free ID after {MINT_ATTEMPTS} attempts"
        )))
    }

    /// Adds `record` after every existing record and rewrites the ledger.
    pub fn append(&self, record: CertificateRecord) -> Result<(), CertError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut records = self.load_all()?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(CertError::DuplicateIdentifier(record.id));
        }
        tracing::debug!(
            "Appending certificate {} as row {} of {}",
            record.id,
            records.len() + 1,
            self.path.display()
        );
        records.push(record);
        self.replace_all(&records)
    }

    fn replace_all(&self, records: &[CertificateRecord]) -> Result<(), CertError> {
        ensure_parent_dir(&self.path)?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(BufWriter::new(tmp.as_file_mut()));
            writer.write_record(HEADER).map_err(csv_io)?;
            for record in records {
                writer.serialize(record).map_err(csv_io)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| CertError::Io(e.error))?;
        Ok(())
    }
}

// Field values are kept byte for byte; only the header row is trimmed.
fn parse_records(contents: &[u8]) -> Result<Vec<CertificateRecord>, CertError> {
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(contents);

    let headers = reader
        .headers()
        .map_err(|e| CertError::DataCorruption(format!("unreadable header: {e}")))?;
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != HEADER {
        return Err(CertError::DataCorruption(format!(
            "expected columns {:?}, found {:?}",
            HEADER, found
        )));
    }

    reader
        .deserialize::<CertificateRecord>()
        .map(|row| {
            row.map_err(|e| {
                let line = e
                    .position()
                    .map(|p| p.line().to_string())
                    .unwrap_or_else(|| "?".to_string());
                CertError::DataCorruption(format!("line {line}: {e}"))
            })
        })
        .collect()
}

fn csv_io(e: csv::Error) -> CertError {
    match e.into_kind() {
        csv::ErrorKind::Io(err) => CertError::Io(err),
        other => CertError::Io(io::Error::new(io::ErrorKind::Other, format!("{other:?}"))),
    }
}
