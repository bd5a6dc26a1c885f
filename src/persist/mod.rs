//! Versioned container for compiled bundle sets.
//!
//! A persisted bundle is a zip archive:
//!
//! ```text
//! manifest.json     - format version, metadata, bundle and unit tables
//! sources/<n>.src   - source text of each bundle
//! units/<id>.bin    - payload of each compiled unit
//! readme.md         - human-readable summary
//! ```

mod error;
mod manifest;


pub use error::{DeserializationError, SerializationError};
pub use manifest::{BundleMetadata, BundleRecord, Manifest, UnitRecord};

use crate::artifact::{
    CompiledBundleSet, CompiledUnit, GeneratedUnit, InnerUnitClassifier, PrefixClassifier, UnitId,
};
use crate::security::EntrySanitizer;
use chrono::{Datelike, Timelike, Utc};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Container format understood by this build
pub const FORMAT_VERSION: u32 = 1;

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const README_ENTRY: &str = "readme.md";
const SOURCES_DIR: &str = "sources";
const UNITS_DIR: &str = "units";

/// Serialized bundle set, ready to be written anywhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedBundle {
    bytes: Vec<u8>,
}

impl PersistedBundle {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Write to `path`; an existing file is only replaced when `overwrite` is set
    pub fn write_to(&self, path: impl AsRef<Path>, overwrite: bool) -> Result<(), SerializationError> {
        let path = path.as_ref();
        if !overwrite && path.exists() {
            return Err(SerializationError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        info!("wrote bundle {} ({} bytes)", path.display(), self.bytes.len());
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, DeserializationError> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(Self { bytes })
    }
}

fn digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Serialize a bundle set and its metadata into a container
pub fn store(set: &CompiledBundleSet, metadata: &BundleMetadata) -> Result<PersistedBundle, SerializationError> {
    let units: Vec<UnitRecord> = set
        .units()
        .iter()
        .enumerate()
        .map(|(id, unit)| UnitRecord {
            id: id as u32,
            name: unit.name.clone(),
            inner: unit.is_inner(),
            size: unit.size(),
            sha256: digest(&unit.payload),
            entry: format!("{}/{}.bin", UNITS_DIR, id),
        })
        .collect();
    let bundles: Vec<BundleRecord> = set
        .bundles()
        .enumerate()
        .map(|(n, bundle)| BundleRecord {
            primary: bundle.name().to_string(),
            origin: bundle.source().origin,
            source_entry: format!("{}/{}.src", SOURCES_DIR, n),
            primary_unit: bundle.primary().0,
            inner_units: bundle.inner_units().iter().map(|id| id.0).collect(),
        })
        .collect();

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        created_at: Utc::now(),
        generator: format!("ingram v{}", env!("CARGO_PKG_VERSION")),
        metadata: metadata.clone(),
        bundles,
        units,
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let now = chrono::Local::now();
    let options: FileOptions<'_, ()> = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .last_modified_time(
            zip::DateTime::from_date_and_time(
                now.year() as u16,
                now.month() as u8,
                now.day() as u8,
                now.hour() as u8,
                now.minute() as u8,
                now.second() as u8,
            )
            .unwrap_or_default(),
        );

    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    for (record, bundle) in manifest.bundles.iter().zip(set.bundles()) {
        zip.start_file(record.source_entry.as_str(), options)?;
        zip.write_all(bundle.source().source.as_bytes())?;
    }
    for (record, unit) in manifest.units.iter().zip(set.units()) {
        zip.start_file(record.entry.as_str(), options)?;
        zip.write_all(&unit.payload)?;
    }

    zip.start_file(README_ENTRY, options)?;
    zip.write_all(readme(&manifest).as_bytes())?;

    let bytes = zip.finish()?.into_inner();
    debug!(
        "stored {} bundle(s), {} unit(s) into {} bytes",
        manifest.bundles.len(),
        manifest.units.len(),
        bytes.len()
    );
    Ok(PersistedBundle { bytes })
}

fn readme(manifest: &Manifest) -> String {
    let metadata = &manifest.metadata;
    let mut out = format!(
        r#"# Compiled recognizer bundle

## Metadata

- **Grammar**: {}
- **Format version**: {}
- **Created**: {}
- **Generator**: {}
- **Lexer**: {}
- **Parser**: {}
- **Entry rule**: {}
- **Case folding**: {}

## Bundles

"#,
        metadata.grammar_name,
        manifest.format_version,
        manifest.created_at.to_rfc3339(),
        manifest.generator,
        metadata.lexer.as_deref().unwrap_or("default"),
        metadata.parser.as_deref().unwrap_or("default"),
        metadata.entry_rule.as_deref().unwrap_or("default"),
        metadata.case_folding,
    );
    for bundle in &manifest.bundles {
        out.push_str(&format!(
            "- `{}` ({:?}): {} inner unit(s)\n",
            bundle.primary,
            bundle.origin,
            bundle.inner_units.len()
        ));
    }
    out.push_str(&format!(
        "\n{} unit(s), {} bytes of payload.\n",
        manifest.units.len(),
        manifest.total_size()
    ));
    out
}

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn read_entry(archive: &mut Archive<'_>, raw: &str, dir: Option<&str>) -> Result<Vec<u8>, DeserializationError> {
    let name = match dir {
        Some(dir) => EntrySanitizer::sanitize_in(raw, dir),
        None => EntrySanitizer::sanitize(raw),
    }
    .map_err(|source| DeserializationError::InvalidEntry {
        entry: raw.to_string(),
        source,
    })?;

    let mut file = match archive.by_name(&name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Err(DeserializationError::MissingEntry(name)),
        Err(e) => return Err(e.into()),
    };
    // The declared size is unverified, so the buffer grows with what is read
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Read and version-check the manifest without touching payloads
pub fn read_manifest(bundle: &PersistedBundle) -> Result<Manifest, DeserializationError> {
    let mut archive = ZipArchive::new(Cursor::new(bundle.as_bytes()))?;
    manifest_of(&mut archive)
}

fn manifest_of(archive: &mut Archive<'_>) -> Result<Manifest, DeserializationError> {
    let raw = read_entry(archive, MANIFEST_ENTRY, None)?;
    // Check the version before committing to this build's manifest layout
    let value: serde_json::Value = serde_json::from_slice(&raw)?;
    let found = value
        .get("format_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or(DeserializationError::MissingVersion)?;
    if found != u64::from(FORMAT_VERSION) {
        return Err(DeserializationError::IncompatibleVersion {
            found: u32::try_from(found).unwrap_or(u32::MAX),
            expected: FORMAT_VERSION,
        });
    }
    Ok(serde_json::from_value(value)?)
}

/// Rebuild the bundle set and metadata from a container, classifying inner
/// units by the default `Primary$name` scheme
pub fn restore(bundle: &PersistedBundle) -> Result<(CompiledBundleSet, BundleMetadata), DeserializationError> {
    restore_with(bundle, &PrefixClassifier::new())
}

/// Like [`restore`], checking unit ownership against `classifier`
pub fn restore_with(
    bundle: &PersistedBundle,
    classifier: &dyn InnerUnitClassifier,
) -> Result<(CompiledBundleSet, BundleMetadata), DeserializationError> {
    let mut archive = ZipArchive::new(Cursor::new(bundle.as_bytes()))?;
    let manifest = manifest_of(&mut archive)?;

    let mut units = Vec::with_capacity(manifest.units.len());
    for (index, record) in manifest.units.iter().enumerate() {
        if record.id as usize != index {
            return Err(DeserializationError::InvalidManifest(format!(
                "unit ids are not contiguous: expected {}, found {}",
                index, record.id
            )));
        }
        let payload = read_entry(&mut archive, &record.entry, Some(UNITS_DIR))?;
        if payload.len() != record.size || digest(&payload) != record.sha256 {
            return Err(DeserializationError::ChecksumMismatch {
                unit: record.name.clone(),
            });
        }
        units.push(CompiledUnit::new(record.name.clone(), payload, record.inner));
    }

    let mut bundles = Vec::with_capacity(manifest.bundles.len());
    for record in &manifest.bundles {
        let raw = read_entry(&mut archive, &record.source_entry, Some(SOURCES_DIR))?;
        let text = String::from_utf8(raw).map_err(|_| {
            DeserializationError::InvalidManifest(format!("source of {} is not UTF-8", record.primary))
        })?;
        let source = GeneratedUnit {
            name: record.primary.clone(),
            source: text,
            origin: record.origin,
        };
        let inner = record.inner_units.iter().map(|id| UnitId(*id)).collect();
        bundles.push((source, UnitId(record.primary_unit), inner));
    }

    let set = CompiledBundleSet::from_parts(units, bundles)?;
    set.verify_classification(classifier)?;
    debug!(
        "restored {} bundle(s), {} unit(s) written {}",
        set.len(),
        set.unit_count(),
        manifest.created_at
    );
    Ok((set, manifest.metadata))
}
