//! Data-driven extension table
//!
//! The table maps `(element type, vector width)` to the backend extension
//! that provides it. It is built once from configuration (JSON, the
//! built-in catalogue, or host detection) and is immutable afterwards; all
//! lookups go through the same exact-width query.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "extensions": [
//!     { "name": "sse", "width_bits": 128, "cpu_flags": ["sse4.1"] },
//!     { "name": "avx2", "width_bits": 256, "cpu_flags": ["avx2"], "element_types": ["u32", "f32"] }
//!   ]
//! }
//! ```
//!
//! `element_types` omitted means every element type whose width divides
//! `width_bits` into more than one lane.

use super::{ExtensionTag, ProcessingStyle};
use crate::element::ElementType;
use crate::error::{BackendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One configured backend extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionSpec {
    pub name: String,
    pub width_bits: usize,
    /// CPU flags that must all be present for the extension to be usable
    #[serde(default)]
    pub cpu_flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_types: Option<Vec<ElementType>>,
}

impl ExtensionSpec {
    pub fn new(name: impl Into<String>, width_bits: usize, cpu_flags: &[&str]) -> Self {
        Self {
            name: name.into(),
            width_bits,
            cpu_flags: cpu_flags.iter().map(|flag| flag.to_string()).collect(),
            element_types: None,
        }
    }

    /// Limit the extension to the given element types
    pub fn with_element_types(mut self, element_types: &[ElementType]) -> Self {
        self.element_types = Some(element_types.to_vec());
        self
    }

    fn requires_only<S: AsRef<str>>(&self, flags: &[S]) -> bool {
        self.cpu_flags
            .iter()
            .all(|required| flags.iter().any(|flag| flag.as_ref() == required))
    }
}

/// Top-level shape of an extension table file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDocument {
    pub extensions: Vec<ExtensionSpec>,
}

/// Immutable `(element, width) -> extension` lookup
#[derive(Debug, Clone, Default)]
pub struct ExtensionTable {
    specs: Vec<ExtensionSpec>,
    by_element: BTreeMap<ElementType, BTreeMap<usize, ExtensionTag>>,
}

impl ExtensionTable {
    /// Table with no vector extensions; every lookup except scalar fails
    pub fn scalar_only() -> Self {
        Self::default()
    }

    /// Build a table, rejecting malformed entries and duplicate widths
    pub fn new(specs: Vec<ExtensionSpec>) -> Result<Self> {
        let mut by_element: BTreeMap<ElementType, BTreeMap<usize, ExtensionTag>> = BTreeMap::new();

        for spec in &specs {
            if spec.name.trim().is_empty() {
                return Err(BackendError::InvalidExtension {
                    name: spec.name.clone(),
                    reason: "name must not be empty".into(),
                });
            }
            if spec.name == ExtensionTag::SCALAR.as_str() {
                return Err(BackendError::InvalidExtension {
                    name: spec.name.clone(),
                    reason: "'scalar' is reserved".into(),
                });
            }
            if spec.width_bits == 0 {
                return Err(BackendError::InvalidExtension {
                    name: spec.name.clone(),
                    reason: "width_bits must be non-zero".into(),
                });
            }

            let explicit = spec.element_types.is_some();
            let elements = spec.element_types.as_deref().unwrap_or(&ElementType::ALL);
            let mut seen = BTreeSet::new();

            for &element in elements {
                if !seen.insert(element) {
                    return Err(BackendError::InvalidExtension {
                        name: spec.name.clone(),
                        reason: format!("element type {element} listed more than once"),
                    });
                }
                let fits = spec.width_bits % element.bits() == 0 && spec.width_bits > element.bits();
                if !fits {
                    if explicit {
                        return Err(BackendError::InvalidExtension {
                            name: spec.name.clone(),
                            reason: format!(
                                "{} bits is not a multi-lane width for {element}",
                                spec.width_bits
                            ),
                        });
                    }
                    continue;
                }

                let widths = by_element.entry(element).or_default();
                if let Some(existing) = widths.get(&spec.width_bits) {
                    return Err(BackendError::DuplicateExtensionWidth {
                        element,
                        width_bits: spec.width_bits,
                        first: existing.to_string(),
                        second: spec.name.clone(),
                    });
                }
                widths.insert(spec.width_bits, ExtensionTag::new(spec.name.clone()));
            }
        }

        tracing::debug!(
            extensions = specs.len(),
            names = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "extension_table_built"
        );

        Ok(Self { specs, by_element })
    }

    /// Vector extensions known for the architecture this crate was built for
    pub fn builtin_catalogue() -> Result<Self> {
        Self::new(builtin_specs())
    }

    /// Catalogue entries whose CPU flags are all present on the running host
    pub fn detect_host() -> Result<Self> {
        Self::builtin_catalogue()?.restrict_to_flags(super::host_cpu_flags())
    }

    /// Keep only entries whose required flags all appear in `flags`
    ///
    /// Used to configure for a target other than the build host.
    pub fn restrict_to_flags<S: AsRef<str>>(&self, flags: &[S]) -> Result<Self> {
        let kept = self
            .specs
            .iter()
            .filter(|spec| spec.requires_only(flags))
            .cloned()
            .collect();
        Self::new(kept)
    }

    /// Parse a [`TableDocument`] from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: TableDocument = serde_json::from_str(json)
            .map_err(|e| BackendError::invalid_config(format!("extension table: {e}")))?;
        Self::new(document.extensions)
    }

    /// Read and parse a JSON extension table file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BackendError::invalid_config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// The table as a serializable document
    pub fn to_document(&self) -> TableDocument {
        TableDocument {
            extensions: self.specs.clone(),
        }
    }

    pub fn extensions(&self) -> &[ExtensionSpec] {
        &self.specs
    }

    /// Resolve a lane count: 1 is always scalar, anything else must match a
    /// configured width exactly.
    pub fn resolve(&self, element: ElementType, parallelism: usize) -> Result<ProcessingStyle> {
        if parallelism == 1 {
            return Ok(ProcessingStyle::scalar(element));
        }
        let width_bits = element
            .bits()
            .checked_mul(parallelism)
            .ok_or(BackendError::UnsupportedVectorLength {
                element,
                width_bits: usize::MAX,
            })?;
        self.resolve_width(element, width_bits)
    }

    /// Resolve an exact register width in bits
    pub fn resolve_width(&self, element: ElementType, width_bits: usize) -> Result<ProcessingStyle> {
        if width_bits == element.bits() {
            return Ok(ProcessingStyle::scalar(element));
        }
        self.by_element
            .get(&element)
            .and_then(|widths| widths.get(&width_bits))
            .map(|tag| ProcessingStyle::new(element, tag.clone(), width_bits))
            .unwrap_or(Err(BackendError::UnsupportedVectorLength { element, width_bits }))
    }

    /// Widest configured style for `element`, scalar if none
    pub fn widest(&self, element: ElementType) -> ProcessingStyle {
        self.vector_styles(element)
            .last()
            .cloned()
            .unwrap_or_else(|| ProcessingStyle::scalar(element))
    }

    /// Narrowest configured vector style for `element`, scalar if none
    pub fn narrowest(&self, element: ElementType) -> ProcessingStyle {
        self.vector_styles(element)
            .first()
            .cloned()
            .unwrap_or_else(|| ProcessingStyle::scalar(element))
    }

    /// Scalar followed by every configured width, ascending
    pub fn available_styles(&self, element: ElementType) -> Vec<ProcessingStyle> {
        let mut styles = vec![ProcessingStyle::scalar(element)];
        styles.extend(self.vector_styles(element));
        styles
    }

    /// Lane counts matching [`ExtensionTable::available_styles`]
    pub fn available_parallelism(&self, element: ElementType) -> Vec<usize> {
        self.available_styles(element)
            .iter()
            .map(ProcessingStyle::vector_element_count)
            .collect()
    }

    fn vector_styles(&self, element: ElementType) -> Vec<ProcessingStyle> {
        self.by_element
            .get(&element)
            .map(|widths| {
                widths
                    .iter()
                    .map(|(&width_bits, tag)| ProcessingStyle {
                        element,
                        extension: tag.clone(),
                        width_bits,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
fn builtin_specs() -> Vec<ExtensionSpec> {
    vec![
        ExtensionSpec::new("sse", 128, &["sse4.1"]),
        ExtensionSpec::new("avx2", 256, &["avx2"]),
        ExtensionSpec::new("avx512", 512, &["avx512f"]),
    ]
}

#[cfg(target_arch = "aarch64")]
fn builtin_specs() -> Vec<ExtensionSpec> {
    vec![ExtensionSpec::new("neon", 128, &["neon"])]
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
fn builtin_specs() -> Vec<ExtensionSpec> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x86_like() -> ExtensionTable {
        ExtensionTable::new(vec![
            ExtensionSpec::new("sse", 128, &["sse4.1"]),
            ExtensionSpec::new("avx2", 256, &["avx2"]),
            ExtensionSpec::new("avx512", 512, &["avx512f"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_parallelism_one_is_scalar() {
        let table = ExtensionTable::scalar_only();
        let style = table.resolve(ElementType::F64, 1).unwrap();
        assert!(style.is_scalar());
        assert_eq!(style.vector_element_count(), 1);
    }

    #[test]
    fn test_exact_width_lookup() {
        let table = x86_like();
        let style = table.resolve(ElementType::U32, 8).unwrap();
        assert_eq!(style.extension().as_str(), "avx2");
        assert_eq!(style.width_bits(), 256);

        let style = table.resolve_width(ElementType::U8, 512).unwrap();
        assert_eq!(style.extension().as_str(), "avx512");
        assert_eq!(style.vector_element_count(), 64);
    }

    #[test]
    fn test_no_rounding() {
        let table = x86_like();
        // 32 * 6 = 192 bits lies between sse and avx2
        let err = table.resolve(ElementType::U32, 6).unwrap_err();
        assert!(matches!(
            err,
            BackendError::UnsupportedVectorLength { width_bits: 192, .. }
        ));
        assert!(table.resolve(ElementType::U32, 0).is_err());
        assert!(table.resolve(ElementType::U64, usize::MAX).is_err());
    }

    #[test]
    fn test_widest_and_narrowest() {
        let table = x86_like();
        assert_eq!(table.widest(ElementType::F32).extension().as_str(), "avx512");
        assert_eq!(table.narrowest(ElementType::F32).extension().as_str(), "sse");

        let empty = ExtensionTable::scalar_only();
        assert!(empty.widest(ElementType::F32).is_scalar());
        assert!(empty.narrowest(ElementType::F32).is_scalar());
    }

    #[test]
    fn test_available_styles_order() {
        let table = x86_like();
        let styles = table.available_styles(ElementType::U32);
        let names: Vec<_> = styles.iter().map(|s| s.extension().as_str().to_string()).collect();
        assert_eq!(names, ["scalar", "sse", "avx2", "avx512"]);
        assert_eq!(table.available_parallelism(ElementType::U32), vec![1, 4, 8, 16]);
        assert_eq!(table.available_parallelism(ElementType::F64), vec![1, 2, 4, 8]);
    }

    #[test]
    fn test_duplicate_width_rejected_at_construction() {
        let err = ExtensionTable::new(vec![
            ExtensionSpec::new("sse", 128, &[]),
            ExtensionSpec::new("neon", 128, &[]),
        ])
        .unwrap_err();
        assert!(matches!(err, BackendError::DuplicateExtensionWidth { width_bits: 128, .. }));
    }

    #[test]
    fn test_repeated_element_type_is_invalid() {
        let err = ExtensionTable::new(vec![
            ExtensionSpec::new("sse", 128, &[]).with_element_types(&[ElementType::U32, ElementType::U32])
        ])
        .unwrap_err();
        match err {
            BackendError::InvalidExtension { name, reason } => {
                assert_eq!(name, "sse");
                assert!(reason.contains("u32"), "{reason}");
            }
            other => panic!("expected InvalidExtension, got {other:?}"),
        }

        let json = r#"{"extensions": [{"name": "sse", "width_bits": 128, "cpu_flags": [], "element_types": ["u32", "u32"]}]}"#;
        assert!(matches!(
            ExtensionTable::from_json_str(json),
            Err(BackendError::InvalidExtension { .. })
        ));
    }

    #[test]
    fn test_same_width_for_disjoint_types_is_fine() {
        let table = ExtensionTable::new(vec![
            ExtensionSpec::new("int128", 128, &[]).with_element_types(&[ElementType::U32]),
            ExtensionSpec::new("fp128", 128, &[]).with_element_types(&[ElementType::F32]),
        ])
        .unwrap();
        assert_eq!(table.resolve(ElementType::U32, 4).unwrap().extension().as_str(), "int128");
        assert_eq!(table.resolve(ElementType::F32, 4).unwrap().extension().as_str(), "fp128");
        assert!(table.resolve(ElementType::U8, 16).is_err());
    }

    #[test]
    fn test_invalid_entries() {
        assert!(matches!(
            ExtensionTable::new(vec![ExtensionSpec::new("scalar", 128, &[])]),
            Err(BackendError::InvalidExtension { .. })
        ));
        assert!(matches!(
            ExtensionTable::new(vec![ExtensionSpec::new("zero", 0, &[])]),
            Err(BackendError::InvalidExtension { .. })
        ));
        assert!(matches!(
            ExtensionTable::new(vec![
                ExtensionSpec::new("odd", 96, &[]).with_element_types(&[ElementType::U64])
            ]),
            Err(BackendError::InvalidExtension { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "extensions": [
                { "name": "sse", "width_bits": 128, "cpu_flags": ["sse4.1"] },
                { "name": "avx2", "width_bits": 256, "cpu_flags": ["avx2"], "element_types": ["u32", "f32"] }
            ]
        }"#;
        let table = ExtensionTable::from_json_str(json).unwrap();
        assert_eq!(table.extensions().len(), 2);
        assert!(table.resolve(ElementType::U16, 16).is_err());
        assert_eq!(table.resolve(ElementType::U16, 8).unwrap().extension().as_str(), "sse");

        let text = serde_json::to_string(&table.to_document()).unwrap();
        let reparsed = ExtensionTable::from_json_str(&text).unwrap();
        assert_eq!(reparsed.extensions(), table.extensions());
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(
            ExtensionTable::from_json_str("{ not json"),
            Err(BackendError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExtensionTable::from_json_str(r#"{"extensions": [], "extra": 1}"#),
            Err(BackendError::InvalidConfig(_))
        ));
        assert!(matches!(
            ExtensionTable::from_path("/nonexistent/vectorhal/table.json"),
            Err(BackendError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_restrict_to_flags() {
        let table = x86_like();
        let restricted = table.restrict_to_flags(&["sse4.1", "avx2"]).unwrap();
        assert_eq!(restricted.widest(ElementType::U32).extension().as_str(), "avx2");
        assert!(restricted.resolve(ElementType::U32, 16).is_err());

        let none: &[&str] = &[];
        let scalar = table.restrict_to_flags(none).unwrap();
        assert_eq!(scalar.available_parallelism(ElementType::U32), vec![1]);
    }

    #[test]
    fn test_detect_host_is_subset_of_catalogue() {
        let catalogue = ExtensionTable::builtin_catalogue().unwrap();
        let host = ExtensionTable::detect_host().unwrap();
        for spec in host.extensions() {
            assert!(catalogue.extensions().contains(spec));
        }
    }
}
