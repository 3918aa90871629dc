//! The JSON-shaped source map model and the codec façade.
//!
//! Maps come in two shapes: flat (a single `mappings` string with its own
//! string tables) and indexed (a list of offset-positioned sections whose
//! nested maps may themselves be indexed). Parsing goes through a permissive
//! raw struct and then explicit validation, so structural problems surface
//! as [`Error::InvalidMap`](crate::Error::InvalidMap) rather than opaque
//! deserialization failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// A parsed source map, either shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceMap {
    Flat(FlatMap),
    Indexed(IndexedMap),
}

/// A flat map: `mappings` plus its `sources` and `names` tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlatMap {
    pub file: Option<String>,
    pub source_root: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Option<Vec<Option<String>>>,
    pub names: Vec<String>,
    pub mappings: String,
    /// Per-source function-name metadata, parallel to `sources`. Carried
    /// verbatim, never interpreted.
    pub x_facebook_sources: Option<Vec<Option<Vec<FunctionMap>>>>,
}

impl FlatMap {
    pub fn new(sources: Vec<String>, names: Vec<String>, mappings: String) -> FlatMap {
        FlatMap {
            file: None,
            source_root: None,
            sources,
            sources_content: None,
            names,
            mappings,
            x_facebook_sources: None,
        }
    }

    /// The `x_facebook_sources` entry for a source index, if any.
    pub fn function_map(&self, source_index: usize) -> Option<&[FunctionMap]> {
        self.x_facebook_sources
            .as_ref()?
            .get(source_index)?
            .as_deref()
    }
}

/// An indexed map: offset-positioned sections in non-decreasing order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedMap {
    pub file: Option<String>,
    pub sections: Vec<Section>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub offset: SectionOffset,
    pub map: Box<SourceMap>,
}

/// A section's position in the outer generated code, 0-based on both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SectionOffset {
    pub line: u32,
    pub column: u32,
}

/// One `x_facebook_sources` metadata item: function-name tracking with its
/// own names table and mappings, independent of the map's main `names`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FunctionMap {
    pub names: Vec<String>,
    pub mappings: String,
}

#[derive(Debug, Deserialize)]
struct RawSourceMap {
    version: Option<u32>,
    file: Option<String>,
    #[serde(rename = "sourceRoot")]
    source_root: Option<String>,
    sources: Option<Vec<String>>,
    #[serde(rename = "sourcesContent")]
    sources_content: Option<Vec<Option<String>>>,
    names: Option<Vec<String>>,
    mappings: Option<String>,
    sections: Option<Vec<RawSection>>,
    x_facebook_sources: Option<Vec<Option<Vec<FunctionMap>>>>,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    offset: Option<SectionOffset>,
    map: Option<RawSourceMap>,
}

impl SourceMap {
    /// Parse a map from JSON text.
    pub fn from_json(json: &str) -> Result<SourceMap, Error> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        SourceMap::from_raw(raw)
    }

    /// Parse a map from an already-parsed JSON tree.
    pub fn from_value(value: &Value) -> Result<SourceMap, Error> {
        let raw = RawSourceMap::deserialize(value)?;
        SourceMap::from_raw(raw)
    }

    fn from_raw(raw: RawSourceMap) -> Result<SourceMap, Error> {
        match raw.version {
            Some(3) => {}
            Some(version) => {
                return Err(Error::InvalidMap(format!(
                    "unsupported source map version {}",
                    version
                )));
            }
            None => {
                return Err(Error::InvalidMap("missing `version` field".to_string()));
            }
        }

        match (raw.mappings, raw.sections) {
            (Some(_), Some(_)) => Err(Error::InvalidMap(
                "map has both `mappings` and `sections`".to_string(),
            )),
            (None, None) => Err(Error::InvalidMap(
                "map has neither `mappings` nor `sections`".to_string(),
            )),
            (Some(mappings), None) => Ok(SourceMap::Flat(FlatMap {
                file: raw.file,
                source_root: raw.source_root,
                sources: raw.sources.unwrap_or_default(),
                sources_content: raw.sources_content,
                names: raw.names.unwrap_or_default(),
                mappings,
                x_facebook_sources: raw.x_facebook_sources,
            })),
            (None, Some(sections)) => {
                let mut parsed = Vec::with_capacity(sections.len());
                for (index, section) in sections.into_iter().enumerate() {
                    let offset = section.offset.ok_or_else(|| {
                        Error::InvalidMap(format!("section {} is missing `offset`", index))
                    })?;
                    let map = section.map.ok_or_else(|| {
                        Error::InvalidMap(format!("section {} is missing `map`", index))
                    })?;
                    parsed.push(Section {
                        offset,
                        map: Box::new(SourceMap::from_raw(map)?),
                    });
                }
                Ok(SourceMap::Indexed(IndexedMap {
                    file: raw.file,
                    sections: parsed,
                }))
            }
        }
    }

    /// Serialize back to a JSON tree.
    pub fn to_value(&self) -> Value {
        let value = match self {
            SourceMap::Flat(map) => serde_json::to_value(FlatMapJson {
                version: 3,
                file: map.file.as_deref(),
                source_root: map.source_root.as_deref(),
                sources: &map.sources,
                sources_content: map.sources_content.as_ref(),
                // The channel is omitted entirely unless something is in it.
                x_facebook_sources: map
                    .x_facebook_sources
                    .as_ref()
                    .filter(|entries| entries.iter().any(Option::is_some)),
                names: &map.names,
                mappings: &map.mappings,
            }),
            SourceMap::Indexed(map) => serde_json::to_value(IndexedMapJson {
                version: 3,
                file: map.file.as_deref(),
                sections: map
                    .sections
                    .iter()
                    .map(|section| SectionJson {
                        offset: section.offset,
                        map: section.map.to_value(),
                    })
                    .collect(),
            }),
        };
        match value {
            Ok(value) => value,
            Err(_) => unreachable!("source map serialization cannot fail"),
        }
    }

    /// Serialize back to JSON text.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Total number of sources, summed across sections for indexed maps.
    pub fn source_count(&self) -> usize {
        match self {
            SourceMap::Flat(map) => map.sources.len(),
            SourceMap::Indexed(map) => map
                .sections
                .iter()
                .map(|section| section.map.source_count())
                .sum(),
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            SourceMap::Flat(map) => map.file.as_deref(),
            SourceMap::Indexed(map) => map.file.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct FlatMapJson<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(rename = "sourceRoot", skip_serializing_if = "Option::is_none")]
    source_root: Option<&'a str>,
    sources: &'a [String],
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    sources_content: Option<&'a Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x_facebook_sources: Option<&'a Vec<Option<Vec<FunctionMap>>>>,
    names: &'a [String],
    mappings: &'a str,
}

#[derive(Serialize)]
struct IndexedMapJson<'a> {
    version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    sections: Vec<SectionJson>,
}

#[derive(Serialize)]
struct SectionJson {
    offset: SectionOffset,
    map: Value,
}
