//! Queryable views over parsed source maps.
//!
//! A [`Consumer`] decodes a map once at construction and then answers
//! original-position queries for generated positions. Construction validates
//! every string-table index and every section offset, so queries are total:
//! the only unmapped signal is `None`.

use tracing::debug;

use crate::map::{FlatMap, FunctionMap, SourceMap};
use crate::mappings::{parse_mappings, Mappings};
use crate::position::GeneratedPosition;
use crate::Error;

/// The result of resolving a generated position: where that position came
/// from in the original code.
///
/// `line` is 1-based, `column` 0-based. `function_map` is the resolved
/// source's `x_facebook_sources` entry, riding along so callers that
/// propagate the channel need no second lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OriginalPosition<'a> {
    pub source: &'a str,
    pub line: u32,
    pub column: u32,
    pub name: Option<&'a str>,
    pub function_map: Option<&'a [FunctionMap]>,
}

/// An immutable, queryable view of a parsed source map.
#[derive(Debug)]
pub enum Consumer<'a> {
    Flat(FlatConsumer<'a>),
    Indexed(IndexedConsumer<'a>),
}

impl<'a> Consumer<'a> {
    pub fn new(map: &'a SourceMap) -> Result<Consumer<'a>, Error> {
        match map {
            SourceMap::Flat(flat) => Ok(Consumer::Flat(FlatConsumer::new(flat)?)),
            SourceMap::Indexed(indexed) => {
                let mut sections = Vec::with_capacity(indexed.sections.len());
                let mut previous: Option<GeneratedPosition> = None;
                for (index, section) in indexed.sections.iter().enumerate() {
                    let line = section
                        .offset
                        .line
                        .checked_add(1)
                        .ok_or(Error::UnexpectedlyBigNumber)?;
                    let offset = GeneratedPosition::new(line, section.offset.column);
                    if let Some(previous) = previous {
                        if offset < previous {
                            return Err(Error::InvalidMap(format!(
                                "section {} offset precedes its predecessor",
                                index
                            )));
                        }
                    }
                    previous = Some(offset);
                    sections.push((offset, Consumer::new(&section.map)?));
                }
                debug!(sections = sections.len(), "built indexed source map consumer");
                Ok(Consumer::Indexed(IndexedConsumer { sections }))
            }
        }
    }

    /// Resolve a generated position to its original position, or `None`
    /// when the position is unmapped (past the last line, before the first
    /// segment on its line, or covered by a hole).
    pub fn original_position_for(
        &self,
        position: GeneratedPosition,
    ) -> Option<OriginalPosition<'a>> {
        match self {
            Consumer::Flat(flat) => flat.original_position_for(position),
            Consumer::Indexed(indexed) => indexed.original_position_for(position),
        }
    }
}

/// A consumer over a flat map: the decoded segment container plus borrowed
/// string tables.
#[derive(Debug)]
pub struct FlatConsumer<'a> {
    map: &'a FlatMap,
    mappings: Mappings,
}

impl<'a> FlatConsumer<'a> {
    fn new(map: &'a FlatMap) -> Result<FlatConsumer<'a>, Error> {
        let mappings = parse_mappings(map.mappings.as_bytes())?;
        validate_string_tables(map, &mappings)?;
        debug!(
            lines = mappings.line_count(),
            segments = mappings.segment_count(),
            "built flat source map consumer"
        );
        Ok(FlatConsumer { map, mappings })
    }

    fn original_position_for(&self, position: GeneratedPosition) -> Option<OriginalPosition<'a>> {
        let line_index = position.line.checked_sub(1)?;
        let segment = self.mappings.floor_segment(line_index, position.column)?;
        let original = segment.original.as_ref()?;
        let source_index = original.source as usize;
        Some(OriginalPosition {
            source: self.map.sources[source_index].as_str(),
            line: original.original_line + 1,
            column: original.original_column,
            name: original
                .name
                .map(|index| self.map.names[index as usize].as_str()),
            function_map: self.map.function_map(source_index),
        })
    }
}

/// A consumer over an indexed map: one child consumer per section, with the
/// section offsets rebased to 1-based lines for dispatch.
#[derive(Debug)]
pub struct IndexedConsumer<'a> {
    sections: Vec<(GeneratedPosition, Consumer<'a>)>,
}

impl<'a> IndexedConsumer<'a> {
    fn original_position_for(&self, position: GeneratedPosition) -> Option<OriginalPosition<'a>> {
        // The last section whose offset is at or before the query wins;
        // duplicate offsets shadow their predecessors.
        let index = self
            .sections
            .partition_point(|&(offset, _)| offset <= position);
        if index == 0 {
            return None;
        }
        let (offset, ref consumer) = self.sections[index - 1];

        let local_line = position.line - offset.line + 1;
        // The column offset applies only to the section's first line.
        let local_column = if local_line == 1 {
            position.column - offset.column
        } else {
            position.column
        };
        consumer.original_position_for(GeneratedPosition::new(local_line, local_column))
    }
}

/// Check that every segment index lands inside the map's string tables and
/// that no original line sits at the conversion boundary. Run once at
/// construction so lookups never have to fail.
pub(crate) fn validate_string_tables(map: &FlatMap, mappings: &Mappings) -> Result<(), Error> {
    for line in mappings.lines() {
        for segment in line {
            let original = match segment.original {
                Some(ref original) => original,
                None => continue,
            };
            if original.source as usize >= map.sources.len() {
                return Err(Error::InvalidMap(format!(
                    "segment references source {} but the map has {} sources",
                    original.source,
                    map.sources.len()
                )));
            }
            if let Some(name) = original.name {
                if name as usize >= map.names.len() {
                    return Err(Error::InvalidMap(format!(
                        "segment references name {} but the map has {} names",
                        name,
                        map.names.len()
                    )));
                }
            }
            if original.original_line == u32::MAX {
                return Err(Error::UnexpectedlyBigNumber);
            }
        }
    }
    Ok(())
}
