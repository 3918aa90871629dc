//! Folding a chain of source maps into one.
//!
//! Maps are given in the order their transformations ran: the first map's
//! sources are the true originals, the last map describes the final
//! generated code. Composition walks every segment of the last map and
//! re-resolves it backwards through consumers of the earlier maps, so one
//! query on the result equals the whole chain of queries.

use indexmap::IndexSet;
use tracing::debug;

use crate::consumer::{validate_string_tables, Consumer};
use crate::map::{FlatMap, FunctionMap, SourceMap};
use crate::mappings::{parse_mappings, MappingsEncoder, OriginalLocation, Segment};
use crate::position::GeneratedPosition;
use crate::Error;

/// Compose a non-empty chain of maps into one flat map.
///
/// Holes propagate from both sides: a hole in the last map stays a hole, and
/// a segment that any earlier map fails to resolve becomes one. The name
/// attached to an output segment is the deepest stage's name when one
/// exists; a stage that resolves without a name leaves the outer name in
/// place. `x_facebook_sources` entries follow the sources they describe.
pub fn compose_source_maps(maps: &[SourceMap]) -> Result<SourceMap, Error> {
    let (tail, chain) = match maps.split_last() {
        Some(split) => split,
        None => {
            return Err(Error::UnsupportedComposition(
                "expected at least one source map".to_string(),
            ));
        }
    };
    let tail = match tail {
        SourceMap::Flat(flat) => flat,
        SourceMap::Indexed(_) => {
            return Err(Error::UnsupportedComposition(
                "the last map of a chain must be flat".to_string(),
            ));
        }
    };
    // Maps after the first are consumed by bare generated position, which is
    // only meaningful when they describe a single intermediate file.
    for (index, map) in maps.iter().enumerate().skip(1) {
        match map {
            SourceMap::Flat(_) => {}
            SourceMap::Indexed(_) if map.source_count() <= 1 => {}
            SourceMap::Indexed(_) => {
                return Err(Error::UnsupportedComposition(format!(
                    "map {} is indexed with {} sources; maps after the first must be flat or single-source",
                    index,
                    map.source_count()
                )));
            }
        }
    }

    let consumers = chain
        .iter()
        .map(Consumer::new)
        .collect::<Result<Vec<_>, Error>>()?;
    let mappings = parse_mappings(tail.mappings.as_bytes())?;
    validate_string_tables(tail, &mappings)?;

    let mut sources: IndexSet<String> = IndexSet::new();
    let mut names: IndexSet<String> = IndexSet::new();
    let mut function_maps: Vec<Option<Vec<FunctionMap>>> = Vec::new();
    let mut encoder = MappingsEncoder::new();

    for (line_index, line) in mappings.lines().enumerate() {
        if line_index > 0 {
            encoder.next_line();
        }
        for segment in line {
            let original = match segment.original {
                Some(ref original) => original,
                None => {
                    // A hole in the last map stays a hole.
                    encoder.push(&Segment {
                        generated_column: segment.generated_column,
                        original: None,
                    });
                    continue;
                }
            };

            // Seed the fold from the last map's own tables, then walk the
            // chain from the map just beneath it down to the first.
            let source_index = original.source as usize;
            let mut source = tail.sources[source_index].as_str();
            let mut line_number = original.original_line + 1;
            let mut column = original.original_column;
            let mut name = original
                .name
                .map(|index| tail.names[index as usize].as_str());
            let mut function_map = tail.function_map(source_index);

            let mut unmapped = false;
            for consumer in consumers.iter().rev() {
                match consumer.original_position_for(GeneratedPosition::new(line_number, column)) {
                    Some(resolved) => {
                        source = resolved.source;
                        line_number = resolved.line;
                        column = resolved.column;
                        if resolved.name.is_some() {
                            name = resolved.name;
                        }
                        function_map = resolved.function_map;
                    }
                    None => {
                        unmapped = true;
                        break;
                    }
                }
            }
            if unmapped {
                encoder.push(&Segment {
                    generated_column: segment.generated_column,
                    original: None,
                });
                continue;
            }

            let (source_id, inserted) = sources.insert_full(source.to_string());
            if inserted {
                function_maps.push(function_map.map(<[FunctionMap]>::to_vec));
            }
            let name_id = name.map(|name| names.insert_full(name.to_string()).0);

            encoder.push(&Segment {
                generated_column: segment.generated_column,
                original: Some(OriginalLocation {
                    source: source_id as u32,
                    original_line: line_number - 1,
                    original_column: column,
                    name: name_id.map(|id| id as u32),
                }),
            });
        }
    }

    let mut composed = FlatMap::new(
        sources.into_iter().collect(),
        names.into_iter().collect(),
        encoder.finish(),
    );
    composed.file = tail.file.clone();
    composed.x_facebook_sources = Some(function_maps);

    debug!(
        maps = maps.len(),
        sources = composed.sources.len(),
        names = composed.names.len(),
        "composed source map chain"
    );
    Ok(SourceMap::Flat(composed))
}
