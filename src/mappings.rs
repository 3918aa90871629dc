//! Decoding and encoding of the compact `mappings` segment stream.
//!
//! The stream is a sequence of generated lines separated by `;`, each line a
//! sequence of `,`-separated segments of 1, 4, or 5 Base64 VLQ fields. All
//! fields except the generated column are deltas carried across every
//! segment in the map; the generated column resets at each line break.

use std::iter::Peekable;

use crate::Error;

/// One decoded mapping segment.
///
/// `original == None` is a hole: the generated column exists but resolves to
/// nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

/// The original-side fields of a mapped segment, as 0-based wire values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: u32,
    pub original_line: u32,
    pub original_column: u32,
    pub name: Option<u32>,
}

/// All segments of a map, packed into one flat array with a separate
/// per-line index. Segments within a line are sorted by generated column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mappings {
    segments: Vec<Segment>,
    // line_starts[i]..line_starts[i + 1] spans line i; always has at least
    // two entries, so even an empty `mappings` string is one empty line.
    line_starts: Vec<u32>,
}

impl Mappings {
    pub fn line_count(&self) -> u32 {
        (self.line_starts.len() - 1) as u32
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// The segments of the given 0-based line, or `None` past the last line.
    pub fn line(&self, line_index: u32) -> Option<&[Segment]> {
        let index = line_index as usize;
        let end = *self.line_starts.get(index + 1)? as usize;
        let start = self.line_starts[index] as usize;
        Some(&self.segments[start..end])
    }

    pub fn lines(&self) -> impl Iterator<Item = &[Segment]> + '_ {
        self.line_starts
            .windows(2)
            .map(move |span| &self.segments[span[0] as usize..span[1] as usize])
    }

    /// The greatest segment on `line_index` whose generated column is at or
    /// before `column`. `None` when the line does not exist or the column
    /// precedes every segment on it.
    pub fn floor_segment(&self, line_index: u32, column: u32) -> Option<&Segment> {
        let line = self.line(line_index)?;
        let index = line.partition_point(|segment| segment.generated_column <= column);
        if index == 0 {
            None
        } else {
            Some(&line[index - 1])
        }
    }

    /// Re-serialize into a canonical `mappings` string.
    pub fn encode(&self) -> String {
        let mut encoder = MappingsEncoder::new();
        for (index, line) in self.lines().enumerate() {
            if index > 0 {
                encoder.next_line();
            }
            for segment in line {
                encoder.push(segment);
            }
        }
        encoder.finish()
    }

    fn sort_line(&mut self, line_index: usize) {
        let start = self.line_starts[line_index] as usize;
        let end = self.line_starts[line_index + 1] as usize;
        self.segments[start..end].sort_by_key(|segment| segment.generated_column);
    }
}

#[inline]
fn is_mapping_separator(byte: u8) -> bool {
    byte == b';' || byte == b','
}

#[inline]
fn at_separator<I>(input: &mut Peekable<I>) -> bool
where
    I: Iterator<Item = u8>,
{
    input.peek().cloned().map_or(true, is_mapping_separator)
}

#[inline]
fn read_relative_positive_vlq<B>(previous: &mut u32, input: &mut B) -> Result<(), Error>
where
    B: Iterator<Item = u8>,
{
    let decoded = vlq::decode(input).map_err(Error::Vlq)?;
    let (new, overflowed) = (*previous as i64).overflowing_add(decoded);
    if overflowed || new > (u32::MAX as i64) {
        return Err(Error::UnexpectedlyBigNumber);
    }

    if new < 0 {
        return Err(Error::UnexpectedNegativeNumber);
    }

    *previous = new as u32;
    Ok(())
}

/// Decode a `mappings` string into its line-indexed segment container.
///
/// Lines whose segments arrive out of order are stable-sorted; duplicate
/// generated columns are tolerated and the floor lookup picks the last.
pub fn parse_mappings(input: &[u8]) -> Result<Mappings, Error> {
    let mut generated_column = 0;
    let mut original_line = 0;
    let mut original_column = 0;
    let mut source = 0;
    let mut name = 0;

    let mut segments: Vec<Segment> = Vec::new();
    let mut line_starts = vec![0u32];
    let mut line_sorted = true;
    let mut unsorted_lines = Vec::new();

    let mut input = input.iter().cloned().peekable();

    while let Some(byte) = input.peek().cloned() {
        match byte {
            b';' => {
                if !line_sorted {
                    unsorted_lines.push(line_starts.len() - 1);
                    line_sorted = true;
                }
                line_starts.push(segments.len() as u32);
                generated_column = 0;
                input.next().unwrap();
            }
            b',' => {
                input.next().unwrap();
            }
            _ => {
                let first_on_line = segments.len() as u32 == *line_starts.last().unwrap();
                let previous_column = generated_column;

                // First is a generated column that is always present.
                read_relative_positive_vlq(&mut generated_column, &mut input)?;
                if !first_on_line && generated_column < previous_column {
                    line_sorted = false;
                }

                // Read source, original line, and original column if the
                // segment has them; a name may follow.
                let original = if at_separator(&mut input) {
                    None
                } else {
                    read_relative_positive_vlq(&mut source, &mut input)?;
                    if at_separator(&mut input) {
                        return Err(Error::InvalidSegmentArity(2));
                    }
                    read_relative_positive_vlq(&mut original_line, &mut input)?;
                    if at_separator(&mut input) {
                        return Err(Error::InvalidSegmentArity(3));
                    }
                    read_relative_positive_vlq(&mut original_column, &mut input)?;

                    let name = if at_separator(&mut input) {
                        None
                    } else {
                        read_relative_positive_vlq(&mut name, &mut input)?;
                        Some(name)
                    };

                    let mut arity = if name.is_some() { 5 } else { 4 };
                    while !at_separator(&mut input) {
                        vlq::decode(&mut input).map_err(Error::Vlq)?;
                        arity += 1;
                    }
                    if arity > 5 {
                        return Err(Error::InvalidSegmentArity(arity));
                    }

                    Some(OriginalLocation {
                        source,
                        original_line,
                        original_column,
                        name,
                    })
                };

                segments.push(Segment {
                    generated_column,
                    original,
                });
            }
        }
    }

    if !line_sorted {
        unsorted_lines.push(line_starts.len() - 1);
    }
    line_starts.push(segments.len() as u32);

    let mut mappings = Mappings {
        segments,
        line_starts,
    };
    for line_index in unsorted_lines {
        mappings.sort_line(line_index);
    }
    Ok(mappings)
}

/// Incremental emitter for a `mappings` string.
///
/// Holds the running accumulators itself: push segments with absolute wire
/// values and the deltas come out right, including across line breaks.
#[derive(Debug)]
pub struct MappingsEncoder {
    out: String,
    buf: Vec<u8>,
    line_has_segments: bool,
    generated_column: u32,
    source: u32,
    original_line: u32,
    original_column: u32,
    name: u32,
}

#[inline]
fn delta(value: u32, previous: &mut u32) -> i64 {
    let delta = i64::from(value) - i64::from(*previous);
    *previous = value;
    delta
}

impl MappingsEncoder {
    pub fn new() -> MappingsEncoder {
        MappingsEncoder {
            out: String::new(),
            buf: Vec::new(),
            line_has_segments: false,
            generated_column: 0,
            source: 0,
            original_line: 0,
            original_column: 0,
            name: 0,
        }
    }

    /// Close the current generated line. The generated-column accumulator
    /// resets; the original-side accumulators carry across.
    pub fn next_line(&mut self) {
        self.out.push(';');
        self.line_has_segments = false;
        self.generated_column = 0;
    }

    pub fn push(&mut self, segment: &Segment) {
        if self.line_has_segments {
            self.out.push(',');
        }
        self.line_has_segments = true;

        let field = delta(segment.generated_column, &mut self.generated_column);
        self.push_vlq(field);

        if let Some(ref original) = segment.original {
            let field = delta(original.source, &mut self.source);
            self.push_vlq(field);
            let field = delta(original.original_line, &mut self.original_line);
            self.push_vlq(field);
            let field = delta(original.original_column, &mut self.original_column);
            self.push_vlq(field);
            if let Some(name) = original.name {
                let field = delta(name, &mut self.name);
                self.push_vlq(field);
            }
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn push_vlq(&mut self, value: i64) {
        self.buf.clear();
        if vlq::encode(value, &mut self.buf).is_err() {
            unreachable!("encoding into a Vec cannot fail");
        }
        for &byte in &self.buf {
            self.out.push(byte as char);
        }
    }
}

impl Default for MappingsEncoder {
    fn default() -> MappingsEncoder {
        MappingsEncoder::new()
    }
}
