use crate::location::{Location, Position, UNBOUNDED_COLUMN};
use crate::path::resolve_relative;

use super::consumer::{Bias, OriginalPosition, SourceMapConsumer};

/// A generated range translated into its original source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedLocation {
    pub source: String,
    pub loc: Location,
}

fn original_position_try_both<C: SourceMapConsumer + ?Sized>(
    map: &C,
    line: u32,
    column: i64,
) -> Option<OriginalPosition> {
    map.original_position_for(line, column, Bias::GreatestLowerBound)
        .or_else(|| map.original_position_for(line, column, Bias::LeastUpperBound))
}

/// The original position where the range ending at `end` stops.
///
/// The mapping covering the last generated character gives the *start* of
/// the original token; the next original mapping on that line gives its
/// end. Without one the range runs to the end of the line.
fn original_end_position_for<C: SourceMapConsumer + ?Sized>(
    map: &C,
    end: Position,
) -> Option<OriginalPosition> {
    let before_end = original_position_try_both(map, end.line, end.column.saturating_sub(1))?;

    let unbounded = OriginalPosition {
        column: UNBOUNDED_COLUMN,
        ..before_end.clone()
    };
    let Some(after_end) = map.generated_position_for(
        &before_end.source,
        before_end.line,
        before_end.column.saturating_add(1),
        Bias::LeastUpperBound,
    ) else {
        return Some(unbounded);
    };
    match map.original_position_for(after_end.line, after_end.column, Bias::GreatestLowerBound) {
        Some(original) if original.line == before_end.line => Some(original),
        _ => Some(unbounded),
    }
}

/// Translate one generated range. `None` when either end cannot be
/// resolved or the ends land in different sources.
pub fn get_mapping<C: SourceMapConsumer + ?Sized>(
    map: &C,
    generated: &Location,
    generated_file: &str,
) -> Option<MappedLocation> {
    if !generated.start.is_valid() || !generated.end.is_valid() {
        return None;
    }
    let start =
        original_position_try_both(map, generated.start.line, generated.start.column)?;
    let end = original_end_position_for(map, generated.end)?;
    if start.source != end.source {
        return None;
    }

    let start_pos = Position::new(start.line, start.column);
    let mut end_pos = Position::new(end.line, end.column);
    if start_pos == end_pos {
        // Zero-width result: re-resolve the generated end and stop one
        // column short of it.
        let widened = map
            .original_position_for(generated.end.line, generated.end.column, Bias::LeastUpperBound)
            .filter(|p| p.source == start.source)
            .map(|p| Position::new(p.line, p.column - 1))
            .filter(|p| *p >= start_pos);
        if let Some(widened) = widened {
            end_pos = widened;
        }
    }

    Some(MappedLocation {
        source: resolve_relative(&start.source, generated_file),
        loc: Location {
            start: start_pos,
            end: end_pos,
            skip: generated.skip,
        },
    })
}
