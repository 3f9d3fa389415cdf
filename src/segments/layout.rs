//! Position layout for freshly built or edited children

use super::Segment;
use crate::base::PositionMarker;

/// Point marker directly after `seg`, with line/column advanced over its raw.
fn end_point_after(seg: &Segment) -> Option<PositionMarker> {
    let pos = seg.position()?;
    let (line_no, line_pos) =
        PositionMarker::infer_next_position(seg.raw(), pos.working_line_no, pos.working_line_pos);
    let mut marker = pos.end_point_marker().with_working_position(line_no, line_pos);
    marker.line_no = line_no;
    marker.line_pos = line_pos;
    Some(marker)
}

/// Point marker at the start of the first positioned leaf in `segments`.
fn next_start_point(segments: &[Segment]) -> Option<PositionMarker> {
    segments.iter().find_map(|s| {
        s.iter_raw_segments()
            .find_map(|leaf| leaf.position())
            .or_else(|| s.position())
            .map(PositionMarker::start_point_marker)
    })
}

/// Give every unpositioned segment (usually a meta) a zero-width marker
/// taken from its neighbours. Positioned segments are returned untouched.
pub(crate) fn fill_meta_positions(segments: Vec<Segment>) -> Vec<Segment> {
    if segments.iter().all(|s| s.position().is_some()) {
        return segments;
    }
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for idx in 0..segments.len() {
        let seg = &segments[idx];
        if seg.position().is_some() {
            out.push(seg.clone());
            continue;
        }
        let marker = out
            .last()
            .and_then(end_point_after)
            .or_else(|| next_start_point(&segments[idx + 1..]));
        out.push(match marker {
            Some(marker) => seg.with_position(Some(marker)),
            None => seg.clone(),
        });
    }
    out
}

/// Refresh positions of `segments` laid out under `parent_pos`.
///
/// Segments without a marker (insertions from fixes) get one spanning from
/// the end of the previous segment to the start of the next. Every segment
/// gets its working line/column recomputed, recursing into children whose
/// marker changed.
pub fn position_segments(segments: &[Segment], parent_pos: Option<&PositionMarker>) -> Vec<Segment> {
    let (mut line_no, mut line_pos) = segments
        .iter()
        .find_map(|s| s.position())
        .or(parent_pos)
        .map_or((1, 1), |p| (p.working_line_no, p.working_line_pos));

    let mut buffer: Vec<Segment> = Vec::with_capacity(segments.len());
    for (idx, segment) in segments.iter().enumerate() {
        let old_position = segment.position().cloned();
        let new_position = match &old_position {
            Some(pos) => pos.clone(),
            None => {
                let start_point = match buffer.last() {
                    Some(prev) => prev.position().map(PositionMarker::end_point_marker),
                    None => parent_pos.map(PositionMarker::start_point_marker),
                };
                let end_point = next_start_point(&segments[idx + 1..]);
                match (start_point, end_point) {
                    (Some(start), Some(end)) if start.source_slice != end.source_slice
                        || start.templated_slice != end.templated_slice =>
                    {
                        PositionMarker::from_points(&start, &end)
                    }
                    (Some(start), _) => start,
                    (None, Some(end)) => end,
                    (None, None) => {
                        tracing::debug!(segment = ?segment, "unable to position new segment");
                        buffer.push(segment.clone());
                        continue;
                    }
                }
            }
        };
        let new_position = new_position.with_working_position(line_no, line_pos);
        (line_no, line_pos) = PositionMarker::infer_next_position(segment.raw(), line_no, line_pos);

        if old_position.as_ref() == Some(&new_position) {
            buffer.push(segment.clone());
        } else if !segment.segments().is_empty() {
            let children = position_segments(segment.segments(), Some(&new_position));
            buffer.push(segment.with_segments(children, Some(new_position)));
        } else {
            buffer.push(segment.with_position(Some(new_position)));
        }
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::range;
    use crate::segments::{MetaKind, TokenFlags};

    fn leaf(raw: &str, start: usize, line_pos: usize) -> Segment {
        Segment::token(
            raw,
            "word",
            TokenFlags::CODE,
            Some(PositionMarker::new(range(start, start + raw.len()), range(start, start + raw.len()), 1, line_pos, true)),
        )
    }

    #[test]
    fn test_inserted_segment_gets_point_between_neighbours() {
        let segs = vec![leaf("a", 0, 1), Segment::whitespace(" "), leaf("b", 1, 2)];
        let placed = position_segments(&segs, None);
        let ws = placed[1].position().unwrap();
        assert!(ws.is_point());
        assert_eq!(ws.templated_slice, range(1, 1));
        assert_eq!(ws.working_loc(), (1, 2));
        // The following segment shifts right by the inserted width
        assert_eq!(placed[2].position().unwrap().working_loc(), (1, 3));
        assert_eq!(placed[2].uuid(), segs[2].uuid());
    }

    #[test]
    fn test_fill_meta_positions_after_previous() {
        let segs = vec![leaf("SELECT", 0, 1), Segment::meta(MetaKind::Indent, None)];
        let filled = fill_meta_positions(segs);
        let pos = filled[1].position().unwrap();
        assert_eq!(pos.templated_slice, range(6, 6));
        assert_eq!(pos.line_pos, 7);
    }

    #[test]
    fn test_untouched_segments_are_shared() {
        let segs = vec![leaf("a", 0, 1), leaf("b", 1, 2)];
        let placed = position_segments(&segs, None);
        assert!(placed[0].ptr_eq(&segs[0]));
        assert!(placed[1].ptr_eq(&segs[1]));
    }
}
