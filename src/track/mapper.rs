use crate::track::Trackpoint;

/// A raw point expressed in master-path terms.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MappedPoint {
    /// Index of the chosen master point
    pub master_index: usize,
    /// Master arc length at that point
    pub master_s: f64,
    pub master_x: f64,
    pub master_y: f64,
    /// Squared Euclidean residual between the raw point and the master point
    pub distance_sq: f64,
}

/// A running cursor into the master path, one per tracked session. Holds only
/// an index; advancing targets move it forward in O(1) amortized, a target
/// behind the current position triggers a binary re-search.
#[derive(Clone, Copy, Debug, Default)]
pub struct MasterCursor {
    index: usize,
}

impl MasterCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the cursor to the master index whose arc length is numerically
    /// closest to `rel_s` and returns it.
    pub fn seek(&mut self, master: &[Trackpoint], rel_s: f64) -> usize {
        if master.is_empty() {
            return 0;
        }
        if self.index >= master.len() {
            self.index = master.len() - 1;
        }
        if master[self.index].s > rel_s {
            self.index = master.partition_point(|p| p.s <= rel_s).saturating_sub(1);
        }
        while self.index + 1 < master.len() && master[self.index + 1].s <= rel_s {
            self.index += 1;
        }

        // The bracket is (index, index + 1); pick whichever is closer by s.
        let mut closest = self.index;
        if self.index + 1 < master.len()
            && rel_s - master[self.index].s > master[self.index + 1].s - rel_s
        {
            closest = self.index + 1;
        }
        closest
    }
}

fn mapping_at(master: &[Trackpoint], index: usize, x: f64, y: f64) -> MappedPoint {
    let m = master[index];
    let dx = x - m.x;
    let dy = y - m.y;
    MappedPoint {
        master_index: index,
        master_s: m.s,
        master_x: m.x,
        master_y: m.y,
        distance_sq: dx * dx + dy * dy,
    }
}

/// Projects every point of a lap segment onto the master path. The segment's
/// local arc length is scaled by `scale_s` (ratio of master length to lap
/// length) before lookup; both sequences advance in lock-step, so the whole
/// scan is O(n).
///
/// The callback receives the point's index within the full session, its
/// scaled relative arc length, the raw point, and the mapping.
pub fn map_segment<F>(
    segment: &[Trackpoint],
    master: &[Trackpoint],
    start_index: usize,
    scale_s: f64,
    mut emit: F,
) where
    F: FnMut(usize, f64, &Trackpoint, MappedPoint),
{
    if segment.is_empty() || master.is_empty() {
        return;
    }
    let scale_s = if scale_s == 0. { 1. } else { scale_s };

    let mut cursor = MasterCursor::new();
    for (i, p) in segment.iter().enumerate() {
        let rel_s = (p.s - segment[0].s) * scale_s;
        let index = cursor.seek(master, rel_s);
        emit(start_index + i, rel_s, p, mapping_at(master, index, p.x, p.y));
    }
}

/// Maps a single relative arc length and position to the closest master
/// point, for isolated lookups such as event positions.
pub fn map_point(master: &[Trackpoint], rel_s: f64, x: f64, y: f64) -> Option<MappedPoint> {
    if master.is_empty() {
        return None;
    }
    let mut cursor = MasterCursor::new();
    let index = cursor.seek(master, rel_s);
    Some(mapping_at(master, index, x, y))
}
