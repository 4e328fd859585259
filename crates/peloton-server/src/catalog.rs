//! Segment catalog loaded from a directory of GPX files.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Result;
use peloton_core::gpx_io::parse_gpx;
use peloton_core::{IdAllocator, Segment, SegmentId};

/// Load every `*.gpx` file in `dir` as a segment.
///
/// Files are visited in sorted name order. A file whose name already has a
/// leaderboard keeps that segment id; new files get fresh ids. Unreadable
/// files are logged and skipped, and a missing directory yields an empty
/// catalog.
pub fn load_catalog(
    dir: &Path,
    ids: &IdAllocator,
    known: &HashMap<String, SegmentId>,
) -> Result<Vec<Segment>> {
    if let Some(max) = known.values().max() {
        ids.reserve_segments_through(*max);
    }

    if !dir.is_dir() {
        tracing::warn!("Segment directory {} not found; catalog is empty", dir.display());
        return Ok(Vec::new());
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("gpx"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut catalog = Vec::with_capacity(files.len());
    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let parsed = File::open(&path)
            .map_err(anyhow::Error::from)
            .and_then(|f| parse_gpx(BufReader::new(f)).map_err(anyhow::Error::from));
        match parsed {
            Ok(doc) => {
                let id = known
                    .get(&file_name)
                    .copied()
                    .unwrap_or_else(|| ids.next_segment());
                tracing::debug!("Loaded {} as {} ({} waypoints)", file_name, id, doc.waypoints.len());
                catalog.push(Segment::new(id, file_name, doc.waypoints));
            }
            Err(err) => {
                tracing::warn!("Skipping segment file {}: {}", path.display(), err);
            }
        }
    }

    Ok(catalog)
}
