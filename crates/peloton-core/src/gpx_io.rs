//! GPX reading and writing at the edge of the pipeline.
//!
//! Every waypoint must carry an elevation and a timestamp; an upload missing
//! either is rejected as a whole rather than patched with defaults.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::io::Read;

use crate::error::{PelotonError, Result};
use crate::models::Waypoint;
use crate::spatial::format_timestamp;

/// Waypoints and creator extracted from one GPX document.
#[derive(Debug, Clone)]
pub struct GpxDocument {
    pub creator: Option<String>,
    pub waypoints: Vec<Waypoint>,
}

/// Parse a GPX document.
///
/// Top-level `<wpt>` elements come first, then every track-segment point in
/// document order.
pub fn parse_gpx<R: Read>(reader: R) -> Result<GpxDocument> {
    let doc = gpx::read(reader).map_err(|e| PelotonError::parse(e.to_string()))?;

    let track_points = doc
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter());

    let waypoints = doc
        .waypoints
        .iter()
        .chain(track_points)
        .enumerate()
        .map(|(i, point)| convert_point(i, point))
        .collect::<Result<Vec<_>>>()?;

    if waypoints.is_empty() {
        return Err(PelotonError::parse("GPX contains no waypoints"));
    }

    let creator = doc
        .creator
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    Ok(GpxDocument { creator, waypoints })
}

pub fn parse_gpx_str(text: &str) -> Result<GpxDocument> {
    parse_gpx(text.as_bytes())
}

fn convert_point(index: usize, point: &gpx::Waypoint) -> Result<Waypoint> {
    let elevation_m = point
        .elevation
        .ok_or_else(|| PelotonError::parse(format!("waypoint {index} has no elevation")))?;
    let time = point
        .time
        .ok_or_else(|| PelotonError::parse(format!("waypoint {index} has no timestamp")))?;
    let iso = time
        .format()
        .map_err(|e| PelotonError::parse(e.to_string()))?;
    let utc = DateTime::parse_from_rfc3339(&iso)
        .map_err(|e| PelotonError::parse(format!("waypoint {index}: {e}")))?
        .with_timezone(&Utc);

    let geo = point.point();
    Ok(Waypoint::new(geo.y(), geo.x(), elevation_m, format_timestamp(utc)))
}

/// Render waypoints as a GPX 1.1 track.
pub fn render_gpx(creator: &str, name: &str, waypoints: &[Waypoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        out,
        r#"<gpx version="1.1" creator="{}" xmlns="http://www.topografix.com/GPX/1/1">"#,
        escape_xml(creator)
    );
    let _ = writeln!(out, "  <trk>");
    let _ = writeln!(out, "    <name>{}</name>", escape_xml(name));
    let _ = writeln!(out, "    <trkseg>");
    for wp in waypoints {
        let _ = writeln!(
            out,
            r#"      <trkpt lat="{:.7}" lon="{:.7}"><ele>{:.2}</ele><time>{}</time></trkpt>"#,
            wp.lat, wp.lon, wp.elevation_m, wp.timestamp
        );
    }
    let _ = writeln!(out, "    </trkseg>");
    let _ = writeln!(out, "  </trk>");
    let _ = writeln!(out, "</gpx>");
    out
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
