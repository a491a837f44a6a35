//! GPX export of synthesized trajectories.
//!
//! A session is written as one track with one segment. Each point carries
//! its wall time (offset from the session start) and, under a
//! `trackpace:` extension, the instantaneous speed and credited distance
//! the collaborator received with it.

use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use crate::trajectory::Sample;

const EXTENSION_NS: &str = "https://github.com/trackpace/trackpace/gpx/1";

const DOCUMENT_OPEN: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "\n",
    r#"<gpx version="1.1" creator="trackpace""#,
    r#" xmlns="http://www.topografix.com/GPX/1/1""#,
    r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#,
    r#" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd""#,
);

/// Generates a GPX 1.1 document from samples.
///
/// Sample timestamps are offsets in seconds from `start`.
pub fn generate_gpx(samples: &[Sample], name: &str, start: OffsetDateTime) -> Vec<u8> {
    let name = escape_xml(name);
    let mut gpx = format!("{DOCUMENT_OPEN} xmlns:trackpace=\"{EXTENSION_NS}\">\n");

    gpx.push_str(&format!("  <metadata>\n    <name>{name}</name>\n"));
    if let Ok(created) = start.format(&Rfc3339) {
        gpx.push_str(&format!("    <time>{created}</time>\n"));
    }
    gpx.push_str("  </metadata>\n");

    gpx.push_str(&format!("  <trk>\n    <name>{name}</name>\n    <trkseg>\n"));
    for sample in samples {
        gpx.push_str(&track_point(sample, start));
    }
    gpx.push_str("    </trkseg>\n  </trk>\n</gpx>\n");

    gpx.into_bytes()
}

fn track_point(sample: &Sample, start: OffsetDateTime) -> String {
    let mut point = format!(
        "      <trkpt lat=\"{:.7}\" lon=\"{:.7}\">\n",
        sample.latitude, sample.longitude
    );
    let at = start + Duration::seconds_f64(sample.timestamp);
    if let Ok(formatted) = at.format(&Rfc3339) {
        point.push_str(&format!("        <time>{formatted}</time>\n"));
    }
    point.push_str(&format!(
        concat!(
            "        <extensions>\n",
            "          <trackpace:speed>{:.3}</trackpace:speed>\n",
            "          <trackpace:distance>{:.2}</trackpace:distance>\n",
            "        </extensions>\n",
            "      </trkpt>\n",
        ),
        sample.instantaneous_speed, sample.cumulative_distance
    ));
    point
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
