use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::ParseError;
use crate::gpx_types::*;

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a GPX XML string into GpxData.
///
/// Every `<trkpt>` becomes a point; a point without usable coordinates is an
/// error rather than being skipped, so the number of points always matches the
/// document.
pub fn parse_gpx(xml: &str) -> Result<GpxData> {
    let mut reader = Reader::from_str(xml);
    let mut data = GpxData::default();
    let mut root = RootState::NotSeen;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                root.check_element(e.local_name().as_ref())?;
                match e.local_name().as_ref() {
                    b"gpx" if root == RootState::NotSeen => root = RootState::Open,
                    b"trk" => data.tracks.push(parse_track(&mut reader)?),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                root.check_element(e.local_name().as_ref())?;
                if root == RootState::NotSeen {
                    root = RootState::Closed;
                }
            }
            Ok(Event::End(e)) => {
                if root == RootState::Open && e.local_name().as_ref() == b"gpx" {
                    root = RootState::Closed;
                }
            }
            Ok(Event::Text(e)) => {
                if root != RootState::Open && !e.as_ref().iter().all(u8::is_ascii_whitespace) {
                    return Err(root.stray_content());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::XmlParse(e)),
            _ => {}
        }
    }

    match root {
        RootState::NotSeen => Err(ParseError::MissingRoot),
        RootState::Open => Err(ParseError::UnexpectedEof { element: "gpx" }),
        RootState::Closed => Ok(data),
    }
}

/// Where the reader stands relative to the `<gpx>` document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootState {
    NotSeen,
    Open,
    Closed,
}

impl RootState {
    /// Elements are only allowed as the `<gpx>` root itself or inside it.
    fn check_element(self, local_name: &[u8]) -> Result<()> {
        match self {
            RootState::NotSeen if local_name != b"gpx" => Err(ParseError::MissingRoot),
            RootState::Closed => Err(self.stray_content()),
            _ => Ok(()),
        }
    }

    fn stray_content(self) -> ParseError {
        match self {
            RootState::Closed => ParseError::ContentAfterRoot,
            _ => ParseError::MissingRoot,
        }
    }
}

/// Parse lat/lon attributes from a point element's start tag.
fn parse_lat_lon(e: &BytesStart<'_>) -> Result<(f64, f64)> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| ParseError::XmlParse(e.into()))?;
        let key = attr.key.local_name();
        let val = std::str::from_utf8(&attr.value).unwrap_or_default();
        match key.as_ref() {
            b"lat" => lat = Some(parse_coordinate("lat", val)?),
            b"lon" => lon = Some(parse_coordinate("lon", val)?),
            _ => {}
        }
    }

    let lat = lat.ok_or(ParseError::MissingAttribute {
        element: "trkpt",
        attribute: "lat",
    })?;
    let lon = lon.ok_or(ParseError::MissingAttribute {
        element: "trkpt",
        attribute: "lon",
    })?;

    Ok((lat, lon))
}

/// Parse a coordinate in degrees; latitude must lie in [-90, 90] and longitude in [-180, 180].
fn parse_coordinate(attribute: &'static str, val: &str) -> Result<f64> {
    let limit = if attribute == "lat" { 90.0 } else { 180.0 };
    val.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.abs() <= limit)
        .ok_or_else(|| ParseError::InvalidAttribute {
            element: "trkpt",
            attribute,
            value: val.to_string(),
        })
}

/// Parse a <trkpt> element and its children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(start: &BytesStart<'a>, reader: &mut Reader<&'a [u8]>) -> Result<GpxPoint> {
    let (lat, lon) = parse_lat_lon(start)?;
    let mut point = GpxPoint::new(lat, lon);
    let end_name = start.name().0.to_vec();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    point.ele = parse_elevation(&text)?;
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    point.time = parse_time(&text)?;
                }
                _ => {
                    // Extensions, hdop, sat and friends carry nothing we derive from.
                    reader
                        .read_to_end(e.name())
                        .map_err(ParseError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(ParseError::UnexpectedEof { element: "trkpt" }),
            Err(e) => return Err(ParseError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(point)
}

fn parse_elevation(text: &str) -> Result<Option<f64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| ParseError::InvalidElement {
            element: "ele",
            value: text.to_string(),
        })
}

/// Parse an ISO 8601 timestamp. Offset-less values are taken as UTC.
fn parse_time(text: &str) -> Result<Option<DateTime<Utc>>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    match DateTime::parse_from_rfc3339(text) {
        Ok(dt) => Ok(Some(dt.with_timezone(&Utc))),
        Err(source) => NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Some(naive.and_utc()))
            .map_err(|_| ParseError::InvalidTimestamp {
                value: text.to_string(),
                source,
            }),
    }
}

/// Parse a <trk> element.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxTrack> {
    let mut track = GpxTrack::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"name" => track.name = Some(read_text_owned(reader, &e)?),
                b"trkseg" => track.segments.push(parse_segment(reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(ParseError::XmlParse)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => return Err(ParseError::UnexpectedEof { element: "trk" }),
            Err(e) => return Err(ParseError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(track)
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<GpxSegment> {
    let mut segment = GpxSegment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => segment.points.push(parse_point(&e, reader)?),
                _ => {
                    reader
                        .read_to_end(e.name())
                        .map_err(ParseError::XmlParse)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    let (lat, lon) = parse_lat_lon(&e)?;
                    segment.points.push(GpxPoint::new(lat, lon));
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => return Err(ParseError::UnexpectedEof { element: "trkseg" }),
            Err(e) => return Err(ParseError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Read text content of an element as an owned String.
/// Handles regular text, CDATA sections, and entity references (Event::GeneralRef).
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(raw);
            }
            Ok(Event::CData(e)) => {
                let s = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                text.push_str(s);
            }
            Ok(Event::GeneralRef(e)) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    text.push(ch);
                } else {
                    let name = std::str::from_utf8(e.as_ref()).unwrap_or_default();
                    match name {
                        "amp" => text.push('&'),
                        "lt" => text.push('<'),
                        "gt" => text.push('>'),
                        "quot" => text.push('"'),
                        "apos" => text.push('\''),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => return Err(ParseError::UnexpectedEof { element: "text" }),
            Err(e) => return Err(ParseError::XmlParse(e)),
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_simple_track() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <name>Morning Run</name>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"><ele>10.0</ele><time>2025-01-01T00:00:00Z</time></trkpt>
      <trkpt lat="35.001" lon="139.001"><ele>11.0</ele><time>2025-01-01T00:00:10Z</time></trkpt>
      <trkpt lat="35.002" lon="139.002"><ele>12.0</ele><time>2025-01-01T00:00:20Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks.len(), 1);
        assert_eq!(data.tracks[0].name.as_deref(), Some("Morning Run"));
        assert_eq!(data.tracks[0].segments.len(), 1);

        let points = &data.tracks[0].segments[0].points;
        assert_eq!(points.len(), 3);
        assert!((points[1].lat - 35.001).abs() < 1e-10);
        assert!((points[1].ele.unwrap() - 11.0).abs() < 1e-10);
        assert_eq!(
            points[2].time,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 20).unwrap())
        );
    }

    #[test]
    fn test_multi_track_flatten_order() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="1.0" lon="0.0"/>
      <trkpt lat="2.0" lon="0.0"/>
    </trkseg>
    <trkseg>
      <trkpt lat="3.0" lon="0.0"/>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="4.0" lon="0.0"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let lats: Vec<f64> = data.points().map(|p| p.lat).collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_gpx() {
        let xml = r#"<?xml version="1.0"?><gpx version="1.1"></gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert!(data.tracks.is_empty());
        assert_eq!(data.points().count(), 0);
    }

    #[test]
    fn test_empty_segment_kept() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg></trkseg>
    <trkseg>
      <trkpt lat="35.0" lon="139.0"/>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.tracks[0].segments.len(), 2);
        assert_eq!(data.points().count(), 1);
    }

    #[test]
    fn test_waypoints_and_routes_ignored() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <wpt lat="35.6762" lon="139.6503"><name>Tokyo</name></wpt>
  <rte>
    <rtept lat="35.0" lon="139.0"/>
    <rtept lat="36.0" lon="140.0"/>
  </rte>
  <trk><trkseg><trkpt lat="35.0" lon="139.0"/></trkseg></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.points().count(), 1);
    }

    #[test]
    fn test_extensions_skipped() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk>
    <trkseg>
      <trkpt lat="35.0" lon="139.0">
        <ele>5.0</ele>
        <extensions>
          <gpxtpx:TrackPointExtension xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
            <gpxtpx:hr>150</gpxtpx:hr>
          </gpxtpx:TrackPointExtension>
        </extensions>
        <time>2025-01-01T00:00:00Z</time>
      </trkpt>
    </trkseg>
  </trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let pt = data.points().next().unwrap();
        assert_eq!(pt.ele, Some(5.0));
        assert!(pt.time.is_some());
    }

    #[test]
    fn test_with_namespace() {
        let xml = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1">
  <trk><trkseg><trkpt lat="35.0" lon="139.0"/></trkseg></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.points().count(), 1);
    }

    #[test]
    fn test_missing_ele_and_time() {
        let xml = r#"<?xml version="1.0"?>
<gpx version="1.1">
  <trk><trkseg><trkpt lat="35.0" lon="139.0"><time> </time></trkpt></trkseg></trk>
</gpx>"#;
        let data = parse_gpx(xml).unwrap();
        let pt = data.points().next().unwrap();
        assert_eq!(pt.ele, None);
        assert_eq!(pt.time, None);
    }

    #[test]
    fn test_time_with_offset_and_fraction() {
        assert_eq!(
            parse_time("2025-01-01T02:00:00+02:00").unwrap(),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        let t = parse_time("2025-01-01T00:00:00.500Z").unwrap().unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_time_without_offset_is_utc() {
        assert_eq!(
            parse_time("2025-01-01T06:30:00").unwrap(),
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_time() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="35.0" lon="139.0"><time>yesterday</time></trkpt>
</trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_invalid_elevation() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="35.0" lon="139.0"><ele>high</ele></trkpt>
</trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(err, ParseError::InvalidElement { element: "ele", .. }));
    }

    #[test]
    fn test_missing_lat_is_error() {
        let xml = r#"<gpx><trk><trkseg><trkpt lon="139.0"/></trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingAttribute {
                attribute: "lat",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_lon_is_error() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="1.0" lon="east"></trkpt></trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidAttribute {
                attribute: "lon",
                ..
            }
        ));
    }

    #[test]
    fn test_not_gpx() {
        let err = parse_gpx("just some text").unwrap_err();
        assert!(matches!(err, ParseError::MissingRoot));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="40.0" lon="-3.0"/>
  <trkpt lat="95.0" lon="-3.0"/>
</trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidAttribute {
                attribute: "lat",
                ..
            }
        ));
    }

    #[test]
    fn test_longitude_out_of_range() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="40.0" lon="-180.5"/></trkseg></trk></gpx>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidAttribute {
                attribute: "lon",
                ..
            }
        ));
    }

    #[test]
    fn test_coordinate_limits_accepted() {
        let xml = r#"<gpx><trk><trkseg>
  <trkpt lat="90" lon="180"/>
  <trkpt lat="-90.0" lon="-180.0"/>
</trkseg></trk></gpx>"#;
        let data = parse_gpx(xml).unwrap();
        assert_eq!(data.points().count(), 2);
    }

    #[test]
    fn test_unclosed_root_after_track() {
        let xml = r#"<gpx version="1.1"><trk><trkseg><trkpt lat="40.0" lon="-3.0"/></trkseg></trk>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { element: "gpx" }));
    }

    #[test]
    fn test_lone_root_start_tag() {
        let err = parse_gpx(r#"<gpx version="1.1">"#).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { element: "gpx" }));
    }

    #[test]
    fn test_self_closing_root() {
        let data = parse_gpx(r#"<?xml version="1.0"?><gpx version="1.1"/>"#).unwrap();
        assert!(data.tracks.is_empty());
    }

    #[test]
    fn test_track_after_root_rejected() {
        let xml = r#"<gpx version="1.1"></gpx>
<trk><trkseg><trkpt lat="40.0" lon="-3.0"/></trkseg></trk>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(err, ParseError::ContentAfterRoot));
    }

    #[test]
    fn test_text_after_root_rejected() {
        let err = parse_gpx("<gpx version=\"1.1\"></gpx>\ngarbage").unwrap_err();
        assert!(matches!(err, ParseError::ContentAfterRoot));
    }

    #[test]
    fn test_trailing_whitespace_and_comment_allowed() {
        let xml = "<gpx version=\"1.1\"></gpx>\n<!-- exported -->\n\n";
        assert!(parse_gpx(xml).is_ok());
    }

    #[test]
    fn test_other_root_element() {
        let xml = r#"<kml><trk><trkseg><trkpt lat="40.0" lon="-3.0"/></trkseg></trk></kml>"#;
        let err = parse_gpx(xml).unwrap_err();
        assert!(matches!(err, ParseError::MissingRoot));
    }

    #[test]
    fn test_truncated_document() {
        let xml = r#"<gpx><trk><trkseg><trkpt lat="1.0" lon="2.0">"#;
        assert!(parse_gpx(xml).is_err());
    }

    #[test]
    fn test_mismatched_tags() {
        let xml = r#"<gpx><trk><trkseg></trk></trkseg></gpx>"#;
        assert!(parse_gpx(xml).is_err());
    }
}
