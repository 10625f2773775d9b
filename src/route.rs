//! Route preparation: waypoints, fallback voice packets, overview polyline
//! and safest-route selection.

use crate::error::{NavError, Result};
use crate::protocol::{Route, RouteDetails, Step};
use crate::types::{Bounds, RoutePoint, VoicePacket};

/// Waypoints and the synchronously derived packet list for one route.
#[derive(Debug, Clone)]
pub struct PreparedRoute {
    pub route_index: usize,
    pub waypoints: Vec<RoutePoint>,
    pub fallback: Vec<VoicePacket>,
}

/// Derive waypoints and fallback packets from the first leg's steps.
///
/// One waypoint and one packet per step, both at the step's end location.
pub fn prepare(route_index: usize, route: &Route) -> Result<PreparedRoute> {
    let steps = first_leg_steps(route_index, route)?;
    Ok(PreparedRoute {
        route_index,
        waypoints: steps.iter().map(|s| s.end_location.into()).collect(),
        fallback: steps.iter().map(fallback_packet).collect(),
    })
}

fn first_leg_steps(route_index: usize, route: &Route) -> Result<&[Step]> {
    match route.legs.first() {
        Some(leg) if !leg.steps.is_empty() => Ok(&leg.steps),
        _ => Err(NavError::EmptyRouteData { route_index }),
    }
}

fn fallback_packet(step: &Step) -> VoicePacket {
    VoicePacket::at(strip_html(&step.html_instructions), step.end_location.into())
}

/// Remove `<...>` tags, turn `&nbsp;` into spaces and trim.
pub fn strip_html(instruction: &str) -> String {
    let mut out = String::with_capacity(instruction.len());
    let mut in_tag = false;
    for c in instruction.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    // An unclosed `<` is not a tag.
    if in_tag {
        if let Some(at) = instruction.rfind('<') {
            out.push_str(&instruction[at..]);
        }
    }
    out.replace("&nbsp;", " ").trim().to_string()
}

// ---------------------------------------------------------------------------
// Route choice
// ---------------------------------------------------------------------------

/// Index of the safest route; the first one wins ties.
pub fn safest_route_index(details: &[RouteDetails]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, d) in details.iter().enumerate() {
        match best {
            Some((_, score)) if d.safety_score <= score => {}
            _ => best = Some((i, d.safety_score)),
        }
    }
    best.map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// Overview polyline
// ---------------------------------------------------------------------------

/// Decoded overview path and its bounding box.
#[derive(Debug, Clone)]
pub struct Overview {
    pub path: Vec<RoutePoint>,
    pub bounds: Option<Bounds>,
}

/// Decode the route's overview polyline, or fall back to the step end points.
pub fn overview(route: &Route) -> Result<Overview> {
    let path = match &route.overview_polyline {
        Some(p) => decode_polyline(&p.points)?,
        None => route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|s| s.end_location.into())
            .collect(),
    };
    let bounds = Bounds::from_points(&path);
    Ok(Overview { path, bounds })
}

/// Decode an encoded polyline (precision 1e-5).
pub fn decode_polyline(encoded: &str) -> Result<Vec<RoutePoint>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut pos = 0;
    let (mut lat, mut lng) = (0i64, 0i64);

    while pos < bytes.len() {
        lat += next_delta(bytes, &mut pos)?;
        lng += next_delta(bytes, &mut pos)?;
        points.push(RoutePoint::new(lat as f64 * 1e-5, lng as f64 * 1e-5));
    }
    Ok(points)
}

fn next_delta(bytes: &[u8], pos: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let Some(&b) = bytes.get(*pos) else {
            return Err(NavError::InvalidPolyline { offset: *pos });
        };
        if !(63..=126).contains(&b) || shift > 30 {
            return Err(NavError::InvalidPolyline { offset: *pos });
        }
        *pos += 1;
        let chunk = i64::from(b - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_markup() {
        assert_eq!(
            strip_html("Turn <b>left</b> onto <b>Main&nbsp;St</b><div style=\"x\">Toll road</div>"),
            "Turn left onto Main StToll road"
        );
        assert_eq!(strip_html("  Keep right  "), "Keep right");
        assert_eq!(strip_html("a < b"), "a < b");
    }

    #[test]
    fn next_delta_rejects_truncated_input() {
        let mut pos = 0;
        // '_' (95) has the continuation bit set and nothing follows.
        assert!(matches!(
            next_delta(b"_", &mut pos),
            Err(NavError::InvalidPolyline { offset: 1 })
        ));
    }
}
