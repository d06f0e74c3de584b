//! Map heat layer of a district table. Each district with coordinates becomes a heat point weighted by its crime index,
//! plus a marker which shows the totals on click. The layer is returned as data for a web map and can be rendered as a
//! standalone Leaflet page.

use super::heatmap::{heatmap_title, EMPTY_SELECTION_MSG};
use crate::model::district::{DistrictStat, DistrictTable};
use crate::model::error::DatasetError;
use poem_openapi::Object;
use serde::{Deserialize, Serialize};

pub const DEFAULT_ZOOM: u8 = 6;
pub const DEFAULT_TILES: &str = "CartoDB positron";
const TILES_URL: &str = "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png";
const TILES_ATTRIBUTION: &str = "&copy; OpenStreetMap contributors &copy; CARTO";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct HeatPoint {
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct GradientStop {
    pub stop: f64,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct DistrictMarker {
    pub district_name: String,
    pub lat: f64,
    pub lon: f64,
    pub total_crime: f64,
    pub crime_index: f64,
    /// HTML shown when the marker is clicked.
    pub popup: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Object)]
pub struct MapHeatLayer {
    pub title: String,
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub tiles: String,
    pub radius: u32,
    pub blur: u32,
    pub min_opacity: f64,
    pub gradient: Vec<GradientStop>,
    pub points: Vec<HeatPoint>,
    pub markers: Vec<DistrictMarker>,
    pub marker_radius: u32,
    pub marker_color: String,
    pub marker_fill_opacity: f64,
}

fn default_gradient() -> Vec<GradientStop> {
    [(0.2, "blue"), (0.4, "lime"), (0.6, "orange"), (0.8, "red")]
        .iter()
        .map(|(stop, color)| GradientStop {
            stop: *stop,
            color: color.to_string(),
        })
        .collect()
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Build the map layer. The table must be grouped with coordinates.
pub fn map_heat_layer(table: &DistrictTable) -> Result<MapHeatLayer, DatasetError> {
    if !table.with_coordinates {
        return Err(DatasetError::MissingCoordinates);
    }

    let located: Vec<(f64, f64, &DistrictStat)> = table
        .districts
        .iter()
        .filter_map(|d| match (d.lat, d.lon) {
            (Some(lat), Some(lon)) => Some((lat, lon, d)),
            _ => None,
        })
        .collect();

    if located.is_empty() {
        return Err(DatasetError::EmptySelection {
            msg: EMPTY_SELECTION_MSG.to_string(),
        });
    }

    let count = located.len() as f64;
    let center_lat = located.iter().map(|(lat, _, _)| lat).sum::<f64>() / count;
    let center_lon = located.iter().map(|(_, lon, _)| lon).sum::<f64>() / count;

    let points = located
        .iter()
        .map(|(lat, lon, d)| HeatPoint {
            lat: *lat,
            lon: *lon,
            intensity: d.crime_index,
        })
        .collect();

    let markers = located
        .iter()
        .map(|(lat, lon, d)| DistrictMarker {
            district_name: d.district_name.clone(),
            lat: *lat,
            lon: *lon,
            total_crime: d.total_crime,
            crime_index: d.crime_index,
            popup: format!(
                "<b>{}</b><br>Total Crime: {}<br>Crime Index: {:.2}",
                escape_html(&d.district_name),
                d.total_crime as i64,
                d.crime_index
            ),
        })
        .collect();

    Ok(MapHeatLayer {
        title: heatmap_title(table),
        center_lat,
        center_lon,
        zoom: DEFAULT_ZOOM,
        tiles: DEFAULT_TILES.to_string(),
        radius: 30,
        blur: 25,
        min_opacity: 0.4,
        gradient: default_gradient(),
        points,
        markers,
        marker_radius: 4,
        marker_color: "red".to_string(),
        marker_fill_opacity: 0.7,
    })
}

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8" />
  <title>__TITLE__</title>
  <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
  <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
  <script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>
  <style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
  <div id="map"></div>
  <script>
    var layer = __LAYER__;
    var map = L.map("map").setView([layer.center_lat, layer.center_lon], layer.zoom);
    L.tileLayer("__TILES_URL__", { attribution: "__TILES_ATTRIBUTION__" }).addTo(map);
    var gradient = {};
    layer.gradient.forEach(function (g) { gradient[g.stop] = g.color; });
    L.heatLayer(
      layer.points.map(function (p) { return [p.lat, p.lon, p.intensity]; }),
      { radius: layer.radius, blur: layer.blur, minOpacity: layer.min_opacity, gradient: gradient }
    ).addTo(map);
    layer.markers.forEach(function (m) {
      L.circleMarker([m.lat, m.lon], {
        radius: layer.marker_radius,
        color: layer.marker_color,
        fill: true,
        fillOpacity: layer.marker_fill_opacity
      }).bindPopup(m.popup).addTo(map);
    });
  </script>
</body>
</html>
"#;

impl MapHeatLayer {
    /// A standalone page which draws the layer with Leaflet.
    pub fn to_html(&self) -> Result<String, DatasetError> {
        // Keep the JSON from closing the script element.
        let layer = serde_json::to_string(self)?.replace("</", "<\\/");

        Ok(MAP_TEMPLATE
            .replace("__TITLE__", &escape_html(&self.title))
            .replace("__TILES_URL__", TILES_URL)
            .replace("__TILES_ATTRIBUTION__", TILES_ATTRIBUTION)
            .replace("__LAYER__", &layer))
    }
}
