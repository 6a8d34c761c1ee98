//! Leaflet map fragment marking one predicted location.

use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_ZOOM: u8 = 12;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// A base layer offered in the layer-toggle control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileLayer {
    pub name: &'static str,
    pub url: &'static str,
    pub attribution: &'static str,
}

pub const STREET_LAYER: TileLayer = TileLayer {
    name: "Street",
    url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
    attribution: "&copy; OpenStreetMap contributors",
};

pub const GOOGLE_LAYER: TileLayer = TileLayer {
    name: "Google Maps",
    url: "https://mt1.google.com/vt/lyrs=m&x={x}&y={y}&z={z}",
    attribution: "Google",
};

pub const SATELLITE_LAYER: TileLayer = TileLayer {
    name: "Satellite",
    url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
    attribution: "Tiles &copy; Esri",
};

pub const BASE_LAYERS: [TileLayer; 3] = [STREET_LAYER, GOOGLE_LAYER, SATELLITE_LAYER];

pub const MARKER_TOOLTIP: &str = "Predicted location";

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
    /// Text shown when the marker is clicked.
    pub popup: String,
    pub height_px: u32,
}

impl MapView {
    pub fn new(latitude: f64, longitude: f64, popup: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            zoom: DEFAULT_ZOOM,
            popup: popup.into(),
            height_px: 500,
        }
    }

    /// Renders a self-contained HTML fragment that can be dropped into any
    /// page. Each call uses a fresh element id so several maps may coexist.
    pub fn to_html(&self) -> String {
        let id = format!("map-{}", NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed));
        let center = format!("[{}, {}]", js_number(self.latitude), js_number(self.longitude));

        let mut layers = String::new();
        for (i, layer) in BASE_LAYERS.iter().enumerate() {
            layers.push_str(&format!(
                "  var layer{i} = L.tileLayer({url}, {{attribution: {attr}, maxZoom: 19}});\n",
                i = i,
                url = js_string(layer.url),
                attr = js_string(layer.attribution),
            ));
        }
        let control_entries: Vec<String> = BASE_LAYERS
            .iter()
            .enumerate()
            .map(|(i, layer)| format!("{}: layer{}", js_string(layer.name), i))
            .collect();

        format!(
            r#"<link rel="stylesheet" href="{css}">
<script src="{js}"></script>
<div id="{id}" class="map" style="height: {height}px;"></div>
<script>
(function() {{
  var map = L.map({id_js}).setView({center}, {zoom});
{layers}  layer0.addTo(map);
  L.marker({center})
    .bindPopup({popup})
    .bindTooltip({tooltip})
    .addTo(map);
  L.control.layers({{{controls}}}).addTo(map);
}})();
</script>"#,
            css = LEAFLET_CSS,
            js = LEAFLET_JS,
            id = id,
            id_js = js_string(&id),
            height = self.height_px,
            center = center,
            zoom = self.zoom,
            layers = layers,
            popup = js_string(&escape_html(&self.popup)),
            tooltip = js_string(MARKER_TOOLTIP),
            controls = control_entries.join(", "),
        )
    }
}

/// Coordinates outside the finite range are pinned to 0 so the script
/// still parses.
fn js_number(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        "0".to_string()
    }
}

/// Quotes `s` as a JavaScript string literal that is also safe inside a
/// `<script>` element.
fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_is_centered_on_coordinates() {
        let html = MapView::new(37.88, -122.23, "Estimated price: $452,600.00").to_html();
        assert!(html.contains("setView([37.88, -122.23], 12)"));
        assert!(html.contains("L.marker([37.88, -122.23])"));
        assert!(html.contains("Estimated price: $452,600.00"));
        assert!(html.contains(r#".bindTooltip("Predicted location")"#));
    }

    #[test]
    fn every_base_layer_is_toggleable() {
        let html = MapView::new(0.0, 0.0, "x").to_html();
        assert!(html.contains("L.control.layers("));
        for layer in BASE_LAYERS {
            assert!(html.contains(&format!("\"{}\": layer", layer.name)));
        }
        assert!(html.contains("mt1.google.com/vt/lyrs=m"));
        assert!(html.contains("World_Imagery"));
    }

    #[test]
    fn popup_text_cannot_break_out_of_the_script() {
        let html = MapView::new(1.0, 2.0, "</script><b>\"hi\"</b>").to_html();
        assert!(!html.contains("</script><b>"));
        assert!(html.contains("&quot;hi&quot;"));
    }

    #[test]
    fn each_render_gets_its_own_element() {
        let view = MapView::new(1.0, 2.0, "a");
        let (a, b) = (view.to_html(), view.to_html());
        let id = |html: &str| html.split("id=\"").nth(1).unwrap().split('"').next().unwrap().to_string();
        assert_ne!(id(&a), id(&b));
    }

    #[test]
    fn non_finite_coordinates_still_render() {
        let html = MapView::new(f64::NAN, f64::INFINITY, "a").to_html();
        assert!(html.contains("setView([0, 0], 12)"));
    }
}
