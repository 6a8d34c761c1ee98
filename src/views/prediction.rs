use crate::features::{FEATURE_NAMES, NUM_FEATURES};
use crate::map::{escape_html, MapView};
use crate::predict::Prediction;

use super::layout::{error_box, info_box, page, Page};

/// Whether the model could be acquired for this request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStatus {
    Ready,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Estimate(Prediction),
    InvalidInput(String),
}

/// Everything the prediction page shows for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionView {
    pub status: ModelStatus,
    /// Text to place back into each input, in schema order.
    pub inputs: [String; NUM_FEATURES],
    /// `None` until the form has been submitted.
    pub outcome: Option<Outcome>,
}

impl PredictionView {
    pub fn new(status: ModelStatus) -> Self {
        Self {
            status,
            inputs: Default::default(),
            outcome: None,
        }
    }
}

fn sidebar(view: &PredictionView) -> String {
    let mut html = String::from(
        "<h3>Input values</h3>\n<form method=\"post\" action=\"/predict\" novalidate>\n",
    );
    for (name, value) in FEATURE_NAMES.iter().zip(&view.inputs) {
        html.push_str(&format!(
            "<label for=\"{name}\">Enter a value for {name}</label>\n\
             <input type=\"number\" step=\"0.1\" placeholder=\"0.0000\" id=\"{name}\" name=\"{name}\" value=\"{value}\">\n",
            name = name,
            value = escape_html(value),
        ));
    }
    let disabled = match view.status {
        ModelStatus::Ready => "",
        ModelStatus::Unavailable(_) => " disabled",
    };
    html.push_str(&format!(
        "<button type=\"submit\"{}>Run prediction</button>\n</form>",
        disabled
    ));
    html
}

fn result_section(prediction: &Prediction) -> String {
    let map = MapView::new(
        prediction.latitude,
        prediction.longitude,
        format!("Estimated price: {}", prediction.formatted),
    );
    format!(
        r#"<h2>Prediction result</h2>
<div class="metric-label">Estimated house price</div>
<div class="metric-value">{price}</div>
<hr>
<h2>Location</h2>
{map}"#,
        price = escape_html(&prediction.formatted),
        map = map.to_html(),
    )
}

pub fn render(view: &PredictionView) -> String {
    let content = match (&view.status, &view.outcome) {
        (ModelStatus::Unavailable(reason), _) => error_box(&format!(
            "The prediction model is unavailable, so predictions are disabled: {}",
            reason
        )),
        (ModelStatus::Ready, None) => {
            info_box("Enter values in the sidebar and press \"Run prediction\".")
        }
        (ModelStatus::Ready, Some(Outcome::InvalidInput(message))) => error_box(message),
        (ModelStatus::Ready, Some(Outcome::Estimate(prediction))) => result_section(prediction),
    };

    let body = format!("<h1>House Price Prediction</h1>\n<hr>\n{}", content);
    page("House Price Prediction", Page::Predict, &sidebar(view), &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::HousingFeatures;

    #[test]
    fn form_has_one_input_per_feature() {
        let html = render(&PredictionView::new(ModelStatus::Ready));
        for name in FEATURE_NAMES {
            assert!(html.contains(&format!("name=\"{}\"", name)));
        }
        assert!(html.contains("press \"Run prediction\"") || html.contains("press &quot;Run prediction&quot;"));
        assert!(!html.contains(" disabled>"));
    }

    #[test]
    fn unavailable_model_disables_the_button() {
        let view = PredictionView::new(ModelStatus::Unavailable("download failed".to_string()));
        let html = render(&view);
        assert!(html.contains("<button type=\"submit\" disabled>"));
        assert!(html.contains("download failed"));
        assert!(!html.contains("Prediction result"));
    }

    #[test]
    fn estimate_shows_price_and_map() {
        let features = HousingFeatures {
            latitude: 37.88,
            longitude: -122.23,
            ..Default::default()
        };
        let mut view = PredictionView::new(ModelStatus::Ready);
        view.outcome = Some(Outcome::Estimate(Prediction::from_raw(4.526, &features)));
        view.inputs[6] = "37.88".to_string();

        let html = render(&view);
        assert!(html.contains("$452,600.00"));
        assert!(html.contains("setView([37.88, -122.23], 12)"));
        assert!(html.contains("value=\"37.88\""));
    }
}
