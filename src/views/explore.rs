use serde::Deserialize;

use crate::charts::{self, ChartResult};
use crate::dataset::{HousingDataset, TARGET_NAME};
use crate::features::FEATURE_NAMES;
use crate::map::escape_html;
use crate::stats::{correlation_matrix, Summary, SUMMARY_LABELS};

use super::layout::{page, table, Page};

const PREVIEW_ROWS: usize = 5;

/// X/Y choices from the sidebar dropdowns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExploreQuery {
    pub x: Option<String>,
    pub y: Option<String>,
}

/// Validated dropdown selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub x: &'static str,
    pub y: &'static str,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            x: FEATURE_NAMES[0],
            y: TARGET_NAME,
        }
    }
}

impl Selection {
    /// X must be a feature; Y may be a feature or the target.
    pub fn from_query(query: &ExploreQuery) -> Result<Self, String> {
        let default = Self::default();
        let x = match query.x.as_deref() {
            None | Some("") => default.x,
            Some(name) => FEATURE_NAMES
                .into_iter()
                .find(|&n| n == name)
                .ok_or_else(|| format!("unknown X column {:?}", name))?,
        };
        let y = match query.y.as_deref() {
            None | Some("") => default.y,
            Some(name) => HousingDataset::column_names()
                .find(|&n| n == name)
                .ok_or_else(|| format!("unknown Y column {:?}", name))?,
        };
        Ok(Self { x, y })
    }
}

fn select(name: &str, label: &str, options: &[&str], selected: &str) -> String {
    let mut html = format!("<label for=\"{name}\">{label}</label>\n<select id=\"{name}\" name=\"{name}\">\n");
    for option in options {
        let attr = if *option == selected { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>\n",
            escape_html(option),
            attr
        ));
    }
    html.push_str("</select>\n");
    html
}

fn sidebar(selection: &Selection) -> String {
    let y_options: Vec<&str> = HousingDataset::column_names().collect();
    format!(
        "<h3>Chart options</h3>\n<form method=\"get\" action=\"/explore\">\n{}{}<button type=\"submit\">Update chart</button>\n</form>",
        select("x", "Variable for the X axis", &FEATURE_NAMES, selection.x),
        select("y", "Variable for the Y axis", &y_options, selection.y),
    )
}

fn preview_table(dataset: &HousingDataset) -> String {
    let header: Vec<&str> = HousingDataset::column_names().collect();
    let rows: Vec<(String, Vec<f64>)> = (0..dataset.len().min(PREVIEW_ROWS))
        .map(|i| (i.to_string(), dataset.row(i)))
        .collect();
    table(&header, &rows, 4)
}

fn summary_table(dataset: &HousingDataset) -> String {
    let header: Vec<&str> = HousingDataset::column_names().collect();
    let summaries: Vec<Option<Summary>> = header
        .iter()
        .map(|name| dataset.column(name).and_then(Summary::of))
        .collect();
    let rows: Vec<(String, Vec<f64>)> = SUMMARY_LABELS
        .iter()
        .enumerate()
        .map(|(k, label)| {
            let values = summaries
                .iter()
                .map(|s| s.as_ref().map_or(f64::NAN, |s| s.values()[k]))
                .collect();
            (label.to_string(), values)
        })
        .collect();
    table(&header, &rows, 4)
}

fn column(dataset: &HousingDataset, name: &str) -> Vec<f64> {
    dataset.column(name).map(<[f64]>::to_vec).unwrap_or_default()
}

/// Renders the full exploration page for `selection`.
pub fn render(dataset: &HousingDataset, selection: &Selection) -> ChartResult {
    let target = column(dataset, TARGET_NAME);
    let income = column(dataset, "MedInc");

    let names: Vec<&str> = HousingDataset::column_names().collect();
    let columns: Vec<&[f64]> = names.iter().filter_map(|n| dataset.column(n)).collect();
    let matrix = correlation_matrix(&columns);

    let x_values = column(dataset, selection.x);
    let y_values = column(dataset, selection.y);

    let body = format!(
        r#"<h1>California Housing Data Analysis</h1>
<hr>
<h2>1. Data preview</h2>
{preview}
<h2>2. Summary statistics</h2>
{summary}
<hr>
<h2>3. Static charts</h2>
<div class="columns">
<div><h4>House value distribution (histogram)</h4>{hist}</div>
<div><h4>Median income vs. house value (scatter)</h4>{scatter}</div>
</div>
<h3>Scatter with trend line</h3>
<p>A least-squares line drawn over the same points shows the overall tendency.</p>
{trend}
<hr>
<h2>4. Feature correlations (heatmap)</h2>
{heatmap}
<hr>
<h2>5. Interactive scatter</h2>
{dynamic}"#,
        preview = preview_table(dataset),
        summary = summary_table(dataset),
        hist = charts::histogram_with_kde(&target, "target distribution", TARGET_NAME)?,
        scatter = charts::scatter(&income, &target, "MedInc vs. target", "MedInc", TARGET_NAME, false)?,
        trend = charts::scatter(&income, &target, "MedInc vs. target", "MedInc", TARGET_NAME, true)?,
        heatmap = charts::correlation_heatmap(&names, &matrix)?,
        dynamic = charts::scatter(
            &x_values,
            &y_values,
            &format!("{} vs. {}", selection.x, selection.y),
            selection.x,
            selection.y,
            false,
        )?,
    );

    Ok(page(
        "California Housing Data Analysis",
        Page::Explore,
        &sidebar(selection),
        &body,
    ))
}
