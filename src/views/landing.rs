use super::layout::{info_box, page, Page};

pub fn render() -> String {
    let body = format!(
        r#"<h1>California Housing Price Dashboard</h1>
<hr>
<h2>About</h2>
<p>This dashboard explores the California housing dataset and estimates
median house values from block-group statistics with a random forest
model.</p>
<p><strong>Features:</strong></p>
<ul>
<li><strong>Data exploration:</strong> distributions and relationships between variables.</li>
<li><strong>Price prediction:</strong> estimate a median house value from values you enter.</li>
</ul>
<hr>
{}"#,
        info_box("Use the sidebar menu to move between pages.")
    );
    page("California Housing Price Dashboard", Page::Home, "", &body)
}

#[cfg(test)]
mod tests {
    #[test]
    fn landing_links_every_view() {
        let html = super::render();
        assert!(html.contains("href=\"/explore\""));
        assert!(html.contains("href=\"/predict\""));
        assert!(html.contains("Use the sidebar menu"));
    }
}
