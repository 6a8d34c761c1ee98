use crate::map::escape_html;

/// The views reachable from the sidebar menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Explore,
    Predict,
}

impl Page {
    pub const ALL: [Page; 3] = [Page::Home, Page::Explore, Page::Predict];

    pub fn path(self) -> &'static str {
        match self {
            Page::Home => "/",
            Page::Explore => "/explore",
            Page::Predict => "/predict",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Page::Home => "Home",
            Page::Explore => "Data exploration",
            Page::Predict => "Price prediction",
        }
    }
}

const STYLE: &str = r#"
body { margin: 0; font-family: sans-serif; color: #262730; }
.app { display: flex; min-height: 100vh; }
.sidebar { width: 280px; background: #f0f2f6; padding: 1.5rem 1rem; box-sizing: border-box; }
.sidebar nav a { display: block; padding: .4rem .6rem; border-radius: 4px; color: inherit; text-decoration: none; }
.sidebar nav a.active { background: #dfe3eb; font-weight: bold; }
.sidebar label { display: block; margin-top: .8rem; font-size: .9rem; }
.sidebar input, .sidebar select { width: 100%; box-sizing: border-box; padding: .3rem; }
.sidebar button { margin-top: 1rem; width: 100%; padding: .5rem; }
main { flex: 1; padding: 2rem 3rem; max-width: 1200px; }
.columns { display: flex; gap: 2rem; flex-wrap: wrap; }
.info { background: #e8f0fe; border-radius: 4px; padding: .8rem 1rem; }
.error { background: #fde8e8; border-radius: 4px; padding: .8rem 1rem; }
.metric-label { font-size: .9rem; color: #555; }
.metric-value { font-size: 2.2rem; }
table { border-collapse: collapse; font-size: .85rem; }
td, th { border: 1px solid #ddd; padding: .25rem .5rem; text-align: right; }
"#;

/// Wraps view content in the shared page shell with the sidebar menu.
pub fn page(title: &str, active: Page, sidebar: &str, body: &str) -> String {
    let mut nav = String::new();
    for p in Page::ALL {
        let class = if p == active { " class=\"active\"" } else { "" };
        nav.push_str(&format!(
            "<a href=\"{}\"{}>{}</a>\n",
            p.path(),
            class,
            p.label()
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<div class="app">
<aside class="sidebar">
<nav>
{nav}</nav>
<hr>
{sidebar}
</aside>
<main>
{body}
</main>
</div>
</body>
</html>
"#,
        title = escape_html(title),
        style = STYLE,
        nav = nav,
        sidebar = sidebar,
        body = body,
    )
}

pub fn info_box(message: &str) -> String {
    format!("<div class=\"info\">{}</div>", escape_html(message))
}

pub fn error_box(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape_html(message))
}

/// Error page used when a view cannot be rendered at all.
pub fn error_page(active: Page, message: &str) -> String {
    page("Error", active, "", &error_box(message))
}

/// Renders a numeric table with a header row and a label column.
pub fn table(header: &[&str], rows: &[(String, Vec<f64>)], decimals: usize) -> String {
    let mut html = String::from("<table>\n<tr><th></th>");
    for h in header {
        html.push_str(&format!("<th>{}</th>", escape_html(h)));
    }
    html.push_str("</tr>\n");
    for (label, values) in rows {
        html.push_str(&format!("<tr><th>{}</th>", escape_html(label)));
        for v in values {
            html.push_str(&format!("<td>{:.*}</td>", decimals, v));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>");
    html
}
