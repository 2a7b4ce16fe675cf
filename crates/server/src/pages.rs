//! HTML pages served by the front end routes.
//!
//! Pages are compiled into the binary. Only the recommender page is
//! rendered per request; it carries the beer dropdown.

use beer_catalog::CHOOSE_A_BEER;

pub const LANDING_PAGE: &str = include_str!("../templates/verification.html");
pub const INDEX_PAGE: &str = include_str!("../templates/index.html");
pub const USER_PREDICT_PAGE: &str = include_str!("../templates/userpredict.html");
pub const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");

const RECOMMENDER_TEMPLATE: &str = include_str!("../templates/knnrecommender.html");
const BEERS_PLACEHOLDER: &str = "{{ beers }}";

/// Render the recommender page with one `<option>` per display name
pub fn render_recommender(names: &[String]) -> String {
    let options: String = names
        .iter()
        .map(|name| {
            let escaped = escape_html(name);
            if name == CHOOSE_A_BEER {
                format!("    <option value=\"\" selected>{}</option>\n", escaped)
            } else {
                format!("    <option value=\"{0}\">{0}</option>\n", escaped)
            }
        })
        .collect();
    RECOMMENDER_TEMPLATE.replace(BEERS_PLACEHOLDER, options.trim_end())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
