//! Dashboard Page
//!
//! A single static page that polls `/status` and `/qr` under the configured
//! base path.

use axum::{extract::State, response::Html};

use crate::startup::AppState;

const TEMPLATE: &str = include_str!("dashboard.html");

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render(&state.settings.http.normalized_base_path()))
}

fn render(base_path: &str) -> String {
    TEMPLATE.replace("{{BASE_PATH}}", base_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_injects_base_path() {
        let page = render("/api");
        assert!(page.contains(r#"const BASE = "/api";"#));
        assert!(!page.contains("{{BASE_PATH}}"));
    }
}
