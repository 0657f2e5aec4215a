use axum::extract::{Path, State};
use axum::response::Html;
use imgup_blob::ObjectId;

use crate::{ApiResult, AppState};

const HEAD: &str = r##"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>imgup</title>
  <style>
    body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 960px; padding: 1rem; }
    .grid { display: grid; grid-template-columns: repeat(3, 1fr); gap: 0.75rem; }
    .grid img { width: 100%; border-radius: 4px; }
    #alert { display: none; border: 1px solid #ccc; padding: 1rem; margin: 1rem 0; border-radius: 4px; }
  </style>
  <script>
    const API_ENDPOINT = "/api";
    function modalAlert(title, body) {
      const box = document.querySelector("#alert");
      box.innerHTML = `<strong>${title}</strong><div>${body}</div>`;
      box.style.display = "block";
    }
  </script>
</head>
<body>
  <h1><a href="/">imgup</a></h1>
  <div id="alert"></div>
"##;

const FOOT: &str = "</body>\n</html>\n";

/// `GET /`
pub async fn index() -> Html<String> {
    Html(format!(
        r#"{HEAD}  <section>
    <input type="file" id="upload-file" accept="image/*">
    <button id="upload-button">Upload</button>
  </section>
  <h2>Recent images</h2>
  <div id="recent-image" class="grid"></div>
  <script src="/static/recent.js"></script>
  <script src="/static/upload.js"></script>
{FOOT}"#
    ))
}

/// `GET /i/{id}`
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Html<String>> {
    let id = ObjectId::parse(id)?;
    let url = state.listing.object_url(&id);
    let (id, url) = (escape(id.as_str()), escape(&url));

    Ok(Html(format!(
        r#"{HEAD}  <figure id="image" data-id="{id}" data-url="{url}">
    <img src="{url}" alt="{id}" style="max-width: 100%;">
    <figcaption><input readonly value="{url}" style="width: 100%;"></figcaption>
  </figure>
  <div id="image-info">Loading...</div>
  <script src="/static/detail.js"></script>
{FOOT}"#
    )))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(escape(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape("abc123"), "abc123");
    }

    #[tokio::test]
    async fn index_keeps_the_alert_script_intact() {
        let Html(page) = index().await;
        assert!(page.contains(r##"document.querySelector("#alert")"##));
        assert!(page.contains("/static/upload.js"));
        assert!(page.trim_end().ends_with("</html>"));
    }
}
