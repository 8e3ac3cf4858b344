use std::borrow::Cow;

use axum::extract::Query;
use axum::http::Uri;

use crate::server::api::{self, ApiError, QueryParams};
use crate::server::ServerContext;

pub struct HttpResponse {
    pub status_code: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn ok(content_type: &'static str, body: String) -> Self {
        HttpResponse {
            status_code: 200,
            content_type,
            body,
        }
    }
}

/// Dispatch one request. `path` is the request target and may carry a query string.
pub fn route_request(ctx: &ServerContext, method: &str, path: &str, body: &str) -> HttpResponse {
    let uri = match path.parse::<Uri>() {
        Ok(uri) => uri,
        Err(err) => {
            return error_response(&ApiError::BadRequest(format!(
                "Invalid request target: {err}"
            )))
        }
    };
    let query = match Query::<QueryParams>::try_from_uri(&uri) {
        Ok(Query(params)) => params,
        Err(rejection) => return error_response(&ApiError::BadRequest(rejection.body_text())),
    };
    let config = &ctx.config;

    match (method, uri.path()) {
        ("GET", "/") => HttpResponse::ok("text/html; charset=utf-8", index_html()),
        ("GET", "/api/health") => json_response(api::health_payload(config)),
        ("GET", "/api/entries") => json_response(api::entries_payload(config, &query)),
        ("GET", "/api/producers") => json_response(api::producers_payload(config)),
        ("POST", "/api/detect") => json_response(api::detect_payload(body)),
        ("POST", "/api/infer") => json_response(api::infer_payload(body)),
        ("POST", "/api/records") => json_response(api::save_payload(config, body)),
        ("GET", route) if route.starts_with("/api/records/") => {
            let segments: Vec<String> = route
                .trim_start_matches("/api/records/")
                .split('/')
                .map(decode_segment)
                .collect();
            match segments.as_slice() {
                [producer, table_name] => {
                    json_response(api::record_payload(config, producer, table_name))
                }
                [producer, table_name, action] if action == "export" => {
                    match api::export_payload(config, producer, table_name, &query) {
                        Ok((format, payload)) => HttpResponse::ok(format.content_type(), payload),
                        Err(err) => error_response(&err),
                    }
                }
                _ => not_found(),
            }
        }
        _ => not_found(),
    }
}

/// Path segments are percent-decoded; invalid UTF-8 is replaced rather than rejected.
fn decode_segment(segment: &str) -> String {
    match urlencoding::decode_binary(segment.as_bytes()) {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Cow::Owned(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

fn json_response(result: Result<String, ApiError>) -> HttpResponse {
    match result {
        Ok(payload) => HttpResponse::ok("application/json", payload),
        Err(err) => error_response(&err),
    }
}

fn not_found() -> HttpResponse {
    error_response(&ApiError::NotFound("Route not found".to_string()))
}

fn error_response(err: &ApiError) -> HttpResponse {
    HttpResponse {
        status_code: err.status_code(),
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(err.message()).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}

fn index_html() -> String {
    r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Metadata catalog</title>
  <style>
    body { font-family: Arial, sans-serif; max-width: 900px; margin: 24px auto; padding: 0 12px; }
    .card { border: 1px solid #ddd; border-radius: 8px; padding: 14px; margin: 14px 0; }
    label { display:block; margin: 8px 0 4px; font-weight: 600; }
    input, select { width: 100%; padding: 8px; box-sizing: border-box; }
    button { margin-top: 12px; padding: 8px 14px; }
    pre { background: #111; color: #aef2ae; padding: 12px; overflow: auto; border-radius: 6px; min-height: 180px; }
  </style>
</head>
<body>
  <h1>Metadata catalog</h1>
  <div class="card">
    <label for="keyword">Keyword</label>
    <input id="keyword" />
    <label for="producer">Producer</label>
    <select id="producer"><option>All</option></select>
    <button id="search-btn">Search</button>
  </div>
  <pre id="output">Ready.</pre>
  <script>
    const output = document.getElementById('output');
    const producerEl = document.getElementById('producer');
    fetch('/api/producers').then(r => r.json()).then(data => {
      producerEl.innerHTML = '';
      data.producers.forEach(p => {
        const opt = document.createElement('option');
        opt.textContent = p;
        producerEl.appendChild(opt);
      });
    });
    document.getElementById('search-btn').addEventListener('click', async () => {
      const keyword = document.getElementById('keyword').value;
      const url = '/api/entries?keyword=' + encodeURIComponent(keyword) + '&producer=' + encodeURIComponent(producerEl.value);
      const response = await fetch(url);
      output.textContent = 'HTTP ' + response.status + '\n' + await response.text();
    });
  </script>
</body>
</html>
"#
    .to_string()
}
