//! Server-side HTML for the review pages.

use crate::content::{Content, display_role};
use crate::view::{DetailPage, FormValues, ListItem, ListPage, Panels};

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; display: flex; min-height: 100vh; }
nav.sidebar { width: 22rem; border-right: 1px solid #ddd; overflow-y: auto; max-height: 100vh; }
nav.sidebar a.trace-item { display: block; padding: .5rem .75rem; border-bottom: 1px solid #eee; color: inherit; text-decoration: none; }
nav.sidebar a.trace-item.active { background: #e8f0fe; }
nav.sidebar .ts { display: block; font-size: .75rem; color: #666; }
.status { display: inline-block; width: .6rem; height: .6rem; border-radius: 50%; margin-right: .4rem; }
.status-alert { background: #d93025; }
.status-success { background: #188038; }
main { flex: 1; padding: 1rem 1.5rem; overflow-x: hidden; }
aside.error-stats { width: 16rem; border-left: 1px solid #ddd; padding: 1rem; }
aside.error-stats table { width: 100%; border-collapse: collapse; }
aside.error-stats td { padding: .2rem 0; }
aside.error-stats td.count { text-align: right; }
pre { white-space: pre-wrap; word-wrap: break-word; background: #f8f8f8; padding: .75rem; margin: 0; }
details.message { border: 1px solid #ddd; margin-bottom: .5rem; }
details.message summary { cursor: pointer; padding: .4rem .6rem; font-weight: 600; }
.error-banner { background: #fce8e6; color: #a50e0e; padding: .75rem; margin-bottom: 1rem; }
.trace-error { background: #fef7e0; padding: .75rem; margin-bottom: 1rem; }
textarea, input[type=text] { width: 100%; box-sizing: border-box; font: inherit; }
textarea { min-height: 8rem; }
.nav-links a { margin-right: 1rem; }
"#;

const SCRIPT: &str = r#"
function setSections(fieldId, open) {
  document.querySelectorAll('#' + fieldId + ' details.message').forEach(function (d) { d.open = open; });
}
"#;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Body text for `<pre>` and `<textarea>`. Browsers drop one newline right
/// after the opening tag, so a leading newline is doubled to survive.
fn preformatted(text: &str) -> String {
    let escaped = escape_html(text);
    if text.starts_with('\n') {
        format!("\n{escaped}")
    } else {
        escaped
    }
}

fn layout(title: &str, panels: &Panels, main: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n<script>{SCRIPT}</script>\n</head>\n<body>\n\
         {sidebar}\n<main>\n{main}\n</main>\n{stats}\n</body>\n</html>\n",
        title = escape_html(title),
        sidebar = sidebar(&panels.traces),
        stats = error_stats(panels),
    )
}

fn sidebar(items: &[ListItem]) -> String {
    let mut out = String::from("<nav class=\"sidebar\">\n<h2>Traces</h2>\n");
    for item in items {
        let active = if item.active { " active" } else { "" };
        out.push_str(&format!(
            "<a class=\"trace-item{active}\" href=\"/traces/{id}\" data-status=\"{status}\">\
             <span class=\"status status-{status}\"></span>{preview}\
             <span class=\"ts\">{ts}</span></a>\n",
            id = item.id,
            status = item.status.as_str(),
            preview = escape_html(&item.preview),
            ts = escape_html(&item.timestamp),
        ));
    }
    if items.is_empty() {
        out.push_str("<p class=\"empty\">No traces recorded yet.</p>\n");
    }
    out.push_str("</nav>");
    out
}

fn error_stats(panels: &Panels) -> String {
    let mut out = String::from("<aside class=\"error-stats\">\n<h2>Failure modes</h2>\n<table>\n");
    for stat in &panels.error_stats {
        out.push_str(&format!(
            "<tr><td class=\"label\">{}</td><td class=\"count\">{}</td></tr>\n",
            escape_html(&stat.label),
            stat.count
        ));
    }
    out.push_str("</table>\n</aside>");
    out
}

fn content_field(field_id: &str, heading: &str, content: &Content) -> String {
    let mut out = format!("<section class=\"content-field\" id=\"{field_id}\">\n<h3>{heading}</h3>\n");
    match content {
        Content::PlainText(text) => {
            out.push_str(&format!("<pre class=\"plain-text\">{}</pre>\n", preformatted(text)));
        }
        Content::Transcript(messages) => {
            out.push_str(&format!(
                "<div class=\"section-controls\">\
                 <button type=\"button\" onclick=\"setSections('{field_id}', true)\">Expand all</button> \
                 <button type=\"button\" onclick=\"setSections('{field_id}', false)\">Collapse all</button>\
                 </div>\n"
            ));
            for (i, message) in messages.iter().enumerate() {
                out.push_str(&format!(
                    "<details class=\"message\" data-role=\"{role_attr}\" open>\
                     <summary>{role} / Message {n}</summary>\
                     <pre>{body}</pre></details>\n",
                    role_attr = escape_html(&message.role),
                    role = escape_html(&display_role(&message.role)),
                    n = i + 1,
                    body = preformatted(&message.text),
                ));
            }
        }
    }
    out.push_str("</section>\n");
    out
}

pub fn list_page(page: &ListPage) -> String {
    let main = "<h1>Trace review</h1>\n\
                <p>Select a trace from the list to review and annotate it.</p>\n\
                <p class=\"nav-links\"><a href=\"/traces/export\">Export traces (CSV)</a>\
                <a href=\"/traces/export_error_analysis\">Export error analysis (CSV)</a></p>";
    layout("Traces", &page.panels, main)
}

pub fn detail_page(page: &DetailPage) -> String {
    let trace = &page.trace;
    let mut main = format!("<h1>Trace {}</h1>\n<p class=\"nav-links\"><a class=\"back\" href=\"/traces\">Back to list</a>", trace.id);
    if let Some(next) = page.next_trace_id {
        main.push_str(&format!("<a class=\"next\" href=\"/traces/{next}\">Next trace</a>"));
    }
    main.push_str("</p>\n");

    if let Some(message) = &page.save_error {
        main.push_str(&format!(
            "<div class=\"error-banner\" role=\"alert\">Save failed: {}</div>\n",
            escape_html(message)
        ));
    }

    main.push_str(&format!(
        "<dl class=\"trace-meta\"><dt>ID</dt><dd class=\"trace-id\">{}</dd>\
         <dt>Timestamp</dt><dd class=\"trace-timestamp\">{}</dd></dl>\n",
        trace.id,
        escape_html(&trace.timestamp)
    ));

    if let Some(error) = &trace.error
        && !error.is_empty()
    {
        main.push_str(&format!(
            "<div class=\"trace-error\">Chatbot error: {}</div>\n",
            escape_html(error)
        ));
    }

    main.push_str(&content_field("field-user-query", "User query", &page.query));
    main.push_str(&content_field("field-bot-response", "Bot response", &page.response));

    main.push_str(&format!(
        "<form class=\"annotation\" method=\"post\" action=\"/traces/{id}\">\n\
         <label for=\"notes\">Notes</label>\n\
         <textarea id=\"notes\" name=\"notes\">{notes}</textarea>\n\
         <label for=\"failure_modes\">Failure modes (comma-separated)</label>\n\
         <input type=\"text\" id=\"failure_modes\" name=\"failure_modes\" list=\"taxonomy\" value=\"{modes}\">\n",
        id = trace.id,
        notes = preformatted(&page.form.notes),
        modes = escape_html(&page.form.failure_modes),
    ));
    if !page.taxonomy.is_empty() {
        main.push_str("<datalist id=\"taxonomy\">");
        for label in &page.taxonomy {
            main.push_str(&format!("<option value=\"{}\">", escape_html(label)));
        }
        main.push_str("</datalist>\n");
    }
    main.push_str("<button type=\"submit\">Save</button>\n</form>");

    layout(&format!("Trace {}", trace.id), &page.panels, &main)
}

pub fn not_found_page(id: i64) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Not found</title></head>\n\
         <body><h1>Not found</h1><p>Trace {id} does not exist.</p>\
         <p><a href=\"/traces\">Back to list</a></p></body>\n</html>\n"
    )
}

/// Last-resort page when a save failed and the trace can't be reloaded:
/// keeps the submitted text in a form that can be resubmitted.
pub fn save_failed_page(id: i64, form: &FormValues, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Save failed</title></head>\n\
         <body><h1>Trace {id}</h1>\
         <div class=\"error-banner\" role=\"alert\">Save failed: {message}</div>\n\
         <form class=\"annotation\" method=\"post\" action=\"/traces/{id}\">\n\
         <textarea name=\"notes\">{notes}</textarea>\n\
         <input type=\"text\" name=\"failure_modes\" value=\"{modes}\">\n\
         <button type=\"submit\">Retry save</button>\n</form>\
         <p><a href=\"/traces\">Back to list</a></p></body>\n</html>\n",
        message = escape_html(message),
        notes = preformatted(&form.notes),
        modes = escape_html(&form.failure_modes),
    )
}

pub fn error_page(message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Error</title></head>\n\
         <body><h1>Something went wrong</h1><p class=\"error\">{}</p>\
         <p><a href=\"/traces\">Back to list</a></p></body>\n</html>\n",
        escape_html(message)
    )
}
