//! Server-rendered pages. Small enough that plain formatted strings beat a
//! template engine; every user-supplied value goes through [`escape`].

use time::macros::format_description;

use crate::analysis::dto::AnalysisReport;
use crate::analysis::repo::HistoryRecord;
use crate::inference::Category;
use crate::narrative::Narrative;

fn escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            c => c.to_string(),
        })
        .collect()
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title} - AuraLens</title>\n</head>\n<body>\n\
<nav><a href=\"/\">Home</a> <a href=\"/dashboard\">Dashboard</a> \
<a href=\"/history\">History</a> <a href=\"/documentation\">Documentation</a> \
<a href=\"/logout\">Logout</a></nav>\n{body}\n</body>\n</html>\n"
    )
}

fn flash_block(flash: Option<&str>) -> String {
    match flash {
        Some(msg) => format!("<p class=\"flash\">{}</p>\n", escape(msg)),
        None => String::new(),
    }
}

pub fn login_page(flash: Option<&str>) -> String {
    let flash = flash_block(flash);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">\
<title>Login - AuraLens</title></head>\n<body>\n<h1>Login</h1>\n{flash}\
<form method=\"post\" action=\"/login\">\n\
<input type=\"email\" name=\"email\" placeholder=\"Email\" required>\n\
<input type=\"password\" name=\"password\" placeholder=\"Password\" required>\n\
<button type=\"submit\">Login</button>\n</form>\n\
<p>New here? <a href=\"/register\">Register</a></p>\n</body>\n</html>\n"
    )
}

pub fn register_page(flash: Option<&str>) -> String {
    let flash = flash_block(flash);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\">\
<title>Register - AuraLens</title></head>\n<body>\n<h1>Register</h1>\n{flash}\
<form method=\"post\" action=\"/register\">\n\
<input type=\"text\" name=\"name\" placeholder=\"Name\" required>\n\
<input type=\"email\" name=\"email\" placeholder=\"Email\" required>\n\
<input type=\"password\" name=\"password\" placeholder=\"Password\" required>\n\
<button type=\"submit\">Register</button>\n</form>\n\
<p>Already registered? <a href=\"/login\">Login</a></p>\n</body>\n</html>\n"
    )
}

pub fn index_page(user_name: &str) -> String {
    layout(
        "Home",
        &format!(
            "<h1>Welcome, {}</h1>\n<p>Upload a scan from the <a href=\"/dashboard\">dashboard</a> \
to get an analysis.</p>",
            escape(user_name)
        ),
    )
}

pub fn dashboard_page() -> String {
    let options: String = Category::ALL
        .iter()
        .map(|c| {
            format!(
                "<option value=\"{v}\">{v}</option>\n",
                v = c.as_str()
            )
        })
        .collect();
    layout(
        "Dashboard",
        &format!(
            "<h1>Analyze a scan</h1>\n\
<form method=\"post\" action=\"/predict\" enctype=\"multipart/form-data\">\n\
<select name=\"category\" required>\n{options}</select>\n\
<input type=\"file\" name=\"file\" accept=\"image/*\" required>\n\
<button type=\"submit\">Analyze</button>\n</form>"
        ),
    )
}

fn format_date(record: &HistoryRecord) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]");
    record
        .created_at
        .format(&fmt)
        .unwrap_or_else(|_| record.created_at.to_string())
}

pub fn documentation_page(record: Option<&HistoryRecord>, user_name: &str) -> String {
    let body = match record {
        Some(r) => format!(
            "<h1>Latest report for {}</h1>\n<ul>\n\
<li>Category: {}</li>\n<li>Status: {}</li>\n<li>Confidence: {}</li>\n<li>Date: {}</li>\n</ul>",
            escape(user_name),
            escape(&r.category),
            escape(&r.status),
            escape(&r.confidence),
            format_date(r),
        ),
        None => format!(
            "<h1>Latest report for {}</h1>\n<p>No analyses yet.</p>",
            escape(user_name)
        ),
    };
    layout("Documentation", &body)
}

pub fn history_page(records: &[HistoryRecord], user_name: &str) -> String {
    let rows: String = records
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&r.category),
                escape(&r.status),
                escape(&r.confidence),
                format_date(r),
            )
        })
        .collect();
    layout(
        "History",
        &format!(
            "<h1>Analysis history for {}</h1>\n<table>\n\
<tr><th>Category</th><th>Status</th><th>Confidence</th><th>Date</th></tr>\n{rows}</table>",
            escape(user_name)
        ),
    )
}

pub fn result_page(report: &AnalysisReport) -> String {
    let narrative = match &report.narrative {
        Narrative::Generated(text) => {
            format!("<pre class=\"narrative\">{}</pre>", escape(text))
        }
        Narrative::Failed(message) => format!(
            "<p class=\"narrative-error\">Analysis Error: {}</p>",
            escape(message)
        ),
    };
    let audio = match &report.audio_file {
        Some(f) => format!(
            "<audio controls src=\"/uploads/{}\"></audio>\n",
            escape(f)
        ),
        None => String::new(),
    };
    layout(
        "Result",
        &format!(
            "<h1>{}</h1>\n<p>Confidence: {}</p>\n\
<img src=\"/uploads/{}\" alt=\"uploaded scan\">\n{narrative}\n{audio}",
            escape(&report.label),
            crate::inference::format_confidence(report.confidence),
            escape(&report.image_file),
        ),
    )
}
