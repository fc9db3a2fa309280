//! Server-rendered HTML pages.

use crate::store::Record;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<nav><a href=\"/\">Home</a> | <a href=\"/register\">Register</a> | <a href=\"/login\">Login</a> | <a href=\"/history\">History</a></nav>\n{body}\n</body>\n</html>\n",
        title = escape(title),
    )
}

pub fn index() -> String {
    layout(
        "Image classification",
        "<h1>Image classification</h1>\n\
         <form action=\"/predict\" method=\"post\" enctype=\"multipart/form-data\">\n\
         <input type=\"file\" name=\"image\" accept=\"image/*\">\n\
         <button type=\"submit\">Predict</button>\n\
         </form>",
    )
}

fn credentials_form(title: &str, action: &str) -> String {
    layout(
        title,
        &format!(
            "<h1>{title}</h1>\n\
             <form action=\"{action}\" method=\"post\">\n\
             <label>Name <input type=\"text\" name=\"name\"></label>\n\
             <label>Password <input type=\"password\" name=\"password\"></label>\n\
             <button type=\"submit\">{title}</button>\n\
             </form>"
        ),
    )
}

pub fn register() -> String { credentials_form("Register", "/register") }

pub fn login() -> String { credentials_form("Login", "/login") }

pub fn history(records: &[Record]) -> String {
    let rows: String = records
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.4}</td></tr>\n",
                r.id,
                escape(&r.model),
                escape(&r.label),
                r.probability
            )
        })
        .collect();
    layout(
        "Prediction history",
        &format!(
            "<h1>Prediction history</h1>\n<table>\n<tr><th>ID</th><th>Model</th><th>Label</th><th>Probability</th></tr>\n{rows}</table>"
        ),
    )
}
