//! Server-rendered HTML for the task list.
//!
//! All user-supplied text passes through [`escape_html`] before it is
//! written into the page.

use std::fmt::Write as _;

use tasklist_proto::task::Task;

/// Everything the index page shows.
#[derive(Debug, Default)]
pub struct IndexPage<'a> {
    /// Tasks, already ordered newest first.
    pub tasks: &'a [Task],
    /// Message carried over from a failed action.
    pub flash: Option<&'a str>,
    /// Set when the listing itself failed.
    pub storage_error: Option<&'a str>,
}

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;max-width:40rem;margin:2rem auto;padding:0 1rem;color:#222}\
h1{font-size:1.6rem}\
.banner{padding:.6rem .8rem;border-radius:4px;margin-bottom:1rem;background:#fde8e8;color:#8a1c1c}\
form.add{display:flex;gap:.5rem;margin-bottom:1.5rem}\
form.add input{flex:1;padding:.4rem}\
ul{list-style:none;padding:0}\
li{padding:.5rem 0;border-bottom:1px solid #eee}\
li .row{display:flex;align-items:center;gap:.5rem}\
li .content{flex:1}\
li.done .content{color:#999;text-decoration:line-through}\
a.toggle{text-decoration:none;font-family:monospace}\
form.inline{display:inline;margin:0}\
.tip{font-size:.9rem;color:#555;margin:.3rem 0 0 2.2rem}\
.empty{color:#777}";

const SCRIPT: &str = "\
document.querySelectorAll('button.tip-button').forEach(function(b){\
b.addEventListener('click',function(){\
var out=document.getElementById('tip-'+b.dataset.id);\
out.textContent='Thinking\u{2026}';\
fetch('/suggest/'+encodeURIComponent(b.dataset.id))\
.then(function(r){return r.json();})\
.then(function(j){out.textContent=j.suggestion||j.error||'No tip available.';})\
.catch(function(){out.textContent='Could not reach the server.';});\
});});";

/// Renders the full index page.
#[must_use]
pub fn render_index(page: &IndexPage<'_>) -> String {
    let mut html = String::with_capacity(2048 + page.tasks.len() * 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Tasks</title>\n<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n<h1>Tasks</h1>\n");

    // A flash repeating the storage banner is shown once.
    let flash = page.flash.filter(|f| Some(*f) != page.storage_error);
    for message in [page.storage_error, flash].into_iter().flatten() {
        let _ = writeln!(
            html,
            "<div class=\"banner\" role=\"alert\">{}</div>",
            escape_html(message)
        );
    }

    html.push_str(
        "<form class=\"add\" method=\"post\" action=\"/\">\
         <input type=\"text\" name=\"content\" placeholder=\"What needs doing?\" \
         required autofocus>\
         <button type=\"submit\">Add</button></form>\n",
    );

    if page.tasks.is_empty() {
        html.push_str("<p class=\"empty\">No tasks yet.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for task in page.tasks {
            render_task(&mut html, task);
        }
        html.push_str("</ul>\n");
    }

    html.push_str("<script>");
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

fn render_task(html: &mut String, task: &Task) {
    let id = escape_html(task.id.as_str());
    let (class, checkbox, label) = if task.completed {
        (" class=\"done\"", "[\u{2713}]", "Mark as not done")
    } else {
        ("", "[ ]", "Mark as done")
    };
    let _ = writeln!(
        html,
        "<li{class}><div class=\"row\">\
         <a class=\"toggle\" href=\"/toggle/{id}\" title=\"{label}\">{checkbox}</a>\
         <span class=\"content\">{content}</span>\
         <button type=\"button\" class=\"tip-button\" data-id=\"{id}\">Tip</button>\
         <form class=\"inline\" method=\"post\" action=\"/delete/{id}\">\
         <button type=\"submit\">Delete</button></form>\
         </div><div class=\"tip\" id=\"tip-{id}\" aria-live=\"polite\"></div></li>",
        content = escape_html(&task.content),
    );
}

/// Escapes text for use in HTML element content and quoted attributes.
#[must_use]
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
