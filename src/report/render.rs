//! HTML and plain-text rendering of report events

use super::event::ReportEvent;
use super::TASK_SLUG;

const EDIT_ICON: &str = "✏️";
const VIEW_ICON: &str = "🔗";
const NO_ID: &str = "(no ID)";

/// Output flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Browser context: anchors for links, struck-through placeholders
    Html,
    /// CLI context
    Text,
}

impl Format {
    pub fn render(&self, event: &ReportEvent) -> String {
        match self {
            Format::Html => render_html(event),
            Format::Text => render_text(event),
        }
    }
}

fn render_html(event: &ReportEvent) -> String {
    match event {
        ReportEvent::Cutoff { cutoff } => format!("<h2>Using date: {}</h2>", escape(cutoff)),
        ReportEvent::TypeHeader { type_name, cutoff } => format!(
            "<strong>DataObjects of class {} changed since {}</strong>",
            escape(type_name),
            escape(cutoff)
        ),
        ReportEvent::Instance(record) => {
            let edit = html_link(record.cms_edit_link.as_deref(), EDIT_ICON);
            let view = html_link(record.link.as_deref(), VIEW_ICON);
            format!(
                " -- {} {} <strong>ID:</strong> {}, <strong>Title:</strong> {}, <strong>LastEdited:</strong> {}",
                edit,
                view,
                escape(&record.id),
                escape(&record.title),
                escape(&record.last_edited)
            )
        }
        ReportEvent::Separator => "---".to_string(),
        ReportEvent::TableHeader {
            table,
            count,
            cutoff,
        } => format!(
            "<strong>Table {} has {} record(s) updated since {}</strong>",
            escape(table),
            count,
            escape(cutoff)
        ),
        ReportEvent::TableRow { id, last_edited } => format!(
            " -- Record ID: {}, LastEdited: {}",
            escape(id.as_deref().unwrap_or(NO_ID)),
            escape(last_edited)
        ),
        ReportEvent::UntimedHeader => {
            "<h2>Additional tables WITHOUT a LastEdited field:</h2>".to_string()
        }
        ReportEvent::UntimedTable { table } => format!(" - {}", escape(table)),
    }
}

fn render_text(event: &ReportEvent) -> String {
    match event {
        ReportEvent::Cutoff { cutoff } => format!("Using date: {}", cutoff),
        ReportEvent::TypeHeader { type_name, cutoff } => {
            format!("DataObjects of class {} changed since {}", type_name, cutoff)
        }
        ReportEvent::Instance(record) => format!(
            " -- {} {} ID: {}, Title: {}, LastEdited: {}",
            text_link(record.cms_edit_link.as_deref(), "edit"),
            text_link(record.link.as_deref(), "view"),
            record.id,
            record.title,
            record.last_edited
        ),
        ReportEvent::Separator => "---".to_string(),
        ReportEvent::TableHeader {
            table,
            count,
            cutoff,
        } => format!(
            "Table {} has {} record(s) updated since {}",
            table, count, cutoff
        ),
        ReportEvent::TableRow { id, last_edited } => format!(
            " -- Record ID: {}, LastEdited: {}",
            id.as_deref().unwrap_or(NO_ID),
            last_edited
        ),
        ReportEvent::UntimedHeader => "Additional tables WITHOUT a LastEdited field:".to_string(),
        ReportEvent::UntimedTable { table } => format!(" - {}", table),
    }
}

fn site_path(url: &str) -> String {
    format!("/{}", url.trim_start_matches('/'))
}

fn html_link(url: Option<&str>, icon: &str) -> String {
    match url {
        Some(url) => format!("<a href=\"{}\">{}</a>", escape(&site_path(url)), icon),
        None => format!("<del>{}</del>", icon),
    }
}

fn text_link(url: Option<&str>, label: &str) -> String {
    match url {
        Some(url) => format!("[{} {}]", label, site_path(url)),
        None => format!("[no {}]", label),
    }
}

/// Minimal HTML escaping for text and attribute values
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// Form for resubmitting the task with another window
pub fn input_form(days_back: f64) -> String {
    format!(
        concat!(
            "<form method='get' action=''>",
            "<label for='daysBack'>Enter number of days back (e.g. 0.5, 1, 30): </label>",
            "<input type='number' step='0.1' name='daysBack' id='daysBack' value='{}'>",
            "<input type='submit' value='Submit'>",
            "</form>"
        ),
        days_back
    )
}

/// Full HTML page: form, rendered events, and the error that stopped the
/// pass if there was one
pub fn html_page(title: &str, days_back: f64, events: &[ReportEvent], error: Option<&str>) -> String {
    let mut body = String::new();
    body.push_str(&input_form(days_back));
    body.push('\n');
    for event in events {
        body.push_str("<div class=\"message\">");
        body.push_str(&render_html(event));
        body.push_str("</div>\n");
    }
    if let Some(error) = error {
        body.push_str(&format!(
            "<div class=\"message error\"><strong>Task failed:</strong> {}</div>\n",
            escape(error)
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body data-task=\"{slug}\">\n<h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape(title),
        slug = TASK_SLUG,
        body = body
    )
}
