//! Embedded web UI.
//!
//! The page template is compiled into the binary and filled with the
//! field catalog once at startup.

use crate::models::{FieldInfo, Table, DISEASE_INFO, LAB_INFO, SYMPTOM_INFO, VITAL_INFO};
use std::fmt::Write;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Render the home page from the field and disease catalogs
pub fn render_home() -> String {
    INDEX_HTML
        .replace("{{version}}", env!("CARGO_PKG_VERSION"))
        .replace("{{symptom_cards}}", &symptom_cards(&SYMPTOM_INFO))
        .replace("{{vital_inputs}}", &field_inputs(&VITAL_INFO))
        .replace("{{lab_inputs}}", &field_inputs(&LAB_INFO))
        .replace("{{disease_legend}}", &disease_legend())
}

fn symptom_cards(table: &Table<FieldInfo>) -> String {
    let mut html = String::new();
    for (key, info) in table.iter() {
        let min = info.min.unwrap_or(0);
        let max = info.max.unwrap_or(3);
        let _ = write!(
            html,
            r#"<div class="symptom-card" title="{desc}">
  <label for="{key}">{emoji} {name}</label>
  <input type="range" class="symptom-slider" id="{key}" name="{key}" min="{min}" max="{max}" step="1" value="0">
  <span class="slider-value" id="{key}Value">0</span>
</div>
"#,
            key = escape(key),
            name = escape(info.name),
            emoji = info.emoji,
            desc = escape(info.description),
            min = min,
            max = max,
        );
    }
    html
}

fn field_inputs(table: &Table<FieldInfo>) -> String {
    let mut html = String::new();
    for (key, info) in table.iter() {
        let key = escape(key);
        let _ = writeln!(
            html,
            r#"<div class="field" title="{}">
  <label for="{}">{} {}</label>"#,
            escape(info.description),
            key,
            info.emoji,
            escape(info.name)
        );

        match (&info.options, info.min, info.max) {
            (Some(options), _, _) => {
                let first = options.first().copied().unwrap_or_default();
                let _ = writeln!(
                    html,
                    r#"  <input type="hidden" id="{key}" name="{key}" value="{}">"#,
                    escape(first)
                );
                for option in options {
                    let active = if *option == first { " active" } else { "" };
                    let _ = writeln!(
                        html,
                        r#"  <button type="button" class="gender-btn{active}" data-value="{0}">{0}</button>"#,
                        escape(option)
                    );
                }
            }
            (None, Some(min), Some(max)) => {
                let mid = (min + max) / 2;
                let _ = writeln!(
                    html,
                    r#"  <input type="range" class="slider" id="{key}Slider" data-target="{key}" min="{min}" max="{max}" value="{mid}">
  <input type="number" id="{key}" name="{key}" min="{min}" max="{max}" step="any" value="{mid}">"#
                );
            }
            _ => {
                let _ = writeln!(
                    html,
                    r#"  <input type="number" id="{key}" name="{key}" step="any">"#
                );
            }
        }

        html.push_str("</div>\n");
    }
    html
}

fn disease_legend() -> String {
    let mut html = String::new();
    for (label, info) in DISEASE_INFO.iter() {
        let _ = writeln!(
            html,
            r#"<li class="disease-item" style="border-left-color: {}"><span>{}</span> <strong>{}</strong> <small>{}</small></li>"#,
            escape(info.color),
            info.emoji,
            escape(label),
            escape(info.description)
        );
    }
    html
}

/// Minimal HTML escaping for text and attribute values
fn escape(text: &str) -> String {
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
