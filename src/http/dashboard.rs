//! Dashboard view: summary counts, patient table and an add form.

use std::fmt::Write;

use crate::application::NutritionSummary;
use crate::domain::nutrition::format_decimal;
use crate::domain::{AssessmentRecord, NutritionStatus};

const STYLE: &str = "body{font-family:sans-serif;margin:2rem;color:#1f2937}\
table{border-collapse:collapse;width:100%;margin-top:1rem}\
th,td{border:1px solid #e5e7eb;padding:.4rem .6rem;text-align:left}\
th{background:#f3f4f6}\
.cards{display:flex;gap:1rem}\
.card{border:1px solid #e5e7eb;border-radius:6px;padding:.8rem 1.2rem}\
.badge{color:#fff;border-radius:4px;padding:.1rem .4rem}\
form{display:flex;gap:.5rem;flex-wrap:wrap;margin-top:1.5rem}";

/// Render the full dashboard page.
pub fn render(records: &[AssessmentRecord], summary: &NutritionSummary) -> String {
    let mut html = String::with_capacity(2048 + records.len() * 256);
    html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>NutriCare Dashboard</title><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body><h1>NutriCare Dashboard</h1>");

    render_summary(&mut html, summary);
    render_table(&mut html, records);
    render_form(&mut html);

    html.push_str("</body></html>");
    html
}

fn render_summary(html: &mut String, summary: &NutritionSummary) {
    html.push_str("<div class=\"cards\">");
    let _ = write!(html, "<div class=\"card\"><strong>Total</strong><br>{}</div>", summary.total);
    for (status, count) in [
        (NutritionStatus::Sam, summary.sam),
        (NutritionStatus::Mam, summary.mam),
        (NutritionStatus::Normal, summary.normal),
    ] {
        let _ = write!(
            html,
            "<div class=\"card\">{}<br>{} ({:.1}%)</div>",
            badge(status),
            count,
            summary.percent(count)
        );
    }
    html.push_str("</div>");
}

fn render_table(html: &mut String, records: &[AssessmentRecord]) {
    if records.is_empty() {
        html.push_str("<p>No patients recorded yet.</p>");
        return;
    }

    html.push_str(
        "<table><thead><tr><th>ID</th><th>Name</th><th>Age</th><th>Weight (kg)</th>\
<th>Height (cm)</th><th>MUAC (mm)</th><th>BMI</th><th>Build</th><th>Nutrition</th>\
<th>Recommendation</th></tr></thead><tbody>",
    );
    for record in records {
        let a = &record.assessment;
        let input = a.input();
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            record.id,
            escape_html(&input.name),
            input.age_years,
            format_decimal(input.weight_kg),
            format_decimal(input.height_cm),
            format_decimal(input.muac_mm),
            format_decimal(a.bmi()),
            a.build(),
            badge(a.nutrition_status()),
            escape_html(a.recommendation()),
        );
    }
    html.push_str("</tbody></table>");
}

fn render_form(html: &mut String) {
    html.push_str(
        "<h2>Add patient</h2><form method=\"post\" action=\"/dashboard/add\">\
<input name=\"name\" placeholder=\"Name\" required>\
<input name=\"age\" type=\"number\" min=\"0\" step=\"1\" placeholder=\"Age (years)\" required>\
<input name=\"weight_kg\" type=\"number\" min=\"0\" step=\"any\" placeholder=\"Weight (kg)\" required>\
<input name=\"height_cm\" type=\"number\" min=\"0\" step=\"any\" placeholder=\"Height (cm)\" required>\
<input name=\"muac_mm\" type=\"number\" min=\"0\" step=\"any\" placeholder=\"MUAC (mm)\" required>\
<button type=\"submit\">Add</button></form>\
<p><a href=\"/export\">Download CSV</a></p>",
    );
}

fn badge(status: NutritionStatus) -> String {
    let (r, g, b) = status.color();
    format!(
        "<span class=\"badge\" style=\"background:#{r:02X}{g:02X}{b:02X}\">{}</span>",
        status.description()
    )
}

/// Escape text for HTML element and attribute content.
fn escape_html(text: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Assessment, PatientInput};

    fn record(id: i64, name: &str, muac_mm: f64) -> AssessmentRecord {
        AssessmentRecord {
            id,
            assessment: Assessment::from_input(PatientInput {
                name: name.to_string(),
                age_years: 3,
                weight_kg: 15.0,
                height_cm: 100.0,
                muac_mm,
            })
            .expect("Should classify"),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_render_escapes_names() {
        let records = vec![record(1, "<script>alert(1)</script>", 110.0)];
        let summary = NutritionSummary::from_records(&records);
        let html = render(&records, &summary);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("SAM (Severe Acute Malnutrition)"));
        assert!(html.contains("#F43F5E"));
    }

    #[test]
    fn test_render_empty() {
        let html = render(&[], &NutritionSummary::default());
        assert!(html.contains("No patients recorded yet."));
        assert!(html.contains("0 (0.0%)"));
    }
}
