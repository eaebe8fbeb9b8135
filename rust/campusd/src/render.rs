//! Print documents. Each function takes typed models and returns a complete
//! HTML document with inline styles; the shell prints it as-is.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::billing::{BillingRecord, BillingSummary, PaymentStatus};
use crate::models::id_cards::{field_label, CardOrientation, IdCardTemplate};
use crate::models::schools::School;
use crate::validate::parse_date;

const BASE_STYLE: &str = "\
body{font-family:Helvetica,Arial,sans-serif;color:#111827;margin:32px;font-size:13px}\
h1{font-size:22px;margin:0 0 4px}\
.muted{color:#6b7280}\
table{width:100%;border-collapse:collapse;margin-top:16px}\
th,td{text-align:left;padding:8px;border-bottom:1px solid #e5e7eb}\
th{background:#f9fafb;font-weight:600}\
td.num,th.num{text-align:right}\
.badge{display:inline-block;padding:2px 8px;border-radius:9999px;font-size:11px;font-weight:600}\
.paid{background:#dcfce7;color:#166534}\
.unpaid{background:#fef9c3;color:#854d0e}\
.overdue{background:#fee2e2;color:#991b1b}\
.pending{background:#e0e7ff;color:#3730a3}\
.header{display:flex;justify-content:space-between;align-items:flex-start}\
.total{font-size:16px;font-weight:700}\
@media print{body{margin:0}}";

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
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

pub fn format_money(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// `2025-03-01` -> `Mar 1, 2025`; anything unparseable is shown as given.
pub fn format_date(s: &str) -> String {
    match parse_date(s) {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => s.to_string(),
    }
}

fn document(title: &str, extra_style: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>{}{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        BASE_STYLE,
        extra_style,
        body
    )
}

fn status_badge(status: PaymentStatus) -> String {
    format!(
        "<span class=\"badge {}\">{}</span>",
        status.as_str(),
        status.label()
    )
}

fn school_block(school: Option<&School>, fallback_name: Option<&str>) -> String {
    let name = school
        .map(|s| s.name.as_str())
        .or(fallback_name)
        .unwrap_or("School");
    let mut out = format!("<strong>{}</strong>", escape_html(name));
    if let Some(s) = school {
        for line in [&s.address, &s.email, &s.phone].into_iter().flatten() {
            if !line.trim().is_empty() {
                out.push_str(&format!("<br>{}", escape_html(line)));
            }
        }
    }
    out
}

pub fn invoice_html(record: &BillingRecord, school: Option<&School>, issued_on: NaiveDate) -> String {
    let logo = school
        .and_then(|s| s.logo_url.as_deref())
        .filter(|u| !u.trim().is_empty())
        .map(|u| format!("<img src=\"{}\" alt=\"\" style=\"max-height:56px\">", escape_html(u)))
        .unwrap_or_default();
    let plan = record.subscription_plan.as_deref().unwrap_or("Subscription");
    let paid_line = match (&record.payment_date, record.payment_status) {
        (Some(d), PaymentStatus::Paid) => format!(
            "<p class=\"muted\">Paid on {}</p>\n",
            escape_html(&format_date(d))
        ),
        _ => String::new(),
    };

    let body = format!(
        "<div class=\"header\">\n<div>{logo}<h1>Invoice</h1><div class=\"muted\">{number}</div></div>\n<div>{status}</div>\n</div>\n\
<table>\n<tr><th>Bill to</th><th>Issued</th><th>Due</th></tr>\n<tr><td>{bill_to}</td><td>{issued}</td><td>{due}</td></tr>\n</table>\n\
<table>\n<tr><th>Description</th><th>Cycle</th><th class=\"num\">Amount</th></tr>\n\
<tr><td>{plan}</td><td>{cycle}</td><td class=\"num\">{amount}</td></tr>\n\
<tr><td colspan=\"2\" class=\"total\">Total</td><td class=\"num total\">{amount}</td></tr>\n</table>\n{paid_line}",
        logo = logo,
        number = escape_html(&record.invoice_number),
        status = status_badge(record.payment_status),
        bill_to = school_block(school, record.school_name.as_deref()),
        issued = escape_html(&issued_on.format("%b %-d, %Y").to_string()),
        due = escape_html(&format_date(&record.due_date)),
        plan = escape_html(plan),
        cycle = record.billing_cycle.label(),
        amount = format_money(record.amount),
        paid_line = paid_line,
    );
    document(&format!("Invoice {}", record.invoice_number), "", &body)
}

pub fn statement_html(
    title: &str,
    records: &[BillingRecord],
    summary: &BillingSummary,
    period: Option<(&str, &str)>,
) -> String {
    let mut rows = String::new();
    for r in records {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>\n",
            escape_html(&r.invoice_number),
            escape_html(r.school_name.as_deref().unwrap_or("")),
            escape_html(&format_date(&r.due_date)),
            status_badge(r.payment_status),
            format_money(r.amount)
        ));
    }
    if records.is_empty() {
        rows.push_str("<tr><td colspan=\"5\" class=\"muted\">No billing records</td></tr>\n");
    }
    let period_line = period
        .map(|(a, b)| {
            format!(
                "<div class=\"muted\">{} to {}</div>\n",
                escape_html(&format_date(a)),
                escape_html(&format_date(b))
            )
        })
        .unwrap_or_default();

    let body = format!(
        "<h1>{title}</h1>\n{period_line}\
<table>\n<tr><th>Billed</th><th>Collected</th><th>Outstanding</th><th>Collection rate</th></tr>\n\
<tr><td>{billed}</td><td>{collected}</td><td>{outstanding}</td><td>{rate:.1}%</td></tr>\n</table>\n\
<table>\n<tr><th>Invoice</th><th>School</th><th>Due</th><th>Status</th><th class=\"num\">Amount</th></tr>\n{rows}</table>\n",
        title = escape_html(title),
        period_line = period_line,
        billed = format_money(summary.total_billed),
        collected = format_money(summary.total_collected),
        outstanding = format_money(summary.total_outstanding),
        rate = summary.collection_rate,
        rows = rows,
    );
    document(title, "", &body)
}

fn substitute(template: &str, values: &HashMap<String, String>, escape: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                if let Some(v) = values.get(key) {
                    if escape {
                        out.push_str(&escape_html(v));
                    } else {
                        out.push_str(v);
                    }
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Replaces `{{key}}` with the escaped value; unknown keys become empty.
pub fn fill_placeholders(template: &str, values: &HashMap<String, String>) -> String {
    substitute(template, values, true)
}

pub fn id_card_html(template: &IdCardTemplate, school: Option<&School>, values: &HashMap<String, String>) -> String {
    let (w, h) = match template.orientation {
        CardOrientation::Portrait => (204, 324),
        CardOrientation::Landscape => (324, 204),
    };
    let color = template.band_color();
    let style = format!(
        ".card{{width:{w}px;height:{h}px;border:1px solid #d1d5db;border-radius:8px;overflow:hidden;font-size:11px}}\
.card .band{{background:{color};color:#fff;padding:8px;font-weight:700}}\
.card dl{{margin:8px}}.card dt{{color:#6b7280;font-size:9px}}.card dd{{margin:0 0 4px}}\
.card .foot{{padding:0 8px;color:#6b7280;font-size:9px}}"
    );

    let mut values = values.clone();
    if let Some(s) = school {
        values.entry("school_name".into()).or_insert_with(|| s.name.clone());
    }

    let mut markup = String::from("<div class=\"card\">\n<div class=\"band\">{{school_name}}</div>\n<dl>\n");
    for key in &template.fields {
        let Some(label) = field_label(key) else {
            continue;
        };
        markup.push_str(&format!("<dt>{label}</dt><dd>{{{{{key}}}}}</dd>\n"));
    }
    markup.push_str("</dl>\n");
    let mut card = fill_placeholders(&markup, &values);
    // footer text is user-written: fill it raw, then escape the result once
    if let Some(foot) = template.footer_text.as_deref().filter(|f| !f.trim().is_empty()) {
        let foot = escape_html(&substitute(foot, &values, false));
        card.push_str(&format!("<div class=\"foot\">{foot}</div>\n"));
    }
    card.push_str("</div>\n");
    document(&template.name, &style, &card)
}
