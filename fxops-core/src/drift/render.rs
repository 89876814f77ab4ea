//! HTML rendering of a drift report.

use super::report::{ColumnDrift, DriftReport};
use std::fmt::Write;

const STYLE: &str = "\
body{font-family:-apple-system,Segoe UI,Helvetica,Arial,sans-serif;margin:2rem;color:#1f2933}\
h1{font-size:1.4rem}\
table{border-collapse:collapse;width:100%;margin-top:1rem}\
th,td{border-bottom:1px solid #d9e2ec;padding:.4rem .6rem;text-align:right}\
th:first-child,td:first-child{text-align:left}\
.drift{color:#b42318;font-weight:600}\
.stable{color:#027a48}\
.summary{display:flex;gap:2rem;margin-top:1rem}\
.card{border:1px solid #d9e2ec;border-radius:6px;padding:.8rem 1.2rem}\
.bar{background:#e4e7eb;height:.5rem;width:8rem;display:inline-block}\
.bar>span{background:#b42318;height:100%;display:block}";

pub(super) fn html(report: &DriftReport) -> String {
    let mut out = String::with_capacity(4096);
    let verdict = if report.dataset_drift {
        "<span class=\"drift\">Dataset drift detected</span>"
    } else {
        "<span class=\"stable\">No dataset drift</span>"
    };

    // fmt::Write into a String cannot fail.
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>Data drift report</title><style>{STYLE}</style></head><body>\
         <h1>Data drift report</h1><p>{verdict}</p>\
         <div class=\"summary\">\
         <div class=\"card\">Columns<br><b>{}</b></div>\
         <div class=\"card\">Drifted columns<br><b>{}</b></div>\
         <div class=\"card\">Share drifted<br><b>{:.1}%</b></div>\
         <div class=\"card\">Rows (reference / current)<br><b>{} / {}</b></div>\
         </div>\
         <p>Test: {} &lt; {} per column; dataset drift at share &ge; {}. Generated {}.</p>",
        report.number_of_columns,
        report.number_of_drifted_columns,
        report.share_of_drifted_columns * 100.0,
        report.reference_rows,
        report.current_rows,
        super::report::STATTEST_NAME,
        report.options.stattest_threshold,
        report.options.drift_share,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    out.push_str(
        "<table><thead><tr><th>Column</th><th>Drift</th><th>Statistic</th>\
         <th>p-value</th><th>Ref mean</th><th>Cur mean</th><th>Ref std</th>\
         <th>Cur std</th><th>Ref range</th><th>Cur range</th></tr></thead><tbody>",
    );
    for column in &report.columns {
        row(&mut out, column);
    }
    out.push_str("</tbody></table></body></html>\n");
    out
}

fn row(out: &mut String, c: &ColumnDrift) {
    let flag = if c.drift_detected {
        "<span class=\"drift\">Detected</span>"
    } else {
        "<span class=\"stable\">Not detected</span>"
    };
    let width = (c.statistic.clamp(0.0, 1.0) * 100.0).round();
    let _ = write!(
        out,
        "<tr><td>{}</td><td>{flag}</td>\
         <td><span class=\"bar\"><span style=\"width:{width}%\"></span></span> {:.4}</td>\
         <td>{:.4e}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td><td>{:.4}</td>\
         <td>{:.4} &ndash; {:.4}</td><td>{:.4} &ndash; {:.4}</td></tr>",
        escape(&c.column),
        c.statistic,
        c.p_value,
        c.reference.mean,
        c.current.mean,
        c.reference.std,
        c.current.std,
        c.reference.min,
        c.reference.max,
        c.current.min,
        c.current.max,
    );
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a & \"b\">"), "&lt;a &amp; &quot;b&quot;&gt;");
    }
}
