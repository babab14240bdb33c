use crate::models::{ChapterSpan, Mode, Outcome};
use crate::services::session::Session;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

const STYLE: &str = r#"
        body { font-family: Arial, sans-serif; margin: 40px; background: #f8fafc; }
        .card { max-width: 760px; margin: 0 auto; background: #fff; padding: 24px 32px; border-radius: 12px; border: 1px solid #e2e8f0; }
        form { margin: 16px 0; }
        .status { display: inline-block; padding: 8px 16px; border-radius: 999px; font-size: 14px; }
        .status-idle { background: #f1f5f9; color: #475569; }
        .status-pending { background: #fef9c3; color: #854d0e; }
        .status-success { background: #dcfce7; color: #166534; }
        .status-error { background: #fee2e2; color: #991b1b; }
        table { width: 100%; border-collapse: collapse; margin-top: 12px; }
        th, td { padding: 8px; border-bottom: 1px solid #e2e8f0; text-align: left; }
        pre { white-space: pre-wrap; background: #f8fafc; padding: 12px; border: 1px solid #cbd5e1; border-radius: 8px; }
        details pre { background: #1f2937; color: #4ade80; }
        .elapsed { font-family: monospace; font-size: 12px; color: #64748b; }
"#;

/// Renders the whole upload-and-report page for the current session.
pub fn render(session: &Session) -> String {
    let status = session.status();
    let in_flight = status.is_in_flight();
    let range = session.range();

    let refresh = if in_flight {
        "\n    <meta http-equiv=\"refresh\" content=\"2\">"
    } else {
        ""
    };

    let mut html = String::with_capacity(4096);
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <title>PDF Chapter Mapper</title>
    <meta charset="utf-8">{refresh}
    <style>{STYLE}</style>
</head>
<body>
<main class="card">
    <h1>PDF Chapter Mapper</h1>
    <p>Find the page range of each chapter, or correct the text of a page range.</p>
"#
    );

    let file_disabled = if in_flight { " disabled" } else { "" };
    let _ = write!(
        html,
        r#"    <form method="post" action="/select" enctype="multipart/form-data">
        <label>1. Upload a PDF</label>
        <input type="file" name="file" accept=".pdf"{file_disabled}>
        <button type="submit"{file_disabled}>Select</button>
    </form>
"#
    );

    let submit_disabled = if in_flight || session.selection().is_none() {
        " disabled"
    } else {
        ""
    };
    let button_label = if in_flight { "Working..." } else { "Start" };
    let _ = write!(
        html,
        r#"    <form method="post" action="/submit">
        <label>2. Choose what to do</label>
        <select name="mode">{options}</select>
        <label>From</label>
        <input type="number" name="start" min="1" value="{start}">
        <label>to</label>
        <input type="number" name="end" min="1" value="{end}">
        <button type="submit"{submit_disabled}>{button_label}</button>
    </form>
    <hr>
"#,
        options = mode_options(session.mode()),
        start = range.start,
        end = range.end,
    );

    let _ = write!(
        html,
        r#"    <div><span class="status {class}">{message}</span></div>
"#,
        class = status.tone().css_class(),
        message = encode_text(&status.message()),
    );

    if let Some(report) = status.report() {
        let elapsed = format!(
            r#"<span class="elapsed">Took {:.2} s</span>"#,
            report.elapsed.as_secs_f64()
        );
        match &report.outcome {
            Outcome::Chapters { chapters } if !chapters.is_empty() => {
                let _ = write!(
                    html,
                    "    <h2>Results</h2>\n    {elapsed}\n{table}{raw}",
                    table = chapter_table(chapters),
                    raw = raw_json(chapters),
                );
            }
            Outcome::Chapters { .. } => {}
            Outcome::CorrectedText(corrected) => {
                let _ = write!(
                    html,
                    "    <h2>Corrected text</h2>\n    {elapsed}\n    <pre class=\"corrected\">{}</pre>\n",
                    encode_text(&corrected.text),
                );
            }
        }
    }

    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn mode_options(selected: Mode) -> String {
    [Mode::ChapterMap, Mode::TextCorrection]
        .into_iter()
        .map(|mode| {
            let value = match mode {
                Mode::ChapterMap => "chapter_map",
                Mode::TextCorrection => "text_correction",
            };
            let marker = if mode == selected { " selected" } else { "" };
            format!(
                r#"<option value="{}"{marker}>{}</option>"#,
                encode_double_quoted_attribute(value),
                encode_text(mode.label())
            )
        })
        .collect()
}

fn chapter_table(chapters: &[ChapterSpan]) -> String {
    let mut table = String::from(
        "    <table>\n        <thead><tr><th>Chapter</th><th>Start page</th><th>End page</th></tr></thead>\n        <tbody>\n",
    );
    for span in chapters {
        let _ = writeln!(
            table,
            "            <tr><td>Chapter {}</td><td>{}</td><td>{}</td></tr>",
            span.chapter, span.start_page, span.end_page
        );
    }
    table.push_str("        </tbody>\n    </table>\n");
    table
}

fn raw_json(chapters: &[ChapterSpan]) -> String {
    let json = serde_json::to_string_pretty(chapters).unwrap_or_default();
    format!(
        "    <details>\n        <summary>Raw JSON</summary>\n        <pre>{}</pre>\n    </details>\n",
        encode_text(&json)
    )
}
