//! Printable per-order invoice.
//!
//! [`render_invoice`] builds a self-contained right-to-left HTML document;
//! [`print_invoice`] writes it to the invoice directory and hands it to the
//! system browser, whose inline script opens the print dialog and closes the
//! window half a second later.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::store::Order;

const PRIMARY: &str = "#1e3a8a";
const SECONDARY: &str = "#047857";

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("failed to write invoice: {0}")]
    Io(#[from] std::io::Error),

    #[error("system opener exited with {0}")]
    Opener(std::process::ExitStatus),
}

/// Escape the five HTML-significant characters.
///
/// ```
/// use zamzami_assistant::invoice::escape_html;
///
/// assert_eq!(escape_html(r#"<b>"A&B"</b>"#), "&lt;b&gt;&quot;A&amp;B&quot;&lt;/b&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// The invoice document for `order`.
pub fn render_invoice(order: &Order, contact_number: &str) -> String {
    let name = escape_html(&order.customer_name);
    let phone = escape_html(&order.phone);
    let branch = escape_html(&order.branch);
    let address = escape_html(&order.address);
    let items = escape_html(&order.items);
    let number = escape_html(&order.short_number());
    let timestamp = escape_html(&order.timestamp);
    let contact = escape_html(contact_number);

    format!(
        r#"<!DOCTYPE html>
<html lang="ar" dir="rtl">
<head>
<meta charset="utf-8">
<title>فاتورة - {name}</title>
<style>
  body {{ font-family: 'Cairo', 'Segoe UI', Tahoma, sans-serif; padding: 40px; color: #333; line-height: 1.6; }}
  .header {{ border-bottom: 4px solid {PRIMARY}; padding-bottom: 20px; margin-bottom: 30px; display: flex; justify-content: space-between; align-items: center; }}
  .logo-text {{ font-size: 28px; font-weight: 800; color: {PRIMARY}; }}
  .invoice-title {{ font-size: 24px; font-weight: 700; color: {SECONDARY}; }}
  .section {{ margin-bottom: 25px; border: 1px solid #eee; padding: 15px; border-radius: 8px; }}
  .section-title {{ font-weight: 700; color: {PRIMARY}; margin-bottom: 10px; border-bottom: 1px solid #eee; padding-bottom: 5px; display: block; }}
  .grid {{ display: grid; grid-template-columns: 1fr 1fr; gap: 15px; }}
  .label {{ font-weight: 700; color: #666; font-size: 14px; }}
  .value {{ font-size: 16px; margin-top: 4px; }}
  .items {{ white-space: pre-wrap; }}
  .footer {{ margin-top: 50px; text-align: center; font-size: 12px; color: #888; border-top: 1px solid #eee; padding-top: 20px; }}
</style>
</head>
<body>
  <div class="header">
    <div class="logo-text">الزمزمي للمستهلكات الطبية</div>
    <div class="invoice-title">فاتورة طلبية</div>
  </div>

  <div class="grid">
    <div class="section">
      <span class="section-title">بيانات العميل</span>
      <div><span class="label">الاسم:</span> <div class="value">{name}</div></div>
      <div style="margin-top:10px;"><span class="label">رقم الهاتف:</span> <div class="value">{phone}</div></div>
    </div>
    <div class="section">
      <span class="section-title">تفاصيل التوصيل</span>
      <div><span class="label">الفرع:</span> <div class="value">{branch}</div></div>
      <div style="margin-top:10px;"><span class="label">العنوان:</span> <div class="value">{address}</div></div>
    </div>
  </div>

  <div class="section">
    <span class="section-title">الطلبية والمنتجات</span>
    <div class="value items">{items}</div>
  </div>

  <div class="grid">
    <div><span class="label">رقم الطلب:</span> <div class="value">{number}</div></div>
    <div><span class="label">تاريخ الطلب:</span> <div class="value">{timestamp}</div></div>
  </div>

  <div class="footer">
    شكراً لتعاملكم مع شركة الزمزمي للمستهلكات والأجهزة الطبية<br>
    تواصل معنا: {contact}
  </div>

  <script>
    window.onload = () => {{
      window.print();
      setTimeout(() => {{ window.close(); }}, 500);
    }};
  </script>
</body>
</html>
"#
    )
}

/// Write the invoice for `order` into `dir` and return its path.
pub fn write_invoice(order: &Order, contact_number: &str, dir: &Path) -> Result<PathBuf, InvoiceError> {
    std::fs::create_dir_all(dir)?;
    let file_id: String = order
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let path = dir.join(format!("invoice-{file_id}.html"));
    std::fs::write(&path, render_invoice(order, contact_number))?;
    Ok(path)
}

/// Open `path` with the platform's default handler.
pub fn open_in_browser(path: &Path) -> Result<(), InvoiceError> {
    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(path);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(path);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(path);
        c
    };

    let status = command.status()?;
    if !status.success() {
        return Err(InvoiceError::Opener(status));
    }
    Ok(())
}

/// Write the invoice and open it for printing.
pub fn print_invoice(order: &Order, contact_number: &str, dir: &Path) -> Result<PathBuf, InvoiceError> {
    let path = write_invoice(order, contact_number, dir)?;
    log::info!("invoice: opening {}", path.display());
    open_in_browser(&path)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
