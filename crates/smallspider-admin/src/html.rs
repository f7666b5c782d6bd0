//! HTML fragments for computed change list cells.

/// Escapes the characters that are significant in HTML text and attributes.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Builds an HTML fragment, substituting each `{}` in `template` with the
/// next argument, escaped.
///
/// The template itself is trusted and emitted as is. Placeholders beyond the
/// supplied arguments are left empty; extra arguments are ignored.
///
/// # Examples
///
/// ```
/// use smallspider_admin::html::format_html;
///
/// let link = format_html("<a href='{}'>{}</a>", &["/admin/blog/post/1/change/", "<b>"]);
/// assert_eq!(link, "<a href='/admin/blog/post/1/change/'>&lt;b&gt;</a>");
/// ```
pub fn format_html(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut pieces = template.split("{}");
    if let Some(first) = pieces.next() {
        out.push_str(first);
    }
    for piece in pieces {
        if let Some(arg) = args.next() {
            out.push_str(&escape_html(arg));
        }
        out.push_str(piece);
    }
    out
}
