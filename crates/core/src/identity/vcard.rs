//! Contact card (vCard 3.0) rendering.

/// Builder for a vCard 3.0 document.
///
/// Absent or empty properties are skipped entirely rather than emitted as
/// empty lines.
#[derive(Debug, Default)]
pub struct ContactCard<'a> {
    pub full_name: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub title: Option<&'a str>,
    pub organization: Option<&'a str>,
    pub url: Option<&'a str>,
}

impl ContactCard<'_> {
    /// Render the card, one property per line.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!("FN:{}", escape(self.full_name)),
        ];

        let properties = [
            ("EMAIL", self.email),
            ("TEL", self.phone),
            ("TITLE", self.title),
            ("ORG", self.organization),
            ("URL", self.url),
        ];
        for (key, value) in properties {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                lines.push(format!("{key}:{}", escape(value)));
            }
        }

        lines.push("END:VCARD".to_string());
        lines.join("\n")
    }
}

/// File name for an exported card: whitespace runs become `_`.
#[must_use]
pub fn file_name(full_name: &str) -> String {
    let stem = full_name.split_whitespace().collect::<Vec<_>>().join("_");
    if stem.is_empty() {
        "contact.vcf".to_string()
    } else {
        format!("{stem}.vcf")
    }
}

// RFC 2426 text value escaping.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}
