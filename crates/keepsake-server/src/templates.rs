//! Email copy for guest-facing notifications.

use keepsake_shared::GuestbookEntry;
use serde::Deserialize;

use crate::mailer::EmailMessage;

/// Details for an anniversary greeting, as posted by an admin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnniversaryData {
    pub years: u32,
    pub message: Option<String>,
    pub gallery_url: Option<String>,
}

/// Renders every email the server sends.
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    from: String,
    site_name: String,
}

impl EmailTemplates {
    pub fn new(from: String, site_name: String) -> Self {
        Self { from, site_name }
    }

    pub fn guestbook_thank_you(&self, entry: &GuestbookEntry, to: &str) -> EmailMessage {
        let subject = format!("Thank you for signing the {} guestbook", self.site_name);
        let text = format!(
            "Dear {name},\n\nThank you for your kind words:\n\n\"{message}\"\n\nWith love,\n{site}",
            name = entry.name,
            message = entry.message,
            site = self.site_name,
        );
        let html = format!(
            "<h2>Dear {name},</h2>\
             <p>Thank you for your kind words:</p>\
             <blockquote>{message}</blockquote>\
             <p>With love,<br>{site}</p>",
            name = escape_html(&entry.name),
            message = escape_html(&entry.message),
            site = escape_html(&self.site_name),
        );
        self.message(to, subject, html, text)
    }

    pub fn upload_thank_you(&self, uploader_name: &str, to: &str, photo_count: usize) -> EmailMessage {
        let photos = if photo_count == 1 { "photo" } else { "photos" };
        let subject = format!("Thank you for sharing your {photos}!");
        let text = format!(
            "Dear {uploader_name},\n\nWe received {photo_count} {photos} from you. \
             Thank you for helping us remember our day.\n\nWith love,\n{site}",
            site = self.site_name,
        );
        let html = format!(
            "<h2>Dear {name},</h2>\
             <p>We received <strong>{photo_count}</strong> {photos} from you. \
             Thank you for helping us remember our day.</p>\
             <p>With love,<br>{site}</p>",
            name = escape_html(uploader_name),
            site = escape_html(&self.site_name),
        );
        self.message(to, subject, html, text)
    }

    pub fn anniversary(
        &self,
        recipient_name: Option<&str>,
        to: &str,
        data: &AnniversaryData,
    ) -> EmailMessage {
        let greeting = recipient_name.unwrap_or("friend");
        let years = if data.years == 1 { "year" } else { "years" };
        let subject = format!("{} {years} since {}", data.years, self.site_name);

        let mut text = format!(
            "Dear {greeting},\n\nIt has been {} {years} since we celebrated together.",
            data.years
        );
        let mut html = format!(
            "<h2>Dear {},</h2><p>It has been <strong>{}</strong> {years} since we celebrated together.</p>",
            escape_html(greeting),
            data.years
        );
        if let Some(message) = &data.message {
            text.push_str(&format!("\n\n{message}"));
            html.push_str(&format!("<p>{}</p>", escape_html(message)));
        }
        if let Some(url) = &data.gallery_url {
            text.push_str(&format!("\n\nRelive the day: {url}"));
            html.push_str(&format!(
                "<p><a href=\"{0}\">Relive the day</a></p>",
                escape_html(url)
            ));
        }
        text.push_str(&format!("\n\nWith love,\n{}", self.site_name));
        html.push_str(&format!("<p>With love,<br>{}</p>", escape_html(&self.site_name)));

        self.message(to, subject, html, text)
    }

    fn message(&self, to: &str, subject: String, html: String, text: String) -> EmailMessage {
        EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject,
            html,
            text,
        }
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

    fn templates() -> EmailTemplates {
        EmailTemplates::new("Us <us@example.com>".into(), "Ana & Ben".into())
    }

    #[test]
    fn test_upload_thank_you_mentions_count() {
        let message = templates().upload_thank_you("Aunt May", "may@example.com", 3);
        assert_eq!(message.to, "may@example.com");
        assert_eq!(message.from, "Us <us@example.com>");
        assert!(message.text.contains("3 photos"));
        assert!(message.html.contains("Aunt May"));
    }

    #[test]
    fn test_guestbook_html_is_escaped() {
        let entry = GuestbookEntry::new(
            "<script>".into(),
            None,
            "a & b".into(),
            None,
        );
        let message = templates().guestbook_thank_you(&entry, "x@example.com");
        assert!(message.html.contains("&lt;script&gt;"));
        assert!(message.html.contains("a &amp; b"));
        assert!(message.html.contains("Ana &amp; Ben"));
        assert!(!message.html.contains("<script>"));
    }

    #[test]
    fn test_anniversary_optional_parts() {
        let data = AnniversaryData {
            years: 1,
            message: None,
            gallery_url: Some("https://example.com/gallery".into()),
        };
        let message = templates().anniversary(None, "x@example.com", &data);
        assert_eq!(message.subject, "1 year since Ana & Ben");
        assert!(message.text.contains("Dear friend"));
        assert!(message.text.contains("https://example.com/gallery"));
    }
}
