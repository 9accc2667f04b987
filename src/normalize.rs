//! Email text normalizer — strips non-semantic content before vectorization.
//!
//! Runs before any model sees an email. The pass order is load-bearing:
//! headers → quoted replies → signatures → boilerplate → HTML → whitespace,
//! then the subject is prepended. Later steps assume the earlier ones ran.
//!
//! The quoted-reply step deliberately drops only the triggering
//! `On … wrote:` / divider line, not the block that follows it. The stage
//! classifiers were trained on output with exactly that behavior, so it is
//! preserved as-is.

use regex::Regex;

/// Text normalizer with pre-compiled patterns.
///
/// Pure and deterministic: the same input always yields the same output,
/// and no step has side effects.
pub struct EmailNormalizer {
    header_line: Regex,
    quoted_wrote: Regex,
    divider: Regex,
    signatures: Vec<Regex>,
    boilerplate: Vec<Regex>,
    html_tag: Regex,
    whitespace: Regex,
}

impl EmailNormalizer {
    pub fn new() -> Self {
        Self {
            // Case-sensitive header keywords, consumed through end of line
            // (including a final line without a trailing newline).
            header_line: Regex::new(
                r"(?m)^(?:From|To|CC|BCC|Date|Subject|Message-ID|In-Reply-To|References|MIME-Version|Content-Type):.*\n?",
            )
            .unwrap(),
            quoted_wrote: Regex::new(r"^On .+ wrote:").unwrap(),
            divider: Regex::new(r"^[-_]{3,}").unwrap(),
            signatures: vec![
                // Double-dash separator through end of text.
                Regex::new(r"(?is)--\s*\n.*").unwrap(),
                Regex::new(r"(?is)___\s*\n.*").unwrap(),
                Regex::new(r"(?is)~{3,}\s*\n.*").unwrap(),
                // Mobile footers through end of text.
                Regex::new(r"(?is)Sent from.*").unwrap(),
                Regex::new(r"(?is)Get Outlook.*").unwrap(),
                Regex::new(r"(?is)Envoyé de mon.*").unwrap(),
            ],
            boilerplate: vec![
                // Footer phrases consumed through end of that line only.
                Regex::new(r"(?i)unsubscribe.*").unwrap(),
                Regex::new(r"(?i)click here.*").unwrap(),
                Regex::new(r"(?i)privacy policy.*").unwrap(),
                Regex::new(r"(?i)terms of service.*").unwrap(),
                Regex::new(r"(?i)manage your preferences.*").unwrap(),
                Regex::new(r"(?i)this is a promotional message.*").unwrap(),
                // Copyright notice up to the year.
                Regex::new(r"(?i)©.*\d{4}").unwrap(),
            ],
            html_tag: Regex::new(r"<[^>]+>").unwrap(),
            whitespace: Regex::new(r"\s+").unwrap(),
        }
    }

    /// Clean a raw email body down to the operative content, prepending the
    /// trimmed subject (if any) followed by a space.
    ///
    /// Output is a single line with no headers, quoted replies, signatures,
    /// footers, HTML tags, or entity escapes.
    pub fn normalize(&self, raw_body: &str, subject: &str) -> String {
        // 1. Header lines.
        let text = self.header_line.replace_all(raw_body, "");

        // 2. Quoted reply content, line by line.
        let kept: Vec<&str> = text
            .split('\n')
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.starts_with('>')
                    && !self.quoted_wrote.is_match(trimmed)
                    && !self.divider.is_match(trimmed)
            })
            .collect();
        let mut text = kept.join("\n");

        // 3. Signature blocks (span to end of text).
        for re in &self.signatures {
            text = re.replace_all(&text, "").into_owned();
        }

        // 4. Unsubscribe links and footers (span to end of line).
        for re in &self.boilerplate {
            text = re.replace_all(&text, "").into_owned();
        }

        // 5. HTML tags and the four common entities.
        let text = self.html_tag.replace_all(&text, "");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&");

        // 6. Collapse whitespace runs (including newlines).
        let text = self.whitespace.replace_all(&text, " ");
        let text = text.trim().to_string();

        // 7. Prepend the subject.
        if !subject.is_empty() {
            format!("{} {}", subject.trim(), text)
        } else {
            text
        }
    }
}

impl Default for EmailNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
