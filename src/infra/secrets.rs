use std::panic;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: [&str; 5] = ["token", "bearer", "otp", "authorization", "jwt"];

pub fn redact_text(input: &str) -> String {
    input
        .split_whitespace()
        .map(redact_chunk)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn install_panic_redaction_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic payload omitted".to_owned());

        let scrubbed = redact_text(&payload);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "convoo panic: {} at {}:{}:{}",
                scrubbed,
                location.file(),
                location.line(),
                location.column()
            );
        } else {
            eprintln!("convoo panic: {}", scrubbed);
        }
    }));
}

fn redact_chunk(chunk: &str) -> String {
    let lowered = chunk.to_ascii_lowercase();
    if SENSITIVE_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
        || looks_like_jwt(chunk)
        || looks_like_code(chunk)
    {
        REDACTED.to_owned()
    } else {
        chunk.to_owned()
    }
}

/// Three base64url segments separated by dots.
fn looks_like_jwt(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| ch == '"' || ch == '\'' || ch == ',');
    let segments: Vec<&str> = cleaned.split('.').collect();

    segments.len() == 3
        && segments.iter().all(|segment| {
            segment.len() >= 4
                && segment
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        })
}

/// A standalone 4-digit number reads as a verification code.
fn looks_like_code(value: &str) -> bool {
    let cleaned = value.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());
    cleaned.len() == 4 && cleaned.chars().all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_text_scrubs_sensitive_fragments() {
        let input = "verify failed token=abc123 otp 4821 for 9876543210";
        let output = redact_text(input);

        assert!(!output.contains("abc123"));
        assert!(!output.contains("4821"));
        assert!(output.contains("9876543210"));
        assert!(output.contains("[REDACTED]"));
    }

    #[test]
    fn redact_text_scrubs_bare_jwt() {
        let output = redact_text("got eyJhbGciOi.eyJzdWIiOiIx.c2lnbmF0dXJl back");

        assert_eq!(output, "got [REDACTED] back");
    }

    #[test]
    fn plain_sentences_pass_through() {
        assert_eq!(
            redact_text("message list loaded in 120 ms"),
            "message list loaded in 120 ms"
        );
    }
}
