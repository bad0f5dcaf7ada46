//! Command construction for the git driver.
//!
//! A [`GitCommand`] carries two views of the same invocation: the argument
//! vector handed to the process, where every caller-provided value occupies
//! exactly one element verbatim, and a shell-style rendering used in logs and
//! error messages, where untrusted values are escaped. Escaping therefore
//! never alters what the tool receives; it only keeps the rendered command
//! line unambiguous.

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escape a value so it would survive shell whitespace-tokenization as a
/// single token (POSIX `Shellwords` rules): the empty string renders as
/// `''`, any character outside `[A-Za-z0-9_\-.,:+/@\n]` is
/// backslash-prefixed, and a newline is wrapped in single quotes.
pub fn shell_escape(value: &str) -> String {
    if value.is_empty() {
        return "''".to_string();
    }

    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' | '.' | ',' | ':' | '+' | '/'
            | '@' => escaped.push(ch),
            '\n' => escaped.push_str("'\n'"),
            _ => {
                escaped.push('\\');
                escaped.push(ch);
            }
        }
    }
    escaped
}

/// Render a commit message the way it appears in the command line: wrapped
/// in double quotes with embedded double quotes backslash-escaped. Other
/// special characters (backticks included) pass through untouched, unlike
/// [`shell_escape`], so rendered messages stay readable in logs. The message
/// itself still travels as one verbatim argv element.
pub fn quote_message(message: &str) -> String {
    format!("\"{}\"", message.replace('"', "\\\""))
}

// ---------------------------------------------------------------------------
// GitCommand
// ---------------------------------------------------------------------------

/// One git invocation under construction.
#[derive(Debug, Clone, Default)]
pub struct GitCommand {
    argv: Vec<String>,
    display: Vec<String>,
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal tokens: subcommand words, flags, fixed values. They
    /// render exactly as written.
    pub fn args(&mut self, tokens: &[&str]) -> &mut Self {
        for token in tokens {
            self.argv.push((*token).to_string());
            self.display.push((*token).to_string());
        }
        self
    }

    /// Append one untrusted name (branch, tag, ref) as a single argv
    /// element, escaped in the rendering.
    pub fn ref_arg(&mut self, value: &str) -> &mut Self {
        self.prefixed_ref_arg("", value)
    }

    /// Like [`ref_arg`](Self::ref_arg), with a trusted prefix composed into
    /// the same element (`origin/<branch>`); only the untrusted part is
    /// escaped in the rendering.
    pub fn prefixed_ref_arg(&mut self, prefix: &str, value: &str) -> &mut Self {
        self.argv.push(format!("{prefix}{value}"));
        self.display.push(format!("{prefix}{}", shell_escape(value)));
        self
    }

    /// Append a commit message, rendered quote-wrapped.
    pub fn message_arg(&mut self, message: &str) -> &mut Self {
        self.argv.push(message.to_string());
        self.display.push(quote_message(message));
        self
    }

    /// Append one element whose argv and rendered forms are both supplied by
    /// the caller, for composed tokens like ref ranges.
    pub fn raw_arg(&mut self, value: String, display: String) -> &mut Self {
        self.argv.push(value);
        self.display.push(display);
        self
    }

    /// The argument vector to hand to the process.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The rendered command line, without the binary path.
    pub fn rendered(&self) -> String {
        self.display.join(" ")
    }
}
