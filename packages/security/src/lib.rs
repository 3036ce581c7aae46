// ABOUTME: Validation for user-supplied bot names, start commands, emails, and filenames
// ABOUTME: Every value that ends up in a shell, a path, or the database passes through here

use regex::Regex;

// Validation limits
const MAX_START_CMD_LENGTH: usize = 500;
const MAX_FILENAME_LENGTH: usize = 255;
const FILENAME_STEM_TRUNCATE: usize = 250;

// Validation patterns
const BOT_NAME_PATTERN: &str = r"^[a-zA-Z0-9_-]{3,50}$";
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Substrings that disqualify a start command, matched case-insensitively.
/// Shell operators, command substitution, shell/binary invocation, and
/// destructive tooling.
const DENIED_COMMAND_SUBSTRINGS: &[&str] = &[
    "&&", "||", ";", "|", ">", "<", "`", "$(", "bash", "sh ", "/bin/", "rm ", "dd ", "mkfs",
];

/// Download-and-pipe shapes, matched case-insensitively
const DENIED_COMMAND_PATTERNS: &[&str] = &[r"curl.*\|", r"wget.*\|"];

/// Bot names are 3-50 chars of `[A-Za-z0-9_-]`
pub fn validate_bot_name(name: &str) -> bool {
    let re = Regex::new(BOT_NAME_PATTERN).expect("Invalid BOT_NAME_PATTERN regex");
    re.is_match(name)
}

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(EMAIL_PATTERN).expect("Invalid EMAIL_PATTERN regex");
    re.is_match(email)
}

/// Validate a user-provided container start command.
///
/// The command is later interpolated into a `sh -c` line inside the
/// sandbox, so anything that could chain, pipe, redirect, or substitute is
/// rejected outright. Rejection is final; no repair is attempted.
pub fn validate_start_command(command: &str) -> bool {
    if command.is_empty() || command.len() > MAX_START_CMD_LENGTH {
        return false;
    }

    let lowered = command.to_lowercase();
    for denied in DENIED_COMMAND_SUBSTRINGS {
        if lowered.contains(denied) {
            return false;
        }
    }

    for pattern in DENIED_COMMAND_PATTERNS {
        let re = Regex::new(pattern).expect("Invalid DENIED_COMMAND_PATTERNS regex");
        if re.is_match(&lowered) {
            return false;
        }
    }

    true
}

/// Reduce a client-supplied filename to a single safe path component.
///
/// Strips directory components, removes traversal sequences, maps anything
/// outside `[A-Za-z0-9._-]` to `_`, and truncates the stem when the total
/// exceeds 255 characters while keeping the extension. Idempotent.
pub fn sanitize_filename(filename: &str) -> String {
    // Drop any directory prefix, whichever separator the client used
    let basename = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .to_string();

    let cleaned = basename.replace("..", "").replace(['/', '\\'], "");

    let mut safe = String::with_capacity(cleaned.len());
    for ch in cleaned.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            safe.push(ch);
        } else {
            safe.push('_');
        }
    }

    if safe.len() > MAX_FILENAME_LENGTH {
        let (stem, ext) = split_extension(&safe);
        let truncated: String = stem.chars().take(FILENAME_STEM_TRUNCATE).collect();
        return format!("{}{}", truncated, ext);
    }

    safe
}

/// Split a filename into stem and extension. A leading dot does not begin
/// an extension, so dotfiles come back with an empty extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    }
}
