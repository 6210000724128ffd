//! Helpers for the V8/SpiderMonkey style `Error.stack` text.

/// Drops the first line (the error constructor/message) and strips the leading `at `
/// from every remaining frame.
///
/// ```
/// use page_monitor::util::format_stack;
///
/// let stack = "TypeError: x\n  at f (a.js:1:2)\n  at g (a.js:3:4)";
/// assert_eq!(format_stack(stack), "f (a.js:1:2)\ng (a.js:3:4)");
/// ```
pub fn format_stack(stack: &str) -> String {
    stack
        .lines()
        .skip(1)
        .map(strip_at_prefix)
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_at_prefix(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix("at") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => line,
    }
}

/// A `file:line:column` location parsed from a stack frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackLocation {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

/// Returns the location of the first frame matching `at <file>:<line>:<col>`.
///
/// Frames shaped like `at fn (<file>:<line>:<col>)` yield the parenthesised location.
pub fn first_frame_location(stack: &str) -> Option<StackLocation> {
    stack.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let rest = trimmed.strip_prefix("at")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        parse_location(rest.trim())
    })
}

fn parse_location(frame: &str) -> Option<StackLocation> {
    let location = match (frame.rfind('('), frame.strip_suffix(')')) {
        (Some(open), Some(inner)) => &inner[open + 1..],
        _ => frame,
    };
    let mut parts = location.rsplitn(3, ':');
    let column = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let filename = parts.next()?.trim();
    if filename.is_empty() {
        return None;
    }
    Some(StackLocation {
        filename: filename.to_string(),
        line,
        column,
    })
}
