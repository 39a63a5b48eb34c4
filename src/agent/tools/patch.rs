//! Line-based unified diff application
//!
//! Hunks are applied purely by position: the `-` and context lines of a hunk
//! are not compared against the target content. Multiple hunks apply in patch
//! order against one progressively edited buffer, tracking the line offset
//! introduced by earlier hunks.

/// Parsed `@@ -a,b +c,d @@` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

/// Parse a hunk header of the exact form `@@ -a,b +c,d @@`.
///
/// Text after the closing `@@` (a function name, for instance) is allowed.
/// Short forms such as `@@ -1 +1 @@` are not recognised.
pub fn parse_hunk_header(line: &str) -> Option<HunkHeader> {
    let rest = line.strip_prefix("@@ -")?;
    let (old, rest) = rest.split_once(" +")?;
    let (new, _) = rest.split_once(" @@")?;
    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    let (start, count) = range.split_once(',')?;
    Some((parse_digits(start)?, parse_digits(count)?))
}

fn parse_digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// True when the patch declares `/dev/null` as its old file
pub fn creates_new_file(patch: &str) -> bool {
    patch.split('\n').any(|line| line.trim_end() == "--- /dev/null")
}

/// Apply `patch` to `content`, returning `None` if any hunk cannot be placed.
///
/// Lines outside a recognised hunk (`---`/`+++` preamble, malformed `@@`
/// headers) are skipped. Inside a hunk `+x` and ` x` contribute `x` to the
/// replacement, `-x` is dropped and anything else is ignored.
pub fn apply_unified_diff(content: &str, patch: &str) -> Option<String> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    let patch_lines: Vec<&str> = patch.split('\n').collect();
    let mut offset: isize = 0;

    let mut i = 0;
    while i < patch_lines.len() {
        let line = patch_lines[i];
        i += 1;

        if !line.starts_with("@@") {
            continue;
        }
        let Some(header) = parse_hunk_header(line) else {
            continue;
        };

        let mut replacement = Vec::new();
        while i < patch_lines.len() && !patch_lines[i].starts_with("@@") {
            let hunk_line = patch_lines[i];
            if let Some(kept) = hunk_line.strip_prefix('+').or_else(|| hunk_line.strip_prefix(' ')) {
                replacement.push(kept);
            }
            i += 1;
        }

        // headers are 1-based; "-0,0" (empty old file) inserts at the top
        let start = isize::try_from(header.old_start.saturating_sub(1))
            .ok()?
            .checked_add(offset)?;
        let start = usize::try_from(start).ok().filter(|&s| s <= lines.len())?;
        let end = start.checked_add(header.old_count)?.min(lines.len());
        let inserted = isize::try_from(replacement.len()).ok()?;
        let removed = isize::try_from(header.old_count).ok()?;

        lines.splice(start..end, replacement);
        offset = offset.checked_add(inserted)?.checked_sub(removed)?;
    }

    Some(lines.join("\n"))
}
