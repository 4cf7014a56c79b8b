/// Characters added by wrapping a chunk in a triple-backtick fence.
pub const FENCE_OVERHEAD: usize = 6;

/// One piece of a split message: its text, plus the whitespace character
/// consumed at the split point (if the split happened on whitespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub body: &'a str,
    pub separator: Option<char>,
}

/// Split `text` into pieces of at most `limit` characters.
///
/// Each split lands on the last whitespace at or before the limit; that
/// whitespace is consumed and recorded as the segment's separator. Text with
/// no usable whitespace in the window is hard-cut at the limit. Joining every
/// `body` followed by its `separator` reproduces the input.
pub fn split_segments(text: &str, limit: usize) -> Vec<Segment<'_>> {
    let limit = limit.max(1);
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        // Byte offset and value of the char just past the window, if any.
        let Some((cut, next)) = rest.char_indices().nth(limit) else {
            segments.push(Segment {
                body: rest,
                separator: None,
            });
            break;
        };

        let window = &rest[..cut + next.len_utf8()];
        match window.rfind(char::is_whitespace).filter(|&i| i > 0) {
            Some(i) => {
                let sep = window[i..].chars().next().unwrap_or(' ');
                segments.push(Segment {
                    body: &rest[..i],
                    separator: Some(sep),
                });
                rest = &rest[i + sep.len_utf8()..];
            }
            None => {
                segments.push(Segment {
                    body: &rest[..cut],
                    separator: None,
                });
                rest = &rest[cut..];
            }
        }

        if rest.is_empty() {
            break;
        }
    }

    segments
}

/// Split a reply into platform-sized messages.
///
/// With `fenced`, every chunk is wrapped in a code fence and the limit
/// shrinks by [`FENCE_OVERHEAD`] so the fenced chunk still fits.
pub fn split_message(text: &str, limit: usize, fenced: bool) -> Vec<String> {
    let effective = if fenced {
        limit.saturating_sub(FENCE_OVERHEAD)
    } else {
        limit
    };

    split_segments(text, effective)
        .into_iter()
        .map(|s| {
            if fenced {
                format!("```{}```", s.body)
            } else {
                s.body.to_string()
            }
        })
        .collect()
}
