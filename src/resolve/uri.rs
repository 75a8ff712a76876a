//! Splits a request path into the tables and keys it addresses.

use percent_encoding::percent_decode_str;

/// Leading path segments that form the mount point, e.g. `/q2/v1`.
pub const PREFIX_SEGMENTS: usize = 2;

/// Tables and keys taken from a request path.
///
/// `keys[i]` is the key following `tables[i]`; a missing key or a `*` key is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UriPath {
    pub tables: Vec<String>,
    pub keys: Vec<Option<String>>,
    /// Row offset from a trailing `next/<n>` pair.
    pub offset: u64,
}

impl UriPath {
    /// Segments are split on `/` first and then percent-decoded, so an
    /// encoded slash stays inside its key.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();
        if segments.len() <= PREFIX_SEGMENTS {
            return UriPath::default();
        }
        let mut segments = &segments[PREFIX_SEGMENTS..];

        let mut offset = 0;
        if let [rest @ .., marker, n] = segments {
            if marker.eq_ignore_ascii_case("next") {
                if let Ok(n) = n.parse::<u64>() {
                    offset = n;
                    segments = rest;
                }
            }
        }

        let mut out = UriPath {
            offset,
            ..UriPath::default()
        };
        for (i, seg) in segments.iter().enumerate() {
            if i % 2 == 0 {
                if is_integer(seg) {
                    continue;
                }
                out.tables.push(seg.to_string());
            } else if seg == "*" {
                out.keys.push(None);
            } else {
                out.keys.push(Some(seg.to_string()));
            }
        }
        out
    }

    pub fn key_at(&self, i: usize) -> Option<&str> {
        self.keys.get(i).and_then(|k| k.as_deref())
    }

    pub fn has_keys(&self) -> bool {
        self.keys.iter().any(Option::is_some)
    }
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
