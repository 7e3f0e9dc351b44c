use crate::models::Movie;

/// Result of scanning one page against the destination watermark.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// New records, still newest first.
    pub keep: Vec<Movie>,
    /// The page reached an already-ingested record.
    pub boundary_hit: bool,
}

/// Keep the prefix of `page` that precedes `watermark`. A `None` watermark
/// (empty destination) never matches, so the whole page is new.
pub fn split(mut page: Vec<Movie>, watermark: Option<&str>) -> Split {
    let hit = watermark.and_then(|w| page.iter().position(|m| m.name == w));
    match hit {
        Some(idx) => {
            page.truncate(idx);
            Split {
                keep: page,
                boundary_hit: true,
            }
        }
        None => Split {
            keep: page,
            boundary_hit: false,
        },
    }
}
