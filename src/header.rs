//! Header row discovery.
//!
//! Marketplace and ad-platform exports often start with a banner (report
//! name, account, generation time) before the real column header. The
//! locator scans the first lines for a header vocabulary, matched on word
//! boundaries, and yields every line that mentions any of it. Callers try
//! those lines in order since a banner such as "Período: ..." can match too.

use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderLocation {
    /// A line within the scan window mentions a header keyword.
    Matched { line: usize, keyword: String },
    /// Nothing matched; the first line is taken as the header.
    Fallback,
}

impl HeaderLocation {
    pub fn index(&self) -> usize {
        match self {
            HeaderLocation::Matched { line, .. } => *line,
            HeaderLocation::Fallback => 0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, HeaderLocation::Fallback)
    }
}

pub struct HeaderLocator {
    keywords: Vec<String>,
    scan_lines: usize,
}

impl HeaderLocator {
    pub fn new(keywords: &[String], scan_lines: usize) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            scan_lines,
        }
    }

    /// Keyword-matching lines in order, followed by `Fallback` unless line 0
    /// already matched.
    pub fn candidates<S: AsRef<str>>(&self, lines: &[S]) -> Vec<HeaderLocation> {
        let mut found: Vec<HeaderLocation> = lines
            .iter()
            .take(self.scan_lines)
            .enumerate()
            .filter_map(|(idx, line)| {
                let lowered = line.as_ref().to_lowercase();
                self.keywords
                    .iter()
                    .find(|k| contains_word(&lowered, k))
                    .map(|keyword| HeaderLocation::Matched {
                        line: idx,
                        keyword: keyword.clone(),
                    })
            })
            .collect();

        if found.is_empty() {
            debug!(
                "No header keyword in the first {} lines; using line 0 as header",
                self.scan_lines.min(lines.len())
            );
        }
        if found.first().map(|h| h.index()) != Some(0) {
            found.push(HeaderLocation::Fallback);
        }
        found
    }

    /// First candidate header line.
    pub fn locate<S: AsRef<str>>(&self, lines: &[S]) -> HeaderLocation {
        self.candidates(lines)
            .into_iter()
            .next()
            .unwrap_or(HeaderLocation::Fallback)
    }

    /// Scans the first lines of decoded text.
    pub fn candidates_in_text(&self, text: &str) -> Vec<HeaderLocation> {
        let lines: Vec<&str> = text.lines().take(self.scan_lines).collect();
        self.candidates(&lines)
    }

    pub fn locate_in_text(&self, text: &str) -> HeaderLocation {
        let lines: Vec<&str> = text.lines().take(self.scan_lines).collect();
        self.locate(&lines)
    }
}

/// True when `keyword` occurs in `haystack` with no letter or digit on either side.
fn contains_word(haystack: &str, keyword: &str) -> bool {
    haystack.match_indices(keyword).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Byte offset at which physical line `line` starts in `text`.
pub fn line_start_offset(text: &str, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    text.match_indices('\n')
        .nth(line - 1)
        .map(|(pos, _)| pos + 1)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IngestionConfig;

    #[test]
    fn test_header_after_banner() {
        let config = IngestionConfig::default();
        let locator = HeaderLocator::new(&config.header_keywords, config.header_scan_lines);
        let text = "Shopee Seller Centre\nShop: loja-exemplo\nExported 2024-02-01 10:00\n\n\
                    Order ID,Order Creation Date,Total\n1,01/01/2024,\"10,00\"\n";
        // the export timestamp line contains no header keyword
        let location = locator.locate_in_text(text);
        assert_eq!(location.index(), 4);
        assert!(matches!(location, HeaderLocation::Matched { ref keyword, .. } if keyword == "order id"));
    }

    #[test]
    fn test_fallback_to_first_line() {
        let keywords = vec!["campaign".to_string()];
        let locator = HeaderLocator::new(&keywords, 20);
        let location = locator.locate(&["a,b", "1,2"]);
        assert!(location.is_fallback());
        assert_eq!(location.index(), 0);
    }

    #[test]
    fn test_scan_window_is_bounded() {
        let keywords = vec!["campaign".to_string()];
        let locator = HeaderLocator::new(&keywords, 3);
        let lines = ["x", "y", "z", "Campaign name,Amount spent"];
        assert!(locator.locate(&lines).is_fallback());
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let keywords = vec!["date".to_string()];
        let locator = HeaderLocator::new(&keywords, 10);
        let lines = ["Report last updated 01/02/2024", "Order ID,Order Creation Date,Total"];
        assert_eq!(locator.locate(&lines).index(), 1);
        assert!(contains_word("created_at,date", "date"));
        assert!(!contains_word("updated", "date"));
    }

    #[test]
    fn test_candidates_keep_every_match_in_order() {
        let config = IngestionConfig::default();
        let locator = HeaderLocator::new(&config.header_keywords, config.header_scan_lines);
        let lines = [
            "Período: 01/01/2024 - 31/01/2024",
            "",
            "Order ID,Order Creation Date,Comissão",
        ];
        let indices: Vec<usize> = locator.candidates(&lines).iter().map(|h| h.index()).collect();
        assert_eq!(indices, vec![0, 2]);

        let keywords = vec!["campaign".to_string()];
        let banner_then_header = ["x", "Campaign name,Amount spent"];
        let fallback_last = HeaderLocator::new(&keywords, 10).candidates(&banner_then_header);
        assert_eq!(fallback_last.len(), 2);
        assert!(fallback_last[1].is_fallback());
    }

    #[test]
    fn test_line_start_offset() {
        let text = "a\nbb\nccc\n";
        assert_eq!(line_start_offset(text, 0), 0);
        assert_eq!(line_start_offset(text, 1), 2);
        assert_eq!(&text[line_start_offset(text, 2)..], "ccc\n");
        assert_eq!(line_start_offset(text, 10), text.len());
    }
}
