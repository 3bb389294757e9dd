//! Substring filters over raw log lines

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::trace;

/// Routes lines containing any of its patterns to a sink.
///
/// The filter owns the only sender of its sink, so the sink closes exactly
/// once: when the filter is dropped after its source is exhausted.
#[derive(Debug)]
pub struct SubstringFilter {
    patterns: Vec<Vec<u8>>,
    sink: mpsc::Sender<String>,
}

impl SubstringFilter {
    /// Create a filter; an empty pattern set matches every line.
    pub fn new<I, S>(patterns: I, sink: mpsc::Sender<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().as_bytes().to_vec())
                .collect(),
            sink,
        }
    }

    /// Create a catch-all filter
    pub fn catch_all(sink: mpsc::Sender<String>) -> Self {
        Self {
            patterns: Vec::new(),
            sink,
        }
    }

    /// Whether the line contains any pattern (case-sensitive)
    pub fn matches(&self, line: &[u8]) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns.iter().any(|p| contains(line, p))
    }

    /// Push a matched line to the sink.
    ///
    /// Returns false when the receiving side has gone away.
    pub async fn push(&self, line: String) -> bool {
        self.sink.send(line).await.is_ok()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Read `reader` line by line, offering every line to every filter.
///
/// Filters observe the stream independently: a line may be pushed to any
/// number of them. All filters (and therefore their sinks) are dropped when
/// the reader is exhausted or fails, never before. Returns the number of
/// lines read.
pub async fn slurp<R>(mut reader: R, filters: Vec<SubstringFilter>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut count = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        count += 1;

        for filter in &filters {
            if filter.matches(&buf) {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if !filter.push(line).await {
                    trace!("Filter sink closed, dropping line");
                }
            }
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(patterns: &[&str]) -> (SubstringFilter, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        (SubstringFilter::new(patterns.iter().copied(), tx), rx)
    }

    #[test]
    fn test_empty_pattern_set_matches_everything() {
        let (f, _rx) = filter(&[]);
        assert!(f.matches(b""));
        assert!(f.matches(b"anything at all"));
    }

    #[test]
    fn test_any_pattern_matches() {
        let (f, _rx) = filter(&["panic", "lost"]);
        assert!(f.matches(b"thread main panicked"));
        assert!(f.matches(b"connection lost"));
        assert!(!f.matches(b"all good"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let (f, _rx) = filter(&["Error"]);
        assert!(f.matches(b"Error: boom"));
        assert!(!f.matches(b"error: boom"));
    }

    #[tokio::test]
    async fn test_slurp_routes_lines_and_closes_sinks() {
        let (all, mut all_rx) = filter(&[]);
        let (errors, mut err_rx) = filter(&["ERR"]);
        let input: &[u8] = b"ok 1\nERR 2\r\nok 3\nERR 4";

        let count = slurp(input, vec![all, errors]).await.unwrap();
        assert_eq!(count, 4);

        let mut seen = Vec::new();
        while let Some(line) = all_rx.recv().await {
            seen.push(line);
        }
        assert_eq!(seen, vec!["ok 1", "ERR 2", "ok 3", "ERR 4"]);

        let mut matched = Vec::new();
        while let Some(line) = err_rx.recv().await {
            matched.push(line);
        }
        assert_eq!(matched, vec!["ERR 2", "ERR 4"]);
    }

    #[tokio::test]
    async fn test_slurp_empty_input_closes_sink() {
        let (all, mut rx) = filter(&[]);
        let count = slurp(&b""[..], vec![all]).await.unwrap();
        assert_eq!(count, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slurp_tolerates_dropped_receiver() {
        let (all, rx) = filter(&[]);
        drop(rx);
        let count = slurp(&b"a\nb\n"[..], vec![all]).await.unwrap();
        assert_eq!(count, 2);
    }
}
