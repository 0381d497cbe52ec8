//! Edge-list ingestion.
//!
//! One edge per line as two unsigned node ids separated by whitespace. Blank
//! lines and lines starting with `#` are ignored.

use std::io::BufRead;

use thiserror::Error;

/// Errors raised while reading an edge list.
#[derive(Debug, Error)]
pub enum EdgeListError {
    /// Reading from the underlying source failed.
    #[error("failed to read edge list: {0}")]
    Read(#[from] std::io::Error),
    /// A line did not hold exactly two node ids.
    #[error("line {line}: {reason}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },
}

/// Parsed edges together with the smallest node count that covers them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeList {
    edges: Vec<(u64, u64)>,
    node_count: u64,
}

impl EdgeList {
    /// Parses an edge list from `reader`.
    ///
    /// # Errors
    /// Returns [`EdgeListError`] when reading fails or a line is malformed.
    ///
    /// # Examples
    /// ```
    /// use colmena_cli::cli::EdgeList;
    ///
    /// let list = EdgeList::from_reader("# pairs\n0 1\n\n4\t2\n".as_bytes())?;
    /// assert_eq!(list.edges(), &[(0, 1), (4, 2)]);
    /// assert_eq!(list.node_count(), 5);
    /// # Ok::<(), colmena_cli::cli::EdgeListError>(())
    /// ```
    pub fn from_reader(reader: impl BufRead) -> Result<Self, EdgeListError> {
        let mut list = Self::default();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (p, q) = parse_edge(trimmed).map_err(|reason| EdgeListError::Malformed {
                line: index + 1,
                reason,
            })?;
            list.push(p, q);
        }
        Ok(list)
    }

    fn push(&mut self, p: u64, q: u64) {
        self.node_count = self.node_count.max(p.saturating_add(1)).max(q.saturating_add(1));
        self.edges.push((p, q));
    }

    /// Returns the edges in file order.
    #[must_use]
    pub fn edges(&self) -> &[(u64, u64)] {
        &self.edges
    }

    /// Returns one past the largest node id mentioned.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        self.node_count
    }
}

fn parse_edge(line: &str) -> Result<(u64, u64), String> {
    let mut fields = line.split_whitespace();
    let (Some(p), Some(q), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err("expected exactly two node ids".to_owned());
    };
    let parse = |raw: &str| {
        raw.parse::<u64>()
            .map_err(|err| format!("invalid node id `{raw}`: {err}"))
    };
    Ok((parse(p)?, parse(q)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_input_has_no_nodes() {
        let list = EdgeList::from_reader("".as_bytes()).expect("empty input parses");
        assert!(list.edges().is_empty());
        assert_eq!(list.node_count(), 0);
    }

    #[rstest]
    #[case::single_id("0 1\n7\n", 2)]
    #[case::three_ids("1 2 3\n", 1)]
    #[case::negative("0 -1\n", 1)]
    #[case::text("a b\n", 1)]
    fn malformed_lines_report_their_number(#[case] input: &str, #[case] expected_line: usize) {
        match EdgeList::from_reader(input.as_bytes()) {
            Err(EdgeListError::Malformed { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected malformed line error, got {other:?}"),
        }
    }
}
