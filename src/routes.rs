//! Route-file loading and next-hop interning.
//!
//! Forwarding tables arrive as UTF-8 text, one `A.B.C.D/len next_hop` per
//! line. Next-hop tokens are opaque; each distinct token is assigned a dense
//! fib index in first-seen order, and that index is what [`Poptrie`] lookups
//! return.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

use thiserror::Error;

use crate::poptrie::Poptrie;
use crate::trie::MultiwayTrie;

/// Loader failure taxonomy.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A line could not be parsed: bad octet, missing field or length > 32.
    #[error("malformed prefix on line {line}")]
    Malformed {
        /// 1-based line number of the offending line.
        line: usize,
    },
    /// Reading the route file failed.
    #[error("failed to read route file: {0}")]
    Io(#[from] io::Error),
    /// The file contained no routes.
    #[error("route file contains no routes")]
    Empty,
}

/// One parsed forwarding entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteEntry {
    /// Network address (host byte order).
    pub addr: u32,
    /// Prefix length in bits, 0..=32.
    pub prefix_len: u8,
    /// Dense index of the entry's next hop.
    pub fib_index: u32,
}

/// A parsed forwarding table: entries in file order plus the interned
/// next-hop tokens they index into.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
    next_hops: Vec<String>,
}

impl RouteTable {
    /// Reads and parses a route file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RouteError> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data)
    }

    /// Parses route-file text. Blank lines are skipped; the first malformed
    /// line aborts with its line number.
    pub fn parse(data: &str) -> Result<Self, RouteError> {
        let mut entries = Vec::new();
        let mut next_hops: Vec<String> = Vec::new();
        let mut interned: HashMap<String, u32> = HashMap::new();

        for (i, line) in data.lines().enumerate() {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (addr, prefix_len, hop) =
                parse_line(line).ok_or(RouteError::Malformed { line: i + 1 })?;
            let fib_index = match interned.get(hop) {
                Some(&idx) => idx,
                None => {
                    let idx = next_hops.len() as u32;
                    interned.insert(hop.to_owned(), idx);
                    next_hops.push(hop.to_owned());
                    idx
                }
            };
            entries.push(RouteEntry {
                addr,
                prefix_len,
                fib_index,
            });
        }

        if entries.is_empty() {
            return Err(RouteError::Empty);
        }
        Ok(RouteTable { entries, next_hops })
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Interned next-hop tokens; `next_hops()[fib_index]` is the token a
    /// lookup result refers to.
    pub fn next_hops(&self) -> &[String] {
        &self.next_hops
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts every entry in file order and compiles the result.
    pub fn build_poptrie(&self, direct_bits: u8) -> Poptrie {
        let mut trie = MultiwayTrie::new();
        for e in &self.entries {
            trie.insert(e.addr, e.prefix_len, e.fib_index);
        }
        trie.build_poptrie(direct_bits)
    }
}

fn parse_line(line: &str) -> Option<(u32, u8, &str)> {
    let (prefix, rest) = line.split_once(' ')?;
    let hop = rest.split_whitespace().next()?;
    let (addr, len) = prefix.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let len: u8 = len.parse().ok()?;
    if len > 32 {
        return None;
    }
    Some((u32::from(addr), len, hop))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_interns_in_first_seen_order() {
        let table = RouteTable::parse(
            "0.0.0.0/0 gw-a\n\
             10.0.0.0/8 gw-b\n\
             10.1.0.0/16 gw-a\n\
             192.168.0.0/16 gw-c\n",
        )
        .unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.next_hops(), ["gw-a", "gw-b", "gw-c"]);
        assert_eq!(
            table.entries()[2],
            RouteEntry {
                addr: u32::from_be_bytes([10, 1, 0, 0]),
                prefix_len: 16,
                fib_index: 0,
            }
        );
    }

    #[test]
    fn tolerates_trailing_whitespace_and_blank_lines() {
        let table = RouteTable::parse("1.2.3.0/24 hop  \n\n4.5.6.0/24 hop\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.next_hops().len(), 1);
    }

    #[test]
    fn reports_malformed_line_numbers() {
        let err = RouteTable::parse("0.0.0.0/0 a\n256.0.0.0/8 b\n").unwrap_err();
        assert!(matches!(err, RouteError::Malformed { line: 2 }));

        let err = RouteTable::parse("1.2.3.4/33 a\n").unwrap_err();
        assert!(matches!(err, RouteError::Malformed { line: 1 }));

        let err = RouteTable::parse("1.2.3.4/8\n").unwrap_err();
        assert!(matches!(err, RouteError::Malformed { line: 1 }));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(RouteTable::parse(""), Err(RouteError::Empty)));
        assert!(matches!(RouteTable::parse("\n\n"), Err(RouteError::Empty)));
    }

    #[test]
    fn builds_a_queryable_poptrie() {
        let table = RouteTable::parse("0.0.0.0/0 a\n10.0.0.0/8 b\n").unwrap();
        let pop = table.build_poptrie(12);
        assert_eq!(pop.lookup(u32::from_be_bytes([10, 9, 8, 7])), 1);
        assert_eq!(pop.lookup(u32::from_be_bytes([11, 9, 8, 7])), 0);
    }
}
