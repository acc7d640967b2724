//! Textual ingestion grammars: prefix files, prefix-distribution files,
//! and address files, for both IPv4 and IPv6.
//!
//! Ported from `read_prefixes`/`read_prefix_distribution`/`read_addresses`
//! in `bloomfwd_opt.c` / `main_opt.c` (both v4 and v6 variants), rendered
//! as parsers over `&str`/`BufRead` rather than `fscanf` call sequences.
//! No panics: every malformed line yields an [`IngestError`].

use core::fmt;
use std::io::BufRead;

use crate::cpe::{Prefix, Prefix64};

#[derive(Debug)]
pub enum IngestError {
    Io(std::io::Error),
    MalformedLine { line_no: usize, text: String },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "I/O error: {e}"),
            IngestError::MalformedLine { line_no, text } => {
                write!(f, "malformed record at line {line_no}: {text:?}")
            }
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Io(e)
    }
}

/// One record from a prefix-distribution file: "at most `quantity`
/// prefixes of length `netmask` will be inserted."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionRecord {
    pub netmask: u8,
    pub quantity: u32,
}

/// Parses a prefix-distribution file: one `<netmask> <quantity>` record
/// per line.
pub fn parse_distribution<R: BufRead>(reader: R) -> Result<Vec<DistributionRecord>, IngestError> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let netmask = fields
            .next()
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| malformed(i, &line))?;
        let quantity = fields
            .next()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| malformed(i, &line))?;
        out.push(DistributionRecord { netmask, quantity });
    }
    Ok(out)
}

fn malformed(line_no: usize, text: &str) -> IngestError {
    IngestError::MalformedLine {
        line_no: line_no + 1,
        text: text.to_string(),
    }
}

fn parse_ipv4_octets(s: &str) -> Option<[u8; 4]> {
    let mut parts = s.split('.');
    let mut out = [0u8; 4];
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn ipv4_to_u32(octets: [u8; 4]) -> u32 {
    u32::from_be_bytes(octets)
}

fn infer_ipv4_length(octets: [u8; 4]) -> u8 {
    if octets[3] != 0 {
        32
    } else if octets[2] != 0 {
        24
    } else if octets[1] != 0 {
        16
    } else if octets[0] != 0 {
        8
    } else {
        0
    }
}

/// Parses an IPv4 prefix file: `A.B.C.D[/L] E.F.G.H` per line. When `/L`
/// is omitted, it is inferred from the first non-zero trailing octet.
pub fn parse_ipv4_prefixes<R: BufRead>(reader: R) -> Result<Vec<Prefix>, IngestError> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let pfx_field = fields.next().ok_or_else(|| malformed(i, &line))?;
        let nh_field = fields.next().ok_or_else(|| malformed(i, &line))?;

        let (addr_str, explicit_len) = match pfx_field.split_once('/') {
            Some((a, l)) => (a, Some(l.parse::<u8>().map_err(|_| malformed(i, &line))?)),
            None => (pfx_field, None),
        };
        let octets = parse_ipv4_octets(addr_str).ok_or_else(|| malformed(i, &line))?;
        let length = explicit_len.unwrap_or_else(|| infer_ipv4_length(octets));
        let key = ipv4_to_u32(octets);
        let nh_octets = parse_ipv4_octets(nh_field).ok_or_else(|| malformed(i, &line))?;
        let next_hop = ipv4_to_u32(nh_octets);

        out.push(Prefix {
            key,
            length,
            next_hop,
        });
    }
    Ok(out)
}

/// Parses an IPv4 address file: a decimal count on the first line,
/// followed by that many `A.B.C.D` addresses.
pub fn parse_ipv4_addresses<R: BufRead>(reader: R) -> Result<Vec<u32>, IngestError> {
    let mut lines = reader.lines();
    let count_line = lines
        .next()
        .ok_or_else(|| malformed(0, ""))??;
    let count: usize = count_line
        .trim()
        .parse()
        .map_err(|_| malformed(0, &count_line))?;
    let mut out = Vec::with_capacity(count);
    for (i, line) in lines.enumerate() {
        if out.len() == count {
            break;
        }
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let octets = parse_ipv4_octets(trimmed).ok_or_else(|| malformed(i + 1, &line))?;
        out.push(ipv4_to_u32(octets));
    }
    Ok(out)
}

fn parse_ipv6_words(s: &str) -> Option<[u16; 8]> {
    let mut parts = s.split(':');
    let mut out = [0u16; 8];
    for slot in out.iter_mut() {
        *slot = u16::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn ipv6_words_to_reduced_key(words: [u16; 8]) -> u64 {
    // Upper 64 bits of the address, as used throughout the reduced-key
    // IPv6 variant: words[0..4] packed big-endian.
    let mut key = 0u64;
    for w in &words[0..4] {
        key = (key << 16) | (*w as u64);
    }
    key
}

/// Packs all 8 words into the full 128-bit address. Used for `next_hop`
/// values, which are never reduced even though lookup keys are.
fn ipv6_words_to_address(words: [u16; 8]) -> u128 {
    let mut addr = 0u128;
    for w in &words {
        addr = (addr << 16) | (*w as u128);
    }
    addr
}

/// Parses an IPv6 prefix file: `a:b:c:d:e:f:g:h/L i:j:k:l:m:n:o:p` per
/// line, each field a 16-bit hex word. Prefixes with `L > 64` are
/// reported as skipped (via the returned `skipped` count) rather than
/// stored, since the reduced-key scheme only covers the upper 64 bits.
pub struct Ipv6ParseResult {
    pub prefixes: Vec<Prefix64>,
    pub skipped: usize,
}

pub fn parse_ipv6_prefixes<R: BufRead>(reader: R) -> Result<Ipv6ParseResult, IngestError> {
    let mut prefixes = Vec::new();
    let mut skipped = 0usize;
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut fields = trimmed.split_whitespace();
        let pfx_field = fields.next().ok_or_else(|| malformed(i, &line))?;
        let nh_field = fields.next().ok_or_else(|| malformed(i, &line))?;

        let (addr_str, len_str) = pfx_field.split_once('/').ok_or_else(|| malformed(i, &line))?;
        let length: u8 = len_str.parse().map_err(|_| malformed(i, &line))?;
        let words = parse_ipv6_words(addr_str).ok_or_else(|| malformed(i, &line))?;
        let nh_words = parse_ipv6_words(nh_field).ok_or_else(|| malformed(i, &line))?;

        if length > 64 {
            skipped += 1;
            continue;
        }
        prefixes.push(Prefix64 {
            key: ipv6_words_to_reduced_key(words),
            length,
            next_hop: ipv6_words_to_address(nh_words),
        });
    }
    Ok(Ipv6ParseResult { prefixes, skipped })
}

/// Parses an IPv6 address file: decimal count, then that many full
/// 8-word addresses, reduced to their upper 64 bits.
pub fn parse_ipv6_addresses<R: BufRead>(reader: R) -> Result<Vec<u64>, IngestError> {
    let mut lines = reader.lines();
    let count_line = lines.next().ok_or_else(|| malformed(0, ""))??;
    let count: usize = count_line
        .trim()
        .parse()
        .map_err(|_| malformed(0, &count_line))?;
    let mut out = Vec::with_capacity(count);
    for (i, line) in lines.enumerate() {
        if out.len() == count {
            break;
        }
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let words = parse_ipv6_words(trimmed).ok_or_else(|| malformed(i + 1, &line))?;
        out.push(ipv6_words_to_reduced_key(words));
    }
    Ok(out)
}
