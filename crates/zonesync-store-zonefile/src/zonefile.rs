//! BIND-style zone file format
//!
//! Parsing supports the subset of RFC 1035 master file syntax that hand-kept
//! zone files use in practice:
//!
//! - `$ORIGIN` and `$TTL` directives (`$INCLUDE` is rejected)
//! - `@` for the origin, relative owner names, and blank owners that repeat
//!   the previous one
//! - optional TTL (plain seconds or `1h30m` style) and class in either order
//! - `;` comments, quoted strings, and parenthesised multi-line records
//!
//! A, AAAA and PTR records inside the zone are *managed*: they are what the
//! store loads, diffs and rewrites. The SOA is kept apart so its serial can
//! be bumped. Everything else is carried through with its meaning intact:
//! relative names inside its rdata are qualified against the `$ORIGIN` in
//! effect where it was read, since the rendered file has a single `$ORIGIN`.

use std::fmt::Write as _;

use zonesync_core::config::SoaConfig;
use zonesync_core::diff::ZoneDelta;
use zonesync_core::name::{canonical_name, fqdn, is_in_zone};
use zonesync_core::record::{Record, RecordType};
use zonesync_core::zone::Zone;

/// Zone file syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number where the offending record starts
    pub line: usize,
    /// What was wrong
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Start of authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Soa {
    pub ttl: u32,
    pub mname: String,
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

impl Soa {
    /// SOA built from zone configuration
    pub fn from_config(config: &SoaConfig, ttl: u32, serial: u32) -> Self {
        Self {
            ttl,
            mname: fqdn(&config.mname),
            rname: fqdn(&config.rname),
            serial,
            refresh: config.refresh,
            retry: config.retry,
            expire: config.expire,
            minimum: config.minimum,
        }
    }
}

/// In-memory form of one zone file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneFile {
    /// Zone apex, written as `$ORIGIN`
    pub origin: String,
    /// Written as `$TTL`; the file's first `$TTL` when it has one
    pub default_ttl: u32,
    pub soa: Option<Soa>,
    /// Records the store does not manage, in file order
    pub preserved: Vec<Record>,
    /// A/AAAA/PTR records inside the zone
    pub managed: Vec<Record>,
}

impl ZoneFile {
    /// An empty zone file
    pub fn new(origin: &str, default_ttl: u32) -> Self {
        Self {
            origin: fqdn(origin).to_ascii_lowercase(),
            default_ttl,
            soa: None,
            preserved: Vec::new(),
            managed: Vec::new(),
        }
    }

    /// Parse zone file text.
    ///
    /// `origin` is the initial `$ORIGIN`. `default_ttl` applies to records
    /// with no TTL when the file has no `$TTL` either.
    pub fn parse(content: &str, origin: &str, default_ttl: u32) -> Result<Self, ParseError> {
        let mut file = Self::new(origin, default_ttl);
        let mut current_origin = file.origin.clone();
        let mut dollar_ttl: Option<u32> = None;
        let mut last_owner: Option<String> = None;

        for line in logical_lines(content)? {
            let tokens = tokenize(&line.text);
            let Some(first) = tokens.first() else {
                continue;
            };

            if first.starts_with('$') {
                let argument = tokens
                    .get(1)
                    .ok_or_else(|| ParseError::new(line.number, format!("{first} needs an argument")))?;
                match first.to_ascii_uppercase().as_str() {
                    "$ORIGIN" => current_origin = qualify(argument, &current_origin),
                    "$TTL" => {
                        let ttl = parse_ttl(argument).ok_or_else(|| {
                            ParseError::new(line.number, format!("invalid $TTL {argument:?}"))
                        })?;
                        if dollar_ttl.is_none() {
                            file.default_ttl = ttl;
                        }
                        dollar_ttl = Some(ttl);
                    }
                    other => {
                        return Err(ParseError::new(line.number, format!("unsupported directive {other}")));
                    }
                }
                continue;
            }

            let (owner, fields) = if line.continues_owner {
                let owner = last_owner
                    .clone()
                    .ok_or_else(|| ParseError::new(line.number, "record without an owner name"))?;
                (owner, &tokens[..])
            } else {
                (qualify(first, &current_origin), &tokens[1..])
            };

            let mut ttl = None;
            let mut idx = 0;
            while idx < fields.len() {
                let field = fields[idx].as_str();
                if ttl.is_none() && field.starts_with(|c: char| c.is_ascii_digit()) {
                    ttl = Some(parse_ttl(field).ok_or_else(|| {
                        ParseError::new(line.number, format!("invalid TTL {field:?}"))
                    })?);
                } else if field.eq_ignore_ascii_case("IN") {
                    // only class supported
                } else if ["CH", "HS", "CS"].iter().any(|c| field.eq_ignore_ascii_case(c)) {
                    return Err(ParseError::new(line.number, format!("unsupported class {field}")));
                } else {
                    break;
                }
                idx += 1;
            }

            let type_token = fields
                .get(idx)
                .ok_or_else(|| ParseError::new(line.number, "missing record type"))?;
            let Ok(record_type) = type_token.parse::<RecordType>();
            let rdata = &fields[idx + 1..];
            if rdata.is_empty() {
                return Err(ParseError::new(line.number, format!("{record_type} record without data")));
            }
            let ttl = ttl.or(dollar_ttl).unwrap_or(default_ttl);

            match record_type {
                RecordType::Soa => {
                    if file.soa.is_some() {
                        return Err(ParseError::new(line.number, "more than one SOA record"));
                    }
                    file.soa = Some(parse_soa(rdata, ttl, &current_origin, line.number)?);
                }
                RecordType::A | RecordType::Aaaa if is_in_zone(&owner, &file.origin) => {
                    file.managed.push(Record::new(&owner, record_type, rdata.to_vec()).with_ttl(ttl));
                }
                RecordType::Ptr if is_in_zone(&owner, &file.origin) => {
                    let targets = rdata
                        .iter()
                        .map(|t| canonical_name(&qualify(t, &current_origin)))
                        .collect();
                    file.managed.push(Record::new(&owner, record_type, targets).with_ttl(ttl));
                }
                _ => {
                    let rdata = qualify_rdata_names(&record_type, rdata, &current_origin);
                    file.preserved.push(Record::new(&owner, record_type, rdata).with_ttl(ttl));
                }
            }

            last_owner = Some(owner);
        }

        Ok(file)
    }

    /// Render as zone file text
    ///
    /// Order: directives, SOA, preserved records in their original order,
    /// then managed records sorted by owner name and type.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "$ORIGIN {}", self.origin);
        let _ = writeln!(out, "$TTL {}", self.default_ttl);

        if let Some(soa) = &self.soa {
            let _ = writeln!(
                out,
                "{} {} IN SOA {} {} {} {} {} {} {}",
                self.origin,
                soa.ttl,
                soa.mname,
                soa.rname,
                soa.serial,
                soa.refresh,
                soa.retry,
                soa.expire,
                soa.minimum
            );
        }

        for record in &self.preserved {
            write_record(&mut out, record);
        }

        let mut managed: Vec<&Record> = self.managed.iter().collect();
        managed.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.record_type.cmp(&b.record_type))
        });
        for record in managed {
            write_record(&mut out, record);
        }

        out
    }

    /// Managed records as a core zone
    pub fn to_zone(&self, name: &str, ttl: u32) -> Zone {
        let mut zone = Zone::new(name, ttl);
        for record in &self.managed {
            zone.add_record(record.clone());
        }
        zone
    }

    /// Apply a delta to the managed records.
    ///
    /// Additions are appended. Each removal deletes one equal record; a
    /// removal with no match is skipped. Returns `(added, removed)`.
    pub fn apply(&mut self, changes: &ZoneDelta) -> (usize, usize) {
        let mut added = 0;
        for record in changes.additions() {
            let mut record = record.clone();
            if record.ttl == zonesync_core::record::INHERIT_TTL {
                record.ttl = self.default_ttl;
            }
            self.managed.push(record);
            added += 1;
        }

        let mut removed = 0;
        for record in changes.removals() {
            match self.managed.iter().position(|r| r == record) {
                Some(pos) => {
                    self.managed.remove(pos);
                    removed += 1;
                }
                None => tracing::debug!("Record to remove not in zone file: {}", record),
            }
        }

        (added, removed)
    }
}

fn write_record(out: &mut String, record: &Record) {
    let _ = writeln!(
        out,
        "{} {} IN {} {}",
        record.name,
        record.ttl,
        record.record_type,
        record.rdata.join(" ")
    );
}

fn parse_soa(rdata: &[String], ttl: u32, origin: &str, line: usize) -> Result<Soa, ParseError> {
    let [mname, rname, serial, refresh, retry, expire, minimum] = rdata else {
        return Err(ParseError::new(
            line,
            format!("SOA needs 7 fields, found {}", rdata.len()),
        ));
    };

    let number = |field: &str, what: &str| {
        parse_ttl(field).ok_or_else(|| ParseError::new(line, format!("invalid SOA {what} {field:?}")))
    };

    Ok(Soa {
        ttl,
        mname: qualify(mname, origin),
        rname: qualify(rname, origin),
        serial: serial
            .parse()
            .map_err(|_| ParseError::new(line, format!("invalid SOA serial {serial:?}")))?,
        refresh: number(refresh.as_str(), "refresh")?,
        retry: number(retry.as_str(), "retry")?,
        expire: number(expire.as_str(), "expire")?,
        minimum: number(minimum.as_str(), "minimum")?,
    })
}

/// Positions of domain-name fields in the rdata of common types
fn name_fields(record_type: &RecordType) -> &'static [usize] {
    match record_type.as_str() {
        "NS" | "CNAME" | "DNAME" | "PTR" => &[0],
        "MX" | "KX" | "AFSDB" => &[1],
        "SRV" => &[3],
        "RP" => &[0, 1],
        _ => &[],
    }
}

/// Rdata with its domain-name fields made absolute
fn qualify_rdata_names(record_type: &RecordType, rdata: &[String], origin: &str) -> Vec<String> {
    let fields = name_fields(record_type);
    rdata
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            if fields.contains(&idx) {
                qualify(value, origin)
            } else {
                value.clone()
            }
        })
        .collect()
}

/// Complete a possibly relative name against `origin`
fn qualify(name: &str, origin: &str) -> String {
    if name == "@" {
        origin.to_string()
    } else if name.ends_with('.') {
        name.to_string()
    } else if origin == "." {
        format!("{name}.")
    } else {
        format!("{name}.{origin}")
    }
}

/// Parse a TTL: plain seconds, or unit groups such as `1h30m` (s, m, h, d, w)
pub fn parse_ttl(value: &str) -> Option<u32> {
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok();
    }

    let mut total: u64 = 0;
    let mut number: Option<u64> = None;
    for c in value.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = Some(number.unwrap_or(0).checked_mul(10)?.checked_add(u64::from(digit))?);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            'w' => 604_800,
            _ => return None,
        };
        total = total.checked_add(number.take()?.checked_mul(unit)?)?;
    }

    // Trailing digits without a unit are seconds
    if let Some(seconds) = number {
        total = total.checked_add(seconds)?;
    }
    u32::try_from(total).ok()
}

struct LogicalLine {
    number: usize,
    text: String,
    continues_owner: bool,
}

/// Join parenthesised continuations and drop comments and blank lines
fn logical_lines(content: &str) -> Result<Vec<LogicalLine>, ParseError> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    let mut depth: i32 = 0;

    for (idx, raw) in content.lines().enumerate() {
        let number = idx + 1;
        let text = strip_comment(raw);

        match pending.as_mut() {
            Some(line) => {
                line.text.push(' ');
                line.text.push_str(text);
            }
            None if text.trim().is_empty() => continue,
            None => {
                pending = Some(LogicalLine {
                    number,
                    text: text.to_string(),
                    continues_owner: text.starts_with([' ', '\t']),
                });
            }
        }

        depth += paren_balance(text);
        if depth < 0 {
            return Err(ParseError::new(number, "unbalanced ')'"));
        }
        if depth == 0 {
            lines.extend(pending.take());
        }
    }

    if let Some(line) = pending {
        return Err(ParseError::new(line.number, "unterminated '('"));
    }
    Ok(lines)
}

/// Text before the first `;` outside quotes
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn paren_balance(text: &str) -> i32 {
    let mut in_quotes = false;
    let mut balance = 0;
    for c in text.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => balance += 1,
            ')' if !in_quotes => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// Split on whitespace and parentheses, keeping quoted strings whole
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if !in_quotes && (c.is_whitespace() || c == '(' || c == ')') => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
