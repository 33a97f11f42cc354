//! CAN bus identity discovery.
//!
//! The identity query prints free-form text containing zero or more
//! `canbus_uuid=<hex>` occurrences. That text is parsed at this boundary
//! into a set of [`Identifier`]s; nothing past here sees the raw output.
//!
//! The two boards cannot be told apart on the bus. The FPS is identified
//! by being the only board attached when it is first queried; the mainboard
//! is then "the other one" once both appear.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ProvisionError, ProvisionResult};
use crate::runner::{CommandRunner, CommandSpec};

/// Identifier pattern in the identity query output.
pub const IDENTIFIER_PATTERN: &str = r"canbus_uuid=([0-9a-fA-F]+)";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is a valid regex"));

/// Opaque hex token a board reports on the CAN bus.
///
/// Stored lowercase, so equality is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProvisionError::InvalidState(format!(
                "not a hexadecimal identifier: {:?}",
                s
            )));
        }
        Ok(Identifier(trimmed.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Identifier {
    type Error = ProvisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract every identifier in `text`. Duplicates collapse.
pub fn parse_identifiers(text: &str) -> BTreeSet<Identifier> {
    IDENTIFIER_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Exactly one identity must be present; anything else is fatal.
pub fn require_single(found: BTreeSet<Identifier>) -> ProvisionResult<Identifier> {
    if found.len() != 1 {
        return Err(ProvisionError::Ambiguous(format!(
            "expected exactly one board on the bus, found {}{}",
            found.len(),
            describe(&found)
        )));
    }
    found
        .into_iter()
        .next()
        .ok_or_else(|| ProvisionError::Ambiguous("no board on the bus".to_string()))
}

/// Outcome of looking for a second board next to a known one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disambiguation {
    /// The known board and exactly one other are present.
    Resolved(Identifier),
    /// Not there yet: the known board is missing or is alone.
    Pending,
    /// The known board plus more than one other; refusing to guess.
    Ambiguous(BTreeSet<Identifier>),
}

/// Find the board that is not `known` in `found`.
pub fn disambiguate(known: &Identifier, found: &BTreeSet<Identifier>) -> Disambiguation {
    if !found.contains(known) {
        return Disambiguation::Pending;
    }

    let mut others = found.iter().filter(|id| *id != known);
    match (others.next(), others.next()) {
        (None, _) => Disambiguation::Pending,
        (Some(other), None) => Disambiguation::Resolved(other.clone()),
        (Some(_), Some(_)) => Disambiguation::Ambiguous(found.clone()),
    }
}

fn describe(found: &BTreeSet<Identifier>) -> String {
    if found.is_empty() {
        return String::new();
    }
    let ids: Vec<&str> = found.iter().map(Identifier::as_str).collect();
    format!(": {}", ids.join(", "))
}

/// Runs the identity query and parses its output.
#[derive(Clone)]
pub struct IdentityDiscovery {
    runner: Arc<dyn CommandRunner>,
    query: CommandSpec,
}

impl IdentityDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, query: CommandSpec) -> Self {
        Self { runner, query }
    }

    pub fn query(&self) -> &CommandSpec {
        &self.query
    }

    /// One round of discovery.
    ///
    /// The query's exit status is not meaningful beyond its output; a
    /// failing query is logged and yields whatever it printed.
    pub async fn discover(&self) -> ProvisionResult<BTreeSet<Identifier>> {
        let captured = self.runner.capture(&self.query).await?;
        if !captured.success() {
            tracing::debug!(code = captured.code, "Identity query exited non-zero");
        }
        let found = parse_identifiers(&captured.stdout);
        tracing::debug!(count = found.len(), "Identity query{}", describe(&found));
        Ok(found)
    }

    /// Discover and require exactly one identity.
    pub async fn discover_single(&self) -> ProvisionResult<Identifier> {
        require_single(self.discover().await?)
    }

    /// One disambiguation round against `known`.
    pub async fn disambiguate(&self, known: &Identifier) -> ProvisionResult<Disambiguation> {
        Ok(disambiguate(known, &self.discover().await?))
    }
}
