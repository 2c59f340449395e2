//! Device identity: rank table, identity record and the precedence rule.
//!
//! Every piece of evidence about a device (its address, advertised name,
//! service UUIDs, manufacturer data, a follow-up query) *proposes* an
//! identity string together with an [`IdType`] rank. Whether the proposal is
//! adopted is decided solely by [`accepts`].

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Signed priority rank of an identity classification.
///
/// Negative ranks suppress the device, zero means unset, and larger positive
/// ranks are more specific (more trusted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdType(pub i16);

#[allow(missing_docs)]
impl IdType {
    pub const ECHO_LOST: Self = Self(-10);
    pub const MISC_APPLE: Self = Self(-5);
    pub const NONE: Self = Self(0);
    pub const RAND_MAC: Self = Self(1);
    pub const RAND_STATIC_MAC: Self = Self(5);
    pub const AD: Self = Self(10);
    pub const SD: Self = Self(15);
    pub const MD: Self = Self(20);
    pub const MISC: Self = Self(30);
    pub const FINDMY: Self = Self(32);
    pub const NAME: Self = Self(35);
    pub const MSFT: Self = Self(40);
    pub const PUBLIC_MAC: Self = Self(55);
    pub const SONOS: Self = Self(105);
    pub const GARMIN: Self = Self(110);
    pub const MITHERM: Self = Self(115);
    pub const MIFIT: Self = Self(120);
    pub const EXPOSURE: Self = Self(125);
    pub const SMARTTAG: Self = Self(130);
    pub const ITAG: Self = Self(135);
    pub const ITRACK: Self = Self(140);
    pub const NUT: Self = Self(141);
    pub const FLORA: Self = Self(142);
    pub const TRACKR: Self = Self(145);
    pub const TILE: Self = Self(150);
    pub const MEATER: Self = Self(155);
    pub const TRACTIVE: Self = Self(160);
    pub const VANMOOF: Self = Self(165);
    pub const APPLE_NEARBY: Self = Self(170);
    pub const QUERY_MODEL: Self = Self(175);
    pub const QUERY_NAME: Self = Self(180);
    pub const EBEACON: Self = Self(190);
    pub const ABEACON: Self = Self(195);
    pub const IBEACON: Self = Self(200);
    pub const KNOWN_IRK: Self = Self(205);
    pub const KNOWN_MAC: Self = Self(210);
    pub const ALIAS: Self = Self(250);
}

impl IdType {
    /// Raw rank value.
    #[must_use]
    pub const fn value(self) -> i16 {
        self.0
    }

    /// `true` for ranks that suppress the device.
    #[must_use]
    pub const fn is_ignored(self) -> bool {
        self.0 < 0
    }

    /// `true` if no classification has been adopted yet.
    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The monotonic precedence rule.
///
/// A device already positively classified only moves to a strictly more
/// specific rank. A device already ignored only moves to a strictly more
/// negative rank, or to any positive one.
#[must_use]
pub const fn accepts(current: IdType, proposed: IdType) -> bool {
    let (cur, new) = (current.0, proposed.0);
    if cur < 0 && new < 0 && new >= cur {
        return false;
    }
    !(cur > 0 && new <= cur)
}

/// An identity proposal produced by a decoder, the address classifier, a
/// follow-up query or an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Proposed identity string.
    pub id: String,
    /// Rank of the proposal.
    pub id_type: IdType,
    /// Display name carried with the proposal.
    pub name: Option<String>,
}

impl Proposal {
    /// Proposal without a display name.
    #[must_use]
    pub fn new(id: impl Into<String>, id_type: IdType) -> Self {
        Self {
            id: id.into(),
            id_type,
            name: None,
        }
    }

    /// Attaches a display name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The identity currently adopted for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Identity string, e.g. `apple:1005:9`.
    pub id: String,
    /// Rank of `id`.
    pub id_type: IdType,
    /// Display name.
    pub name: Option<String>,
    /// Filtered out by the include/exclude lists.
    pub hidden: bool,
    /// Suppressed by a negative rank.
    pub ignore: bool,
    /// Eligible for occupancy counting.
    pub countable: bool,
    /// Eligible for follow-up queries.
    pub allow_query: bool,
}

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

/// Normalises free text into a case- and space-insensitive token,
/// e.g. `"Jane's iPhone"` becomes `jane-s-iphone`.
#[must_use]
pub fn slug(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    NON_SLUG
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}
