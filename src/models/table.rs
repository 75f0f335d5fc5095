use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Tables the service reads and writes. `annonser` and `uthyrning` are
/// legacy listing tables still reachable through the delete endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingTable {
    Annonser,
    Uthyrning,
    Listings,
    Profiles,
}

impl ListingTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingTable::Annonser => "annonser",
            ListingTable::Uthyrning => "uthyrning",
            ListingTable::Listings => "listings",
            ListingTable::Profiles => "profiles",
        }
    }

    /// Columns that may hold the creator's user id.
    pub fn owner_id_columns(&self) -> &'static [&'static str] {
        match self {
            ListingTable::Listings => &["user_id", "created_by", "owner_id"],
            ListingTable::Annonser | ListingTable::Uthyrning => {
                &["created_by", "owner_id", "user_id"]
            }
            ListingTable::Profiles => &["id"],
        }
    }

    /// Columns that may hold the creator's contact email.
    pub fn owner_email_columns(&self) -> &'static [&'static str] {
        match self {
            ListingTable::Profiles => &[],
            _ => &["contact_email", "email"],
        }
    }
}

impl fmt::Display for ListingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown listing table '{0}'")]
pub struct UnknownTable(pub String);

/// Parses the listing tables a client may name. `profiles` is not one of
/// them.
impl FromStr for ListingTable {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annonser" => Ok(ListingTable::Annonser),
            "uthyrning" => Ok(ListingTable::Uthyrning),
            "listings" => Ok(ListingTable::Listings),
            other => Err(UnknownTable(other.to_string())),
        }
    }
}
