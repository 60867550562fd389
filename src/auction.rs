use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type Amount = f64;
pub type Timestamp = i64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid {kind} identifier: {value:?}")]
    InvalidIdentifier { kind: IdKind, value: String },
    #[error("invalid bid amount: {0}")]
    InvalidAmount(Amount),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IdKind {
    Item,
    User,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdKind::Item => "item",
            IdKind::User => "user",
        })
    }
}

macro_rules! uuid_id {
    ($name:ident, $kind:expr) => {
        /// Accepts any form `Uuid::parse_str` does; always printed hyphenated.
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Uuid);

        impl $name {
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_owned(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(ItemId, IdKind::Item);
uuid_id!(UserId, IdKind::User);

/// Amounts must be finite and non-negative.
pub fn validate_amount(amount: Amount) -> Result<Amount, ValidationError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(ValidationError::InvalidAmount(amount))
    }
}

/// An accepted bid. Never mutated after acceptance.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    #[serde(rename = "itemuuid")]
    pub item_id: ItemId,
    #[serde(rename = "useruuid")]
    pub user_id: UserId,
    pub timestamp: Timestamp,
    pub amount: Amount,
}

impl Bid {
    /// Whether `self`, accepted after `current`, takes the lead from it.
    ///
    /// Equal amounts go to the earlier timestamp; equal timestamps keep the
    /// bid that was accepted first.
    pub fn outbids(&self, current: &Bid) -> bool {
        self.amount > current.amount
            || (self.amount == current.amount && self.timestamp < current.timestamp)
    }
}

/// Winning bid of an acceptance-ordered sequence of bids for one item.
pub fn resolve_winner<'a, I>(bids: I) -> Option<&'a Bid>
where
    I: IntoIterator<Item = &'a Bid>,
{
    bids.into_iter().fold(None, |winner, bid| match winner {
        Some(current) if !bid.outbids(current) => Some(current),
        _ => Some(bid),
    })
}
