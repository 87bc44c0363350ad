use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Business category of a batch. Selects the contract, the warehouse store
/// and the aggregate bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    CreditCard,
    Retail,
    Trade,
    Upi,
    CustomerProfile,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::CreditCard,
        Domain::Retail,
        Domain::Trade,
        Domain::Upi,
        Domain::CustomerProfile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::CreditCard => "credit_card",
            Domain::Retail => "retail",
            Domain::Trade => "trade",
            Domain::Upi => "upi",
            Domain::CustomerProfile => "customer_profile",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = SchemaError;

    /// Accepts the snake_case name plus the hyphenated and squashed forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "creditcard" => Ok(Domain::CreditCard),
            "retail" => Ok(Domain::Retail),
            "trade" => Ok(Domain::Trade),
            "upi" => Ok(Domain::Upi),
            "customerprofile" | "customer" => Ok(Domain::CustomerProfile),
            _ => Err(SchemaError::UnknownDomain(s.to_string())),
        }
    }
}
