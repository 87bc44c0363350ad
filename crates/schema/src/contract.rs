//! Per-domain field contracts.
//!
//! A contract lists the fields a domain knows about, the keys each field may
//! appear under after normalization, the target type, and whether the field
//! is required. Fields not listed are ignored by validation and preserved in
//! the accepted record.
use std::collections::HashMap;
use std::sync::Arc;

use canonical::NormalizedRecord;

use crate::domain::Domain;
use crate::error::SchemaError;
use crate::validate::{validate, ValidationOutcome};

/// What to do with a date, time or timestamp that matches no layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Store null and accept the record.
    Lenient,
    /// Reject the record with `unparseable_date`.
    Strict,
}

/// Target type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Any scalar; numbers and booleans are stringified.
    Text,
    /// Non-empty string or integral number.
    Identifier,
    Integer,
    /// Money amounts and ratios. Thousands separators and symbols are stripped.
    Float,
    /// Output `YYYY-MM-DD`.
    Date(DatePolicy),
    /// Output `HH:MM:SS`.
    Time(DatePolicy),
    /// Output `YYYY-MM-DDTHH:MM:SS`.
    Timestamp(DatePolicy),
    Email,
}

/// One logical field of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Logical name, reported in field errors.
    pub name: String,
    /// Normalized keys the field may appear under, in priority order.
    pub aliases: Vec<String>,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            aliases: vec![name.to_string()],
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Replaces the alias list. Aliases are lowercased to match normalized keys.
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_lowercase()).collect();
        self
    }
}

/// The full contract of one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldContract {
    domain: Domain,
    fields: Vec<FieldSpec>,
}

impl FieldContract {
    pub fn new(domain: Domain, fields: Vec<FieldSpec>) -> Self {
        Self { domain, fields }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// The built-in contract for `domain`.
    pub fn builtin(domain: Domain) -> Self {
        let fields = match domain {
            Domain::CreditCard => credit_card_fields(),
            Domain::CustomerProfile => customer_profile_fields(),
            Domain::Retail => retail_fields(),
            Domain::Trade => trade_fields(),
            Domain::Upi => upi_fields(),
        };
        Self::new(domain, fields)
    }
}

fn credit_card_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    let mut fields = vec![
        FieldSpec::optional("recordid", Integer),
        FieldSpec::required("cust_id", Identifier).aliases(&["cust_id", "customer_id"]),
    ];
    fields.extend(
        [
            "balance",
            "balance_frequency",
            "purchases",
            "oneoff_purchases",
            "installments_purchases",
            "cash_advance",
            "purchases_frequency",
            "oneoff_purchases_frequency",
            "purchases_installments_frequency",
            "cash_advance_frequency",
            "cash_advance_trx",
            "purchases_trx",
            "credit_limit",
            "payments",
            "minimum_payments",
            "prc_full_payment",
            "tenure",
        ]
        .into_iter()
        .map(|name| FieldSpec::optional(name, Float)),
    );
    fields
}

fn customer_profile_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("customer_id", Identifier).aliases(&["customer_id", "cust_id"]),
        FieldSpec::optional("name", Text),
        FieldSpec::optional("email", Email),
        FieldSpec::optional("phone", Text),
        FieldSpec::optional("address", Text),
        FieldSpec::optional("city", Text),
        FieldSpec::optional("state", Text),
        FieldSpec::optional("zipcode", Integer),
        FieldSpec::optional("country", Text),
        FieldSpec::optional("age", Integer),
        FieldSpec::optional("gender", Text),
        FieldSpec::optional("income", Text),
        FieldSpec::optional("customer_segment", Text),
    ]
}

fn retail_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("transaction_id", Identifier),
        FieldSpec::required("customer_id", Identifier),
        FieldSpec::optional("date", Date(DatePolicy::Lenient)),
        FieldSpec::optional("year", Integer),
        FieldSpec::optional("month", Text),
        FieldSpec::optional("time", Time(DatePolicy::Lenient)),
        FieldSpec::optional("total_purchases", Integer),
        FieldSpec::optional("amount", Float),
        FieldSpec::optional("total_amount", Float),
        FieldSpec::optional("product_category", Text),
        FieldSpec::optional("product_brand", Text),
        FieldSpec::optional("product_type", Text),
        FieldSpec::optional("feedback", Text),
        FieldSpec::optional("shipping_method", Text),
        FieldSpec::optional("payment_method", Text),
        FieldSpec::optional("order_status", Text),
        FieldSpec::optional("rating", Integer),
        FieldSpec::optional("products", Text),
    ]
}

fn trade_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    vec![
        FieldSpec::required("trade_id", Identifier).aliases(&["tradeid", "trade_id"]),
        FieldSpec::optional("trade_date", Date(DatePolicy::Lenient))
            .aliases(&["tradedate", "trade_date"]),
        FieldSpec::optional("instrument", Text),
        FieldSpec::optional("symbol", Text),
        FieldSpec::optional("trade_type", Text).aliases(&["tradetype", "trade_type"]),
        FieldSpec::optional("quantity", Integer),
        FieldSpec::optional("price", Float),
        FieldSpec::required("customer_id", Identifier)
            .aliases(&["customerid", "customer_id", "cust_id"]),
        FieldSpec::optional("trade_value", Float).aliases(&["tradevalue", "trade_value"]),
        FieldSpec::optional("fee", Float),
        FieldSpec::optional("net_value", Float).aliases(&["netvalue", "net_value"]),
        FieldSpec::optional("pnl", Float),
        FieldSpec::optional("settlement_date", Date(DatePolicy::Lenient))
            .aliases(&["settlementdate", "settlement_date"]),
        FieldSpec::optional("risk_category", Text).aliases(&["riskcategory", "risk_category"]),
    ]
}

fn upi_fields() -> Vec<FieldSpec> {
    use FieldKind::*;
    let mut fields = vec![
        FieldSpec::required("transaction_id", Identifier)
            .aliases(&["transaction id", "transaction_id"]),
        FieldSpec::required("customer_id", Identifier)
            .aliases(&["customer id", "customer_id", "cust_id"]),
        FieldSpec::required("timestamp", Timestamp(DatePolicy::Strict)),
        FieldSpec::optional("transaction_type", Text)
            .aliases(&["transaction type", "transaction_type"]),
        FieldSpec::optional("merchant_category", Text),
        FieldSpec::optional("amount", Float).aliases(&["amount (inr)", "amount"]),
    ];
    fields.extend(
        [
            "transaction_status",
            "sender_age_group",
            "receiver_age_group",
            "sender_state",
            "sender_bank",
            "receiver_bank",
            "device_type",
            "network_type",
        ]
        .into_iter()
        .map(|name| FieldSpec::optional(name, Text)),
    );
    fields.extend([
        FieldSpec::optional("fraud_flag", Integer),
        FieldSpec::optional("hour_of_day", Integer),
        FieldSpec::optional("day_of_week", Text),
        FieldSpec::optional("is_weekend", Integer),
    ]);
    fields
}

/// Exactly one contract per domain.
#[derive(Debug, Clone)]
pub struct ContractSet {
    contracts: HashMap<Domain, Arc<FieldContract>>,
}

impl Default for ContractSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ContractSet {
    /// No contracts; every domain is unknown.
    pub fn empty() -> Self {
        Self {
            contracts: HashMap::new(),
        }
    }

    /// The built-in contracts for all five domains.
    pub fn builtin() -> Self {
        let mut set = Self::empty();
        for domain in Domain::ALL {
            set.insert(FieldContract::builtin(domain));
        }
        set
    }

    /// Installs a contract, replacing any previous one for the same domain.
    pub fn insert(&mut self, contract: FieldContract) -> Option<Arc<FieldContract>> {
        self.contracts.insert(contract.domain(), Arc::new(contract))
    }

    pub fn get(&self, domain: Domain) -> Result<&FieldContract, SchemaError> {
        self.contracts
            .get(&domain)
            .map(Arc::as_ref)
            .ok_or_else(|| SchemaError::UnknownDomain(domain.to_string()))
    }

    pub fn contains(&self, domain: Domain) -> bool {
        self.contracts.contains_key(&domain)
    }

    /// Validates one record against the contract of `domain`.
    pub fn validate(
        &self,
        domain: Domain,
        record: &NormalizedRecord,
    ) -> Result<ValidationOutcome, SchemaError> {
        Ok(validate(self.get(domain)?, record))
    }
}
