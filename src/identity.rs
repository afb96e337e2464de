//! Deterministic entity identities
//!
//! Shape: `{accountId}|{domain}|{typeTag}|{hash}` where `hash` is the first
//! 32 hex characters of SHA-256 over the non-empty key parts joined with `:`.
//! Callers pass parts in hierarchy order: provider, cluster, entity keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::entity::EntityKind;
use crate::error::{Result, SynthesisError};

const HASH_LEN: usize = 32;
const PART_SEPARATOR: &str = ":";
const FIELD_SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityIdentity(String);

impl EntityIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing hash segment
    pub fn hash(&self) -> &str {
        self.0.rsplit(FIELD_SEPARATOR).next().unwrap_or_default()
    }

    /// Type tag segment, e.g. `KAFKA_BROKER`
    pub fn type_tag(&self) -> Option<&str> {
        self.0.split(FIELD_SEPARATOR).nth(2)
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityGenerator {
    account_id: String,
    domain: String,
}

impl IdentityGenerator {
    pub fn new(account_id: impl Into<String>, domain: impl Into<String>) -> Result<Self> {
        let account_id = account_id.into();
        let domain = domain.into();

        for (label, value) in [("account id", &account_id), ("domain", &domain)] {
            if value.trim().is_empty() {
                return Err(SynthesisError::config(format!("{} must not be empty", label)));
            }
            if value.contains(FIELD_SEPARATOR) {
                return Err(SynthesisError::config(format!(
                    "{} '{}' must not contain '{}'",
                    label, value, FIELD_SEPARATOR
                )));
            }
        }

        Ok(IdentityGenerator { account_id, domain })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn identity<S: AsRef<str>>(&self, kind: EntityKind, parts: &[S]) -> EntityIdentity {
        let key = parts
            .iter()
            .map(AsRef::as_ref)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(PART_SEPARATOR);

        let digest = hex::encode(Sha256::digest(key.as_bytes()));

        EntityIdentity(format!(
            "{}|{}|{}|{}",
            self.account_id,
            self.domain,
            kind.type_tag(),
            &digest[..HASH_LEN]
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn generator() -> IdentityGenerator {
        IdentityGenerator::new("123456789012", "INFRA").unwrap()
    }

    #[test]
    fn test_canonical_shape() {
        let id = generator().identity(EntityKind::Broker, &["aws-msk", "c1", "broker-1"]);
        insta::assert_snapshot!(id.as_str(), @"123456789012|INFRA|KAFKA_BROKER|4b60f554e541226cac84a7e5cbe6c01c");
        assert_eq!(id.type_tag(), Some("KAFKA_BROKER"));
        assert_eq!(id.hash().len(), 32);
    }

    #[test]
    fn test_empty_parts_are_skipped() {
        let g = generator();
        let a = g.identity(EntityKind::Broker, &["aws-msk", "", "c1", "broker-1"]);
        let b = g.identity(EntityKind::Broker, &["aws-msk", "c1", "broker-1"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_order_and_kind_matter() {
        let g = generator();
        let a = g.identity(EntityKind::Topic, &["aws-msk", "c1", "orders"]);
        let b = g.identity(EntityKind::Topic, &["aws-msk", "orders", "c1"]);
        let c = g.identity(EntityKind::ConsumerGroup, &["aws-msk", "c1", "orders"]);
        assert_ne!(a, b);
        assert_ne!(a.as_str(), c.as_str());
        assert_eq!(a.hash(), c.hash());
    }

    #[test]
    fn test_rejects_separator_in_domain() {
        assert!(IdentityGenerator::new("123", "IN|FRA").is_err());
        assert!(IdentityGenerator::new("", "INFRA").is_err());
    }

    proptest! {
        #[test]
        fn prop_identity_is_deterministic(parts in proptest::collection::vec("[a-z0-9-]{0,12}", 0..6)) {
            let g = generator();
            let first = g.identity(EntityKind::Cluster, &parts);
            let second = g.identity(EntityKind::Cluster, &parts);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.hash().len(), 32);
            prop_assert!(first.as_str().starts_with("123456789012|INFRA|KAFKA_CLUSTER|"));
        }
    }
}
