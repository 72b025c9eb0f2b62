//! Certificate payload model.
//!
//! The payload is a JSON document shaped like a JSON:API response:
//!
//! ```json
//! {
//!   "meta": {"issued": "...", "expiry": "...", "ttl": 2629746},
//!   "data": {"type": "licenses", "id": "...", "attributes": {...},
//!            "relationships": {"account": {"type": "accounts", "id": "..."}}},
//!   "included": [...]
//! }
//! ```
//!
//! Struct fields serialize in declaration order and every map is a
//! `BTreeMap`, so the same logical content always encodes to the same bytes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relationship name that carries the owning account.
pub const ACCOUNT_RELATIONSHIP: &str = "account";

/// The kind of resource a certificate is issued for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A license.
    #[default]
    License,
    /// A product instance activated against a license.
    Machine,
    /// A self-hosted enterprise deployment.
    Enterprise,
}

impl ResourceKind {
    /// Domain-separation prefix for signatures.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::License => "license",
            Self::Machine => "machine",
            Self::Enterprise => "enterprise",
        }
    }

    /// JSON:API type of the primary resource.
    #[must_use]
    pub fn resource_type(&self) -> &'static str {
        match self {
            Self::License => "licenses",
            Self::Machine => "machines",
            Self::Enterprise => "enterprises",
        }
    }

    /// Label used in the BEGIN/END armor lines.
    #[must_use]
    pub fn armor_label(&self) -> &'static str {
        match self {
            Self::License => "LICENSE FILE",
            Self::Machine => "MACHINE FILE",
            Self::Enterprise => "ENTERPRISE FILE",
        }
    }

    /// Relations that may be embedded in this kind of certificate.
    #[must_use]
    pub fn allowed_includes(&self) -> &'static [&'static str] {
        match self {
            Self::License => &["entitlements", "product", "policy", "group", "user"],
            Self::Machine => &[
                "license",
                "license.entitlements",
                "license.product",
                "license.policy",
                "license.user",
                "group",
            ],
            Self::Enterprise => &["entitlements", "product", "policy"],
        }
    }
}

/// A `{type, id}` pointer to another resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl ResourceIdentifier {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// A denormalized snapshot of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, ResourceIdentifier>,
}

impl ResourceObject {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>, target: ResourceIdentifier) -> Self {
        self.relationships.insert(name.into(), target);
        self
    }

    /// Returns a string attribute, if present.
    #[must_use]
    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Issuance metadata embedded in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMeta {
    pub issued: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
    /// Validity window in seconds, or None for non-expiring certificates.
    pub ttl: Option<i64>,
}

/// The decoded certificate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificatePayload {
    pub meta: CertificateMeta,
    pub data: ResourceObject,
    #[serde(default)]
    pub included: Vec<ResourceObject>,
}

impl CertificatePayload {
    /// Returns the owning account's id.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        self.data
            .relationships
            .get(ACCOUNT_RELATIONSHIP)
            .map(|account| account.id.as_str())
    }

    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.data.id
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.data.kind
    }

    #[must_use]
    pub fn issued(&self) -> DateTime<Utc> {
        self.meta.issued
    }

    #[must_use]
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.meta.expiry
    }

    /// Returns included snapshots of the given JSON:API type.
    pub fn included_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ResourceObject> {
        self.included.iter().filter(move |obj| obj.kind == kind)
    }

    /// Serializes to the canonical JSON encoding.
    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Issuance input: the primary resource and its pre-loaded relations.
///
/// `relations` maps an include path (e.g. `"product"`,
/// `"license.entitlements"`) to the snapshots embedded when that path is
/// requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub data: ResourceObject,
    #[serde(default)]
    pub relations: BTreeMap<String, Vec<ResourceObject>>,
}

impl Resource {
    pub fn new(kind: ResourceKind, data: ResourceObject) -> Self {
        Self {
            kind,
            data,
            relations: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_relation(mut self, path: impl Into<String>, objects: Vec<ResourceObject>) -> Self {
        self.relations.insert(path.into(), objects);
        self
    }

    /// Machine fingerprint, used to bind machine certificates.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.data.attribute_str("fingerprint")
    }
}

/// An issued certificate and the facts recorded about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    account_id: String,
    resource_id: String,
    resource_type: String,
    certificate: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    ttl: Option<i64>,
    includes: Vec<String>,
}

impl Certificate {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        account_id: String,
        resource_id: String,
        resource_type: String,
        certificate: String,
        issued_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        ttl: Option<i64>,
        includes: Vec<String>,
    ) -> Self {
        Self {
            account_id,
            resource_id,
            resource_type,
            certificate,
            issued_at,
            expires_at,
            ttl,
            includes,
        }
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The armored certificate text.
    #[must_use]
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    #[must_use]
    pub fn includes(&self) -> &[String] {
        &self.includes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_prefixes() {
        assert_eq!(ResourceKind::License.prefix(), "license");
        assert_eq!(ResourceKind::Machine.prefix(), "machine");
        assert_eq!(ResourceKind::Enterprise.armor_label(), "ENTERPRISE FILE");
    }

    #[test]
    fn kind_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&ResourceKind::Machine).unwrap(), "\"machine\"");
    }

    #[test]
    fn canonical_json_sorts_attributes() {
        let obj = ResourceObject::new("licenses", "1")
            .with_attribute("zeta", 1)
            .with_attribute("alpha", 2);
        let json = serde_json::to_string(&obj).unwrap();
        assert!(json.find("alpha").unwrap() < json.find("zeta").unwrap());
    }

    #[test]
    fn account_id_from_relationship() {
        let payload = CertificatePayload {
            meta: CertificateMeta {
                issued: Utc::now(),
                expiry: None,
                ttl: None,
            },
            data: ResourceObject::new("licenses", "lic-1")
                .with_relationship(ACCOUNT_RELATIONSHIP, ResourceIdentifier::new("accounts", "acct-1")),
            included: vec![],
        };
        assert_eq!(payload.account_id(), Some("acct-1"));
        assert_eq!(payload.resource_id(), "lic-1");
        assert_eq!(payload.resource_type(), "licenses");
    }
}
