//! Registry key-value entity mapping
//!
//! The registry describes an entity as a flat JSON object whose keys are
//! colon-separated paths, for example:
//!
//! ```json
//! {
//!   "type": "saml20-idp",
//!   "workflowState": "prodaccepted",
//!   "name:en": "Example IdP",
//!   "SingleSignOnService:0:Binding": "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
//!   "SingleSignOnService:0:Location": "https://idp.example.org/sso",
//!   "certData": "MIIC..."
//! }
//! ```
//!
//! Unknown keys are ignored.

use crate::error::{RegistryError, RegistryResult};
use fedmeta_common::{DomainEntity, EntityId, EntityRole, Endpoint, RoleFlags};
use serde_json::Value;
use std::collections::BTreeMap;

const SSO_DEFAULT_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect";
const ACS_DEFAULT_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";
const CERTIFICATE_KEYS: [&str; 3] = ["certData", "certData2", "certData3"];

#[derive(Default)]
struct EndpointParts {
    binding: Option<String>,
    location: Option<String>,
}

/// Converts registry key-value payloads into domain entities
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueMapper;

impl KeyValueMapper {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Map one payload
    ///
    /// With `role` set (entries of a role-specific listing) the entity gets
    /// that role; otherwise the role is read from the `type` key.
    pub fn map(
        &self,
        entity_id: &str,
        role: Option<EntityRole>,
        payload: &Value,
    ) -> RegistryResult<DomainEntity> {
        let object = payload
            .as_object()
            .ok_or_else(|| RegistryError::mapping(entity_id, "payload is not an object"))?;
        let id = EntityId::new(entity_id).map_err(|e| RegistryError::mapping(entity_id, e))?;

        let role = match role {
            Some(role) => role,
            None => match object.get("type") {
                Some(value) => parse_type(entity_id, string_value(entity_id, "type", value)?)?,
                None => return Err(RegistryError::mapping(entity_id, "missing type")),
            },
        };
        let mut roles = RoleFlags::default();
        roles.set(role);

        let mut entity = DomainEntity::new(id, roles);
        let mut sso: BTreeMap<u32, EndpointParts> = BTreeMap::new();
        let mut acs: BTreeMap<u32, EndpointParts> = BTreeMap::new();
        let mut certificates: BTreeMap<usize, String> = BTreeMap::new();

        for (key, value) in object {
            let mut path = key.split(':');
            match (path.next(), path.next(), path.next(), path.next()) {
                (Some("name"), Some(lang), None, None) => {
                    let name = string_value(entity_id, key, value)?;
                    entity.names.insert(lang.to_string(), name.to_string());
                }
                (Some("workflowState"), None, None, None) => {
                    entity.workflow_state = Some(string_value(entity_id, key, value)?.to_string());
                }
                (
                    Some(service @ ("SingleSignOnService" | "AssertionConsumerService")),
                    Some(n),
                    Some(part),
                    None,
                ) => {
                    let index: u32 = n.parse().map_err(|_| {
                        RegistryError::mapping(
                            entity_id,
                            format!("non-numeric endpoint index in '{key}'"),
                        )
                    })?;
                    let endpoints = if service == "SingleSignOnService" {
                        &mut sso
                    } else {
                        &mut acs
                    };
                    match part {
                        "Binding" => {
                            endpoints.entry(index).or_default().binding =
                                Some(string_value(entity_id, key, value)?.to_string());
                        }
                        "Location" => {
                            endpoints.entry(index).or_default().location =
                                Some(string_value(entity_id, key, value)?.to_string());
                        }
                        _ => {}
                    }
                }
                (Some(cert), None, None, None) => {
                    if let Some(pos) = CERTIFICATE_KEYS.iter().position(|k| *k == cert) {
                        certificates.insert(pos, string_value(entity_id, key, value)?.to_string());
                    }
                }
                _ => {}
            }
        }

        entity.single_sign_on_services =
            build_endpoints(entity_id, "SingleSignOnService", sso, SSO_DEFAULT_BINDING, false)?;
        entity.assertion_consumer_services = build_endpoints(
            entity_id,
            "AssertionConsumerService",
            acs,
            ACS_DEFAULT_BINDING,
            true,
        )?;
        entity.certificates = certificates.into_values().collect();

        entity
            .check_role_requirements()
            .map_err(|e| RegistryError::mapping(entity_id, e))?;
        Ok(entity)
    }
}

fn string_value<'a>(entity_id: &str, key: &str, value: &'a Value) -> RegistryResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| RegistryError::mapping(entity_id, format!("'{key}' is not a string")))
}

fn parse_type(entity_id: &str, value: &str) -> RegistryResult<EntityRole> {
    match value {
        "saml20-idp" => Ok(EntityRole::IdentityProvider),
        "saml20-sp" => Ok(EntityRole::ServiceProvider),
        other => Err(RegistryError::mapping(
            entity_id,
            format!("unknown entity type '{other}'"),
        )),
    }
}

fn build_endpoints(
    entity_id: &str,
    service: &str,
    parts: BTreeMap<u32, EndpointParts>,
    default_binding: &str,
    indexed: bool,
) -> RegistryResult<Vec<Endpoint>> {
    parts
        .into_iter()
        .map(|(index, part)| {
            let location = part.location.ok_or_else(|| {
                RegistryError::mapping(entity_id, format!("{service}:{index} has no Location"))
            })?;
            let endpoint = Endpoint::new(
                part.binding.unwrap_or_else(|| default_binding.to_string()),
                location,
            );
            Ok(if indexed {
                endpoint.with_index(index)
            } else {
                endpoint
            })
        })
        .collect()
}
