//! Resource identity: ids, canonical names, and resource name syntax.
//!
//! Ids follow the user-settable id rules of https://google.aip.dev/122 and
//! https://google.aip.dev/133. System-generated ids are UUIDs, which is why
//! a caller may not pick something that parses as one.

use uuid::Uuid;

use crate::error::Error;

/// Service part of every full resource name.
pub const SERVICE_NAME: &str = "storage.opiproject.org";
/// Collection that holds virtio-blk controllers.
pub const COLLECTION: &str = "volumes";

const RESOURCE_ID_MAX_LEN: usize = 63;

/// Characters allowed in a resource name segment besides ASCII alphanumerics.
const SEGMENT_PUNCTUATION: &str = "-._~!$&'()*+,;=:@";

/// Id and canonical name of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentity {
    pub id: String,
    pub name: String,
}

impl ResourceIdentity {
    /// Derive the identity from a caller-supplied id, or generate one.
    ///
    /// An empty string counts as "not supplied".
    pub fn assign(requested: Option<&str>) -> Result<Self, Error> {
        let id = match requested.filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_user_settable_id(id)?;
                id.to_string()
            }
            None => system_generated_id(),
        };
        let name = resource_name(&id);
        Ok(Self { id, name })
    }
}

pub fn system_generated_id() -> String {
    Uuid::new_v4().to_string()
}

/// `//storage.opiproject.org/volumes/{id}`
pub fn resource_name(id: &str) -> String {
    format!("//{SERVICE_NAME}/{COLLECTION}/{id}")
}

/// Trailing path segment of `name`, which is also the backend device name.
pub fn resource_id(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, id)| id)
}

pub fn validate_user_settable_id(id: &str) -> Result<(), Error> {
    let invalid = |reason| {
        Err(Error::InvalidResourceId {
            id: id.to_string(),
            reason,
        })
    };

    if id.is_empty() {
        return invalid("must not be empty");
    }
    if id.len() > RESOURCE_ID_MAX_LEN {
        return invalid("must be at most 63 characters");
    }
    if !id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("must begin with a lowercase letter");
    }
    if id.ends_with('-') {
        return invalid("must not end with a hyphen");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return invalid("may only contain lowercase letters, digits and hyphens");
    }
    if Uuid::try_parse(id).is_ok() {
        return invalid("must not be a UUID");
    }
    Ok(())
}

/// Validate resource name syntax, relative (`volumes/x`) or full
/// (`//service.example.com/volumes/x`).
pub fn validate_resource_name(name: &str) -> Result<(), Error> {
    let invalid = |reason: String| {
        Err(Error::InvalidResourceName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty".to_string());
    }

    let path = match name.strip_prefix("//") {
        Some(full) => {
            let Some((service, path)) = full.split_once('/') else {
                return invalid("full resource name has no resource path".to_string());
            };
            if !is_domain_name(service) {
                return invalid(format!("service name {service:?} is not a valid domain"));
            }
            path
        }
        None => name,
    };

    for (i, segment) in path.split('/').enumerate() {
        if segment.is_empty() {
            return invalid(format!("segment {} is empty", i + 1));
        }
        if segment.contains(['{', '}']) {
            return invalid(format!("segment {segment:?} must not contain variables"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SEGMENT_PUNCTUATION.contains(c))
        {
            return invalid(format!("segment {segment:?} contains invalid characters"));
        }
    }
    Ok(())
}

fn is_domain_name(s: &str) -> bool {
    !s.is_empty()
        && s.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_uses_supplied_id() {
        let identity = ResourceIdentity::assign(Some("virtio-blk-42")).unwrap();
        assert_eq!(identity.id, "virtio-blk-42");
        assert_eq!(identity.name, "//storage.opiproject.org/volumes/virtio-blk-42");
    }

    #[test]
    fn assign_generates_uuid_when_absent() {
        for requested in [None, Some("")] {
            let identity = ResourceIdentity::assign(requested).unwrap();
            assert!(Uuid::try_parse(&identity.id).is_ok());
            assert_eq!(resource_id(&identity.name), identity.id);
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(system_generated_id(), system_generated_id());
    }

    #[test]
    fn user_settable_id_rules() {
        for ok in ["a", "virtio-blk-42", "x1", &"a".repeat(63)] {
            assert!(validate_user_settable_id(ok).is_ok(), "{ok} should be valid");
        }
        for bad in [
            "",
            "42-virtio",
            "Virtio",
            "virtio_blk",
            "virtio-",
            "virtio blk",
            &"a".repeat(64),
        ] {
            assert!(
                matches!(
                    validate_user_settable_id(bad),
                    Err(Error::InvalidResourceId { .. })
                ),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn user_settable_id_rejects_uuid() {
        let id = "abcdef12-3456-4789-abcd-ef0123456789";
        assert!(validate_user_settable_id(id).is_err());
    }

    #[test]
    fn resource_id_is_trailing_segment() {
        assert_eq!(resource_id("//storage.opiproject.org/volumes/abc"), "abc");
        assert_eq!(resource_id("abc"), "abc");
    }

    #[test]
    fn resource_name_accepts_full_and_relative() {
        assert!(validate_resource_name("//storage.opiproject.org/volumes/virtio-blk-42").is_ok());
        assert!(validate_resource_name("volumes/virtio-blk-42").is_ok());
        assert!(validate_resource_name("Malloc42").is_ok());
    }

    #[test]
    fn resource_name_rejects_malformed() {
        for bad in [
            "",
            "//",
            "//storage.opiproject.org",
            "//bad_domain/volumes/x",
            "volumes//x",
            "volumes/x/",
            "volumes/{volume}",
            "volumes/x y",
        ] {
            assert!(
                matches!(
                    validate_resource_name(bad),
                    Err(Error::InvalidResourceName { .. })
                ),
                "{bad:?} should be invalid"
            );
        }
    }
}
