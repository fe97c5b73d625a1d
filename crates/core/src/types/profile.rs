//! Role-specific profile details.
//!
//! A profile is a common core (user, verification flag, commission rate)
//! plus a [`RoleProfile`] payload selected by the role tag. Store fields
//! cannot exist on an artist and vice versa.

use serde::{Deserialize, Serialize};

use super::status::UserRole;

/// Errors raised when validating profile details.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// Details were submitted for a different role than expected.
    #[error("profile details are for '{found}' but the role is '{expected}'")]
    RoleMismatch {
        /// Role the details should have matched.
        expected: UserRole,
        /// Role tag of the submitted details.
        found: UserRole,
    },
    /// The operation needs an artist or store role.
    #[error("'{0}' is not a seller role")]
    NotASellerRole(UserRole),
    /// A required text field is blank.
    #[error("{0} cannot be empty")]
    Blank(&'static str),
    /// A text field is longer than allowed.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum length.
        max: usize,
    },
}

/// Details kept for artist accounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtistDetails {
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Details kept for store accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDetails {
    pub store_name: String,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub has_physical_store: bool,
    /// Only kept when `has_physical_store` is set.
    #[serde(default)]
    pub physical_address: Option<String>,
}

/// Role-tagged profile payload.
///
/// Serialized with an inline `role` tag:
///
/// ```
/// use atelier_core::{RoleProfile, UserRole};
///
/// let profile: RoleProfile =
///     serde_json::from_str(r#"{"role":"artist","specialty":"ceramics"}"#).unwrap();
/// assert_eq!(profile.role(), UserRole::Artist);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleProfile {
    #[default]
    Customer,
    Artist(ArtistDetails),
    Store(StoreDetails),
}

const MAX_NAME_LEN: usize = 100;
const MAX_TAX_ID_LEN: usize = 50;

impl RoleProfile {
    /// The role selected by this payload.
    #[must_use]
    pub const fn role(&self) -> UserRole {
        match self {
            Self::Customer => UserRole::Customer,
            Self::Artist(_) => UserRole::Artist,
            Self::Store(_) => UserRole::Store,
        }
    }

    /// Validate and normalize the payload.
    ///
    /// Trims text fields, turns blank optionals into `None` and drops the
    /// physical address of stores without a physical location.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] if a store name is blank or a field is too long.
    pub fn normalized(self) -> Result<Self, ProfileError> {
        match self {
            Self::Customer => Ok(Self::Customer),
            Self::Artist(details) => Ok(Self::Artist(ArtistDetails {
                specialty: check_len(clean(details.specialty), "specialty", MAX_NAME_LEN)?,
                bio: clean(details.bio),
            })),
            Self::Store(details) => {
                let store_name = details.store_name.trim().to_owned();
                if store_name.is_empty() {
                    return Err(ProfileError::Blank("store_name"));
                }
                if store_name.chars().count() > MAX_NAME_LEN {
                    return Err(ProfileError::TooLong {
                        field: "store_name",
                        max: MAX_NAME_LEN,
                    });
                }
                let physical_address = if details.has_physical_store {
                    clean(details.physical_address)
                } else {
                    None
                };
                Ok(Self::Store(StoreDetails {
                    store_name,
                    tax_id: check_len(clean(details.tax_id), "tax_id", MAX_TAX_ID_LEN)?,
                    has_physical_store: details.has_physical_store,
                    physical_address,
                }))
            }
        }
    }

    /// Ensure the payload is for `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::RoleMismatch`] when the tags differ.
    pub fn expect_role(&self, expected: UserRole) -> Result<(), ProfileError> {
        let found = self.role();
        if found == expected {
            Ok(())
        } else {
            Err(ProfileError::RoleMismatch { expected, found })
        }
    }

    /// Ensure the payload describes a seller.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::NotASellerRole`] for customers.
    pub fn expect_seller(&self) -> Result<(), ProfileError> {
        let role = self.role();
        if role.is_seller() {
            Ok(())
        } else {
            Err(ProfileError::NotASellerRole(role))
        }
    }

    /// Public display name for a seller, falling back to `fallback`.
    #[must_use]
    pub fn display_name(&self, fallback: &str) -> String {
        match self {
            Self::Store(details) => format!("Store: {}", details.store_name),
            Self::Artist(_) => format!("Artist: {fallback}"),
            Self::Customer => fallback.to_owned(),
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn check_len(
    value: Option<String>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ProfileError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ProfileError::TooLong { field, max }),
        other => Ok(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store(name: &str, physical: bool, address: Option<&str>) -> RoleProfile {
        RoleProfile::Store(StoreDetails {
            store_name: name.to_owned(),
            tax_id: None,
            has_physical_store: physical,
            physical_address: address.map(str::to_owned),
        })
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(store("Kiln & Co", false, None)).unwrap();
        assert_eq!(json["role"], "store");
        assert_eq!(json["store_name"], "Kiln & Co");

        let customer = serde_json::to_value(RoleProfile::Customer).unwrap();
        assert_eq!(customer, serde_json::json!({"role": "customer"}));
    }

    #[test]
    fn test_store_fields_ignored_on_artist_tag() {
        // Unknown fields for a variant are ignored, never attached to another role.
        let profile: RoleProfile =
            serde_json::from_str(r#"{"role":"artist","store_name":"Nope"}"#).unwrap();
        assert_eq!(profile, RoleProfile::Artist(ArtistDetails::default()));
    }

    #[test]
    fn test_normalize_trims_and_drops_blank() {
        let profile = RoleProfile::Artist(ArtistDetails {
            specialty: Some("  prints ".to_owned()),
            bio: Some("   ".to_owned()),
        })
        .normalized()
        .unwrap();
        assert_eq!(
            profile,
            RoleProfile::Artist(ArtistDetails {
                specialty: Some("prints".to_owned()),
                bio: None,
            })
        );
    }

    #[test]
    fn test_store_requires_name() {
        assert_eq!(
            store("   ", false, None).normalized(),
            Err(ProfileError::Blank("store_name"))
        );
    }

    #[test]
    fn test_store_drops_address_without_physical_store() {
        let profile = store("Shop", false, Some("1 Main St")).normalized().unwrap();
        let RoleProfile::Store(details) = profile else {
            panic!("expected store");
        };
        assert_eq!(details.physical_address, None);

        let profile = store("Shop", true, Some("1 Main St")).normalized().unwrap();
        let RoleProfile::Store(details) = profile else {
            panic!("expected store");
        };
        assert_eq!(details.physical_address.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_expect_role() {
        let artist = RoleProfile::Artist(ArtistDetails::default());
        assert!(artist.expect_role(UserRole::Artist).is_ok());
        assert_eq!(
            artist.expect_role(UserRole::Store),
            Err(ProfileError::RoleMismatch {
                expected: UserRole::Store,
                found: UserRole::Artist,
            })
        );
        assert!(artist.expect_seller().is_ok());
        assert_eq!(
            RoleProfile::Customer.expect_seller(),
            Err(ProfileError::NotASellerRole(UserRole::Customer))
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(
            store("Kiln", false, None).display_name("x@y.z"),
            "Store: Kiln"
        );
        assert_eq!(
            RoleProfile::Artist(ArtistDetails::default()).display_name("a@b.c"),
            "Artist: a@b.c"
        );
    }
}
