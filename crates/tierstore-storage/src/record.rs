//! Record types stored in the relational store and cached as JSON.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::OffsetDateTime;

use crate::StorageResult;
use crate::error::StorageError;

/// An entity that can be stored, listed and cached.
///
/// `ENTITY` is the singular name used in cache keys (`"<entity>:<id>"`,
/// `"<entity>:all"`) and in error messages.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn created_at(&self) -> OffsetDateTime;

    fn set_created_at(&mut self, at: OffsetDateTime);

    fn set_updated_at(&mut self, at: OffsetDateTime);

    /// Check field-level constraints before a write.
    fn validate(&self) -> StorageResult<()> {
        Ok(())
    }

    /// Carry over fields an update left blank from the stored record.
    fn keep_stored_fields(&mut self, _stored: &Self) {}
}

fn unix_epoch() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH
}

/// A product offered in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    /// Owner of the listing, if any.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub updated_at: OffsetDateTime,
}

impl Product {
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: f64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: description.into(),
            price,
            user_id: None,
            created_at: unix_epoch(),
            updated_at: unix_epoch(),
        }
    }
}

impl Record for Product {
    const ENTITY: &'static str = "product";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn set_created_at(&mut self, at: OffsetDateTime) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: OffsetDateTime) {
        self.updated_at = at;
    }

    fn validate(&self) -> StorageResult<()> {
        if self.name.trim().is_empty() {
            return Err(StorageError::invalid_input("product name must not be empty"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(StorageError::invalid_input(
                "product price must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// A registered user.
///
/// The password is accepted on input but never serialized, so it does not
/// leak into responses or into the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339", default = "unix_epoch")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
            password: String::new(),
            created_at: unix_epoch(),
            updated_at: unix_epoch(),
        }
    }
}

impl Record for User {
    const ENTITY: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    fn set_created_at(&mut self, at: OffsetDateTime) {
        self.created_at = at;
    }

    fn set_updated_at(&mut self, at: OffsetDateTime) {
        self.updated_at = at;
    }

    fn validate(&self) -> StorageResult<()> {
        if self.name.trim().is_empty() {
            return Err(StorageError::invalid_input("user name must not be empty"));
        }
        if !self.email.contains('@') {
            return Err(StorageError::invalid_input("user email is not valid"));
        }
        Ok(())
    }

    /// An empty password on update keeps the stored one.
    fn keep_stored_fields(&mut self, stored: &Self) {
        if self.password.is_empty() {
            self.password.clone_from(&stored.password);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_product_json_shape() {
        let mut product = Product::new("Keyboard", "Mechanical", 49.5);
        product.id = 3;
        product.set_created_at(datetime!(2024-05-01 10:00 UTC));

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "Keyboard");
        assert_eq!(json["created_at"], "2024-05-01T10:00:00Z");

        let back: Product = serde_json::from_value(json).unwrap();
        assert_eq!(back, product);
    }

    #[test]
    fn test_product_input_defaults() {
        let product: Product = serde_json::from_str(r#"{"name":"Mouse","price":10}"#).unwrap();
        assert_eq!(product.id, 0);
        assert_eq!(product.description, "");
        assert_eq!(product.created_at, OffsetDateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_user_password_is_never_serialized() {
        let user: User = serde_json::from_str(
            r#"{"name":"Ann","email":"ann@example.com","password":"hunter2"}"#,
        )
        .unwrap();
        assert_eq!(user.password, "hunter2");

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_validation() {
        assert!(Product::new("Desk", "", 120.0).validate().is_ok());
        assert!(Product::new(" ", "", 1.0).validate().is_err());
        assert!(Product::new("Desk", "", -1.0).validate().is_err());
        assert!(Product::new("Desk", "", f64::NAN).validate().is_err());

        assert!(User::new("Ann", "ann@example.com").validate().is_ok());
        assert!(User::new("Ann", "not-an-email").validate().is_err());
        assert!(User::new("", "ann@example.com").validate().is_err());
    }

    #[test]
    fn test_entity_names() {
        assert_eq!(Product::ENTITY, "product");
        assert_eq!(User::ENTITY, "user");
    }
}
