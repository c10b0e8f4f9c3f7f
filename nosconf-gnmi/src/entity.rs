//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

//! Configuration entities.
//!
//! An [`Entity`] is one addressable configuration subtree. Optional behavior
//! is exposed through capability queries on the base trait:
//!
//! * [`Entity::is_list_item`] marks rows of a YANG list.
//! * [`Entity::as_defaultable`] exposes a [`Defaultable`] implementation, used
//!   to reset the subtree instead of deleting it.
//! * [`Entity::marshal`] and [`Entity::unmarshal`] can be overridden when the
//!   wire shape depends on the negotiated YANG models.
//!
//! The plumbing needed by the client (cloning, typed comparison, plain JSON
//! conversion) comes from [`EntityExt`], implemented for every serde-capable
//! entity.

use std::any::Any;
use std::fmt::Debug;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::capabilities::Capabilities;

pub trait Entity: EntityExt + Debug + Send + Sync {
    /// Vendor path string of the subtree.
    fn path(&self) -> String;

    fn is_list_item(&self) -> bool {
        false
    }

    fn as_defaultable(&mut self) -> Option<&mut dyn Defaultable> {
        None
    }

    /// Encodes the entity for the device.
    fn marshal(&self, _caps: &Capabilities) -> Result<Value, serde_json::Error> {
        self.to_json()
    }

    /// Decodes a value received from the device into the entity.
    ///
    /// When diffing writes, this is called on a copy of the desired entity,
    /// so an implementation may keep only the parts of `value` it models.
    fn unmarshal(
        &mut self,
        _caps: &Capabilities,
        value: Value,
    ) -> Result<(), serde_json::Error> {
        self.from_json(value)
    }
}

/// Entities with a canonical empty value.
pub trait Defaultable {
    /// Resets the entity to its canonical empty value.
    fn set_default(&mut self);
}

pub trait EntityExt: Any {
    fn to_json(&self) -> Result<Value, serde_json::Error>;

    fn from_json(&mut self, value: Value) -> Result<(), serde_json::Error>;

    fn clone_entity(&self) -> Box<dyn Entity>;

    // Typed structural equality.
    fn eq_entity(&self, other: &dyn Entity) -> bool;

    fn as_any(&self) -> &dyn Any;
}

// ===== blanket impl EntityExt =====

impl<T> EntityExt for T
where
    T: Entity + Serialize + DeserializeOwned + Clone + PartialEq,
{
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn from_json(&mut self, value: Value) -> Result<(), serde_json::Error> {
        *self = serde_json::from_value(value)?;
        Ok(())
    }

    fn clone_entity(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn eq_entity(&self, other: &dyn Entity) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ===== unit tests =====
