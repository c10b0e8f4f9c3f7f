//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod capabilities;
pub mod client;
pub mod entity;
pub mod error;
pub mod list;
pub mod path;
#[cfg(feature = "testing")]
pub mod test;
pub mod transport;

pub mod proto {
    #![allow(clippy::all)]
    tonic::include_proto!("gnmi");
}

pub use crate::capabilities::{Capabilities, Encoding, ModelData};
pub use crate::client::{Client, DataType, SetBatch};
pub use crate::entity::{Defaultable, Entity, EntityExt};
pub use crate::error::{Error, PathError, ResponseError};
pub use crate::list::{Keyed, KeyedList};
pub use crate::path::{Path, PathElem};
pub use crate::transport::{GrpcTransport, Transport};
