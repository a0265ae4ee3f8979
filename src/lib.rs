#[macro_use]
extern crate serde_derive;

pub mod error;
pub mod config;
pub mod discovery;
pub mod datatypes;
pub mod capabilities;
pub mod devices;
pub mod environment;
pub mod skill;
pub mod wemo_skill;
mod protocol;

#[cfg(feature = "async")]
pub mod tokio;

pub use crate::{
    environment::Environment,
    wemo_skill::{create_skill, WemoSkill},
};
