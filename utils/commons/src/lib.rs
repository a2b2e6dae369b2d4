//! Common types shared between the marketplace contracts.
#![cfg_attr(not(feature = "std"), no_std)]
pub use crate::{authority::*, constants::*, errors::*, guard::*, types::*};
use concordium_cis2::*;
use concordium_std::*;

mod authority;
mod constants;
mod errors;
mod guard;
mod types;
