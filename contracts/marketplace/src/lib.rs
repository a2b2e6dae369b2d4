//! Marketplace contract for items minted in an external token registry.
//!
//! Items can be listed for a fixed price or auctioned to the highest
//! bidder, paid either in CCD attached to the call or in a fungible CIS-2
//! token the paying account has pre-authorized the marketplace to move.
//! While a sale or auction is open, the contract escrows the item; while an
//! auction has bids, it also escrows exactly the current highest bid.
#![cfg_attr(not(feature = "std"), no_std)]
use crate::{events::*, external::*, state::*};
use commons::*;
use concordium_cis2::*;
use concordium_std::*;

mod contract;
mod events;
mod external;
mod payment;
mod registry;
mod state;
