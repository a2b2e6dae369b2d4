use super::*;

/// Fixed length of every auction, counted from listing.
pub const AUCTION_DURATION: Duration = Duration::from_hours(24);

/// Window before the deadline within which an accepted bid pushes the
/// deadline to `now + EXTENSION_MARGIN`.
pub const EXTENSION_MARGIN: Duration = Duration::from_minutes(10);

/// Entrypoint invoked by CIS-2 contracts when tokens are transferred into
/// marketplace escrow.
pub const DEPOSIT_ENTRYPOINT: &str = "onReceivingCIS2";

// Event tags. CIS-2 reserves `u8::MAX` down to `u8::MAX - 4`.

/// Tag for the Custom Listing event.
pub const LIST_TAG: u8 = u8::MAX - 5;

/// Tag for the Custom Unlisting event.
pub const UNLIST_TAG: u8 = u8::MAX - 6;

/// Tag for the Custom Buy event.
pub const BUY_TAG: u8 = u8::MAX - 7;

/// Tag for the Custom Auction event.
pub const AUCTION_TAG: u8 = u8::MAX - 8;

/// Tag for the Custom Bid event.
pub const BID_TAG: u8 = u8::MAX - 9;

/// Tag for the Custom Finish Auction event.
pub const FINISH_TAG: u8 = u8::MAX - 10;

/// Tag for the Custom Cancel Auction event.
pub const CANCEL_AUCTION_TAG: u8 = u8::MAX - 11;
