use super::*;

/// Fixed-price listing event data.
#[derive(Debug, Serial)]
pub struct ListEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
    pub price: AssetAmount,
    pub asset: PaymentAsset,
}

/// Listing cancellation event data.
#[derive(Debug, Serial)]
pub struct UnlistEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
}

/// Purchase event data.
#[derive(Debug, Serial)]
pub struct BuyEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
    pub buyer: &'a AccountAddress,
    pub price: AssetAmount,
}

/// Auction opening event data.
#[derive(Debug, Serial)]
pub struct OpenAuctionEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
    pub min_price: AssetAmount,
    pub bid_step: AssetAmount,
    pub asset: PaymentAsset,
    pub deadline: Timestamp,
}

/// Accepted bid event data.
#[derive(Debug, Serial)]
pub struct BidEvent<'a> {
    pub item: &'a ItemId,
    pub bidder: &'a AccountAddress,
    pub amount: AssetAmount,
}

/// Auction settlement event data. `winner` is absent when fewer than two
/// bids were placed and the item returned to the seller.
#[derive(Debug, Serial)]
pub struct FinishEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
    pub winner: Option<&'a AccountAddress>,
    pub price: AssetAmount,
}

/// Auction cancellation event data.
#[derive(Debug, Serial)]
pub struct CancelAuctionEvent<'a> {
    pub item: &'a ItemId,
    pub seller: &'a AccountAddress,
}

/// Tagged Custom event to be serialized for the event log.
#[derive(Debug)]
pub enum MarketEvent<'a> {
    List(ListEvent<'a>),
    Unlist(UnlistEvent<'a>),
    Buy(BuyEvent<'a>),
    OpenAuction(OpenAuctionEvent<'a>),
    Bid(BidEvent<'a>),
    Finish(FinishEvent<'a>),
    CancelAuction(CancelAuctionEvent<'a>),
}

impl<'a> MarketEvent<'a> {
    pub fn list(
        item: &'a ItemId,
        seller: &'a AccountAddress,
        price: AssetAmount,
        asset: PaymentAsset,
    ) -> Self {
        Self::List(ListEvent {
            item,
            seller,
            price,
            asset,
        })
    }

    pub fn unlist(item: &'a ItemId, seller: &'a AccountAddress) -> Self {
        Self::Unlist(UnlistEvent { item, seller })
    }

    pub fn buy(
        item: &'a ItemId,
        seller: &'a AccountAddress,
        buyer: &'a AccountAddress,
        price: AssetAmount,
    ) -> Self {
        Self::Buy(BuyEvent {
            item,
            seller,
            buyer,
            price,
        })
    }

    pub fn open_auction(
        item: &'a ItemId,
        seller: &'a AccountAddress,
        min_price: AssetAmount,
        bid_step: AssetAmount,
        asset: PaymentAsset,
        deadline: Timestamp,
    ) -> Self {
        Self::OpenAuction(OpenAuctionEvent {
            item,
            seller,
            min_price,
            bid_step,
            asset,
            deadline,
        })
    }

    pub fn bid(item: &'a ItemId, bidder: &'a AccountAddress, amount: AssetAmount) -> Self {
        Self::Bid(BidEvent {
            item,
            bidder,
            amount,
        })
    }

    pub fn finish(
        item: &'a ItemId,
        seller: &'a AccountAddress,
        winner: Option<&'a AccountAddress>,
        price: AssetAmount,
    ) -> Self {
        Self::Finish(FinishEvent {
            item,
            seller,
            winner,
            price,
        })
    }

    pub fn cancel_auction(item: &'a ItemId, seller: &'a AccountAddress) -> Self {
        Self::CancelAuction(CancelAuctionEvent { item, seller })
    }
}

impl<'a> Serial for MarketEvent<'a> {
    fn serial<W: Write>(&self, out: &mut W) -> Result<(), W::Err> {
        match self {
            MarketEvent::List(event) => {
                out.write_u8(LIST_TAG)?;
                event.serial(out)
            }
            MarketEvent::Unlist(event) => {
                out.write_u8(UNLIST_TAG)?;
                event.serial(out)
            }
            MarketEvent::Buy(event) => {
                out.write_u8(BUY_TAG)?;
                event.serial(out)
            }
            MarketEvent::OpenAuction(event) => {
                out.write_u8(AUCTION_TAG)?;
                event.serial(out)
            }
            MarketEvent::Bid(event) => {
                out.write_u8(BID_TAG)?;
                event.serial(out)
            }
            MarketEvent::Finish(event) => {
                out.write_u8(FINISH_TAG)?;
                event.serial(out)
            }
            MarketEvent::CancelAuction(event) => {
                out.write_u8(CANCEL_AUCTION_TAG)?;
                event.serial(out)
            }
        }
    }
}
