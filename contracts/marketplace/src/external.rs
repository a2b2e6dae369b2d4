use super::*;

#[derive(Debug, Serialize, SchemaType)]
pub struct InitParams {
    /// Token registry contract whose items are traded on this marketplace.
    pub registry: ContractAddress,
}

/// Parameter for the `listItem` entrypoint.
#[derive(Debug, Serialize, SchemaType)]
pub struct ListItemParams {
    pub item: ItemId,
    /// Sale price in units of `asset`. Must be positive.
    pub price: AssetAmount,
    pub asset: PaymentAsset,
}

/// Parameter for the `listOnAuction` entrypoint.
#[derive(Debug, Serialize, SchemaType)]
pub struct OpenAuctionParams {
    pub item: ItemId,
    /// Starting price in units of `asset`. Must be positive.
    pub min_price: AssetAmount,
    /// Minimum increment between accepted bids.
    pub bid_step: AssetAmount,
    pub asset: PaymentAsset,
}

/// Parameter for the `makeBid` entrypoint.
#[derive(Debug, Serialize, SchemaType)]
pub struct BidParams {
    pub item: ItemId,
    /// Offered amount. For CCD auctions at least this much must be attached
    /// to the call; for token auctions it is pulled from the bidder.
    pub amount: AssetAmount,
}

/// Values required for internal contract functionality.
#[derive(Debug, Serialize, SchemaType)]
pub enum InternalValue {
    Registry(ContractAddress),
}

#[derive(Debug, Serialize, SchemaType)]
pub enum ViewInternalValueParams {
    Registry,
}
