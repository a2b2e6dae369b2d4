use super::*;

/// Fixed-price sale record. Present if and only if the contract currently
/// escrows the item for sale.
#[derive(Debug, Serialize, SchemaType, Clone)]
pub struct Listing {
    /// Account that listed the item and receives the payment.
    pub seller: AccountAddress,
    /// Sale price, in units of `asset`. Always positive.
    pub price: AssetAmount,
    /// Denomination the sale settles in.
    pub asset: PaymentAsset,
}

/// Timed auction record. Present if and only if the contract currently
/// escrows the item for auction. While `bid_count > 0` the contract also
/// escrows exactly `current_price` of `asset` on behalf of `high_bidder`.
#[derive(Debug, Serialize, SchemaType, Clone)]
pub struct Auction {
    /// Account that opened the auction.
    pub seller: AccountAddress,
    /// Starting price. Seeds `current_price`; later bids are gated by
    /// `current_price + bid_step` alone.
    pub min_price: AssetAmount,
    /// Minimum increment between accepted bids.
    pub bid_step: AssetAmount,
    /// Denomination the auction settles in.
    pub asset: PaymentAsset,
    /// Absolute end of the bidding period. Never moves earlier.
    pub deadline: Timestamp,
    /// Highest accepted bid, seeded with `min_price` until the first bid.
    pub current_price: AssetAmount,
    /// Number of accepted bids.
    pub bid_count: u32,
    /// Account holding the highest accepted bid. Absent until the first bid.
    pub high_bidder: Option<AccountAddress>,
}

impl Auction {
    /// New auction with the full fixed duration ahead of it.
    pub fn open(
        seller: AccountAddress,
        min_price: AssetAmount,
        bid_step: AssetAmount,
        asset: PaymentAsset,
        now: Timestamp,
    ) -> Self {
        Self {
            seller,
            min_price,
            bid_step,
            asset,
            deadline: saturating_add(now, AUCTION_DURATION),
            current_price: min_price,
            bid_count: 0,
            high_bidder: None,
        }
    }
}

/// Escrowed payment owed to a displaced or refunded bidder.
#[must_use]
pub struct Refund {
    pub account: AccountAddress,
    pub amount: AssetAmount,
}

/// Outcome of settling an auction.
#[must_use]
pub enum Settlement {
    /// Two or more bids were placed: the item goes to the winner and the
    /// winning bid leaves escrow.
    Sold {
        seller: AccountAddress,
        winner: AccountAddress,
        price: AssetAmount,
        asset: PaymentAsset,
    },
    /// Fewer than two bids: no sale. The item returns to the seller and a
    /// sole bid, if any, is refunded.
    Returned {
        seller: AccountAddress,
        asset: PaymentAsset,
        refund: Option<Refund>,
    },
}

/// The contract state.
#[derive(Serial, DeserialWithState)]
#[concordium(state_parameter = "S")]
pub struct State<S: HasStateApi> {
    /// Authority module for administrative rights management.
    pub authority: Authority<S>,
    /// Token registry contract that minted the items traded here.
    pub registry: ContractAddress,
    /// Operation-wide mutual exclusion flag.
    pub guard: ReentrancyGuard,
    /// Active fixed-price sales by item.
    pub listings: StateMap<ItemId, Listing, S>,
    /// Active or unsettled auctions by item.
    pub auctions: StateMap<ItemId, Auction, S>,
}

impl<S: HasStateApi> State<S> {
    /// Creates a new state with no listings and no auctions.
    pub fn new(
        state_builder: &mut StateBuilder<S>,
        registry: ContractAddress,
        origin: AccountAddress,
    ) -> Self {
        State {
            authority: Authority::new(state_builder, Address::Account(origin)),
            registry,
            guard: ReentrancyGuard::new(),
            listings: state_builder.new_map(),
            auctions: state_builder.new_map(),
        }
    }

    /// Record a fixed-price sale. Overwriting is safe: reaching this point
    /// requires pulling custody from the caller, which fails while a
    /// previous listing or auction still holds the item.
    pub fn insert_listing(&mut self, item: ItemId, listing: Listing) {
        self.listings.insert(item, listing);
    }

    /// Look up a listing without removing it.
    pub fn listing(&self, item: &ItemId) -> ContractResult<Listing> {
        self.listings
            .get(item)
            .map(|listing| listing.clone())
            .ok_or_else(|| CustomContractError::NoSuchListing.into())
    }

    /// Remove a listing, failing with `NoSuchListing` if absent.
    pub fn remove_listing(&mut self, item: &ItemId) -> ContractResult<Listing> {
        self.listings
            .remove_and_get(item)
            .ok_or_else(|| CustomContractError::NoSuchListing.into())
    }

    /// Remove a listing on behalf of its seller. The record is only removed
    /// once both checks pass, so a failed cancel leaves it intact.
    pub fn cancel_listing(
        &mut self,
        item: &ItemId,
        caller: &AccountAddress,
    ) -> ContractResult<Listing> {
        {
            let listing = self
                .listings
                .get(item)
                .ok_or(CustomContractError::NoSuchListing)?;
            ensure!(
                *caller == listing.seller,
                CustomContractError::Unauthorized.into()
            );
        }
        self.remove_listing(item)
    }

    /// Record a new auction. See `insert_listing` on why overwriting is safe.
    pub fn open_auction(&mut self, item: ItemId, auction: Auction) {
        self.auctions.insert(item, auction);
    }

    /// Look up an auction without removing it.
    pub fn auction(&self, item: &ItemId) -> ContractResult<Auction> {
        self.auctions
            .get(item)
            .map(|auction| auction.clone())
            .ok_or_else(|| CustomContractError::NoSuchAuction.into())
    }

    /// Validate a bid without touching the record, reporting the auction's
    /// denomination and the escrowed bid a committed one would displace.
    /// Callers move the payments between this check and `place_bid`, so a
    /// failed payment never leaves a mutated record behind.
    pub fn prepare_bid(
        &self,
        item: &ItemId,
        now: Timestamp,
        amount: AssetAmount,
    ) -> ContractResult<(PaymentAsset, Option<Refund>)> {
        let auction = self
            .auctions
            .get(item)
            .ok_or(CustomContractError::NoSuchAuction)?;

        ensure!(
            now <= auction.deadline,
            CustomContractError::AuctionExpired.into()
        );

        let threshold = auction
            .current_price
            .checked_add(auction.bid_step)
            .ok_or(CustomContractError::BidTooLow)?;
        ensure!(amount >= threshold, CustomContractError::BidTooLow.into());

        let displaced = auction.high_bidder.map(|account| Refund {
            account,
            amount: auction.current_price,
        });
        Ok((auction.asset, displaced))
    }

    /// Accept a bid, returning the auction's denomination and the displaced
    /// bid that must be refunded. All checks precede any mutation.
    pub fn place_bid(
        &mut self,
        item: &ItemId,
        now: Timestamp,
        bidder: AccountAddress,
        amount: AssetAmount,
    ) -> ContractResult<(PaymentAsset, Option<Refund>)> {
        let (asset, displaced) = self.prepare_bid(item, now, amount)?;

        let mut auction = self
            .auctions
            .get_mut(item)
            .ok_or(CustomContractError::NoSuchAuction)?;

        // Anti-sniping: a bid near the deadline pushes it to now + margin.
        // The deadline never moves earlier.
        let remaining = auction.deadline.timestamp_millis() - now.timestamp_millis();
        if remaining < EXTENSION_MARGIN.millis() {
            auction.deadline = saturating_add(now, EXTENSION_MARGIN);
        }

        auction.high_bidder = Some(bidder);
        auction.current_price = amount;
        auction.bid_count += 1;

        Ok((asset, displaced))
    }

    /// Close an auction and decide where the item and the escrowed bid go.
    /// The seller may force an early settlement; anyone may settle once the
    /// deadline has passed.
    pub fn settle_auction(
        &mut self,
        item: &ItemId,
        caller: &AccountAddress,
        now: Timestamp,
    ) -> ContractResult<Settlement> {
        {
            let auction = self
                .auctions
                .get(item)
                .ok_or(CustomContractError::NoSuchAuction)?;
            ensure!(
                now > auction.deadline || *caller == auction.seller,
                CustomContractError::AuctionNotExpired.into()
            );
        }
        let auction = self
            .auctions
            .remove_and_get(item)
            .ok_or(CustomContractError::NoSuchAuction)?;

        let seller = auction.seller;
        let asset = auction.asset;
        let settlement = match auction.high_bidder {
            Some(winner) if auction.bid_count >= 2 => Settlement::Sold {
                seller,
                winner,
                price: auction.current_price,
                asset,
            },
            // A single bid does not make a sale; the sole bid is returned.
            Some(bidder) => Settlement::Returned {
                seller,
                asset,
                refund: Some(Refund {
                    account: bidder,
                    amount: auction.current_price,
                }),
            },
            None => Settlement::Returned {
                seller,
                asset,
                refund: None,
            },
        };
        Ok(settlement)
    }

    /// Remove an auction on behalf of its seller before the deadline,
    /// reporting the bid that must be refunded. A lapsed auction can only
    /// be finished, never cancelled.
    pub fn cancel_auction(
        &mut self,
        item: &ItemId,
        caller: &AccountAddress,
        now: Timestamp,
    ) -> ContractResult<(AccountAddress, PaymentAsset, Option<Refund>)> {
        {
            let auction = self
                .auctions
                .get(item)
                .ok_or(CustomContractError::NoSuchAuction)?;
            ensure!(
                *caller == auction.seller,
                CustomContractError::Unauthorized.into()
            );
            ensure!(
                now <= auction.deadline,
                CustomContractError::AuctionExpired.into()
            );
        }
        let auction = self
            .auctions
            .remove_and_get(item)
            .ok_or(CustomContractError::NoSuchAuction)?;

        let refund = auction.high_bidder.map(|account| Refund {
            account,
            amount: auction.current_price,
        });
        Ok((auction.seller, auction.asset, refund))
    }
}

/// Timestamp addition that saturates at the far future; slot times never
/// get near the representable maximum.
pub fn saturating_add(now: Timestamp, duration: Duration) -> Timestamp {
    now.checked_add(duration)
        .unwrap_or_else(|| Timestamp::from_timestamp_millis(u64::MAX))
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use concordium_std::test_infrastructure::*;

    const SELLER: AccountAddress = AccountAddress([1u8; 32]);
    const BIDDER_1: AccountAddress = AccountAddress([2u8; 32]);
    const BIDDER_2: AccountAddress = AccountAddress([3u8; 32]);
    const REGISTRY: ContractAddress = ContractAddress {
        index: 7,
        subindex: 0,
    };

    const OPENED_AT: u64 = 1_000;

    fn item_1() -> ItemId {
        TokenIdVec(vec![1])
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_timestamp_millis(millis)
    }

    fn state_with_auction(
        min_price: AssetAmount,
        bid_step: AssetAmount,
    ) -> State<TestStateApi> {
        let mut state_builder = TestStateBuilder::new();
        let mut state = State::new(&mut state_builder, REGISTRY, SELLER);
        state.open_auction(
            item_1(),
            Auction::open(SELLER, min_price, bid_step, PaymentAsset::Ccd, at(OPENED_AT)),
        );
        state
    }

    #[concordium_test]
    fn test_first_bid_gated_by_seed_plus_step() {
        let mut state = state_with_auction(1, 2);

        let too_low = state.place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 2);
        claim_eq!(
            too_low.err(),
            Some(CustomContractError::BidTooLow.into()),
            "Bid below min_price + step must be rejected"
        );
        // Rejected bids leave the record untouched.
        let auction = state.auction(&item_1()).expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 0);
        claim_eq!(auction.current_price, 1);
        claim_eq!(auction.high_bidder, None);

        let (asset, displaced) = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 3)
            .expect_report("Bid at min_price + step must pass");
        claim_eq!(asset, PaymentAsset::Ccd);
        claim!(displaced.is_none(), "First bid displaces nobody");

        let auction = state.auction(&item_1()).expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 1);
        claim_eq!(auction.current_price, 3);
        claim_eq!(auction.high_bidder, Some(BIDDER_1));
    }

    #[concordium_test]
    fn test_next_bid_refunds_exactly_the_displaced_escrow() {
        let mut state = state_with_auction(1, 2);

        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 3)
            .expect_report("First bid must pass");

        let short = state.place_bid(&item_1(), at(OPENED_AT + 2), BIDDER_2, 4);
        claim_eq!(short.err(), Some(CustomContractError::BidTooLow.into()));

        let (_, displaced) = state
            .place_bid(&item_1(), at(OPENED_AT + 2), BIDDER_2, 6)
            .expect_report("Higher bid must pass");
        let refund = displaced.expect_report("Previous bidder must be displaced");
        claim_eq!(refund.account, BIDDER_1);
        claim_eq!(refund.amount, 3, "Refund equals the escrow it replaces");

        let auction = state.auction(&item_1()).expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 2);
        claim_eq!(auction.current_price, 6);
        claim_eq!(auction.high_bidder, Some(BIDDER_2));
    }

    #[concordium_test]
    fn test_bid_after_deadline_rejected() {
        let mut state = state_with_auction(1, 2);
        let deadline = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;

        // At the deadline bids are still accepted; past it they are not.
        let result = state.place_bid(&item_1(), deadline, BIDDER_1, 3);
        claim!(result.is_ok(), "Bid at the deadline must pass");

        // The deadline bid lands inside the margin and extends the deadline.
        let extended = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;
        claim_eq!(extended, saturating_add(deadline, EXTENSION_MARGIN));

        let result = state.place_bid(
            &item_1(),
            at(extended.timestamp_millis() + 1),
            BIDDER_2,
            10,
        );
        claim_eq!(result.err(), Some(CustomContractError::AuctionExpired.into()));
    }

    #[concordium_test]
    fn test_deadline_extension_only_within_margin() {
        let mut state = state_with_auction(1, 2);
        let deadline = at(OPENED_AT + AUCTION_DURATION.millis());

        // Early bid: deadline untouched.
        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 3)
            .expect_report("Early bid must pass");
        claim_eq!(
            state.auction(&item_1()).expect_report("Auction must exist").deadline,
            deadline
        );

        // Bid with less than the margin remaining: deadline becomes
        // now + margin, which is strictly later than before.
        let late = at(deadline.timestamp_millis() - EXTENSION_MARGIN.millis() + 1);
        let _ = state
            .place_bid(&item_1(), late, BIDDER_2, 6)
            .expect_report("Late bid must pass");
        let extended = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;
        claim_eq!(extended, saturating_add(late, EXTENSION_MARGIN));
        claim!(extended > deadline, "Deadline never decreases");
    }

    #[concordium_test]
    fn test_settle_two_bids_sells_to_high_bidder() {
        let mut state = state_with_auction(1, 2);
        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 3)
            .expect_report("First bid must pass");
        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 2), BIDDER_2, 6)
            .expect_report("Second bid must pass");
        let deadline = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;

        let settlement = state
            .settle_auction(
                &item_1(),
                &BIDDER_1,
                at(deadline.timestamp_millis() + 1),
            )
            .expect_report("Settling after expiry must pass");
        match settlement {
            Settlement::Sold {
                seller,
                winner,
                price,
                ..
            } => {
                claim_eq!(seller, SELLER);
                claim_eq!(winner, BIDDER_2);
                claim_eq!(price, 6);
            }
            Settlement::Returned { .. } => fail!("Two bids must settle as a sale"),
        }
        claim_eq!(
            state.auction(&item_1()).err(),
            Some(CustomContractError::NoSuchAuction.into()),
            "Settled auction must be removed"
        );
    }

    #[concordium_test]
    fn test_settle_single_bid_returns_item_and_refunds() {
        let mut state = state_with_auction(1, 2);
        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 5)
            .expect_report("Bid must pass");
        let deadline = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;

        let settlement = state
            .settle_auction(
                &item_1(),
                &BIDDER_1,
                at(deadline.timestamp_millis() + 1),
            )
            .expect_report("Settling after expiry must pass");
        match settlement {
            Settlement::Returned { seller, refund, .. } => {
                claim_eq!(seller, SELLER);
                let refund = refund.expect_report("Sole bid must be refunded");
                claim_eq!(refund.account, BIDDER_1);
                claim_eq!(refund.amount, 5);
            }
            Settlement::Sold { .. } => fail!("A single bid must not make a sale"),
        }
    }

    #[concordium_test]
    fn test_settle_no_bids_returns_item() {
        let mut state = state_with_auction(1, 2);
        let deadline = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;

        let settlement = state
            .settle_auction(
                &item_1(),
                &BIDDER_1,
                at(deadline.timestamp_millis() + 1),
            )
            .expect_report("Settling after expiry must pass");
        match settlement {
            Settlement::Returned { seller, refund, .. } => {
                claim_eq!(seller, SELLER);
                claim!(refund.is_none());
            }
            Settlement::Sold { .. } => fail!("No bids must not make a sale"),
        }
    }

    #[concordium_test]
    fn test_settle_before_expiry_is_seller_only() {
        let mut state = state_with_auction(1, 2);

        let result = state.settle_auction(&item_1(), &BIDDER_1, at(OPENED_AT + 1));
        claim_eq!(
            result.err(),
            Some(CustomContractError::AuctionNotExpired.into())
        );
        claim!(
            state.auction(&item_1()).is_ok(),
            "Rejected settle must leave the auction intact"
        );

        let result = state.settle_auction(&item_1(), &SELLER, at(OPENED_AT + 1));
        claim!(result.is_ok(), "The seller may force an early settlement");
    }

    #[concordium_test]
    fn test_cancel_checks_seller_and_deadline() {
        let mut state = state_with_auction(1, 2);
        let _ = state
            .place_bid(&item_1(), at(OPENED_AT + 1), BIDDER_1, 3)
            .expect_report("Bid must pass");
        let deadline = state
            .auction(&item_1())
            .expect_report("Auction must exist")
            .deadline;

        let result = state.cancel_auction(&item_1(), &BIDDER_1, at(OPENED_AT + 2));
        claim_eq!(result.err(), Some(CustomContractError::Unauthorized.into()));

        let result = state.cancel_auction(
            &item_1(),
            &SELLER,
            at(deadline.timestamp_millis() + 1),
        );
        claim_eq!(result.err(), Some(CustomContractError::AuctionExpired.into()));
        let auction = state.auction(&item_1()).expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 1, "Failed cancel must not touch escrow");

        let (seller, _, refund) = state
            .cancel_auction(&item_1(), &SELLER, at(OPENED_AT + 3))
            .expect_report("Cancel before expiry by the seller must pass");
        claim_eq!(seller, SELLER);
        let refund = refund.expect_report("Outstanding bid must be refunded");
        claim_eq!(refund.account, BIDDER_1);
        claim_eq!(refund.amount, 3);
    }

    #[concordium_test]
    fn test_escrow_matches_collected_minus_refunded() {
        let mut state = state_with_auction(10, 5);
        let bids: [(AccountAddress, AssetAmount); 3] =
            [(BIDDER_1, 15), (BIDDER_2, 20), (BIDDER_1, 30)];

        let mut collected: u64 = 0;
        let mut refunded: u64 = 0;
        for (i, (bidder, amount)) in bids.iter().enumerate() {
            let (_, displaced) = state
                .place_bid(&item_1(), at(OPENED_AT + 1 + i as u64), *bidder, *amount)
                .expect_report("Bid must pass");
            collected += amount;
            if let Some(refund) = displaced {
                refunded += refund.amount;
            }
        }

        let auction = state.auction(&item_1()).expect_report("Auction must exist");
        claim_eq!(
            collected - refunded,
            auction.current_price,
            "Escrow equals the current price while bids are outstanding"
        );
    }

    #[concordium_test]
    fn test_listing_cancel_guards() {
        let mut state_builder = TestStateBuilder::new();
        let mut state = State::new(&mut state_builder, REGISTRY, SELLER);
        state.insert_listing(
            item_1(),
            Listing {
                seller: SELLER,
                price: 10,
                asset: PaymentAsset::Ccd,
            },
        );

        let result = state.cancel_listing(&item_1(), &BIDDER_1);
        claim_eq!(result.err(), Some(CustomContractError::Unauthorized.into()));
        claim!(state.listing(&item_1()).is_ok());

        let listing = state
            .cancel_listing(&item_1(), &SELLER)
            .expect_report("Seller must be able to cancel");
        claim_eq!(listing.price, 10);
        claim_eq!(
            state.listing(&item_1()).err(),
            Some(CustomContractError::NoSuchListing.into())
        );
    }
}
