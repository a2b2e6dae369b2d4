use super::*;
use crate::{payment, registry};

/// Initialize the marketplace with no listings and no auctions, trading
/// items of the given token registry.
#[init(contract = "Marketplace", parameter = "InitParams")]
fn init<S: HasStateApi>(
    ctx: &impl HasInitContext,
    state_builder: &mut StateBuilder<S>,
) -> InitResult<State<S>> {
    let params = InitParams::deserial(&mut ctx.parameter_cursor())?;
    Ok(State::new(state_builder, params.registry, ctx.init_origin()))
}

/// Run an entrypoint body under the mutual exclusion flag. The flag is
/// cleared on both success and failure, so a rejected call never wedges
/// the contract.
fn with_guard<S: HasStateApi, H: HasHost<State<S>, StateApiType = S>, R>(
    host: &mut H,
    body: impl FnOnce(&mut H) -> ContractResult<R>,
) -> ContractResult<R> {
    host.state_mut().guard.enter()?;
    let result = body(host);
    host.state_mut().guard.exit();
    result
}

fn only_account(sender: &Address) -> ContractResult<AccountAddress> {
    match sender {
        Address::Account(account) => Ok(*account),
        Address::Contract(_) => Err(CustomContractError::OnlyAccountAddress.into()),
    }
}

/// Put an item up for sale at a fixed price. The caller must own the item
/// in the registry and must have made the marketplace an operator there;
/// the item moves into marketplace escrow until it is bought or unlisted.
///
/// It rejects if:
/// - The price is zero.
/// - The caller is a contract or does not own the item.
/// - The registry refuses or lacks the custody transfer.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "listItem",
    parameter = "ListItemParams",
    enable_logger
)]
fn list_item<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let params = ListItemParams::deserial(&mut ctx.parameter_cursor())?;
        let seller = only_account(&ctx.sender())?;
        ensure!(params.price > 0, CustomContractError::PriceIsZero.into());

        let registry = host.state().registry;
        let owner = registry::owner_of(host, &registry, &params.item)?;
        ensure!(
            owner == Address::Account(seller),
            CustomContractError::Unauthorized.into()
        );

        registry::pull_item(host, &registry, &params.item, seller, ctx.self_address())?;

        logger.log(&MarketEvent::list(
            &params.item,
            &seller,
            params.price,
            params.asset,
        ))?;

        host.state_mut().insert_listing(
            params.item,
            Listing {
                seller,
                price: params.price,
                asset: params.asset,
            },
        );

        Ok(())
    })
}

/// Buy a listed item at its asking price. Payment goes straight to the
/// seller and the item leaves escrow to the buyer. For a CCD sale the price
/// must be attached to the call and any surplus is returned; for a token
/// sale the price is pulled from the buyer's pre-authorized balance.
#[receive(
    mutable,
    payable,
    contract = "Marketplace",
    name = "buyItem",
    parameter = "ItemId",
    enable_logger
)]
fn buy_item<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
        let buyer = only_account(&ctx.sender())?;
        let listing = host.state().listing(&item)?;

        payment::pay(
            host,
            buyer,
            amount,
            listing.seller,
            listing.price,
            &listing.asset,
        )?;

        let registry = host.state().registry;
        registry::release_item(host, &registry, &item, ctx.self_address(), buyer)?;
        host.state_mut().remove_listing(&item)?;

        logger.log(&MarketEvent::buy(
            &item,
            &listing.seller,
            &buyer,
            listing.price,
        ))?;

        Ok(())
    })
}

/// Take a listed item off sale. Only the seller may cancel; the item
/// returns from escrow to them.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "cancelListing",
    parameter = "ItemId",
    enable_logger
)]
fn cancel_listing<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
        let caller = only_account(&ctx.sender())?;
        let listing = host.state_mut().cancel_listing(&item, &caller)?;

        let registry = host.state().registry;
        registry::release_item(host, &registry, &item, ctx.self_address(), listing.seller)?;

        logger.log(&MarketEvent::unlist(&item, &listing.seller))?;

        Ok(())
    })
}

/// Open a fixed-duration auction for an item. Same ownership and custody
/// requirements as `listItem`. Bidding closes 24 hours after opening,
/// except for anti-sniping extensions.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "listOnAuction",
    parameter = "OpenAuctionParams",
    enable_logger
)]
fn list_on_auction<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let params = OpenAuctionParams::deserial(&mut ctx.parameter_cursor())?;
        let seller = only_account(&ctx.sender())?;
        ensure!(params.min_price > 0, CustomContractError::PriceIsZero.into());

        let registry = host.state().registry;
        let owner = registry::owner_of(host, &registry, &params.item)?;
        ensure!(
            owner == Address::Account(seller),
            CustomContractError::Unauthorized.into()
        );

        registry::pull_item(host, &registry, &params.item, seller, ctx.self_address())?;

        let auction = Auction::open(
            seller,
            params.min_price,
            params.bid_step,
            params.asset,
            ctx.metadata().slot_time(),
        );

        logger.log(&MarketEvent::open_auction(
            &params.item,
            &seller,
            params.min_price,
            params.bid_step,
            params.asset,
            auction.deadline,
        ))?;

        host.state_mut().open_auction(params.item, auction);

        Ok(())
    })
}

/// Place a bid on a running auction. The bid must exceed the current price
/// by at least the bid step. The full bid moves into escrow and the
/// previously escrowed bid, if any, is returned to its bidder.
#[receive(
    mutable,
    payable,
    contract = "Marketplace",
    name = "makeBid",
    parameter = "BidParams",
    enable_logger
)]
fn make_bid<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    amount: Amount,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let params = BidParams::deserial(&mut ctx.parameter_cursor())?;
        let bidder = only_account(&ctx.sender())?;
        let now = ctx.metadata().slot_time();

        let (asset, displaced) = host.state().prepare_bid(&params.item, now, params.amount)?;
        if asset.is_native() {
            ensure!(
                amount.micro_ccd >= params.amount,
                CustomContractError::InsufficientValue.into()
            );
        }

        // The displaced escrow leaves before the new bid enters, so the
        // contract never owes two refunds for the same auction. The record
        // is only touched once both payments have gone through.
        let self_address = ctx.self_address();
        if let Some(refund) = displaced {
            payment::payout(host, self_address, refund.account, refund.amount, &asset)?;
        }
        payment::collect(host, self_address, bidder, amount, params.amount, &asset)?;

        let _ = host
            .state_mut()
            .place_bid(&params.item, now, bidder, params.amount)?;

        logger.log(&MarketEvent::bid(&params.item, &bidder, params.amount))?;

        Ok(())
    })
}

/// Settle an auction. Anyone may settle once the deadline has passed; the
/// seller may force an early settlement. With two or more bids the item
/// goes to the highest bidder and the escrowed winning bid is paid out to
/// the account that triggered the settlement. With fewer the item returns
/// to the seller and a sole bid is refunded.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "finishAuction",
    parameter = "ItemId",
    enable_logger
)]
fn finish_auction<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
        let caller = only_account(&ctx.sender())?;
        let now = ctx.metadata().slot_time();

        let settlement = host.state_mut().settle_auction(&item, &caller, now)?;

        let registry = host.state().registry;
        let self_address = ctx.self_address();
        match settlement {
            Settlement::Sold {
                seller,
                winner,
                price,
                asset,
            } => {
                registry::release_item(host, &registry, &item, self_address, winner)?;
                payment::payout(host, self_address, caller, price, &asset)?;
                logger.log(&MarketEvent::finish(&item, &seller, Some(&winner), price))?;
            }
            Settlement::Returned {
                seller,
                asset,
                refund,
            } => {
                registry::release_item(host, &registry, &item, self_address, seller)?;
                if let Some(refund) = refund {
                    payment::payout(host, self_address, refund.account, refund.amount, &asset)?;
                }
                logger.log(&MarketEvent::finish(&item, &seller, None, 0))?;
            }
        }

        Ok(())
    })
}

/// Call off a running auction. Only the seller may cancel, and only before
/// the deadline; a lapsed auction can only be finished. The item returns
/// to the seller and an outstanding bid is refunded.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "cancelAuction",
    parameter = "ItemId",
    enable_logger
)]
fn cancel_auction<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
    logger: &mut impl HasLogger,
) -> ContractResult<()> {
    with_guard(host, |host| {
        let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
        let caller = only_account(&ctx.sender())?;
        let now = ctx.metadata().slot_time();

        let (seller, asset, refund) = host.state_mut().cancel_auction(&item, &caller, now)?;

        let registry = host.state().registry;
        let self_address = ctx.self_address();
        registry::release_item(host, &registry, &item, self_address, seller)?;
        if let Some(refund) = refund {
            payment::payout(host, self_address, refund.account, refund.amount, &asset)?;
        }

        logger.log(&MarketEvent::cancel_auction(&item, &seller))?;

        Ok(())
    })
}

/// Deposit hook. Both the registry and CIS-2 payment tokens notify this
/// entrypoint when escrow transfers land; the transfer itself is the
/// record, so nothing is stored here.
#[receive(contract = "Marketplace", name = "onReceivingCIS2")]
fn on_receiving_cis2<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    _host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<()> {
    ensure!(
        matches!(ctx.sender(), Address::Contract(_)),
        CustomContractError::ContractOnly.into()
    );
    Ok(())
}

/// View the fixed-price sale record for an item.
#[receive(
    contract = "Marketplace",
    name = "viewListing",
    parameter = "ItemId",
    return_value = "Listing"
)]
fn view_listing<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<Listing> {
    let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
    host.state().listing(&item)
}

/// View the auction record for an item.
#[receive(
    contract = "Marketplace",
    name = "viewAuction",
    parameter = "ItemId",
    return_value = "Auction"
)]
fn view_auction<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<Auction> {
    let item = ItemId::deserial(&mut ctx.parameter_cursor())?;
    host.state().auction(&item)
}

/// Function to manage addresses that are allowed to maintain and modify the
/// state of the contract.
///
/// It rejects if:
/// - Fails to parse `AuthorityUpdateParams` parameters.
/// - If sender is neither one of the admins nor one of the maintainers.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "updateAuthority",
    parameter = "AuthorityUpdateParams"
)]
fn update_authority<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<()> {
    let params = AuthorityUpdateParams::deserial(&mut ctx.parameter_cursor())?;
    let sender = ctx.sender();
    host.state_mut().authority.handle_update(sender, params)
}

/// Function to view addresses that are allowed to maintain and modify the
/// state of the contract.
#[receive(
    contract = "Marketplace",
    name = "viewAuthority",
    parameter = "AuthorityViewParams",
    return_value = "Vec<Address>"
)]
fn view_authority<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<Vec<Address>> {
    let params = AuthorityViewParams::deserial(&mut ctx.parameter_cursor())?;
    Ok(host.state().authority.handle_view(params))
}

/// Function to update values required for internal contract functionality.
/// This includes:
/// - Registry. Token registry contract whose items are traded here.
///
/// It rejects if:
/// - Fails to parse `InternalValue` parameters.
/// - If sender is not one of the maintainers.
#[receive(
    mutable,
    contract = "Marketplace",
    name = "updateInternalValue",
    parameter = "InternalValue"
)]
fn update_internal_value<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &mut impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<()> {
    if !host.state().authority.has_maintainer_rights(&ctx.sender()) {
        return Err(CustomContractError::Unauthorized.into());
    }

    let params = InternalValue::deserial(&mut ctx.parameter_cursor())?;
    match params {
        InternalValue::Registry(registry) => host.state_mut().registry = registry,
    }

    Ok(())
}

/// Function to view values required for internal contract functionality.
#[receive(
    contract = "Marketplace",
    name = "viewInternalValue",
    parameter = "ViewInternalValueParams",
    return_value = "InternalValue"
)]
fn view_internal_value<S: HasStateApi>(
    ctx: &impl HasReceiveContext,
    host: &impl HasHost<State<S>, StateApiType = S>,
) -> ContractResult<InternalValue> {
    let params = ViewInternalValueParams::deserial(&mut ctx.parameter_cursor())?;
    let value = match params {
        ViewInternalValueParams::Registry => InternalValue::Registry(host.state().registry),
    };
    Ok(value)
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use concordium_std::test_infrastructure::*;

    const CREATOR: AccountAddress = AccountAddress([0u8; 32]);
    const SELLER: AccountAddress = AccountAddress([1u8; 32]);
    const BUYER: AccountAddress = AccountAddress([2u8; 32]);
    const BIDDER_1: AccountAddress = AccountAddress([3u8; 32]);
    const BIDDER_2: AccountAddress = AccountAddress([4u8; 32]);

    const MARKET: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };
    const REGISTRY: ContractAddress = ContractAddress {
        index: 5,
        subindex: 0,
    };
    const TOKEN: ContractAddress = ContractAddress {
        index: 8,
        subindex: 0,
    };

    const OPENED_AT: u64 = 1_000;

    fn item_1() -> ItemId {
        TokenIdVec(vec![0, 1])
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_timestamp_millis(millis)
    }

    fn ccd(micro: u64) -> Amount {
        Amount::from_micro_ccd(micro)
    }

    fn new_ctx<'a>(sender: Address, slot_time: u64) -> TestReceiveContext<'a> {
        let mut ctx = TestReceiveContext::empty();
        ctx.set_sender(sender);
        ctx.set_self_address(MARKET);
        ctx.set_metadata_slot_time(at(slot_time));
        ctx
    }

    fn account_ctx<'a>(sender: AccountAddress, slot_time: u64) -> TestReceiveContext<'a> {
        new_ctx(Address::Account(sender), slot_time)
    }

    fn new_host() -> TestHost<State<TestStateApi>> {
        let mut state_builder = TestStateBuilder::new();
        let state = State::new(&mut state_builder, REGISTRY, CREATOR);
        TestHost::new(state, state_builder)
    }

    /// Registry stub: a fixed item owner, transfers always succeed.
    fn mock_registry(host: &mut TestHost<State<TestStateApi>>, owner: AccountAddress) {
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("ownerOf".into()),
            MockFn::new_v1(move |_, _, _, _| Ok((false, Address::Account(owner)))),
        );
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|_, _, _, _| Ok((true, ()))),
        );
    }

    fn with_listing(host: &mut TestHost<State<TestStateApi>>, price: AssetAmount, asset: PaymentAsset) {
        host.state_mut().insert_listing(
            item_1(),
            Listing {
                seller: SELLER,
                price,
                asset,
            },
        );
    }

    fn with_auction(host: &mut TestHost<State<TestStateApi>>, min_price: AssetAmount, bid_step: AssetAmount) {
        host.state_mut().open_auction(
            item_1(),
            Auction::open(SELLER, min_price, bid_step, PaymentAsset::Ccd, at(OPENED_AT)),
        );
    }

    fn bid_params(amount: AssetAmount) -> Vec<u8> {
        to_bytes(&BidParams {
            item: item_1(),
            amount,
        })
    }

    #[concordium_test]
    fn test_init() {
        let parameter_bytes = to_bytes(&InitParams { registry: REGISTRY });
        let mut ctx = TestInitContext::empty();
        ctx.set_init_origin(CREATOR);
        ctx.set_parameter(&parameter_bytes);
        let mut state_builder = TestStateBuilder::new();

        let state = init(&ctx, &mut state_builder).expect_report("Init must pass");
        claim_eq!(state.registry, REGISTRY);
        claim!(!state.guard.is_entered());
        claim_eq!(
            state.listing(&item_1()).err(),
            Some(CustomContractError::NoSuchListing.into())
        );
        claim!(
            state.authority.has_admin_rights(&Address::Account(CREATOR)),
            "The instance creator starts as admin"
        );
    }

    #[concordium_test]
    fn test_list_item() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&ListItemParams {
            item: item_1(),
            price: 10,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_item(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));

        let listing = host
            .state()
            .listing(&item_1())
            .expect_report("Listing must exist");
        claim_eq!(listing.seller, SELLER);
        claim_eq!(listing.price, 10);
        claim_eq!(listing.asset, PaymentAsset::Ccd);
        claim_eq!(
            logger.logs,
            [to_bytes(&MarketEvent::list(
                &item_1(),
                &SELLER,
                10,
                PaymentAsset::Ccd
            ))]
        );
    }

    #[concordium_test]
    fn test_list_item_zero_price() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&ListItemParams {
            item: item_1(),
            price: 0,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_item(&ctx, &mut host, &mut logger);
        claim_eq!(result, Err(CustomContractError::PriceIsZero.into()));
        claim!(host.state().listing(&item_1()).is_err());
    }

    #[concordium_test]
    fn test_list_item_not_owner() {
        let mut host = new_host();
        mock_registry(&mut host, BUYER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&ListItemParams {
            item: item_1(),
            price: 10,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_item(&ctx, &mut host, &mut logger);
        claim_eq!(
            result,
            Err(CustomContractError::Unauthorized.into()),
            "Only the registry owner may list an item"
        );
    }

    #[concordium_test]
    fn test_list_item_contract_sender() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&ListItemParams {
            item: item_1(),
            price: 10,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = new_ctx(Address::Contract(TOKEN), OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_item(&ctx, &mut host, &mut logger);
        claim_eq!(result, Err(CustomContractError::OnlyAccountAddress.into()));
    }

    #[concordium_test]
    fn test_buy_item_ccd() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_listing(&mut host, 10, PaymentAsset::Ccd);
        host.set_self_balance(ccd(10));
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = buy_item(&ctx, &mut host, ccd(10), &mut logger);
        claim_eq!(result, Ok(()));
        claim_eq!(
            host.get_transfers(),
            [(SELLER, ccd(10))],
            "The full price goes to the seller"
        );
        claim_eq!(
            host.state().listing(&item_1()).err(),
            Some(CustomContractError::NoSuchListing.into()),
            "A sold item is no longer listed"
        );
        claim_eq!(
            logger.logs,
            [to_bytes(&MarketEvent::buy(&item_1(), &SELLER, &BUYER, 10))]
        );
    }

    #[concordium_test]
    fn test_buy_item_underpaid_keeps_listing() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_listing(&mut host, 10, PaymentAsset::Ccd);
        host.set_self_balance(ccd(9));
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = buy_item(&ctx, &mut host, ccd(9), &mut logger);
        claim_eq!(result, Err(CustomContractError::InsufficientValue.into()));
        claim!(host.get_transfers().is_empty(), "No partial payment");
        claim!(
            host.state().listing(&item_1()).is_ok(),
            "A failed purchase leaves the listing intact"
        );
    }

    #[concordium_test]
    fn test_buy_item_missing_listing() {
        let mut host = new_host();
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = buy_item(&ctx, &mut host, ccd(10), &mut logger);
        claim_eq!(result, Err(CustomContractError::NoSuchListing.into()));
    }

    #[concordium_test]
    fn test_buy_item_with_token_asset() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_listing(&mut host, 10, PaymentAsset::Cis2(TOKEN));
        host.setup_mock_entrypoint(
            TOKEN,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdUnit, TokenAmountU64>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Account(BUYER)
                    || transfer.amount != TokenAmountU64(10)
                {
                    return Err(CallContractError::Trap);
                }
                match &transfer.to {
                    Receiver::Account(account) if *account == SELLER => Ok((true, ())),
                    _ => Err(CallContractError::Trap),
                }
            }),
        );
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = buy_item(&ctx, &mut host, Amount::zero(), &mut logger);
        claim_eq!(result, Ok(()));
        claim!(host.get_transfers().is_empty(), "No CCD moves in a token sale");
        claim!(host.state().listing(&item_1()).is_err());
    }

    #[concordium_test]
    fn test_cancel_listing() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_listing(&mut host, 10, PaymentAsset::Ccd);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);
        let result = cancel_listing(&ctx, &mut host, &mut logger);
        claim_eq!(
            result,
            Err(CustomContractError::Unauthorized.into()),
            "Only the seller may cancel"
        );
        claim!(host.state().listing(&item_1()).is_ok());

        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);
        let result = cancel_listing(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));
        claim!(host.state().listing(&item_1()).is_err());
        claim_eq!(
            logger.logs,
            [to_bytes(&MarketEvent::unlist(&item_1(), &SELLER))]
        );
    }

    #[concordium_test]
    fn test_open_auction() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&OpenAuctionParams {
            item: item_1(),
            min_price: 5,
            bid_step: 2,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_on_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));

        let auction = host
            .state()
            .auction(&item_1())
            .expect_report("Auction must exist");
        claim_eq!(auction.seller, SELLER);
        claim_eq!(auction.current_price, 5, "Seeded with the starting price");
        claim_eq!(auction.bid_count, 0);
        claim_eq!(
            auction.deadline,
            at(OPENED_AT + AUCTION_DURATION.millis()),
            "Bidding closes a fixed duration after opening"
        );
    }

    #[concordium_test]
    fn test_open_auction_zero_min_price() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&OpenAuctionParams {
            item: item_1(),
            min_price: 0,
            bid_step: 2,
            asset: PaymentAsset::Ccd,
        });
        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);

        let result = list_on_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Err(CustomContractError::PriceIsZero.into()));
        claim!(host.state().auction(&item_1()).is_err());
    }

    #[concordium_test]
    fn test_bid_flow_escrows_and_refunds() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        // First bid: 3 CCD enters escrow, nobody is displaced.
        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(3));
        let result = make_bid(&ctx, &mut host, ccd(3), &mut logger);
        claim_eq!(result, Ok(()));
        claim!(host.get_transfers().is_empty(), "First bid refunds nobody");

        // Second bid: 6 CCD enters escrow, the 3 CCD bid is returned.
        let parameter_bytes = bid_params(6);
        let mut ctx = account_ctx(BIDDER_2, OPENED_AT + 2);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(9));
        let result = make_bid(&ctx, &mut host, ccd(6), &mut logger);
        claim_eq!(result, Ok(()));
        claim_eq!(
            host.get_transfers(),
            [(BIDDER_1, ccd(3))],
            "Exactly the displaced escrow is refunded"
        );

        let auction = host
            .state()
            .auction(&item_1())
            .expect_report("Auction must exist");
        claim_eq!(auction.current_price, 6);
        claim_eq!(auction.bid_count, 2);
        claim_eq!(auction.high_bidder, Some(BIDDER_2));
        claim_eq!(
            logger.logs,
            [
                to_bytes(&MarketEvent::bid(&item_1(), &BIDDER_1, 3)),
                to_bytes(&MarketEvent::bid(&item_1(), &BIDDER_2, 6)),
            ]
        );
    }

    #[concordium_test]
    fn test_bid_underfunded() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(2));

        let result = make_bid(&ctx, &mut host, ccd(2), &mut logger);
        claim_eq!(
            result,
            Err(CustomContractError::InsufficientValue.into()),
            "The offered amount must be attached in full"
        );
        let auction = host
            .state()
            .auction(&item_1())
            .expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 0, "A rejected bid leaves no trace");
        claim!(host.get_transfers().is_empty());
    }

    #[concordium_test]
    fn test_bid_too_low() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(2);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(2));

        let result = make_bid(&ctx, &mut host, ccd(2), &mut logger);
        claim_eq!(result, Err(CustomContractError::BidTooLow.into()));
        let auction = host
            .state()
            .auction(&item_1())
            .expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 0);
        claim_eq!(auction.current_price, 1);
        claim!(host.get_transfers().is_empty());
    }

    #[concordium_test]
    fn test_cis2_bid_rejection_leaves_no_trace() {
        let mut host = new_host();
        host.state_mut().open_auction(
            item_1(),
            Auction::open(SELLER, 1, 2, PaymentAsset::Cis2(TOKEN), at(OPENED_AT)),
        );
        host.setup_mock_entrypoint(
            TOKEN,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1::<(), _>(|_, _, _, _| {
                Err(CallContractError::LogicReject {
                    reason: -42,
                    return_value: (),
                })
            }),
        );
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);

        let result = make_bid(&ctx, &mut host, Amount::zero(), &mut logger);
        claim_eq!(
            result,
            Err(CustomContractError::InvokeContractError.into()),
            "A refused token pull must abort the bid"
        );
        let auction = host
            .state()
            .auction(&item_1())
            .expect_report("Auction must exist");
        claim_eq!(auction.bid_count, 0, "A failed pull leaves the record untouched");
        claim_eq!(auction.current_price, 1);
        claim_eq!(auction.high_bidder, None);
        claim!(logger.logs.is_empty());
    }

    #[concordium_test]
    fn test_bid_deadline_checked_before_funding() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let after_expiry = OPENED_AT + AUCTION_DURATION.millis() + 1;
        let parameter_bytes = bid_params(10);
        let mut ctx = account_ctx(BIDDER_1, after_expiry);
        ctx.set_parameter(&parameter_bytes);

        // Unfunded and late: the deadline decides the error.
        let result = make_bid(&ctx, &mut host, Amount::zero(), &mut logger);
        claim_eq!(result, Err(CustomContractError::AuctionExpired.into()));

        // Unfunded and below the step: the threshold decides the error.
        let parameter_bytes = bid_params(2);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        let result = make_bid(&ctx, &mut host, Amount::zero(), &mut logger);
        claim_eq!(result, Err(CustomContractError::BidTooLow.into()));
    }

    #[concordium_test]
    fn test_finish_with_two_bids_pays_out_escrow() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(3));
        make_bid(&ctx, &mut host, ccd(3), &mut logger).expect_report("First bid must pass");

        let parameter_bytes = bid_params(6);
        let mut ctx = account_ctx(BIDDER_2, OPENED_AT + 2);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(9));
        make_bid(&ctx, &mut host, ccd(6), &mut logger).expect_report("Second bid must pass");

        let after_expiry = OPENED_AT + AUCTION_DURATION.millis() + 1;
        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, after_expiry);
        ctx.set_parameter(&parameter_bytes);
        let result = finish_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));

        // The escrowed winning bid leaves the contract to the settling
        // account; the item goes to the highest bidder.
        claim_eq!(
            host.get_transfers(),
            [(BIDDER_1, ccd(3)), (BUYER, ccd(6))]
        );
        claim!(host.state().auction(&item_1()).is_err(), "Auction is gone");
        claim_eq!(
            logger.logs[2],
            to_bytes(&MarketEvent::finish(&item_1(), &SELLER, Some(&BIDDER_2), 6))
        );
    }

    #[concordium_test]
    fn test_finish_with_single_bid_returns_item_and_refunds() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(5);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(5));
        make_bid(&ctx, &mut host, ccd(5), &mut logger).expect_report("Bid must pass");

        let after_expiry = OPENED_AT + AUCTION_DURATION.millis() + 1;
        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, after_expiry);
        ctx.set_parameter(&parameter_bytes);
        let result = finish_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));
        claim_eq!(
            host.get_transfers(),
            [(BIDDER_1, ccd(5))],
            "A single bid does not make a sale and is refunded"
        );
        claim_eq!(
            logger.logs[1],
            to_bytes(&MarketEvent::finish(&item_1(), &SELLER, None, 0))
        );
    }

    #[concordium_test]
    fn test_finish_before_expiry_is_seller_only() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(BUYER, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        let result = finish_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Err(CustomContractError::AuctionNotExpired.into()));
        claim!(host.state().auction(&item_1()).is_ok());

        let mut ctx = account_ctx(SELLER, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        let result = finish_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()), "The seller may settle early");
        claim!(host.state().auction(&item_1()).is_err());
    }

    #[concordium_test]
    fn test_cancel_auction_refunds_outstanding_bid() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(3));
        make_bid(&ctx, &mut host, ccd(3), &mut logger).expect_report("Bid must pass");

        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(SELLER, OPENED_AT + 2);
        ctx.set_parameter(&parameter_bytes);
        let result = cancel_auction(&ctx, &mut host, &mut logger);
        claim_eq!(result, Ok(()));
        claim_eq!(host.get_transfers(), [(BIDDER_1, ccd(3))]);
        claim!(host.state().auction(&item_1()).is_err());
        claim_eq!(
            logger.logs[1],
            to_bytes(&MarketEvent::cancel_auction(&item_1(), &SELLER))
        );
    }

    #[concordium_test]
    fn test_cancel_auction_after_expiry_rejected() {
        let mut host = new_host();
        mock_registry(&mut host, SELLER);
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let after_expiry = OPENED_AT + AUCTION_DURATION.millis() + 1;
        let parameter_bytes = to_bytes(&item_1());
        let mut ctx = account_ctx(SELLER, after_expiry);
        ctx.set_parameter(&parameter_bytes);

        let result = cancel_auction(&ctx, &mut host, &mut logger);
        claim_eq!(
            result,
            Err(CustomContractError::AuctionExpired.into()),
            "A lapsed auction can only be finished"
        );
        claim!(host.state().auction(&item_1()).is_ok());
    }

    #[concordium_test]
    fn test_reentrant_call_rejected() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        host.state_mut()
            .guard
            .enter()
            .expect_report("Guard must be free");

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(3));

        let result = make_bid(&ctx, &mut host, ccd(3), &mut logger);
        claim_eq!(result, Err(CustomContractError::RequestInProgress.into()));
    }

    #[concordium_test]
    fn test_guard_released_after_failure() {
        let mut host = new_host();
        with_auction(&mut host, 1, 2);
        let mut logger = TestLogger::init();

        let parameter_bytes = bid_params(2);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 1);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(2));
        let result = make_bid(&ctx, &mut host, ccd(2), &mut logger);
        claim!(result.is_err());
        claim!(
            !host.state().guard.is_entered(),
            "A rejected call must not wedge the contract"
        );

        let parameter_bytes = bid_params(3);
        let mut ctx = account_ctx(BIDDER_1, OPENED_AT + 2);
        ctx.set_parameter(&parameter_bytes);
        host.set_self_balance(ccd(3));
        let result = make_bid(&ctx, &mut host, ccd(3), &mut logger);
        claim_eq!(result, Ok(()));
    }

    #[concordium_test]
    fn test_deposit_hook_rejects_accounts() {
        let mut host = new_host();

        let ctx = new_ctx(Address::Contract(REGISTRY), OPENED_AT);
        claim_eq!(on_receiving_cis2(&ctx, &host), Ok(()));

        let ctx = account_ctx(SELLER, OPENED_AT);
        claim_eq!(
            on_receiving_cis2(&ctx, &host),
            Err(CustomContractError::ContractOnly.into()),
            "Direct account calls carry no escrow deposit"
        );
    }

    #[concordium_test]
    fn test_update_internal_value() {
        let mut host = new_host();
        let replacement = ContractAddress {
            index: 9,
            subindex: 0,
        };
        let parameter_bytes = to_bytes(&InternalValue::Registry(replacement));

        let mut ctx = account_ctx(SELLER, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);
        let result = update_internal_value(&ctx, &mut host);
        claim_eq!(
            result,
            Err(CustomContractError::Unauthorized.into()),
            "Only maintainers may repoint the registry"
        );
        claim_eq!(host.state().registry, REGISTRY);

        let mut ctx = account_ctx(CREATOR, OPENED_AT);
        ctx.set_parameter(&parameter_bytes);
        let result = update_internal_value(&ctx, &mut host);
        claim_eq!(result, Ok(()));
        claim_eq!(host.state().registry, replacement);
    }
}
