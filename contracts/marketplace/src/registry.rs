use super::*;

/// Query the registry for the current owner of an item.
pub fn owner_of<T>(
    host: &impl HasHost<T>,
    registry: &ContractAddress,
    item: &ItemId,
) -> ContractResult<Address> {
    let mut response = host
        .invoke_contract_read_only(
            registry,
            item,
            EntrypointName::new_unchecked("ownerOf"),
            Amount::zero(),
        )
        .map_err(handle_call_error)?
        .ok_or(CustomContractError::Incompatible)?;

    Address::deserial(&mut response).map_err(|_| CustomContractError::Incompatible.into())
}

/// Pull an item from its owner into marketplace escrow. The owner must have
/// made the marketplace an operator in the registry beforehand.
pub fn pull_item<T>(
    host: &mut impl HasHost<T>,
    registry: &ContractAddress,
    item: &ItemId,
    owner: AccountAddress,
    self_address: ContractAddress,
) -> ContractResult<()> {
    transfer_item(
        host,
        registry,
        item,
        Address::Account(owner),
        Receiver::Contract(
            self_address,
            OwnedEntrypointName::new_unchecked(DEPOSIT_ENTRYPOINT.into()),
        ),
    )
}

/// Release an escrowed item to an account.
pub fn release_item<T>(
    host: &mut impl HasHost<T>,
    registry: &ContractAddress,
    item: &ItemId,
    self_address: ContractAddress,
    to: AccountAddress,
) -> ContractResult<()> {
    transfer_item(
        host,
        registry,
        item,
        Address::Contract(self_address),
        Receiver::Account(to),
    )
}

fn transfer_item<T>(
    host: &mut impl HasHost<T>,
    registry: &ContractAddress,
    item: &ItemId,
    from: Address,
    to: Receiver,
) -> ContractResult<()> {
    let transfer = Transfer {
        token_id: item.clone(),
        amount: TokenAmountU8(1),
        from,
        to,
        data: AdditionalData::empty(),
    };
    host.invoke_contract(
        registry,
        &TransferParams::from(vec![transfer]),
        EntrypointName::new_unchecked("transfer"),
        Amount::zero(),
    )
    .map_err(handle_call_error)?;
    Ok(())
}

fn handle_call_error<R>(error: CallContractError<R>) -> ContractError {
    match error {
        CallContractError::MissingEntrypoint | CallContractError::MessageFailed => {
            CustomContractError::Incompatible.into()
        }
        CallContractError::LogicReject { .. } => CustomContractError::InvokeContractError.into(),
        e => e.into(),
    }
}

#[concordium_cfg_test]
mod tests {
    use super::*;
    use concordium_std::test_infrastructure::*;

    const REGISTRY: ContractAddress = ContractAddress {
        index: 5,
        subindex: 0,
    };
    const MARKET: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };
    const OWNER: AccountAddress = AccountAddress([1; 32]);
    const BUYER: AccountAddress = AccountAddress([2; 32]);

    fn item() -> ItemId {
        TokenIdVec(vec![0, 7])
    }

    fn new_host() -> TestHost<()> {
        TestHost::new((), TestStateBuilder::default())
    }

    #[concordium_test]
    fn test_owner_of() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("ownerOf".into()),
            MockFn::new_v1(|param, _, _, _| {
                ItemId::deserial(&mut Cursor::new(param.as_ref()))
                    .map_err(|_| CallContractError::Trap)?;
                Ok((false, Address::Account(OWNER)))
            }),
        );

        let response = owner_of(&host, &REGISTRY, &item());
        claim_eq!(response, Ok(Address::Account(OWNER)));
    }

    #[concordium_test]
    fn test_owner_of_without_response_is_incompatible() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("ownerOf".into()),
            MockFn::new_v1::<(), _>(|_, _, _, _| Err(CallContractError::MissingEntrypoint)),
        );

        let response = owner_of(&host, &REGISTRY, &item());
        claim_eq!(response, Err(CustomContractError::Incompatible.into()));
    }

    #[concordium_test]
    fn test_pull_item_escrows_with_deposit_hook() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdVec, TokenAmountU8>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Account(OWNER)
                    || transfer.amount != TokenAmountU8(1)
                {
                    return Err(CallContractError::Trap);
                }
                match &transfer.to {
                    Receiver::Contract(address, hook)
                        if *address == MARKET
                            && hook.as_entrypoint_name()
                                == EntrypointName::new_unchecked(DEPOSIT_ENTRYPOINT) =>
                    {
                        Ok((true, ()))
                    }
                    _ => Err(CallContractError::Trap),
                }
            }),
        );

        let response = pull_item(&mut host, &REGISTRY, &item(), OWNER, MARKET);
        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    fn test_release_item_to_account() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdVec, TokenAmountU8>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Contract(MARKET) {
                    return Err(CallContractError::Trap);
                }
                match &transfer.to {
                    Receiver::Account(account) if *account == BUYER => Ok((true, ())),
                    _ => Err(CallContractError::Trap),
                }
            }),
        );

        let response = release_item(&mut host, &REGISTRY, &item(), MARKET, BUYER);
        claim_eq!(response, Ok(()));
    }

    #[concordium_test]
    fn test_registry_reject_surfaces_as_invoke_error() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            REGISTRY,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1::<(), _>(|_, _, _, _| {
                Err(CallContractError::LogicReject {
                    reason: -3,
                    return_value: (),
                })
            }),
        );

        let response = release_item(&mut host, &REGISTRY, &item(), MARKET, BUYER);
        claim_eq!(response, Err(CustomContractError::InvokeContractError.into()));
    }
}
