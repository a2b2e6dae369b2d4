use super::*;

/// Fungible payment tokens use the unit token id.
const PAYMENT_TOKEN_ID: TokenIdUnit = TokenIdUnit();

/// Settle a payment directly from `payer` to `payee`.
///
/// For CCD the required amount must have been attached to the triggering
/// call; any surplus is returned to the payer. For a CIS-2 asset the amount
/// is pulled from the payer's pre-authorized balance, and CCD attached by
/// mistake is handed back.
pub fn pay<T>(
    host: &mut impl HasHost<T>,
    payer: AccountAddress,
    attached: Amount,
    payee: AccountAddress,
    amount: AssetAmount,
    asset: &PaymentAsset,
) -> ContractResult<()> {
    match asset {
        PaymentAsset::Ccd => {
            ensure!(
                attached.micro_ccd >= amount,
                CustomContractError::InsufficientValue.into()
            );
            host.invoke_transfer(&payee, Amount::from_micro_ccd(amount))?;
            refund_surplus(host, payer, attached, amount)?;
        }
        PaymentAsset::Cis2(contract) => {
            transfer_tokens(
                host,
                contract,
                Address::Account(payer),
                Receiver::Account(payee),
                amount,
            )?;
            return_attached(host, payer, attached)?;
        }
    }
    Ok(())
}

/// Pull a payment from `payer` into marketplace escrow.
pub fn collect<T>(
    host: &mut impl HasHost<T>,
    self_address: ContractAddress,
    payer: AccountAddress,
    attached: Amount,
    amount: AssetAmount,
    asset: &PaymentAsset,
) -> ContractResult<()> {
    match asset {
        PaymentAsset::Ccd => {
            // The attached CCD already sits in the contract balance.
            ensure!(
                attached.micro_ccd >= amount,
                CustomContractError::InsufficientValue.into()
            );
            refund_surplus(host, payer, attached, amount)?;
        }
        PaymentAsset::Cis2(contract) => {
            transfer_tokens(
                host,
                contract,
                Address::Account(payer),
                Receiver::Contract(
                    self_address,
                    OwnedEntrypointName::new_unchecked(DEPOSIT_ENTRYPOINT.into()),
                ),
                amount,
            )?;
            return_attached(host, payer, attached)?;
        }
    }
    Ok(())
}

/// Release an escrowed payment to `payee`.
pub fn payout<T>(
    host: &mut impl HasHost<T>,
    self_address: ContractAddress,
    payee: AccountAddress,
    amount: AssetAmount,
    asset: &PaymentAsset,
) -> ContractResult<()> {
    match asset {
        PaymentAsset::Ccd => {
            host.invoke_transfer(&payee, Amount::from_micro_ccd(amount))?;
        }
        PaymentAsset::Cis2(contract) => {
            transfer_tokens(
                host,
                contract,
                Address::Contract(self_address),
                Receiver::Account(payee),
                amount,
            )?;
        }
    }
    Ok(())
}

fn transfer_tokens<T>(
    host: &mut impl HasHost<T>,
    asset: &ContractAddress,
    from: Address,
    to: Receiver,
    amount: AssetAmount,
) -> ContractResult<()> {
    let transfer = Transfer {
        token_id: PAYMENT_TOKEN_ID,
        amount: TokenAmountU64(amount),
        from,
        to,
        data: AdditionalData::empty(),
    };
    host.invoke_contract(
        asset,
        &TransferParams::from(vec![transfer]),
        EntrypointName::new_unchecked("transfer"),
        Amount::zero(),
    )
    .map_err(handle_call_error)?;
    Ok(())
}

/// Return CCD attached beyond the required payment.
fn refund_surplus<T>(
    host: &mut impl HasHost<T>,
    payer: AccountAddress,
    attached: Amount,
    required: AssetAmount,
) -> ContractResult<()> {
    let surplus = attached.micro_ccd.saturating_sub(required);
    if surplus > 0 {
        host.invoke_transfer(&payer, Amount::from_micro_ccd(surplus))?;
    }
    Ok(())
}

/// CCD attached to a token-denominated payment is not consumed, hand it back.
fn return_attached<T>(
    host: &mut impl HasHost<T>,
    payer: AccountAddress,
    attached: Amount,
) -> ContractResult<()> {
    if attached > Amount::zero() {
        host.invoke_transfer(&payer, attached)?;
    }
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

    const PAYER: AccountAddress = AccountAddress([1; 32]);
    const PAYEE: AccountAddress = AccountAddress([2; 32]);
    const MARKET: ContractAddress = ContractAddress {
        index: 1,
        subindex: 0,
    };
    const ASSET: ContractAddress = ContractAddress {
        index: 8,
        subindex: 0,
    };

    fn new_host() -> TestHost<()> {
        TestHost::new((), TestStateBuilder::default())
    }

    fn ccd(micro: u64) -> Amount {
        Amount::from_micro_ccd(micro)
    }

    #[concordium_test]
    fn test_pay_ccd_forwards_exact_amount() {
        let mut host = new_host();
        host.set_self_balance(ccd(10));

        let result = pay(&mut host, PAYER, ccd(10), PAYEE, 10, &PaymentAsset::Ccd);
        claim_eq!(result, Ok(()));
        claim_eq!(host.get_transfers(), [(PAYEE, ccd(10))]);
    }

    #[concordium_test]
    fn test_pay_ccd_returns_surplus() {
        let mut host = new_host();
        host.set_self_balance(ccd(15));

        let result = pay(&mut host, PAYER, ccd(15), PAYEE, 10, &PaymentAsset::Ccd);
        claim_eq!(result, Ok(()));
        claim_eq!(host.get_transfers(), [(PAYEE, ccd(10)), (PAYER, ccd(5))]);
    }

    #[concordium_test]
    fn test_pay_ccd_underfunded() {
        let mut host = new_host();
        host.set_self_balance(ccd(9));

        let result = pay(&mut host, PAYER, ccd(9), PAYEE, 10, &PaymentAsset::Ccd);
        claim_eq!(
            result,
            Err(CustomContractError::InsufficientValue.into()),
            "Attaching less than the price must be rejected"
        );
        claim!(host.get_transfers().is_empty(), "No partial transfer");
    }

    #[concordium_test]
    fn test_pay_cis2_moves_tokens_between_accounts() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            ASSET,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdUnit, TokenAmountU64>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Account(PAYER)
                    || transfer.amount != TokenAmountU64(10)
                {
                    return Err(CallContractError::Trap);
                }
                match &transfer.to {
                    Receiver::Account(account) if *account == PAYEE => Ok((true, ())),
                    _ => Err(CallContractError::Trap),
                }
            }),
        );

        let result = pay(
            &mut host,
            PAYER,
            Amount::zero(),
            PAYEE,
            10,
            &PaymentAsset::Cis2(ASSET),
        );
        claim_eq!(result, Ok(()));
        claim!(host.get_transfers().is_empty(), "No CCD moves in a token sale");
    }

    #[concordium_test]
    fn test_collect_cis2_targets_escrow_hook() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            ASSET,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdUnit, TokenAmountU64>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                match &params.0[0].to {
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

        let result = collect(
            &mut host,
            MARKET,
            PAYER,
            Amount::zero(),
            10,
            &PaymentAsset::Cis2(ASSET),
        );
        claim_eq!(result, Ok(()));
    }

    #[concordium_test]
    fn test_collect_ccd_keeps_escrow_and_returns_surplus() {
        let mut host = new_host();
        host.set_self_balance(ccd(12));

        let result = collect(&mut host, MARKET, PAYER, ccd(12), 10, &PaymentAsset::Ccd);
        claim_eq!(result, Ok(()));
        claim_eq!(
            host.get_transfers(),
            [(PAYER, ccd(2))],
            "Only the surplus leaves the contract"
        );
        claim_eq!(host.self_balance(), ccd(10), "The bid stays in escrow");
    }

    #[concordium_test]
    fn test_payout_ccd() {
        let mut host = new_host();
        host.set_self_balance(ccd(10));

        let result = payout(&mut host, MARKET, PAYEE, 10, &PaymentAsset::Ccd);
        claim_eq!(result, Ok(()));
        claim_eq!(host.get_transfers(), [(PAYEE, ccd(10))]);
    }

    #[concordium_test]
    fn test_payout_cis2_leaves_contract_custody() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            ASSET,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1(|param, _, _, _| {
                let params =
                    TransferParams::<TokenIdUnit, TokenAmountU64>::deserial(&mut Cursor::new(
                        param.as_ref(),
                    ))
                    .map_err(|_| CallContractError::Trap)?;
                let transfer = &params.0[0];
                if transfer.from != Address::Contract(MARKET) {
                    return Err(CallContractError::Trap);
                }
                match &transfer.to {
                    Receiver::Account(account) if *account == PAYEE => Ok((true, ())),
                    _ => Err(CallContractError::Trap),
                }
            }),
        );

        let result = payout(&mut host, MARKET, PAYEE, 10, &PaymentAsset::Cis2(ASSET));
        claim_eq!(result, Ok(()));
    }

    #[concordium_test]
    fn test_asset_rejection_aborts_payment() {
        let mut host = new_host();
        host.setup_mock_entrypoint(
            ASSET,
            OwnedEntrypointName::new_unchecked("transfer".into()),
            MockFn::new_v1::<(), _>(|_, _, _, _| {
                Err(CallContractError::LogicReject {
                    reason: -42,
                    return_value: (),
                })
            }),
        );

        let result = pay(
            &mut host,
            PAYER,
            Amount::zero(),
            PAYEE,
            10,
            &PaymentAsset::Cis2(ASSET),
        );
        claim_eq!(
            result,
            Err(CustomContractError::InvokeContractError.into()),
            "An authorization failure in the asset contract must abort"
        );
    }
}
