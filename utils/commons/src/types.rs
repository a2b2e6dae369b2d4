use super::*;

/// Item identifier within the token registry contract.
pub type ItemId = TokenIdVec;

/// Amount of the payment asset. Interpreted as micro CCD when the asset is
/// [`PaymentAsset::Ccd`] and as raw token units otherwise.
pub type AssetAmount = u64;

/// Wrapping the custom errors in a type with CIS2 errors.
pub type ContractError = Cis2Error<CustomContractError>;

pub type ContractResult<A> = Result<A, ContractError>;

/// Denomination a sale or auction is settled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SchemaType)]
pub enum PaymentAsset {
    /// Native currency, attached to the triggering call.
    Ccd,
    /// Fungible CIS-2 token. Moving it on behalf of an account requires the
    /// marketplace to be an operator of that account on the token contract.
    Cis2(ContractAddress),
}

impl PaymentAsset {
    pub fn is_native(&self) -> bool {
        matches!(self, PaymentAsset::Ccd)
    }
}
