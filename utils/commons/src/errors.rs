use super::*;

/// The custom errors the contract can produce.
#[derive(Serialize, Debug, PartialEq, Eq, Reject, SchemaType)]
pub enum CustomContractError {
    /// Failed parsing the parameter (Error code: -1).
    #[from(ParseError)]
    ParseParams,
    /// Failed logging: Log is full (Error code: -2).
    LogFull,
    /// Failed logging: Log is malformed (Error code: -3).
    LogMalformed,
    /// Listing or auctioning an item at a price of zero (Error code: -4).
    PriceIsZero,
    /// No fixed-price listing exists for this item (Error code: -5).
    NoSuchListing,
    /// No auction exists for this item (Error code: -6).
    NoSuchAuction,
    /// Bid does not clear the current price plus the bid step
    /// (Error code: -7).
    BidTooLow,
    /// The attached amount is less than the required payment
    /// (Error code: -8).
    InsufficientValue,
    /// Sender is not allowed to perform this action (Error code: -9).
    Unauthorized,
    /// The auction deadline has passed (Error code: -10).
    AuctionExpired,
    /// The auction deadline has not passed yet (Error code: -11).
    AuctionNotExpired,
    /// This function must only be called by an account (Error code: -12).
    OnlyAccountAddress,
    /// This function must only be called by a contract (Error code: -13).
    ContractOnly,
    /// Another operation on this contract is already in progress
    /// (Error code: -14).
    RequestInProgress,
    /// Failed to invoke a contract (Error code: -15).
    InvokeContractError,
    /// Failed to invoke a transfer (Error code: -16).
    InvokeTransferError,
    /// Incompatible contract (Error code: -17).
    Incompatible,
}

/// Mapping the logging errors to CustomContractError.
impl From<LogError> for CustomContractError {
    fn from(le: LogError) -> Self {
        match le {
            LogError::Full => Self::LogFull,
            LogError::Malformed => Self::LogMalformed,
        }
    }
}

/// Mapping errors related to contract invocations to CustomContractError.
impl<T> From<CallContractError<T>> for CustomContractError {
    fn from(_cce: CallContractError<T>) -> Self {
        Self::InvokeContractError
    }
}

/// Mapping errors related to transfer invocations to CustomContractError.
impl From<TransferError> for CustomContractError {
    fn from(_te: TransferError) -> Self {
        Self::InvokeTransferError
    }
}

/// Mapping CustomContractError to ContractError
impl From<CustomContractError> for ContractError {
    fn from(c: CustomContractError) -> Self {
        Cis2Error::Custom(c)
    }
}
