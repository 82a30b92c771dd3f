//! Pyth contract bindings.

use alloy::sol;

// Pyth pull oracle: updates must be paid for before they are readable on chain.
sol! {
    #[sol(rpc)]
    interface IPyth {
        function getUpdateFee(bytes[] calldata updateData) external view returns (uint256 feeAmount);
        function updatePriceFeeds(bytes[] calldata updateData) external payable;
    }
}
