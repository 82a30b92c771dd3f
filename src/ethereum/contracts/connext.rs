//! Connext core contract bindings.

use alloy::sol;

// Only the arbitrary-message entrypoint is needed; no assets are bridged.
sol! {
    #[sol(rpc)]
    interface IConnext {
        function xcall(
            uint32 destination,
            address to,
            address asset,
            address delegate,
            uint256 amount,
            uint256 slippage,
            bytes calldata callData
        ) external payable returns (bytes32);
    }
}
