//! Price bulletin (destination mirror) contract bindings.

use alloy::sol;

// Bridge receiver side of the bulletin. `callData` is the encoded attestation.
sol! {
    #[sol(rpc)]
    interface IPriceBulletin {
        function xReceive(
            bytes32 transferId,
            uint256 amount,
            address asset,
            address originSender,
            uint32 origin,
            bytes memory callData
        ) external returns (bytes memory);

        function updateBulletin(bytes memory callData) external;

        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}
