use alloy::sol;

sol! {
    /// Chainlink aggregator read used by the oracle sampling job.
    function latestRoundData() external view returns (
        uint80 roundId,
        int256 answer,
        uint256 startedAt,
        uint256 updatedAt,
        uint80 answeredInRound
    );
}
