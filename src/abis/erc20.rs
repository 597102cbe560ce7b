use alloy::sol;

sol! {
    /// ERC-20 metadata read used when a pool's tokens are first discovered.
    function decimals() external view returns (uint8);
}
