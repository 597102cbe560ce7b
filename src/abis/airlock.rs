use alloy::sol;

sol! {
    /// Emitted when the airlock launches a new asset onto its bonding pool.
    event Create(address poolOrHook, address indexed asset, address indexed numeraire);
    /// Emitted when a graduated asset's liquidity migrates to a standard pool.
    event Migrate(address indexed asset, address pool);

    function getAssetData(address asset) external view returns (
        address numeraire,
        address timelock,
        address governance,
        address liquidityMigrator,
        address poolInitializer,
        address pool,
        address migrationPool,
        uint256 numTokensToSell,
        uint256 totalSupply,
        address integrator
    );
}
