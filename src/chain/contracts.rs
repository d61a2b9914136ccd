//! Contract bindings

use alloy::sol;

sol! {
    /// autoHODL savings registry and executor
    #[sol(rpc)]
    interface IAutoHodl {
        function getSavings(address user, address token)
            external
            view
            returns (
                address toAddress,
                address delegate,
                uint256 roundUp,
                bool active,
                bool depositYield
            );

        function executeSavings(address user, address token, uint256 amount) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address owner) external view returns (uint256);
    }
}
