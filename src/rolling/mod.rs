mod rolling_quantile;
pub use rolling_quantile::RollingQuantile;
