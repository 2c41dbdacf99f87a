pub mod asset_store;
