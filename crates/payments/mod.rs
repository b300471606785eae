pub mod gateway;
pub mod mtn_momo;
pub mod orange_money;
pub mod signatures;
