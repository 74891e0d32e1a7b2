pub mod backfill;
pub mod gameserver;
