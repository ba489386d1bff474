//! Persistence collaborators (Supabase REST)

pub mod games;
pub mod supabase;

pub use games::{persist_match, DisabledGameStore, GameRecord, GameStore, SupabaseGameStore};
pub use supabase::{StoreError, SupabaseClient};
