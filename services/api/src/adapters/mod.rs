pub mod db;
pub mod rate_limit;
pub mod supabase_auth;

pub use db::DbAdapter;
pub use rate_limit::RedisRateLimiter;
pub use supabase_auth::SupabaseAuthAdapter;
