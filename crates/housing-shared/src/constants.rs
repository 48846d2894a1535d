/// Application name
pub const APP_NAME: &str = "Najran University Housing";

/// Maximum number of applications the vault holds at once
pub const MAX_CAPACITY: usize = 50;

/// Storage key holding the serialized application list
pub const VAULT_STORAGE_KEY: &str = "student_housing_vault";

/// Storage key holding the vault event log
pub const EVENTS_STORAGE_KEY: &str = "vault_events";

/// Number of events retained in the event log
pub const MAX_EVENTS: usize = 100;

/// Yearly housing fees per room type (SAR)
pub const FEE_STANDARD: u32 = 4000;
pub const FEE_PREMIUM: u32 = 6000;
pub const FEE_SUITE: u32 = 8000;

/// Distance weight used for provinces missing from the distance table
pub const DEFAULT_DISTANCE_WEIGHT: u32 = 50;

/// Maximum points contributed by GPA to the priority score
pub const GPA_POINTS: u32 = 70;

/// Upper bound of the GPA scale
pub const GPA_SCALE: f64 = 5.0;

/// GPA required by the high-demand majors
pub const HIGH_DEMAND_MIN_GPA: f64 = 4.0;

/// Nominal number of beds used for the occupancy rate
pub const NOMINAL_BED_CAPACITY: usize = 1000;

/// Default page size for admin listings
pub const DEFAULT_ROWS_PER_PAGE: usize = 25;

/// Default age after which stale applications are cleaned up
pub const DEFAULT_CLEANUP_AGE_DAYS: i64 = 7;

/// Prefix of every generated reference number
pub const REFERENCE_PREFIX: &str = "NU";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Key derivation context (BLAKE3) for sealing the persisted vault
pub const KDF_CONTEXT_VAULT_KEY: &str = "nu-housing-vault-key-v1";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;
