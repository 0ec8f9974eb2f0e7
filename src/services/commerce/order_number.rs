use chrono::Utc;
use rand::Rng;

const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;

/// Source of candidate order numbers.
///
/// Candidates only need to be unlikely to collide: the unique index on
/// `orders.order_number` is what guarantees uniqueness, and checkout asks
/// for a fresh candidate when an insert hits it.
pub trait OrderNumberGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// `{prefix}-{YYYYMMDDHHMMSS}-{6 uppercase alphanumerics}`
#[derive(Debug, Clone)]
pub struct TimestampOrderNumberGenerator {
    prefix: String,
}

impl TimestampOrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl OrderNumberGenerator for TimestampOrderNumberGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
            .collect();

        format!(
            "{}-{}-{}",
            self.prefix,
            Utc::now().format("%Y%m%d%H%M%S"),
            suffix
        )
    }
}
