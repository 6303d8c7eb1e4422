pub mod time;

pub use time::format_duration;

use chrono::Local;
use uuid::Uuid;

/// Identifier of one `run()`: `run-<YYYYMMDDHHmmss>-<8 hex>`.
///
/// The random suffix separates runs started within the same second.
pub fn generate_run_id() -> String {
    let suffix = Uuid::new_v4().as_u128() as u32;
    format!("run-{}-{suffix:08x}", Local::now().format("%Y%m%d%H%M%S"))
}
