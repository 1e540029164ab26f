use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::ServerError;

/// Installs a formatting subscriber at `level` as the global default.
///
/// # Errors
///
/// Fails if a global subscriber was already installed.
pub fn init_logging(level: Level) -> Result<(), ServerError> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
