use std::future::Future;

use roster_bootable::Bootable;
use tracing::{error, info};

/// Starts `bootable` and runs it until `shutdown_signal` resolves.
///
/// The signal is watched from the moment startup begins, so a shutdown
/// requested while registration is still delaying or retrying aborts it
/// instead of waiting it out. A startup failure is returned as is.
pub(crate) async fn run_until<B, S>(bootable: &B, shutdown_signal: S) -> Result<(), B::Error>
where
    B: Bootable,
    S: Future<Output = ()>,
{
    let name = bootable.bootable_name();

    tokio::pin!(shutdown_signal);
    let start = bootable.start();
    tokio::pin!(start);

    tokio::select! {
        result = &mut start => {
            result?;
            info!("{} running", name);
        }
        () = &mut shutdown_signal => {
            info!("Shutdown requested while starting {}", name);

            let (started, stopped) = tokio::join!(start, bootable.shutdown());
            if let Err(e) = started {
                info!("Startup of {} aborted: {}", name, e);
            }

            return stopped;
        }
    }

    tokio::select! {
        () = shutdown_signal => {
            info!("Shutting down {}", name);
            bootable.shutdown().await?;
        }
        () = bootable.wait() => {
            error!("{} exited", name);
        }
    }

    Ok(())
}
