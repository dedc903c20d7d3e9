//! Bridge between the host's synchronous node-calling convention and the
//! async client. The host invokes nodes on a plain thread, so each
//! invocation builds a fresh single-threaded runtime, runs the job to
//! completion, and tears it down. This is the only place sync meets async;
//! everything below it is a plain `async fn`.

use std::future::Future;

pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_a_future_to_completion() {
        let value = block_on(async { 40 + 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn timers_work_inside_the_bridged_runtime() {
        // the sleep must be constructed inside the runtime, not just polled there
        block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        })
        .unwrap();
    }
}
