use crate::engine::{RunOptions, tally_of};
use crate::pool::PooledInterpreter;
use crate::types::{Session, SessionResult, Summary};
use crate::verdict::{Counters, Reporter, judge};
use futures::future::join_all;
use tracing::debug;

/// Replays all sessions concurrently; the pool size bounds how many run at once.
pub async fn run_sessions_async(
    interpreter: &PooledInterpreter,
    sessions: &[Session],
    opts: RunOptions<'_>,
    reporter: &dyn Reporter,
    counters: &Counters,
) -> Summary {
    debug!(
        sessions = sessions.len(),
        workers = interpreter.max_size(),
        "starting pooled replay"
    );
    let runs = sessions.iter().map(|session| async move {
        let execution = interpreter
            .run_session(session, opts.prologue, opts.normalizer)
            .await;
        judge(session, execution, reporter, counters)
    });
    let results: Vec<SessionResult> = join_all(runs).await;
    Summary {
        tally: tally_of(&results),
        sessions: results,
        load_failures: Vec::new(),
    }
}
